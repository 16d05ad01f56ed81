//! txledger Protocol Messages
//!
//! Request and response types exchanged between the gateway and its clients,
//! framed as newline-delimited JSON.

pub mod messages;
pub mod codec;

pub use messages::*;
pub use codec::*;
