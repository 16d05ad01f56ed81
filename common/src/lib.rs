//! txledger Common Types
//!
//! Value types shared by the ledger engine, the wire protocol and the client:
//! money, account tokens, timestamps and deadlines, and the engine error
//! taxonomy.

pub mod identifiers;
pub mod monetary;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use error::*;
pub use time::*;
