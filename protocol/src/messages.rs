//! Protocol message types.
//!
//! Tokens travel as plain strings so that a request with a bad token can still
//! be answered with its id; the gateway parses them into `AccountToken`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use txledger_common::{Money, Timestamp};
use txledger_ledger::{Summary, TransactionRecord};

/// Current protocol version.
pub const PROTOCOL_VERSION: &str = "1.0";

/// A call from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Protocol version.
    pub version: String,
    /// Request id, echoed in the response.
    pub id: Uuid,
    /// Time budget in milliseconds; the gateway default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
    /// The operation.
    #[serde(flatten)]
    pub call: Call,
}

impl Request {
    /// Create a request with a fresh id.
    pub fn new(call: Call) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            id: Uuid::new_v4(),
            deadline_ms: None,
            call,
        }
    }

    /// Set the time budget.
    pub fn with_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }
}

/// Ledger operation carried by a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Call {
    Debit(ActionRequest),
    Credit(ActionRequest),
    GetBalance { token: String },
}

impl Call {
    /// Name of the method, as sent on the wire.
    pub fn method(&self) -> &'static str {
        match self {
            Call::Debit(_) => "debit",
            Call::Credit(_) => "credit",
            Call::GetBalance { .. } => "get_balance",
        }
    }
}

/// Arguments of a debit or credit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Account token.
    pub token: String,
    /// Amount to move.
    pub amount: Money,
    /// Caller reference.
    pub reference: String,
    /// Caller time; the gateway stamps receipt time when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

/// Transport status of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Ok,
    NotFound,
    FailedPrecondition,
    InvalidArgument,
    OutOfRange,
    DeadlineExceeded,
    Internal,
}

impl StatusCode {
    /// Check if the status is OK.
    pub fn is_ok(&self) -> bool {
        matches!(self, StatusCode::Ok)
    }
}

/// Error details of a failed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable error code, e.g. `INSUFFICIENT_FUNDS`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// Payload of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseBody {
    Record(TransactionRecord),
    Summary(Summary),
    Error(ErrorBody),
}

/// The gateway's answer to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Protocol version.
    pub version: String,
    /// Id of the request answered; absent when the request could not be decoded.
    pub id: Option<Uuid>,
    /// Transport status.
    pub status: StatusCode,
    /// Result or error.
    pub body: ResponseBody,
}

impl Response {
    /// Successful response.
    pub fn ok(id: Uuid, body: ResponseBody) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            id: Some(id),
            status: StatusCode::Ok,
            body,
        }
    }

    /// Failed response.
    pub fn error(
        id: Option<Uuid>,
        status: StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            id,
            status,
            body: ResponseBody::Error(ErrorBody {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}
