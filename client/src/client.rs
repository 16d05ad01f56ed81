//! Connection to a txledger gateway.

use std::time::Duration;

use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

use txledger_common::{Money, Timestamp};
use txledger_ledger::{Summary, TransactionRecord};
use txledger_protocol::{
    read_message, write_message, ActionRequest, Call, ErrorBody, ProtocolError, Request,
    Response, ResponseBody, StatusCode,
};

use crate::config::ClientConfig;

/// Client-side failures.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Could not reach the gateway.
    #[error("Connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Connecting took longer than the configured timeout.
    #[error("Connection to {0} timed out")]
    ConnectTimeout(String),

    /// Framing or decoding failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The gateway answered with a non-OK status.
    #[error("{code} ({status:?}): {message}")]
    Rejected {
        status: StatusCode,
        code: String,
        message: String,
    },

    /// No answer within the request timeout.
    #[error("No response within {0:?}")]
    Timeout(Duration),

    /// The gateway closed the connection before answering.
    #[error("Connection closed by gateway")]
    ConnectionClosed,

    /// The answer does not fit the request.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ClientError {
    /// Stable error code of a rejected call.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Rejected { code, .. } => Some(code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    async fn open(config: &ClientConfig) -> Result<Self> {
        let addr = config.server_addr.clone();
        let stream = match tokio::time::timeout(config.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(ClientError::Connect { addr, source }),
            Err(_) => return Err(ClientError::ConnectTimeout(addr)),
        };

        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
        })
    }

    /// Send one request and wait for its answer.
    async fn exchange(&mut self, request: &Request, budget: Duration) -> Result<Response> {
        write_message(&mut self.writer, request).await?;

        match tokio::time::timeout(budget, read_message(&mut self.reader)).await {
            Ok(Ok(Some(response))) => Ok(response),
            Ok(Ok(None)) => Err(ClientError::ConnectionClosed),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ClientError::Timeout(budget)),
        }
    }
}

/// A connection to the gateway. Calls are sent one at a time.
///
/// A call that fails in transport (timeout, I/O, closed connection) drops the
/// connection, since a late or partially read answer may still be in flight.
/// The next call reconnects.
pub struct LedgerClient {
    config: ClientConfig,
    connection: Option<Connection>,
}

impl LedgerClient {
    /// Connect with default settings.
    pub async fn connect(addr: impl Into<String>) -> Result<Self> {
        Self::with_config(ClientConfig {
            server_addr: addr.into(),
            ..ClientConfig::default()
        })
        .await
    }

    /// Connect using `config`.
    #[instrument(skip(config), fields(addr = %config.server_addr))]
    pub async fn with_config(config: ClientConfig) -> Result<Self> {
        let connection = Connection::open(&config).await?;
        info!("Connected to gateway");

        Ok(Self {
            config,
            connection: Some(connection),
        })
    }

    /// Check if a connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Withdraw `amount` from `token`.
    pub async fn debit(
        &mut self,
        token: &str,
        amount: Money,
        reference: impl Into<String>,
        timestamp: Option<Timestamp>,
    ) -> Result<TransactionRecord> {
        let call = Call::Debit(action(token, amount, reference, timestamp));
        self.call(call).await.and_then(expect_record)
    }

    /// Deposit `amount` into `token`, opening the account if needed.
    pub async fn credit(
        &mut self,
        token: &str,
        amount: Money,
        reference: impl Into<String>,
        timestamp: Option<Timestamp>,
    ) -> Result<TransactionRecord> {
        let call = Call::Credit(action(token, amount, reference, timestamp));
        self.call(call).await.and_then(expect_record)
    }

    /// Current balance and latest record of `token`.
    pub async fn get_balance(&mut self, token: &str) -> Result<Summary> {
        let call = Call::GetBalance {
            token: token.to_string(),
        };
        match self.call(call).await? {
            ResponseBody::Summary(summary) => Ok(summary),
            other => Err(ClientError::UnexpectedResponse(format!("{:?}", other))),
        }
    }

    async fn call(&mut self, call: Call) -> Result<ResponseBody> {
        let budget = self.config.request_timeout;
        let request = Request::new(call).with_deadline_ms(budget.as_millis() as u64);
        let id = request.id;

        if self.connection.is_none() {
            self.connection = Some(Connection::open(&self.config).await?);
            info!(addr = %self.config.server_addr, "Reconnected to gateway");
        }
        let connection = self.connection.as_mut().ok_or(ClientError::ConnectionClosed)?;

        debug!(%id, method = request.call.method(), "Sending request");
        let response = match connection.exchange(&request, budget).await {
            Ok(response) => response,
            Err(e) => {
                warn!(%id, error = %e, "Dropping connection");
                self.connection = None;
                return Err(e);
            }
        };

        if response.id != Some(id) {
            self.connection = None;
            return Err(ClientError::UnexpectedResponse(format!(
                "answer to {:?}, expected {}",
                response.id, id
            )));
        }

        if response.status.is_ok() {
            return Ok(response.body);
        }

        match response.body {
            ResponseBody::Error(ErrorBody { code, message }) => Err(ClientError::Rejected {
                status: response.status,
                code,
                message,
            }),
            other => Err(ClientError::UnexpectedResponse(format!(
                "{:?} with status {:?}",
                other, response.status
            ))),
        }
    }
}

fn action(
    token: &str,
    amount: Money,
    reference: impl Into<String>,
    timestamp: Option<Timestamp>,
) -> ActionRequest {
    ActionRequest {
        token: token.to_string(),
        amount,
        reference: reference.into(),
        timestamp,
    }
}

fn expect_record(body: ResponseBody) -> Result<TransactionRecord> {
    match body {
        ResponseBody::Record(record) => Ok(record),
        other => Err(ClientError::UnexpectedResponse(format!("{:?}", other))),
    }
}
