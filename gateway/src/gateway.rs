//! TCP gateway translating wire requests into engine calls.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use txledger_common::{now, AccountToken, Deadline, LedgerError};
use txledger_ledger::LedgerEngine;
use txledger_protocol::{
    decode_line, read_frame, write_message, ActionRequest, Call, ProtocolError, Request,
    Response, ResponseBody, StatusCode,
};

use crate::config::GatewayConfig;
use crate::metrics::Metrics;
use crate::state::GatewayState;

/// Map an engine error to a transport status.
pub fn status_for(error: &LedgerError) -> StatusCode {
    match error {
        LedgerError::UnknownAccount(_) => StatusCode::NotFound,
        LedgerError::InsufficientFunds { .. } | LedgerError::CurrencyMismatch { .. } => {
            StatusCode::FailedPrecondition
        }
        LedgerError::InvalidToken | LedgerError::InvalidAmount | LedgerError::InvalidReference => {
            StatusCode::InvalidArgument
        }
        LedgerError::BalanceOverflow => StatusCode::OutOfRange,
        LedgerError::DeadlineExceeded => StatusCode::DeadlineExceeded,
        LedgerError::SeedError { .. } => StatusCode::Internal,
    }
}

/// Network front of a [`LedgerEngine`].
pub struct Gateway {
    config: GatewayConfig,
    engine: Arc<LedgerEngine>,
    metrics: Arc<Metrics>,
    state: RwLock<GatewayState>,
    shutdown: watch::Sender<bool>,
}

impl Gateway {
    /// Create a gateway over an engine.
    pub fn new(config: GatewayConfig, engine: Arc<LedgerEngine>) -> Self {
        Self {
            config,
            engine,
            metrics: Arc::new(Metrics::new()),
            state: RwLock::new(GatewayState::Starting),
            shutdown: watch::channel(false).0,
        }
    }

    /// Get the current state.
    pub fn state(&self) -> GatewayState {
        *self.state.read()
    }

    /// Get the request counters.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        TcpListener::bind(self.config.bind_addr()).await
    }

    /// Accept connections until `shutdown` resolves.
    pub async fn serve<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()>,
    {
        *self.state.write() = GatewayState::Running;
        info!(addr = %listener.local_addr()?, "Gateway listening");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let gateway = self.clone();
                        tokio::spawn(async move {
                            gateway.handle_connection(stream, peer).await;
                        });
                    }
                    Err(e) => warn!(error = %e, "Accept failed"),
                },
            }
        }

        *self.state.write() = GatewayState::ShuttingDown;
        drop(listener);
        self.shutdown.send_replace(true);
        *self.state.write() = GatewayState::Stopped;

        let snapshot = self.metrics.snapshot();
        info!(
            requests = snapshot.requests_total,
            ok = snapshot.requests_ok,
            rejected = snapshot.requests_rejected,
            invalid = snapshot.requests_invalid,
            deadline_exceeded = snapshot.requests_deadline_exceeded,
            "Gateway stopped"
        );
        Ok(())
    }

    #[instrument(skip(self, stream))]
    async fn handle_connection(self: Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        self.metrics.connection_opened();
        debug!("Connection opened");

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut shutdown = self.shutdown.subscribe();

        loop {
            if !self.state().accepts_requests() || *shutdown.borrow_and_update() {
                break;
            }

            let frame = tokio::select! {
                _ = shutdown.changed() => break,
                frame = read_frame(&mut reader) => frame,
            };

            let (response, keep_open) = match frame {
                Ok(Some(line)) => match decode_line::<Request>(&line) {
                    Ok(request) => (self.handle_request(request).await, true),
                    Err(e) => (self.reject_frame(e), true),
                },
                Ok(None) => break,
                Err(ProtocolError::Io(e)) => {
                    debug!(error = %e, "Connection read failed");
                    break;
                }
                // The rest of an oversized frame is still unread.
                Err(e @ ProtocolError::FrameTooLarge(_)) => (self.reject_frame(e), false),
                Err(e) => (self.reject_frame(e), true),
            };

            if let Err(e) = write_message(&mut writer, &response).await {
                debug!(error = %e, "Connection write failed");
                break;
            }
            if !keep_open {
                break;
            }
        }

        self.metrics.connection_closed();
        debug!("Connection closed");
    }

    /// Execute one request against the engine.
    ///
    /// The engine call runs on the blocking pool, one worker per request.
    #[instrument(skip(self, request), fields(id = %request.id, method = request.call.method()))]
    pub async fn handle_request(&self, request: Request) -> Response {
        self.metrics.request_received();

        let deadline = Deadline::after(self.config.request_budget(request.deadline_ms));
        let engine = self.engine.clone();
        let call = request.call;

        let result = tokio::task::spawn_blocking(move || dispatch(&engine, call, &deadline)).await;

        let response = match result {
            Ok(Ok(body)) => Response::ok(request.id, body),
            Ok(Err(e)) => {
                debug!(error = %e, "Request refused");
                Response::error(Some(request.id), status_for(&e), e.error_code(), e.to_string())
            }
            Err(e) => {
                error!(error = %e, "Engine worker failed");
                Response::error(Some(request.id), StatusCode::Internal, "INTERNAL", e.to_string())
            }
        };

        self.metrics.request_completed(response.status);
        response
    }

    fn reject_frame(&self, error: ProtocolError) -> Response {
        debug!(error = %error, "Undecodable frame");
        self.metrics.request_completed(StatusCode::InvalidArgument);
        Response::error(None, StatusCode::InvalidArgument, "MALFORMED_REQUEST", error.to_string())
    }
}

fn dispatch(engine: &LedgerEngine, call: Call, deadline: &Deadline) -> Result<ResponseBody, LedgerError> {
    match call {
        Call::Debit(args) => {
            let (token, args) = parse_action(args)?;
            let timestamp = args.timestamp.unwrap_or_else(now);
            engine
                .apply_debit_within(&token, args.amount, args.reference, timestamp, deadline)
                .map(ResponseBody::Record)
        }
        Call::Credit(args) => {
            let (token, args) = parse_action(args)?;
            let timestamp = args.timestamp.unwrap_or_else(now);
            engine
                .apply_credit_within(&token, args.amount, args.reference, timestamp, deadline)
                .map(ResponseBody::Record)
        }
        Call::GetBalance { token } => {
            let token = AccountToken::parse(token)?;
            engine
                .get_balance_within(&token, deadline)
                .map(ResponseBody::Summary)
        }
    }
}

fn parse_action(args: ActionRequest) -> Result<(AccountToken, ActionRequest), LedgerError> {
    let token = AccountToken::parse(args.token.as_str())?;
    Ok((token, args))
}
