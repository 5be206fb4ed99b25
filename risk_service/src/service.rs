// Connection handling and message dispatch
//
// The service accepts one client at a time and processes its frames in
// receive order: decode, hand to the risk engine, reply for the message
// types that carry a response. Engine state outlives connections; the
// full state is dumped to the log after every connection ends.

use crate::engine::{RiskEngine, RiskLimits};
use crate::protocol::{self, InboundMessage, OrderResponse, ProtocolError};
use common::logging::Logger;
use common::net::tcp::{TcpListener, TcpSocket};
use common::{log_debug, log_error, log_info, log_warn};
use common::{time, SeqNum};

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default port for client connections.
pub const DEFAULT_PORT: u16 = 12345;

/// Errors surfaced by the service.
#[derive(Debug)]
pub enum ServiceError {
    Io(io::Error),
    Protocol(ProtocolError),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Protocol(e) => write!(f, "protocol error: {e}"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Protocol(e) => Some(e),
        }
    }
}

impl From<io::Error> for ServiceError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ProtocolError> for ServiceError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

/// Configuration for the risk service.
#[derive(Debug, Clone)]
pub struct RiskServiceConfig {
    /// IP address to listen on.
    pub listen_addr: String,
    /// Port to listen on.
    pub port: u16,
    /// Worst-case position limits enforced on every instrument.
    pub limits: RiskLimits,
}

impl Default for RiskServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            limits: RiskLimits::default(),
        }
    }
}

impl RiskServiceConfig {
    /// Creates a new configuration with the specified endpoint and limits.
    pub fn new(listen_addr: &str, port: u16, limits: RiskLimits) -> Self {
        Self {
            listen_addr: listen_addr.to_string(),
            port,
            limits,
        }
    }
}

/// The risk gate service: accept loop, dispatch, and response framing.
pub struct RiskService {
    listener: TcpListener,
    engine: RiskEngine,
    running: Arc<AtomicBool>,
    logger: Logger,
}

impl RiskService {
    /// Binds the listener and prepares the engine.
    ///
    /// Bind failure is the only fatal startup error.
    pub fn new(config: RiskServiceConfig) -> Result<Self, ServiceError> {
        let listener = TcpListener::bind(&config.listen_addr, config.port)?;
        Ok(Self {
            listener,
            engine: RiskEngine::new(config.limits),
            running: Arc::new(AtomicBool::new(true)),
            logger: Logger::new("risk_service"),
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared run flag; clearing it makes the accept loop exit at its
    /// next iteration (signal handlers store through this).
    pub fn running_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Asks the accept loop to exit at its next iteration. In-flight
    /// frames of the current connection complete first.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Accepts clients until stopped, serving one connection at a time.
    ///
    /// Transport failures and malformed frames abort the current
    /// connection only; the accept loop keeps going.
    pub fn run(&mut self) {
        log_info!(self.logger, "waiting for connections");
        while self.running.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok(mut socket) => {
                    log_debug!(self.logger, "new connection, reading all messages");
                    // Outbound responses carry a per-connection counter.
                    let mut outbound_seq: SeqNum = 1;
                    loop {
                        match self.serve_client(&mut socket, &mut outbound_seq) {
                            Ok(true) => {}
                            Ok(false) => break,
                            Err(error) => {
                                log_error!(self.logger, "dropping connection: {error}");
                                break;
                            }
                        }
                    }
                }
                Err(error) => log_error!(self.logger, "failed accepting new connection: {error}"),
            }
            log_info!(self.logger, "{}", self.engine.dump_state());
        }
    }

    /// Reads and handles one frame.
    ///
    /// Returns `Ok(false)` once the client performs an orderly close.
    /// Unknown message types are logged and skipped; any other decode
    /// failure propagates and costs the connection.
    fn serve_client(
        &mut self,
        socket: &mut TcpSocket,
        outbound_seq: &mut SeqNum,
    ) -> Result<bool, ServiceError> {
        let frame = socket.recv()?;
        if frame.is_empty() {
            // Client closed the connection.
            return Ok(false);
        }

        let header = protocol::decode_header(frame)?;
        log_info!(self.logger, "handling message of type {}", header.version);

        let message = match protocol::decode_inbound(&header, frame) {
            Ok(message) => message,
            Err(ProtocolError::UnknownMessageType(version)) => {
                log_warn!(self.logger, "ignoring unknown message type {version}");
                return Ok(true);
            }
            Err(error) => return Err(error.into()),
        };

        match message {
            InboundMessage::New(new_order) => {
                log_debug!(self.logger, "handling creation of order {}", new_order.order_id);
                let response = self.engine.handle_new_order(&new_order);
                self.send_response(socket, outbound_seq, &response)?;
            }
            InboundMessage::Delete(delete_order) => {
                log_debug!(self.logger, "handling deletion of order {}", delete_order.order_id);
                self.engine.handle_delete_order(&delete_order);
            }
            InboundMessage::Modify(modify_order) => {
                log_debug!(self.logger, "handling modification of order {}", modify_order.order_id);
                let response = self.engine.handle_modify_order(&modify_order);
                self.send_response(socket, outbound_seq, &response)?;
            }
            InboundMessage::Trade(trade) => {
                log_debug!(
                    self.logger,
                    "handling trade {} of listing {}",
                    trade.trade_id,
                    trade.listing_id
                );
                if !self.engine.handle_trade(&trade) {
                    log_warn!(
                        self.logger,
                        "trade {} references an unknown order, discarding",
                        trade.trade_id
                    );
                }
            }
        }

        Ok(true)
    }

    /// Frames and sends one order response, bumping the connection's
    /// outbound sequence counter.
    fn send_response(
        &self,
        socket: &mut TcpSocket,
        outbound_seq: &mut SeqNum,
        response: &OrderResponse,
    ) -> Result<(), ServiceError> {
        let frame = protocol::encode_frame(response, *outbound_seq, time::now());
        *outbound_seq += 1;
        socket.send(frame.as_bytes())?;
        Ok(())
    }
}
