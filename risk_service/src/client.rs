// Client for the risk gate
//
// Mirrors the service's framing from the other end of the wire: every
// outbound frame carries a fresh header stamped with the client's own
// sequence counter and wall-clock time. Drives the integration tests.

use crate::protocol::{self, Message, OrderResponse, ProtocolError};
use crate::service::ServiceError;
use common::logging::Logger;
use common::net::tcp::TcpSocket;
use common::{log_debug, time, SeqNum};

use std::io;

/// A connected client of the risk service.
pub struct RiskClient {
    socket: TcpSocket,
    sequence: SeqNum,
    logger: Logger,
}

impl RiskClient {
    /// Connects to a running risk service.
    pub fn connect(addr: &str, port: u16) -> io::Result<Self> {
        Ok(Self {
            socket: TcpSocket::connect(addr, port)?,
            sequence: 0,
            logger: Logger::new("risk_client"),
        })
    }

    /// Frames and sends one payload; returns the bytes written.
    pub fn send<M: Message>(&mut self, message: &M) -> io::Result<usize> {
        self.sequence += 1;
        let frame = protocol::encode_frame(message, self.sequence, time::now());
        log_debug!(self.logger, "sending message of type {}", M::MESSAGE_TYPE);
        self.socket.send(frame.as_bytes())
    }

    /// Blocks until the service replies with an order response.
    ///
    /// Any other discriminant in the reply header is an error.
    pub fn wait_for_response(&mut self) -> Result<OrderResponse, ServiceError> {
        let frame = self.socket.recv()?;
        let header = protocol::decode_header(frame)?;
        if header.version != OrderResponse::MESSAGE_TYPE {
            return Err(ProtocolError::UnknownMessageType(header.version).into());
        }
        Ok(protocol::decode_response(frame)?)
    }

    /// Reads one raw reply and returns its decoded header alongside the
    /// response, for callers that check the framing itself.
    pub fn wait_for_framed_response(
        &mut self,
    ) -> Result<(protocol::Header, OrderResponse), ServiceError> {
        let frame = self.socket.recv()?;
        let header = protocol::decode_header(frame)?;
        let response = protocol::decode_response(frame)?;
        Ok((header, response))
    }
}
