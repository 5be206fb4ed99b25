// Wire protocol for the risk gate
//
// Frames are ASCII sequences of space separated decimal tokens with no
// trailing delimiter. The first four tokens form the header; in inbound
// frames the header version doubles as the message type discriminant,
// and every payload repeats that discriminant as its first token. Each
// token parses as an unsigned 64 bit integer and narrows to the declared
// field width by truncation. The decoder validates neither the version
// nor the advertised payload size; semantic checks belong to the engine.

use common::{ListingId, OrderId, Price, Qty, SeqNum, Timestamp};

/// Number of header tokens at the start of every frame.
const HEADER_TOKEN_COUNT: usize = 4;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The frame ended before all expected tokens were read.
    TruncatedFrame,
    /// A token is not an unsigned decimal integer.
    InvalidToken(String),
    /// The header discriminant does not name a known payload.
    UnknownMessageType(u16),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TruncatedFrame => write!(f, "frame ended before all expected tokens were read"),
            Self::InvalidToken(token) => write!(f, "invalid token {token:?}"),
            Self::UnknownMessageType(version) => write!(f, "unknown message type {version}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

// ============================================================================
// Header
// ============================================================================

/// Fixed four-field header carried by every message in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Message type discriminant.
    pub version: u16,
    /// Payload size in bytes; informational only.
    pub payload_size: u16,
    /// Monotonic per sender.
    pub sequence_number: SeqNum,
    /// Seconds since the Unix epoch.
    pub timestamp: Timestamp,
}

// ============================================================================
// Payloads
// ============================================================================

/// Request to add a live order to the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrder {
    pub listing_id: ListingId,
    pub order_id: OrderId,
    pub quantity: Qty,
    /// Never consulted by the risk check.
    pub price: Price,
    /// Raw side byte; the engine rejects anything but `B` or `S`.
    pub side: u8,
}

/// Request to remove a live order from the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOrder {
    pub order_id: OrderId,
}

/// Request to change the quantity of a live order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifyOrderQuantity {
    pub order_id: OrderId,
    pub new_quantity: Qty,
}

/// Notification that a resting order traded.
///
/// On the wire the quantity token precedes the price token, in both
/// directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trade {
    pub listing_id: ListingId,
    /// Order id of the order that traded.
    pub trade_id: OrderId,
    pub quantity: Qty,
    pub price: Price,
}

/// Accept or reject verdict for a new or modify request.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Accepted = 0,
    Rejected = 1,
}

impl OrderStatus {
    /// Convert from the raw wire value
    #[inline]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(OrderStatus::Accepted),
            1 => Some(OrderStatus::Rejected),
            _ => None,
        }
    }

    #[inline]
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }
}

/// Verdict sent back for NewOrder and ModifyOrderQuantity requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

// ============================================================================
// Encoding
// ============================================================================

/// A payload that can be framed behind a header.
pub trait Message {
    /// Header discriminant for this payload.
    const MESSAGE_TYPE: u16;

    /// Renders the payload tokens, discriminant first.
    fn encode_payload(&self) -> String;
}

impl Message for NewOrder {
    const MESSAGE_TYPE: u16 = 1;

    fn encode_payload(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            Self::MESSAGE_TYPE,
            self.listing_id,
            self.order_id,
            self.quantity,
            self.price,
            self.side
        )
    }
}

impl Message for DeleteOrder {
    const MESSAGE_TYPE: u16 = 2;

    fn encode_payload(&self) -> String {
        format!("{} {}", Self::MESSAGE_TYPE, self.order_id)
    }
}

impl Message for ModifyOrderQuantity {
    const MESSAGE_TYPE: u16 = 3;

    fn encode_payload(&self) -> String {
        format!("{} {} {}", Self::MESSAGE_TYPE, self.order_id, self.new_quantity)
    }
}

impl Message for Trade {
    const MESSAGE_TYPE: u16 = 4;

    fn encode_payload(&self) -> String {
        format!(
            "{} {} {} {} {}",
            Self::MESSAGE_TYPE,
            self.listing_id,
            self.trade_id,
            self.quantity,
            self.price
        )
    }
}

impl Message for OrderResponse {
    const MESSAGE_TYPE: u16 = 5;

    fn encode_payload(&self) -> String {
        format!("{} {} {}", Self::MESSAGE_TYPE, self.order_id, self.status.as_u16())
    }
}

/// Renders the header tokens.
pub fn encode_header(header: &Header) -> String {
    format!(
        "{} {} {} {}",
        header.version, header.payload_size, header.sequence_number, header.timestamp
    )
}

/// Frames a payload behind an existing header.
pub fn encode(header: &Header, message: &impl Message) -> String {
    format!("{} {}", encode_header(header), message.encode_payload())
}

/// Frames a payload with a freshly built header.
///
/// The header version is the payload discriminant and the payload size
/// is the encoded byte length of the payload tokens.
pub fn encode_frame<M: Message>(message: &M, sequence_number: SeqNum, timestamp: Timestamp) -> String {
    let payload = message.encode_payload();
    let header = Header {
        version: M::MESSAGE_TYPE,
        payload_size: payload.len() as u16,
        sequence_number,
        timestamp,
    };
    format!("{} {}", encode_header(&header), payload)
}

// ============================================================================
// Decoding
// ============================================================================

/// Inbound messages, tagged by the header discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundMessage {
    New(NewOrder),
    Delete(DeleteOrder),
    Modify(ModifyOrderQuantity),
    Trade(Trade),
}

/// Cursor over the space separated tokens of one frame.
struct Tokens<'a> {
    frame: &'a [u8],
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn new(frame: &'a [u8]) -> Self {
        Self { frame, pos: 0 }
    }

    /// Parses the next token as an unsigned 64 bit decimal integer.
    fn next_u64(&mut self) -> Result<u64, ProtocolError> {
        if self.pos >= self.frame.len() {
            return Err(ProtocolError::TruncatedFrame);
        }
        let end = self.frame[self.pos..]
            .iter()
            .position(|&b| b == b' ')
            .map_or(self.frame.len(), |offset| self.pos + offset);
        let token = &self.frame[self.pos..end];
        self.pos = end + 1;

        std::str::from_utf8(token)
            .ok()
            .and_then(|text| text.parse::<u64>().ok())
            .ok_or_else(|| ProtocolError::InvalidToken(String::from_utf8_lossy(token).into_owned()))
    }
}

/// Decodes the four header tokens present on every frame.
pub fn decode_header(frame: &[u8]) -> Result<Header, ProtocolError> {
    let mut tokens = Tokens::new(frame);
    Ok(Header {
        version: tokens.next_u64()? as u16,
        payload_size: tokens.next_u64()? as u16,
        sequence_number: tokens.next_u64()? as u32,
        timestamp: tokens.next_u64()?,
    })
}

/// Positions a token cursor past the header and the repeated payload
/// discriminant.
fn payload_tokens(frame: &[u8]) -> Result<Tokens<'_>, ProtocolError> {
    let mut tokens = Tokens::new(frame);
    for _ in 0..HEADER_TOKEN_COUNT {
        tokens.next_u64()?;
    }
    // Payloads repeat the discriminant as their first token.
    tokens.next_u64()?;
    Ok(tokens)
}

/// Decodes the payload named by an already-decoded header.
pub fn decode_inbound(header: &Header, frame: &[u8]) -> Result<InboundMessage, ProtocolError> {
    let mut tokens = payload_tokens(frame)?;
    match header.version {
        NewOrder::MESSAGE_TYPE => Ok(InboundMessage::New(NewOrder {
            listing_id: tokens.next_u64()?,
            order_id: tokens.next_u64()?,
            quantity: tokens.next_u64()?,
            price: tokens.next_u64()?,
            side: tokens.next_u64()? as u8,
        })),
        DeleteOrder::MESSAGE_TYPE => Ok(InboundMessage::Delete(DeleteOrder {
            order_id: tokens.next_u64()?,
        })),
        ModifyOrderQuantity::MESSAGE_TYPE => Ok(InboundMessage::Modify(ModifyOrderQuantity {
            order_id: tokens.next_u64()?,
            new_quantity: tokens.next_u64()?,
        })),
        Trade::MESSAGE_TYPE => Ok(InboundMessage::Trade(Trade {
            listing_id: tokens.next_u64()?,
            trade_id: tokens.next_u64()?,
            quantity: tokens.next_u64()?,
            price: tokens.next_u64()?,
        })),
        other => Err(ProtocolError::UnknownMessageType(other)),
    }
}

/// Decodes an order response payload (client side).
pub fn decode_response(frame: &[u8]) -> Result<OrderResponse, ProtocolError> {
    let mut tokens = payload_tokens(frame)?;
    let order_id = tokens.next_u64()?;
    let raw_status = tokens.next_u64()? as u16;
    let status = OrderStatus::from_u16(raw_status)
        .ok_or_else(|| ProtocolError::InvalidToken(raw_status.to_string()))?;
    Ok(OrderResponse { order_id, status })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_full(frame: &[u8]) -> InboundMessage {
        let header = decode_header(frame).unwrap();
        decode_inbound(&header, frame).unwrap()
    }

    #[test]
    fn test_decode_header() {
        let header = decode_header(b"1 46 7 1700000000 1 10 99 25 10000 66").unwrap();
        assert_eq!(
            header,
            Header {
                version: 1,
                payload_size: 46,
                sequence_number: 7,
                timestamp: 1_700_000_000,
            }
        );
    }

    #[test]
    fn test_decode_new_order() {
        let message = decode_full(b"1 46 7 1700000000 1 10 99 25 10000 66");
        assert_eq!(
            message,
            InboundMessage::New(NewOrder {
                listing_id: 10,
                order_id: 99,
                quantity: 25,
                price: 10000,
                side: b'B',
            })
        );
    }

    #[test]
    fn test_decode_delete_order() {
        let message = decode_full(b"2 4 8 1700000000 2 99");
        assert_eq!(message, InboundMessage::Delete(DeleteOrder { order_id: 99 }));
    }

    #[test]
    fn test_decode_modify_order() {
        let message = decode_full(b"3 7 9 1700000000 3 99 50");
        assert_eq!(
            message,
            InboundMessage::Modify(ModifyOrderQuantity {
                order_id: 99,
                new_quantity: 50,
            })
        );
    }

    #[test]
    fn test_decode_trade_quantity_before_price() {
        let message = decode_full(b"4 12 10 1700000000 4 10 99 25 10000");
        assert_eq!(
            message,
            InboundMessage::Trade(Trade {
                listing_id: 10,
                trade_id: 99,
                quantity: 25,
                price: 10000,
            })
        );
    }

    #[test]
    fn test_new_order_roundtrip() {
        let order = NewOrder {
            listing_id: 2,
            order_id: 12345,
            quantity: 100,
            price: 150_000,
            side: b'S',
        };
        let frame = encode_frame(&order, 3, 1_700_000_000);
        let header = decode_header(frame.as_bytes()).unwrap();
        assert_eq!(header.version, NewOrder::MESSAGE_TYPE);
        assert_eq!(header.sequence_number, 3);
        assert_eq!(decode_inbound(&header, frame.as_bytes()).unwrap(), InboundMessage::New(order));
    }

    #[test]
    fn test_trade_roundtrip() {
        let trade = Trade {
            listing_id: 7,
            trade_id: 42,
            quantity: 9,
            price: 123_456,
        };
        let frame = encode_frame(&trade, 1, 1_700_000_000);
        let header = decode_header(frame.as_bytes()).unwrap();
        assert_eq!(
            decode_inbound(&header, frame.as_bytes()).unwrap(),
            InboundMessage::Trade(trade)
        );
    }

    #[test]
    fn test_response_encoding() {
        let response = OrderResponse {
            order_id: 99,
            status: OrderStatus::Accepted,
        };
        assert_eq!(response.encode_payload(), "5 99 0");

        let frame = encode_frame(&response, 1, 1_700_000_000);
        assert_eq!(frame, "5 6 1 1700000000 5 99 0");
    }

    #[test]
    fn test_response_roundtrip() {
        let response = OrderResponse {
            order_id: 7,
            status: OrderStatus::Rejected,
        };
        let frame = encode_frame(&response, 4, 1_700_000_000);
        assert_eq!(decode_response(frame.as_bytes()).unwrap(), response);
    }

    #[test]
    fn test_encode_with_explicit_header() {
        // payload_size is informational: the decoder accepts a header
        // that advertises the wrong size
        let header = Header {
            version: DeleteOrder::MESSAGE_TYPE,
            payload_size: 999,
            sequence_number: 2,
            timestamp: 1_700_000_000,
        };
        let frame = encode(&header, &DeleteOrder { order_id: 31 });
        assert_eq!(frame, "2 999 2 1700000000 2 31");

        let decoded = decode_header(frame.as_bytes()).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(
            decode_inbound(&decoded, frame.as_bytes()).unwrap(),
            InboundMessage::Delete(DeleteOrder { order_id: 31 })
        );
    }

    #[test]
    fn test_payload_size_is_encoded_byte_length() {
        let response = OrderResponse {
            order_id: 12345,
            status: OrderStatus::Rejected,
        };
        let frame = encode_frame(&response, 1, 1_700_000_000);
        let header = decode_header(frame.as_bytes()).unwrap();
        assert_eq!(header.payload_size as usize, response.encode_payload().len());
    }

    #[test]
    fn test_truncated_frame() {
        let header = decode_header(b"1 46 7 1700000000 1 10").unwrap();
        assert_eq!(
            decode_inbound(&header, b"1 46 7 1700000000 1 10"),
            Err(ProtocolError::TruncatedFrame)
        );
        assert_eq!(decode_header(b"1 46"), Err(ProtocolError::TruncatedFrame));
        assert_eq!(decode_header(b""), Err(ProtocolError::TruncatedFrame));
    }

    #[test]
    fn test_invalid_token() {
        assert_eq!(
            decode_header(b"1 nope 7 1700000000"),
            Err(ProtocolError::InvalidToken("nope".to_string()))
        );
        // Negative numbers are not unsigned decimals
        assert_eq!(
            decode_header(b"-1 46 7 1700000000"),
            Err(ProtocolError::InvalidToken("-1".to_string()))
        );
    }

    #[test]
    fn test_unknown_message_type() {
        let frame = b"9 4 1 1700000000 9 1";
        let header = decode_header(frame).unwrap();
        assert_eq!(
            decode_inbound(&header, frame),
            Err(ProtocolError::UnknownMessageType(9))
        );
    }

    #[test]
    fn test_narrowing_by_truncation() {
        // 65537 == 2^16 + 1 truncates to 1 in the u16 version field
        let header = decode_header(b"65537 4 1 1700000000 1 10 99 25 10000 66").unwrap();
        assert_eq!(header.version, 1);

        // Side takes the low byte of its token: 322 & 0xFF == 66 == 'B'
        let frame = b"1 46 7 1700000000 1 10 99 25 10000 322";
        let header = decode_header(frame).unwrap();
        match decode_inbound(&header, frame).unwrap() {
            InboundMessage::New(order) => assert_eq!(order.side, b'B'),
            other => panic!("expected a new order, got {other:?}"),
        }
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            ProtocolError::UnknownMessageType(9).to_string(),
            "unknown message type 9"
        );
        assert_eq!(
            ProtocolError::InvalidToken("x".to_string()).to_string(),
            "invalid token \"x\""
        );
    }
}
