//! Frame codec
//!
//! Wire format: `[HEADER_WIDTH ASCII decimal digits][JSON body]`, no
//! delimiter, the header counts body bytes only.
//!
//! Body is a JSON envelope:
//! `{"Header":{"To":"bob","From":"alice"},"Contents":{"Body":"hi"}}`.
//! Only `Header.To` is needed for routing.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde_json::Value;

use crate::error::{FrameError, RoutingError};

/// Width of the decimal length header
pub const HEADER_WIDTH: usize = 5;

/// Largest body a frame may carry (the largest 5-digit value)
pub const MAX_BODY_LENGTH: usize = 99_999;

/// How the length header is parsed
///
/// `Permissive` behaves like C `atoi`: leading whitespace, an optional sign,
/// then as many digits as follow. No digits at all yields 0. A negative value
/// is rejected. `Strict` requires every header byte to be a digit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeaderParsing {
    #[default]
    Permissive,
    Strict,
}

/// Routing metadata extracted from an envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routing {
    /// Recipient username (`Header.To`)
    pub to: String,
    /// Sender username (`Header.From`), if present
    pub from: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Envelope<'a> {
    header: EnvelopeHeader<'a>,
    contents: EnvelopeContents<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EnvelopeHeader<'a> {
    to: &'a str,
    from: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EnvelopeContents<'a> {
    body: &'a str,
}

/// Decode a length header into a body length
pub fn decode_header(
    header: &[u8; HEADER_WIDTH],
    parsing: HeaderParsing,
) -> Result<usize, FrameError> {
    let declared = match parsing {
        HeaderParsing::Permissive => parse_permissive(header),
        HeaderParsing::Strict => parse_strict(header)?,
    };

    let length = usize::try_from(declared).map_err(|_| FrameError::NegativeLength(declared))?;
    if length > MAX_BODY_LENGTH {
        return Err(FrameError::Oversized(length));
    }
    Ok(length)
}

fn parse_permissive(header: &[u8]) -> i64 {
    let mut bytes = header
        .iter()
        .copied()
        .skip_while(u8::is_ascii_whitespace)
        .peekable();

    let negative = match bytes.peek() {
        Some(b'-') => {
            bytes.next();
            true
        }
        Some(b'+') => {
            bytes.next();
            false
        }
        _ => false,
    };

    let value = bytes
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, digit| acc * 10 + i64::from(digit - b'0'));

    if negative {
        -value
    } else {
        value
    }
}

fn parse_strict(header: &[u8]) -> Result<i64, FrameError> {
    if !header.iter().all(u8::is_ascii_digit) {
        return Err(FrameError::InvalidHeader(
            String::from_utf8_lossy(header).into_owned(),
        ));
    }
    Ok(header
        .iter()
        .fold(0i64, |acc, digit| acc * 10 + i64::from(digit - b'0')))
}

/// Encode a body length as a zero-padded header
pub fn encode_header(body_length: usize) -> Result<[u8; HEADER_WIDTH], FrameError> {
    if body_length > MAX_BODY_LENGTH {
        return Err(FrameError::Oversized(body_length));
    }

    let digits = format!("{:0width$}", body_length, width = HEADER_WIDTH);
    let mut header = [0u8; HEADER_WIDTH];
    header.copy_from_slice(digits.as_bytes());
    Ok(header)
}

/// Return the body of a complete frame
///
/// No validation; a buffer shorter than a header yields an empty body.
pub fn decode_body(frame: &[u8]) -> &[u8] {
    frame.get(HEADER_WIDTH..).unwrap_or_default()
}

/// Allocate a frame with its header written and `body_length` zeroed bytes
/// after it, ready for the body to be read in place
pub fn frame_buffer(body_length: usize) -> Result<BytesMut, FrameError> {
    let header = encode_header(body_length)?;

    let mut frame = BytesMut::with_capacity(HEADER_WIDTH + body_length);
    frame.put_slice(&header);
    frame.resize(HEADER_WIDTH + body_length, 0);
    Ok(frame)
}

/// Prefix a body with its header
pub fn encode_frame(body: &[u8]) -> Result<Bytes, FrameError> {
    let header = encode_header(body.len())?;

    let mut frame = BytesMut::with_capacity(HEADER_WIDTH + body.len());
    frame.put_slice(&header);
    frame.put_slice(body);
    Ok(frame.freeze())
}

/// Build a framed envelope for `recipient`
pub fn encode(recipient: &str, sender: &str, body_text: &str) -> Result<Bytes, FrameError> {
    let envelope = Envelope {
        header: EnvelopeHeader {
            to: recipient,
            from: sender,
        },
        contents: EnvelopeContents { body: body_text },
    };

    let json = serde_json::to_vec(&envelope).map_err(|e| FrameError::Encode(e.to_string()))?;
    encode_frame(&json)
}

/// Parse an envelope and pull out `Header.To` / `Header.From`
///
/// Any well-formed JSON of a different shape is reported as an error,
/// never a panic.
pub fn extract_routing(json: &[u8]) -> Result<Routing, RoutingError> {
    let document: Value =
        serde_json::from_slice(json).map_err(|e| RoutingError::MalformedJson(e.to_string()))?;

    let root = document
        .as_object()
        .ok_or_else(|| RoutingError::MalformedJson("envelope is not an object".to_string()))?;

    let header = root
        .get("Header")
        .and_then(Value::as_object)
        .ok_or(RoutingError::MissingField("Header"))?;

    let to = header
        .get("To")
        .and_then(Value::as_str)
        .ok_or(RoutingError::MissingField("To"))?;

    let from = header.get("From").and_then(Value::as_str).map(str::to_owned);

    Ok(Routing {
        to: to.to_owned(),
        from,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(text: &str) -> [u8; HEADER_WIDTH] {
        let mut buf = [0u8; HEADER_WIDTH];
        buf.copy_from_slice(text.as_bytes());
        buf
    }

    #[test]
    fn test_header_is_zero_padded() {
        assert_eq!(&encode_header(42).unwrap(), b"00042");
        assert_eq!(&encode_header(0).unwrap(), b"00000");
        assert_eq!(&encode_header(MAX_BODY_LENGTH).unwrap(), b"99999");
    }

    #[test]
    fn test_encode_header_oversized() {
        assert_eq!(
            encode_header(MAX_BODY_LENGTH + 1),
            Err(FrameError::Oversized(MAX_BODY_LENGTH + 1))
        );
    }

    #[test]
    fn test_frame_body_survives() {
        for n in [0, 1, 17, 4096, MAX_BODY_LENGTH] {
            let body = vec![b'x'; n];
            let frame = encode_frame(&body).unwrap();

            let mut head = [0u8; HEADER_WIDTH];
            head.copy_from_slice(&frame[..HEADER_WIDTH]);

            assert_eq!(decode_header(&head, HeaderParsing::Strict).unwrap(), n);
            assert_eq!(decode_body(&frame), body.as_slice());
        }
    }

    #[test]
    fn test_permissive_quirks() {
        let p = HeaderParsing::Permissive;
        assert_eq!(decode_header(&header(" 0042"), p).unwrap(), 42);
        assert_eq!(decode_header(&header("+0042"), p).unwrap(), 42);
        assert_eq!(decode_header(&header("12abc"), p).unwrap(), 12);
        assert_eq!(decode_header(&header("abcde"), p).unwrap(), 0);
        assert_eq!(decode_header(&header("-0000"), p).unwrap(), 0);
    }

    #[test]
    fn test_negative_length_rejected() {
        let result = decode_header(&header("-0001"), HeaderParsing::Permissive);
        assert_eq!(result, Err(FrameError::NegativeLength(-1)));

        let err = decode_header(&header("-9999"), HeaderParsing::Permissive).unwrap_err();
        assert_eq!(err.to_string(), "Negative frame length: -9999");
    }

    #[test]
    fn test_frame_buffer_has_header() {
        let frame = frame_buffer(12).unwrap();
        assert_eq!(frame.len(), HEADER_WIDTH + 12);
        assert_eq!(&frame[..HEADER_WIDTH], b"00012");
        assert!(decode_body(&frame).iter().all(|&b| b == 0));

        assert!(matches!(
            frame_buffer(MAX_BODY_LENGTH + 1),
            Err(FrameError::Oversized(_))
        ));
    }

    #[test]
    fn test_strict_rejects_non_digits() {
        let result = decode_header(&header(" 0042"), HeaderParsing::Strict);
        assert_eq!(result, Err(FrameError::InvalidHeader(" 0042".to_string())));

        let result = decode_header(&header("-0001"), HeaderParsing::Strict);
        assert!(matches!(result, Err(FrameError::InvalidHeader(_))));
    }

    #[test]
    fn test_encode_envelope_layout() {
        let frame = encode("bob", "alice", "hi").unwrap();
        let expected = r#"{"Header":{"To":"bob","From":"alice"},"Contents":{"Body":"hi"}}"#;

        assert_eq!(decode_body(&frame), expected.as_bytes());
        assert_eq!(&frame[..HEADER_WIDTH], format!("{:05}", expected.len()).as_bytes());
    }

    #[test]
    fn test_encode_oversized_body() {
        let text = "x".repeat(MAX_BODY_LENGTH);
        let result = encode("bob", "alice", &text);
        assert!(matches!(result, Err(FrameError::Oversized(_))));
    }

    #[test]
    fn test_decode_body_short_buffer() {
        assert!(decode_body(b"12").is_empty());
    }

    #[test]
    fn test_extract_routing() {
        let json = br#"{"Header":{"To":"bob","From":"alice"},"Contents":{"Body":"hi"}}"#;
        let routing = extract_routing(json).unwrap();
        assert_eq!(routing.to, "bob");
        assert_eq!(routing.from.as_deref(), Some("alice"));
    }

    #[test]
    fn test_extract_routing_without_sender() {
        let routing = extract_routing(br#"{"Header":{"To":"bob"}}"#).unwrap();
        assert_eq!(routing.to, "bob");
        assert!(routing.from.is_none());
    }

    #[test]
    fn test_extract_routing_missing_header() {
        let result = extract_routing(br#"{"Contents":{"Body":"x"}}"#);
        assert_eq!(result, Err(RoutingError::MissingField("Header")));
    }

    #[test]
    fn test_extract_routing_missing_to() {
        let result = extract_routing(br#"{"Header":{"From":"alice"}}"#);
        assert_eq!(result, Err(RoutingError::MissingField("To")));
    }

    #[test]
    fn test_extract_routing_wrong_shapes() {
        assert!(matches!(
            extract_routing(b"[1,2,3]"),
            Err(RoutingError::MalformedJson(_))
        ));
        assert_eq!(
            extract_routing(br#"{"Header":"bob"}"#),
            Err(RoutingError::MissingField("Header"))
        );
        assert_eq!(
            extract_routing(br#"{"Header":{"To":7}}"#),
            Err(RoutingError::MissingField("To"))
        );
    }

    #[test]
    fn test_extract_routing_not_json() {
        assert!(matches!(
            extract_routing(b"hello"),
            Err(RoutingError::MalformedJson(_))
        ));
        assert!(matches!(
            extract_routing(b""),
            Err(RoutingError::MalformedJson(_))
        ));
    }
}
