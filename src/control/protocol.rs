//! Control message definitions
//!
//! Peers send JSON objects tagged by `"type"`. The transport frames them with
//! a 4-byte big-endian length prefix; everything in this module works on the
//! unframed body except [`encode_frame`].

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::error::ControlError;

/// Size of the frame length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Commands a peer may send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Change the advertised WPS device name
    SetDeviceName {
        /// New name, truncated to 100 bytes
        name: String,
    },

    /// Replace the group interface address
    SetLocalIp {
        /// Dotted quad, optionally with `/prefix`
        address: String,
    },
}

/// Reply written back to the peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlReply {
    /// Command applied
    Ok {
        /// Address now assigned, for address-changing commands
        #[serde(default, skip_serializing_if = "Option::is_none")]
        address: Option<String>,
    },

    /// Command rejected
    Error {
        code: ErrorCode,
        message: String,
    },
}

impl ControlReply {
    /// Success without data
    pub fn ok() -> Self {
        Self::Ok { address: None }
    }

    /// Success carrying the new address
    pub fn ok_with_address(address: impl Into<String>) -> Self {
        Self::Ok {
            address: Some(address.into()),
        }
    }

    /// Error reply
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }

    /// Check if this is an error reply
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Error codes carried by [`ControlReply::Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Parameter could not be parsed
    InvalidParameters,
    /// Command needs an active group
    NotActive,
    /// The control utility rejected the change
    OperationFailed,
}

/// An inbound control buffer as delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessage {
    /// Adapter the transport received the buffer on
    pub adapter_id: u32,
    /// Unframed message body
    pub payload: Vec<u8>,
}

/// Decode an unframed message body
///
/// # Errors
///
/// Returns `ControlError::Parse` for malformed JSON or an unknown `"type"`.
pub fn decode_command(buf: &[u8]) -> Result<ControlCommand, ControlError> {
    serde_json::from_slice(buf).map_err(|e| ControlError::parse(e.to_string()))
}

/// Encode a message with length prefix
///
/// # Errors
///
/// Returns `ControlError::SerializationError` if the value cannot be encoded.
pub fn encode_frame<T: Serialize>(msg: &T) -> Result<Vec<u8>, ControlError> {
    let json = serde_json::to_vec(msg).map_err(|e| ControlError::SerializationError(e.to_string()))?;
    let len = u32::try_from(json.len())
        .map_err(|_| ControlError::SerializationError(format!("{} byte message", json.len())))?;

    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + json.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&json);
    Ok(buf)
}

/// Parse `a.b.c.d` or `a.b.c.d/len`, using `default_prefix` for the former
///
/// # Errors
///
/// Returns `ControlError::Parse` if the text is not an IPv4 host address.
pub fn parse_address(text: &str, default_prefix: u8) -> Result<Ipv4Net, ControlError> {
    let text = text.trim();
    let net = if text.contains('/') {
        text.parse::<Ipv4Net>()
            .map_err(|e| ControlError::parse(format!("invalid address {text:?}: {e}")))?
    } else {
        let addr: Ipv4Addr = text
            .parse()
            .map_err(|e| ControlError::parse(format!("invalid address {text:?}: {e}")))?;
        Ipv4Net::new(addr, default_prefix)
            .map_err(|e| ControlError::parse(format!("invalid prefix: {e}")))?
    };

    let addr = net.addr();
    if addr.is_unspecified() || addr.is_broadcast() || addr.is_multicast() || addr.is_loopback() {
        return Err(ControlError::parse(format!("{addr} is not a usable host address")));
    }
    Ok(net)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_commands() {
        let cmd = decode_command(br#"{"type":"set_local_ip","address":"10.0.0.5"}"#).unwrap();
        assert_eq!(
            cmd,
            ControlCommand::SetLocalIp {
                address: "10.0.0.5".into()
            }
        );

        let cmd = decode_command(br#"{"type":"set_device_name","name":"tv"}"#).unwrap();
        assert!(matches!(cmd, ControlCommand::SetDeviceName { name } if name == "tv"));
    }

    #[test]
    fn test_decode_rejects_unknown_and_garbage() {
        assert!(decode_command(br#"{"type":"reboot"}"#).is_err());
        assert!(decode_command(br#"{"type":"set_local_ip"}"#).is_err());
        assert!(decode_command(b"\x00\x01\x02").is_err());
        assert!(decode_command(b"").is_err());
    }

    #[test]
    fn test_reply_serialization() {
        let json = serde_json::to_string(&ControlReply::ok()).unwrap();
        assert_eq!(json, r#"{"type":"ok"}"#);

        let json = serde_json::to_string(&ControlReply::error(ErrorCode::NotActive, "no group")).unwrap();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("NOT_ACTIVE"));
    }

    #[test]
    fn test_encode_frame() {
        let encoded = encode_frame(&ControlReply::ok_with_address("10.0.0.5")).unwrap();
        let len = u32::from_be_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]) as usize;
        assert_eq!(len, encoded.len() - LENGTH_PREFIX_SIZE);

        let reply: ControlReply = serde_json::from_slice(&encoded[LENGTH_PREFIX_SIZE..]).unwrap();
        assert_eq!(reply, ControlReply::ok_with_address("10.0.0.5"));
    }

    #[test]
    fn test_parse_address() {
        let net = parse_address("10.0.0.5", 24).unwrap();
        assert_eq!(net.to_string(), "10.0.0.5/24");

        let net = parse_address(" 10.0.0.5/16 ", 24).unwrap();
        assert_eq!(net.prefix_len(), 16);

        assert!(parse_address("10.0.0", 24).is_err());
        assert!(parse_address("10.0.0.5/40", 24).is_err());
        assert!(parse_address("0.0.0.0", 24).is_err());
        assert!(parse_address("255.255.255.255", 24).is_err());
    }
}
