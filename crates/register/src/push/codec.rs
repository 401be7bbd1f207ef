//! Engine.IO v4 / Socket.IO v5 text packet codec.
//!
//! Only the text subset the push channel needs is supported: binary
//! attachments are recognised and skipped.
//!
//! ```text
//! engine packet:  <type digit><payload>
//!                 0 open (JSON handshake), 1 close, 2 ping, 3 pong,
//!                 4 message, 5 upgrade, 6 noop
//! socket packet:  <type digit>[<attachments>-][<namespace>,][<ack id>][<JSON>]
//!                 0 connect, 1 disconnect, 2 event, 3 ack,
//!                 4 connect error, 5 binary event, 6 binary ack
//! ```

use serde::Deserialize;
use serde_json::Value;

use super::PushError;

/// Namespace used when a packet names none.
pub const DEFAULT_NAMESPACE: &str = "/";

/// Handshake sent by the server in the `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    pub ping_timeout: u64,
    #[serde(default)]
    pub upgrades: Vec<String>,
}

/// Transport-level packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

/// Application-level packet carried inside [`EnginePacket::Message`].
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Option<Value>,
    },
    /// Acks and binary packets, which the push channel never needs.
    Ignored(u8),
}

/// Decode one websocket text frame.
///
/// # Errors
///
/// Returns `PushError::Protocol` for an unknown packet type and
/// `PushError::Json` for a malformed open handshake.
pub fn decode_engine(frame: &str) -> Result<EnginePacket, PushError> {
    let (kind, payload) = split_type(frame)?;
    Ok(match kind {
        0 => EnginePacket::Open(serde_json::from_str(payload)?),
        1 => EnginePacket::Close,
        2 => EnginePacket::Ping(payload.to_string()),
        3 => EnginePacket::Pong(payload.to_string()),
        4 => EnginePacket::Message(payload.to_string()),
        5 => EnginePacket::Upgrade,
        6 => EnginePacket::Noop,
        other => {
            return Err(PushError::Protocol(format!(
                "unknown engine packet type {other}"
            )));
        }
    })
}

/// Decode the payload of an engine `message` packet.
///
/// # Errors
///
/// Returns `PushError::Protocol` for an unknown packet type or an event
/// without a name, and `PushError::Json` for malformed data.
pub fn decode_socket(payload: &str) -> Result<SocketPacket, PushError> {
    let (kind, rest) = split_type(payload)?;

    if matches!(kind, 3 | 5 | 6) {
        return Ok(SocketPacket::Ignored(kind));
    }

    let (namespace, rest) = split_namespace(rest);
    let (ack_id, rest) = split_ack_id(rest);
    let data = if rest.is_empty() {
        None
    } else {
        Some(serde_json::from_str::<Value>(rest)?)
    };

    Ok(match kind {
        0 => SocketPacket::Connect { namespace, data },
        1 => SocketPacket::Disconnect { namespace },
        2 => {
            let Some(Value::Array(mut args)) = data else {
                return Err(PushError::Protocol("event payload is not an array".into()));
            };
            if args.is_empty() {
                return Err(PushError::Protocol("event without a name".into()));
            }
            let Value::String(name) = args.remove(0) else {
                return Err(PushError::Protocol("event name is not a string".into()));
            };
            SocketPacket::Event {
                namespace,
                ack_id,
                name,
                args,
            }
        }
        4 => SocketPacket::ConnectError { namespace, data },
        other => {
            return Err(PushError::Protocol(format!(
                "unknown socket packet type {other}"
            )));
        }
    })
}

/// Frame that joins a namespace.
#[must_use]
pub fn encode_connect(namespace: &str) -> String {
    if namespace == DEFAULT_NAMESPACE {
        "40".to_string()
    } else {
        format!("40{namespace},")
    }
}

/// Frame answering a server ping.
#[must_use]
pub fn encode_pong(payload: &str) -> String {
    format!("3{payload}")
}

fn split_type(frame: &str) -> Result<(u8, &str), PushError> {
    let mut chars = frame.chars();
    let kind = chars
        .next()
        .and_then(|c| c.to_digit(10))
        .and_then(|d| u8::try_from(d).ok())
        .ok_or_else(|| PushError::Protocol(format!("invalid packet: {frame:?}")))?;
    Ok((kind, chars.as_str()))
}

fn split_namespace(rest: &str) -> (String, &str) {
    if !rest.starts_with('/') {
        return (DEFAULT_NAMESPACE.to_string(), rest);
    }
    match rest.split_once(',') {
        Some((namespace, tail)) => (namespace.to_string(), tail),
        None => (rest.to_string(), ""),
    }
}

fn split_ack_id(rest: &str) -> (Option<u64>, &str) {
    let digits = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    match rest.split_at_checked(digits) {
        Some((id, tail)) if !id.is_empty() => (id.parse().ok(), tail),
        _ => (None, rest),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_decode_open_handshake() {
        let packet = decode_engine(
            r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();
        let EnginePacket::Open(handshake) = packet else {
            panic!("expected open packet, got {packet:?}");
        };
        assert_eq!(handshake.sid, "lv_VI97HAXpY6yYWAAAC");
        assert_eq!(handshake.ping_interval, 25_000);
        assert_eq!(handshake.ping_timeout, 20_000);
    }

    #[test]
    fn test_decode_control_packets() {
        assert_eq!(decode_engine("1").unwrap(), EnginePacket::Close);
        assert_eq!(decode_engine("2").unwrap(), EnginePacket::Ping(String::new()));
        assert_eq!(
            decode_engine("2probe").unwrap(),
            EnginePacket::Ping("probe".to_string())
        );
        assert_eq!(decode_engine("6").unwrap(), EnginePacket::Noop);
        assert!(matches!(decode_engine("9"), Err(PushError::Protocol(_))));
        assert!(matches!(decode_engine(""), Err(PushError::Protocol(_))));
    }

    #[test]
    fn test_decode_event() {
        let EnginePacket::Message(payload) =
            decode_engine(r#"42["stock_updated",{"id":3,"name":"Milk","stock":0}]"#).unwrap()
        else {
            panic!("expected message packet");
        };
        let packet = decode_socket(&payload).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                namespace: "/".to_string(),
                ack_id: None,
                name: "stock_updated".to_string(),
                args: vec![json!({"id": 3, "name": "Milk", "stock": 0})],
            }
        );
    }

    #[test]
    fn test_decode_event_with_namespace_and_ack_id() {
        let packet = decode_socket(r#"2/sales,12["low_stock_alert",{"product_name":"Bread","stock":2}]"#)
            .unwrap();
        let SocketPacket::Event {
            namespace,
            ack_id,
            name,
            args,
        } = packet
        else {
            panic!("expected event");
        };
        assert_eq!(namespace, "/sales");
        assert_eq!(ack_id, Some(12));
        assert_eq!(name, "low_stock_alert");
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_decode_connect_variants() {
        assert_eq!(
            decode_socket(r#"0{"sid":"abc"}"#).unwrap(),
            SocketPacket::Connect {
                namespace: "/".to_string(),
                data: Some(json!({"sid": "abc"})),
            }
        );
        assert_eq!(
            decode_socket("1/admin,").unwrap(),
            SocketPacket::Disconnect {
                namespace: "/admin".to_string()
            }
        );
        assert!(matches!(
            decode_socket(r#"4{"message":"Not authorized"}"#).unwrap(),
            SocketPacket::ConnectError { data: Some(_), .. }
        ));
    }

    #[test]
    fn test_binary_and_ack_packets_are_ignored() {
        assert_eq!(decode_socket("3[]").unwrap(), SocketPacket::Ignored(3));
        assert_eq!(
            decode_socket(r#"51-["upload",{"_placeholder":true,"num":0}]"#).unwrap(),
            SocketPacket::Ignored(5)
        );
    }

    #[test]
    fn test_malformed_events() {
        assert!(matches!(decode_socket("2{}"), Err(PushError::Protocol(_))));
        assert!(matches!(decode_socket("2[]"), Err(PushError::Protocol(_))));
        assert!(matches!(decode_socket("2[1]"), Err(PushError::Protocol(_))));
        assert!(matches!(decode_socket("2[\"x\""), Err(PushError::Json(_))));
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode_connect("/"), "40");
        assert_eq!(encode_connect("/sales"), "40/sales,");
        assert_eq!(encode_pong(""), "3");
        assert_eq!(encode_pong("probe"), "3probe");
    }
}
