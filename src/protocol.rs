//! JSON datagrams exchanged with the VR headset.
//!
//! The headset matches raw substrings such as `"type": "result"`, so outgoing
//! payloads keep Python-style `", "` / `": "` separators and unescaped UTF-8.

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::{Value, ser::Formatter};
use thiserror::Error;

/// PC → headset
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Telemetry {
    /// Depth gauge fill, 0.0..=1.0
    Depth { data: f64 },
    Count,
    Msg { data: String },
    /// Remaining hold seconds
    Hold { data: f64 },
    Knee {
        #[serde(rename = "isGood")]
        is_good: bool,
    },
    Spine {
        #[serde(rename = "isGood")]
        is_good: bool,
    },
    Result {
        count: u32,
        score: f64,
        kcal: f64,
        feedback: String,
    },
}

/// Headset → PC
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    Start {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        difficulty: Option<String>,
    },
    Stop,
}

const CONTROL_TYPES: &[&str] = &["start", "stop"];

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("payload is not valid UTF-8")]
    NotUtf8(#[from] std::str::Utf8Error),
    #[error("unknown message type `{0}`")]
    UnknownType(String),
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::with_capacity(96);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    message.serialize(&mut serializer)?;
    Ok(buf)
}

pub fn decode_control(payload: &[u8]) -> Result<ControlMessage, ProtocolError> {
    let text = std::str::from_utf8(payload)?;
    let value: Value = serde_json::from_str(text.trim())?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_owned);

    serde_json::from_value(value).map_err(|err| match kind {
        Some(kind) if !CONTROL_TYPES.contains(&kind.as_str()) => ProtocolError::UnknownType(kind),
        _ => ProtocolError::Json(err),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(message: &Telemetry) -> String {
        String::from_utf8(encode(message).unwrap()).unwrap()
    }

    #[test]
    fn depth_uses_spaced_separators() {
        let text = encoded(&Telemetry::Depth { data: 0.5 });
        assert_eq!(text, r#"{"type": "depth", "data": 0.5}"#);
    }

    #[test]
    fn count_has_only_a_type() {
        assert_eq!(encoded(&Telemetry::Count), r#"{"type": "count"}"#);
    }

    #[test]
    fn knee_and_spine_use_is_good_key() {
        assert_eq!(
            encoded(&Telemetry::Knee { is_good: false }),
            r#"{"type": "knee", "isGood": false}"#
        );
        assert_eq!(
            encoded(&Telemetry::Spine { is_good: true }),
            r#"{"type": "spine", "isGood": true}"#
        );
    }

    #[test]
    fn messages_keep_hangul_unescaped() {
        let text = encoded(&Telemetry::Msg {
            data: "좋아요! 아주 완벽해요.".to_string(),
        });
        assert_eq!(text, r#"{"type": "msg", "data": "좋아요! 아주 완벽해요."}"#);
    }

    #[test]
    fn result_field_order_matches_headset_parser() {
        let text = encoded(&Telemetry::Result {
            count: 3,
            score: 4.5,
            kcal: 2.4,
            feedback: "잘하셨어요!\n- 무릎".to_string(),
        });
        assert_eq!(
            text,
            r#"{"type": "result", "count": 3, "score": 4.5, "kcal": 2.4, "feedback": "잘하셨어요!\n- 무릎"}"#
        );
    }

    #[test]
    fn decodes_start_with_difficulty() {
        let msg = decode_control(br#"{"type": "start", "difficulty": "Hard"}"#).unwrap();
        assert_eq!(
            msg,
            ControlMessage::Start {
                difficulty: Some("Hard".to_string())
            }
        );
    }

    #[test]
    fn decodes_start_without_difficulty() {
        let msg = decode_control(br#"{"type":"start"}"#).unwrap();
        assert_eq!(msg, ControlMessage::Start { difficulty: None });
    }

    #[test]
    fn decodes_stop_ignoring_extra_fields() {
        let msg = decode_control(br#"{"type": "stop", "reason": "quit"}"#).unwrap();
        assert_eq!(msg, ControlMessage::Stop);
    }

    #[test]
    fn unknown_type_is_reported() {
        let err = decode_control(br#"{"type": "pause"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(kind) if kind == "pause"));
    }

    #[test]
    fn garbage_is_a_json_error() {
        assert!(matches!(
            decode_control(b"not json"),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            decode_control(&[0xff, 0xfe]),
            Err(ProtocolError::NotUtf8(_))
        ));
    }
}
