use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Control frames a client may send.
///
/// Frames look like `{"type": "subscribe", "modelType": "patients"}`. The
/// `type` values are matched exactly; anything else fails to parse.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Subscribe {
        #[serde(rename = "modelType")]
        model_type: String,
    },
    Unsubscribe {
        #[serde(rename = "modelType", default)]
        model_type: Option<String>,
    },
    Disconnect,
    Ping,
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Frames the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ServerMessage {
    Subscribed {
        #[serde(rename = "modelType")]
        model_type: String,
    },
    Unsubscribed {
        #[serde(rename = "modelType", skip_serializing_if = "Option::is_none")]
        model_type: Option<String>,
    },
    Update {
        #[serde(rename = "modelType")]
        model_type: String,
    },
    Pong,
}

impl ServerMessage {
    pub fn event_type(&self) -> &'static str {
        match self {
            ServerMessage::Subscribed { .. } => "subscribed",
            ServerMessage::Unsubscribed { .. } => "unsubscribed",
            ServerMessage::Update { .. } => "update",
            ServerMessage::Pong => "pong",
        }
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_parse_subscribe() {
        let message = ClientMessage::parse(r#"{"type":"subscribe","modelType":"patients"}"#);
        assert_eq!(
            message.unwrap(),
            ClientMessage::Subscribe {
                model_type: "patients".to_string()
            }
        );
    }

    #[test]
    fn test_parse_unsubscribe_with_and_without_model_type() {
        assert_eq!(
            ClientMessage::parse(r#"{"type":"unsubscribe","modelType":"orders"}"#).unwrap(),
            ClientMessage::Unsubscribe {
                model_type: Some("orders".to_string())
            }
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"unsubscribe"}"#).unwrap(),
            ClientMessage::Unsubscribe { model_type: None }
        );
    }

    #[test]
    fn test_parse_unit_messages_ignore_extra_fields() {
        assert_eq!(
            ClientMessage::parse(r#"{"type":"ping"}"#).unwrap(),
            ClientMessage::Ping
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"disconnect","modelType":"x"}"#).unwrap(),
            ClientMessage::Disconnect
        );
    }

    #[test]
    fn test_parse_rejects_malformed_frames() {
        for frame in [
            r#"{"type":"subscribe"}"#,
            r#"{"type":"subscribe","modelType":null}"#,
            r#"{"type":"explode"}"#,
            r#"{"modelType":"patients"}"#,
            r#"{"type":"Ping"}"#,
            "ping",
            "",
        ] {
            let err = ClientMessage::parse(frame).unwrap_err();
            assert_eq!(err.error_kind, ErrorKind::MalformedFrame, "frame: {frame}");
        }
    }

    #[test]
    fn test_server_messages_serialize_to_wire_format() {
        let cases = [
            (
                ServerMessage::Subscribed {
                    model_type: "patients".to_string(),
                },
                json!({"event": "subscribed", "modelType": "patients"}),
            ),
            (
                ServerMessage::Unsubscribed {
                    model_type: Some("patients".to_string()),
                },
                json!({"event": "unsubscribed", "modelType": "patients"}),
            ),
            (
                ServerMessage::Unsubscribed { model_type: None },
                json!({"event": "unsubscribed"}),
            ),
            (
                ServerMessage::Update {
                    model_type: "orders".to_string(),
                },
                json!({"event": "update", "modelType": "orders"}),
            ),
            (ServerMessage::Pong, json!({"event": "pong"})),
        ];

        for (message, expected) in cases {
            let actual: serde_json::Value =
                serde_json::from_str(&message.to_json().unwrap()).unwrap();
            assert_eq!(actual, expected, "{}", message.event_type());
        }
    }
}
