use crate::error::{AppError, Result};
use crate::snapshot::{SystemSnapshot, RELAY_COUNT};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Update { data: SystemSnapshot },
}

/// Commands sent from client to server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    SetRelay { relay_index: usize, state: bool },
}

impl ClientCommand {
    pub fn set_relay(relay_index: usize, state: bool) -> Result<Self> {
        if relay_index >= RELAY_COUNT {
            return Err(AppError::InvalidRelay(relay_index));
        }
        Ok(ClientCommand::SetRelay { relay_index, state })
    }

    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decode one inbound text frame.
///
/// Invalid JSON and bad payloads yield [`AppError::MalformedFrame`]; well-formed
/// frames whose `type` is anything other than `update` yield
/// [`AppError::UnexpectedFrame`].
pub fn decode_frame(text: &str) -> Result<ServerMessage> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| AppError::MalformedFrame(e.to_string()))?;

    match value.get("type").and_then(Value::as_str) {
        Some("update") => {}
        Some(other) => return Err(AppError::UnexpectedFrame(other.to_string())),
        None => return Err(AppError::MalformedFrame("missing \"type\" field".to_string())),
    }

    serde_json::from_value(value).map_err(|e| AppError::MalformedFrame(e.to_string()))
}
