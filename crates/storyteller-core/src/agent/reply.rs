use crate::error::{RelayError, Result};
use serde::Deserialize;
use serde_json::Value;

/// Name of the function the agent calls to talk to the user.
pub const SEND_MESSAGE_FUNCTION: &str = "send_message";

/// One entry of the `messages` array returned by the agent server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AgentMessage {
    FunctionCall { function_call: FunctionCall },
    InternalMonologue { internal_monologue: String },
    FunctionReturn { function_return: Value },
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded string on current servers; some builds send an object.
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Deserialize)]
struct SendMessageArgs {
    message: String,
}

impl FunctionCall {
    fn send_message_text(&self) -> Result<String> {
        let args: SendMessageArgs = match &self.arguments {
            Value::String(raw) => serde_json::from_str(raw),
            other => serde_json::from_value(other.clone()),
        }
        .map_err(|e| {
            RelayError::ResponseShape(format!("{} arguments are not parseable: {}", self.name, e))
        })?;
        Ok(args.message)
    }
}

/// Extract the reply text from a send-message response body.
///
/// The reply is the `message` argument of the first `send_message`
/// function call. A body without one is an error, never an empty reply.
pub fn decode_reply(body: Value) -> Result<String> {
    let Some(Value::Array(raw)) = body.get("messages").cloned() else {
        return Err(RelayError::ResponseShape(
            "response has no messages array".to_string(),
        ));
    };

    let messages: Vec<AgentMessage> = raw
        .into_iter()
        .map(serde_json::from_value)
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| RelayError::ResponseShape(format!("unreadable message entry: {}", e)))?;

    messages
        .iter()
        .find_map(|m| match m {
            AgentMessage::FunctionCall { function_call } if function_call.name == SEND_MESSAGE_FUNCTION => {
                Some(function_call)
            }
            _ => None,
        })
        .ok_or_else(|| {
            RelayError::ResponseShape("assistant message not found in the response".to_string())
        })?
        .send_message_text()
}
