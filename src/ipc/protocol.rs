use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::config::ConfigCommand;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "command", content = "args", rename_all = "snake_case")]
pub enum Request {
    GetConfig,
    Apply(ConfigCommand),
    WriteConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Success { data: Value },
    Error { error: Value },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            error: serde_json::json!({ "message": message.into() }),
        }
    }

    pub fn is_success(&self) -> bool { matches!(self, Response::Success { .. }) }
}
