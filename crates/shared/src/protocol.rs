//! Views and requests exchanged with an external UI transport.

use serde::{Deserialize, Serialize};

use crate::{domain::CallbackId, error::ApiError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandView {
    pub name: String,
    pub trigger: String,
    pub priority: i32,
    pub blocked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackView {
    pub id: CallbackId,
    pub name: String,
    pub started: bool,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub commands: Vec<CommandView>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub state: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum UiRequest {
    ListCallbacks,
    GetCallbackData { id: CallbackId },
    Invoke { id: CallbackId, command: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum UiResponse {
    Callbacks(Vec<CallbackView>),
    Callback(CallbackView),
    Error(ApiError),
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
