use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::Phase;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    Search { query: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected { session_id: String },
    PhaseUpdate { phase: u8 },
    ToolCall { tool: String, success: bool },
    SearchComplete,
    Error { message: String },
}

impl ServerEvent {
    pub fn phase(phase: Phase) -> Self {
        ServerEvent::PhaseUpdate {
            phase: phase.index(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Event(ServerEvent),
}

impl Outbound {
    pub fn into_frame(self) -> Result<String, serde_json::Error> {
        match self {
            Outbound::Text(text) => Ok(text),
            Outbound::Event(event) => serde_json::to_string(&event),
        }
    }
}

impl From<ServerEvent> for Outbound {
    fn from(event: ServerEvent) -> Self {
        Outbound::Event(event)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("search query is empty")]
    EmptyQuery,

    #[error("binary frames are not supported")]
    Binary,
}

pub fn parse_request(text: &str) -> Result<ClientRequest, ProtocolError> {
    let request: ClientRequest =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    match &request {
        ClientRequest::Search { query } if query.trim().is_empty() => Err(ProtocolError::EmptyQuery),
        _ => Ok(request),
    }
}
