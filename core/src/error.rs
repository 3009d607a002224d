use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool '{0}' not found")]
    UnknownTool(String),

    #[error("Invalid arguments for '{tool}': {}", join_violations(.violations))]
    InvalidArguments {
        tool: String,
        violations: Vec<FieldViolation>,
    },

    #[error("Tool '{tool}' failed: {message}")]
    ExecutionFailed { tool: String, message: String },

    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),
}

impl ToolError {
    pub fn offending_fields(&self) -> Vec<&str> {
        match self {
            Self::InvalidArguments { violations, .. } => {
                violations.iter().map(|v| v.field.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Errors that end a conversation turn. Tool failures never show up here.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Model call failed: {0}")]
    ModelCall(String),

    #[error("Model did not finish within {0} rounds")]
    IterationLimit(usize),

    #[error("Turn requested unknown tool '{0}'")]
    UnknownTool(String),
}

impl TurnError {
    pub fn model(err: impl fmt::Display) -> Self {
        Self::ModelCall(err.to_string())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Failed to load model '{model}': {message}")]
pub struct ModelLoadError {
    pub model: String,
    pub message: String,
}

impl From<ModelLoadError> for TurnError {
    fn from(err: ModelLoadError) -> Self {
        Self::ModelCall(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_arguments_lists_every_field() {
        let err = ToolError::InvalidArguments {
            tool: "web_search".into(),
            violations: vec![
                FieldViolation::new("query", "must be at most 100 characters"),
                FieldViolation::new("limit", "expected integer"),
            ],
        };

        let msg = err.to_string();
        assert!(msg.contains("query: must be at most 100 characters"));
        assert!(msg.contains("limit: expected integer"));
        assert_eq!(err.offending_fields(), vec!["query", "limit"]);
    }

    #[test]
    fn load_error_becomes_model_call_failure() {
        let err: TurnError = ModelLoadError {
            model: "qwen3-4b".into(),
            message: "connection refused".into(),
        }
        .into();
        assert!(matches!(err, TurnError::ModelCall(ref m) if m.contains("qwen3-4b")));
    }
}
