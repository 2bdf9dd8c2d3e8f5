use thiserror::Error;

pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;

/// Structural invariant violations detected while building or editing a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("duplicate node id `{id}`")]
    DuplicateId { id: String },

    #[error("node ids must not be empty")]
    EmptyId,
}

/// Failure reported by an action handler.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("invalid parameters for `{action}`: {source}")]
    InvalidParams {
        action: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Unknown action: {action_type}")]
    UnknownAction { action_type: String },

    #[error("Invalid JSON: {0}")]
    ImportParse(#[source] serde_json::Error),

    #[error("Invalid document: {0}")]
    InvalidDocument(#[from] DocumentError),

    #[error("Failed to serialize document: {0}")]
    Export(#[source] serde_json::Error),

    #[error("Action `{action_type}` failed: {source}")]
    Action {
        action_type: String,
        #[source]
        source: ActionError,
    },
}
