use thiserror::Error;

use crate::view::lifecycle::Stage;

/// Errors surfaced by view operations.
#[derive(Debug, Clone, Error)]
pub enum ViewError {
    #[error("View '{view_id}' is destroyed")]
    Destroyed { view_id: String },

    #[error("Adding '{child_id}' under '{parent_id}' would create a cycle")]
    Cycle { parent_id: String, child_id: String },

    #[error("View '{view_id}' must be rendered before it is mounted")]
    NotRendered { view_id: String },

    #[error("Stage '{stage}' failed for view '{view_id}': {message}")]
    Stage {
        stage: Stage,
        view_id: String,
        message: String,
    },

    #[error("Template error: {0}")]
    Template(String),
}

impl ViewError {
    /// The lifecycle stage this error came from, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ViewError::Stage { stage, .. } => Some(*stage),
            ViewError::Template(_) => Some(Stage::Template),
            _ => None,
        }
    }
}
