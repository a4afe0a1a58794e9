use thiserror::Error;

use crate::page::PatternError;
use crate::view::{Stage, ViewError};

#[derive(Debug, Clone, Error)]
pub enum RouterError {
    #[error("No route is registered for page '{page}'")]
    UnknownPage { page: String },

    #[error("No route is named '{name}'")]
    UnknownRoute { name: String },

    #[error("A route named '{name}' is already registered")]
    DuplicateRoute { name: String },

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("Navigation to '{path}' failed at stage '{stage}': {message}")]
    Stage {
        path: String,
        stage: Stage,
        message: String,
    },
}

impl RouterError {
    /// Wrap a view failure, keeping the view's own stage when it has one.
    pub(crate) fn from_view(path: &str, fallback: Stage, err: ViewError) -> Self {
        RouterError::Stage {
            path: path.to_string(),
            stage: err.stage().unwrap_or(fallback),
            message: err.to_string(),
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            RouterError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
