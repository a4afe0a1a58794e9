use std::collections::BTreeMap;

use thiserror::Error;

/// Per-field error messages, keyed by attribute name. Errors that belong to
/// no particular field are stored under [`BASE_ERROR_KEY`].
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub const BASE_ERROR_KEY: &str = "_base";

/// Errors produced by models, collections and the REST transport.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    /// The request never produced an API envelope (connection, timeout, client setup)
    #[error("Transport error for {method} {url}: {message}")]
    Transport {
        method: &'static str,
        url: String,
        message: String,
    },

    /// The API answered with `success != true`
    #[error("API error: {message}")]
    Api { message: String, errors: FieldErrors },

    /// Local validation rules failed
    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(FieldErrors),

    /// The operation needs an identity the model does not have yet
    #[error("Model '{model}' has no identity")]
    MissingIdentity { model: String },

    /// A model of another definition was added to a collection
    #[error("Collection of '{expected}' cannot hold a '{found}' model")]
    SchemaMismatch { expected: String, found: String },

    /// The response body did not have the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl DataError {
    /// Field errors carried by this error, with transport/decode failures
    /// reported under the base key.
    pub fn field_errors(&self) -> FieldErrors {
        match self {
            DataError::Api { message, errors } => {
                if errors.is_empty() {
                    base_error(message)
                } else {
                    errors.clone()
                }
            }
            DataError::Validation(errors) => errors.clone(),
            other => base_error(&other.to_string()),
        }
    }
}

fn base_error(message: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.insert(BASE_ERROR_KEY.to_string(), vec![message.to_string()]);
    errors
}
