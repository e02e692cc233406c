//! Error types for the avatar registry

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Avatar not found: {id}")]
    NotFound { id: u64 },

    #[error("Unauthorized: caller may not act on {}", describe_target(.id))]
    Unauthorized { id: Option<u64> },

    #[error("Avatar inactive: {id}")]
    Inactive { id: u64 },

    #[error("Corrupt snapshot: {reason}")]
    CorruptSnapshot { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn describe_target(id: &Option<u64>) -> String {
    match id {
        Some(id) => format!("avatar {id}"),
        None => "registry administration".to_string(),
    }
}

impl RegistryError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptSnapshot {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
