//! Outbound request seam used by entity action methods.
//!
//! The crate does not ship an HTTP client. Callers provide a [`Transport`] that
//! performs the request and returns the response record; the action method then
//! hydrates that record through the same engine as inbound events.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::entity::HydrationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Patch => write!(f, "PATCH"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("response could not be decoded: {0}")]
    Decode(String),
}

/// Executes REST requests against the remote API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `path` is relative to the API root, e.g. `/channels/1/messages`.
    async fn request(&self, method: Method, path: &str, body: Value) -> Result<Value, TransportError>;
}

/// Failure of an entity action method.
#[derive(Debug, Clone, Error)]
pub enum ActionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("response rejected: {0}")]
    Hydration(#[from] HydrationError),

    #[error("{kind} has no `{attribute}` yet")]
    NotHydrated {
        kind: &'static str,
        attribute: &'static str,
    },
}
