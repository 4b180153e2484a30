//! The request-handling capability required of every mounted viewer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A request routed to a mounted handler by the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandlerRequest {
    /// Path below the mount point, without a leading slash.
    pub path: String,

    /// Query or form parameters.
    #[serde(default)]
    pub params: HashMap<String, String>,

    /// Authenticated user, when the host has one.
    #[serde(default)]
    pub user: Option<String>,
}

impl HandlerRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// A rendered response handed back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl HandlerResponse {
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8".to_string(),
            body: body.into(),
        }
    }

    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "application/json".to_string(),
            body: body.into(),
        }
    }

    pub fn not_found(path: &str) -> Self {
        Self {
            status: 404,
            content_type: "text/plain; charset=utf-8".to_string(),
            body: format!("Not found: {path}"),
        }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8".to_string(),
            body: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Base request-handling capability of the routing host.
///
/// Handlers are installed once, before the listener activates, and are then
/// called concurrently by the host.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    /// Handle one request.
    async fn handle(&self, request: &HandlerRequest) -> HandlerResponse;
}
