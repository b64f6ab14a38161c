//! # Error Handling
//!
//! Every fallible operation in this crate returns [`FunnelError`]. Most variants
//! describe a misconfigured filter (reserved parameter names, unknown operators,
//! relations the query builder cannot resolve) and are reported as internal
//! errors. [`FunnelError::InvalidOperation`] is the one variant a client can
//! trigger by sending a value of the wrong shape, so it maps to `400`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use funnelcrate::{FunnelError, QueryParams};
//!
//! async fn list_posts(params: QueryParams) -> Result<Json<Vec<Post>>, FunnelError> {
//!     let select = Post::filtered(&params)?.into_select();
//!     // ...
//! }
//! ```
//!
//! Internal details are logged through `tracing` and never sent to the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Errors raised while building filters or applying them to a query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FunnelError {
    /// A value was converted into a shape it does not have, or an attribute
    /// was asked for a relation it does not contain.
    #[error("{0}")]
    InvalidOperation(String),

    /// A filter listens on the request parameter reserved for eager loading.
    #[error("parameter `{parameter}` is reserved for eager loading relations")]
    ReservedParameter {
        /// The offending parameter name
        parameter: String,
    },

    /// The operator string does not name a supported comparison.
    #[error("unsupported operator `{0}`")]
    UnsupportedOperator(String),

    /// The query builder has no relation registered under this name.
    #[error("relation `{relation}` is not defined on `{table}`")]
    UnknownRelation {
        /// Table the relation was looked up on
        table: String,
        /// Relation accessor name
        relation: String,
    },

    /// Configuration could not be read or is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl FunnelError {
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    pub fn reserved_parameter(parameter: impl Into<String>) -> Self {
        Self::ReservedParameter {
            parameter: parameter.into(),
        }
    }

    pub fn unknown_relation(table: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::UnknownRelation {
            table: table.into(),
            relation: relation.into(),
        }
    }

    /// HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::ReservedParameter { .. }
            | Self::UnsupportedOperator(_)
            | Self::UnknownRelation { .. }
            | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message that is safe to send to the client
    fn user_message(&self) -> String {
        match self {
            Self::InvalidOperation(message) => message.clone(),
            _ => "An internal error occurred".to_string(),
        }
    }

    fn log_internal(&self) {
        match self {
            Self::InvalidOperation(message) => {
                tracing::debug!(error = %message, "Rejected filter parameter");
            }
            _ => {
                tracing::error!(error = %self, "Filter configuration error");
            }
        }
    }
}

/// Error response sent to users (sanitized)
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for FunnelError {
    fn into_response(self) -> Response {
        self.log_internal();

        let body = ErrorResponse {
            error: self.user_message(),
        };

        (self.status_code(), Json(body)).into_response()
    }
}
