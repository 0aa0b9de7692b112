use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    RateLimited,
    Internal,
}

/// Payload of a `rejected` frame: the gateway refused a request.
#[derive(Debug, Clone, Deserialize, Error)]
#[error("{code:?}: {message}")]
pub struct GatewayRejection {
    pub code: ErrorCode,
    pub message: String,
}
