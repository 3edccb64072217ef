/// Error taxonomy for alerthub
///
/// Every fallible operation in the repository and handler layers maps into
/// one of these variants; the webserver boundary translates them to HTTP
/// status codes.
use axum::http::StatusCode;

#[derive(Debug, Clone)]
pub enum AlertHubError {
    /// A requested resource was not found
    NotFound(String),

    /// Input data is missing, unparsable, or out of range
    InvalidInput(String),

    /// Password missing or wrong on a protected endpoint
    Unauthorized(String),

    /// Operation conflicts with in-flight state (batch upload admission)
    Conflict(String),

    /// Database operation failure or any other unexpected failure
    Database(String),
}

impl std::fmt::Display for AlertHubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertHubError::NotFound(msg) => write!(f, "not found: {}", msg),
            AlertHubError::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            AlertHubError::Unauthorized(msg) => write!(f, "unauthorized: {}", msg),
            AlertHubError::Conflict(msg) => write!(f, "conflict: {}", msg),
            AlertHubError::Database(msg) => write!(f, "database operation failed: {}", msg),
        }
    }
}

impl std::error::Error for AlertHubError {}

impl AlertHubError {
    /// HTTP status the webserver boundary responds with
    pub fn status_code(&self) -> StatusCode {
        match self {
            AlertHubError::NotFound(_) => StatusCode::NOT_FOUND,
            AlertHubError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AlertHubError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AlertHubError::Conflict(_) => StatusCode::CONFLICT,
            AlertHubError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message exposed in the HTTP response body
    ///
    /// 4xx responses carry the specific message; 5xx responses do not echo
    /// internal error strings.
    pub fn public_message(&self) -> String {
        match self {
            AlertHubError::NotFound(msg) => msg.clone(),
            AlertHubError::InvalidInput(msg) => msg.clone(),
            AlertHubError::Unauthorized(msg) => msg.clone(),
            AlertHubError::Conflict(msg) => msg.clone(),
            AlertHubError::Database(_) => "Internal server error".to_string(),
        }
    }

    pub fn unauthorized() -> AlertHubError {
        AlertHubError::Unauthorized("Unauthorized: Invalid API password".to_string())
    }
}

impl From<rusqlite::Error> for AlertHubError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => {
                AlertHubError::NotFound("resource not found".to_string())
            }
            other => AlertHubError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AlertHubError {
    fn from(err: serde_json::Error) -> Self {
        AlertHubError::InvalidInput(format!("invalid JSON: {}", err))
    }
}
