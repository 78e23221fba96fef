use axum::http::StatusCode;
use thiserror::Error;

/// HTTP boundary error: a status plus a plain-text message.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "admin password required".to_string(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::Http(_) | StoreError::Status { .. } => StatusCode::BAD_GATEWAY,
            StoreError::InvalidRow { .. } => StatusCode::BAD_GATEWAY,
            StoreError::Io(_) | StoreError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}

/// Failures talking to a record store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("record store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("record store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed {table} row: {message}")]
    InvalidRow { table: &'static str, message: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{0} is set but {1} is missing")]
    Incomplete(&'static str, &'static str),

    #[error("record store endpoint is not a valid URL: {0}")]
    InvalidEndpoint(String),
}

/// Per-record failures that exclude a row from aggregation without
/// aborting it.
#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("attendance record {record_id} has an invalid timestamp '{value}': {source}")]
    InvalidTimestamp {
        record_id: i64,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("attendance row {} is malformed: {source}", display_id(.record_id))]
    InvalidRow {
        record_id: Option<i64>,
        #[source]
        source: serde_json::Error,
    },
}

fn display_id(id: &Option<i64>) -> String {
    id.map_or_else(|| "without id".to_string(), |id| id.to_string())
}
