use axum::{Json, http::StatusCode, response::IntoResponse};
use oauth2::basic::BasicErrorResponseType;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use serde::Serialize;
use serde_json::json;
use sqlx::Error as SqlxError;
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ChowError {
    /// Message meant for the end user, rendered verbatim.
    #[error("{0}")]
    UserVisible(String),

    #[error("missing required fields: {}", .0.join(", "))]
    RequiredFields(Vec<String>),

    #[error("login required")]
    LoginRequired,

    #[error("restaurant not found: {0}")]
    RestaurantNotFound(String),

    #[error("invalid merge: {0}")]
    InvalidMerge(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Session store error: {0}")]
    SessionStore(#[from] tower_sessions::session_store::Error),

    #[error("Password hash error: {0}")]
    PasswordHash(String),

    #[error("OAuth2 token request error: {0}")]
    Oauth2Token(String),

    #[error("OAuth2 server error: {error}")]
    Oauth2Server { error: String },

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Upstream error with status: {0}")]
    UpstreamStatus(StatusCode),

    #[error("request context missing")]
    MissingContext,

    #[error("identity {0:?} cannot name an external account")]
    IdentityConflict(String),
}

impl ChowError {
    pub fn user_visible(message: impl Into<String>) -> Self {
        ChowError::UserVisible(message.into())
    }
}

/// Whether an error is worth another attempt against a remote service.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for ChowError {
    fn is_retryable(&self) -> bool {
        match self {
            ChowError::Reqwest(e) => e.is_timeout() || e.is_connect(),
            ChowError::UpstreamStatus(code) => {
                code.is_server_error() || *code == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

impl From<argon2::password_hash::Error> for ChowError {
    fn from(e: argon2::password_hash::Error) -> Self {
        ChowError::PasswordHash(e.to_string())
    }
}

impl
    From<
        RequestTokenError<
            HttpClientError<reqwest::Error>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for ChowError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<reqwest::Error>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => ChowError::Oauth2Server {
                error: err.error().to_string(),
            },
            RequestTokenError::Request(req_e) => {
                ChowError::Oauth2Token(format!("request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => ChowError::Json(parse_err.into_inner()),
            RequestTokenError::Other(s) => ChowError::Oauth2Token(s),
        }
    }
}

impl IntoResponse for ChowError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            ChowError::UserVisible(message) => {
                tracing::info!(message = %message, "user visible error");
                (
                    StatusCode::BAD_REQUEST,
                    ApiErrorBody {
                        code: "USER_ERROR".to_string(),
                        message,
                    },
                )
            }
            ChowError::RequiredFields(fields) => {
                let fields: BTreeMap<String, bool> =
                    fields.into_iter().map(|f| (f, true)).collect();
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "errors": { "fields": fields } })),
                )
                    .into_response();
            }
            ChowError::LoginRequired => (
                StatusCode::UNAUTHORIZED,
                ApiErrorBody {
                    code: "LOGIN_REQUIRED".to_string(),
                    message: "You must be logged in.".to_string(),
                },
            ),
            ChowError::IdentityConflict(identity) => {
                tracing::warn!(identity = %identity, "external identity rejected");
                (
                    StatusCode::CONFLICT,
                    ApiErrorBody {
                        code: "IDENTITY_CONFLICT".to_string(),
                        message: "This account cannot be used here.".to_string(),
                    },
                )
            }
            ChowError::RestaurantNotFound(id) => (
                StatusCode::NOT_FOUND,
                ApiErrorBody {
                    code: "NOT_FOUND".to_string(),
                    message: format!("No restaurant with id {id}."),
                },
            ),
            ChowError::DatabaseError(_)
            | ChowError::SessionStore(_)
            | ChowError::RactorError(_)
            | ChowError::PasswordHash(_)
            | ChowError::InvalidMerge(_)
            | ChowError::MissingContext
            | ChowError::Json(_) => {
                tracing::error!(error = %self, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorBody {
                        code: "INTERNAL_ERROR".to_string(),
                        message: "An internal server error occurred.".to_string(),
                    },
                )
            }
            ChowError::Oauth2Token(_) | ChowError::Oauth2Server { .. } => (
                StatusCode::UNAUTHORIZED,
                ApiErrorBody {
                    code: "UNAUTHORIZED".to_string(),
                    message: "Authentication error.".to_string(),
                },
            ),
            ChowError::Reqwest(_) | ChowError::UrlParse(_) => (
                StatusCode::BAD_GATEWAY,
                ApiErrorBody {
                    code: "BAD_GATEWAY".to_string(),
                    message: "Upstream service is unavailable.".to_string(),
                },
            ),
            ChowError::UpstreamStatus(code) => {
                let (err_code, msg) = match code {
                    StatusCode::TOO_MANY_REQUESTS => {
                        ("RATE_LIMIT", "Upstream rate limit exceeded.")
                    }
                    StatusCode::UNAUTHORIZED => ("UNAUTHORIZED", "Upstream authentication failed."),
                    StatusCode::FORBIDDEN => ("FORBIDDEN", "Upstream permission denied."),
                    _ => ("UPSTREAM_ERROR", "An upstream error occurred."),
                };
                (
                    StatusCode::BAD_GATEWAY,
                    ApiErrorBody {
                        code: err_code.to_string(),
                        message: msg.to_string(),
                    },
                )
            }
        };
        (status, Json(ApiErrorResponse { error: error_body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
