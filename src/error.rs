use std::string::FromUtf8Error;
use std::time::Duration;

use hyper::http;
use thiserror::Error;

use crate::xmlrpc::protocol::Fault;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid server url `{0}`")]
    InvalidUrl(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] hyper::Error),

    #[error("cannot build HTTP request: {0}")]
    Request(#[from] http::Error),

    #[error("server answered with HTTP status {0}")]
    Status(u16),

    #[error("no answer from server within {0:?}")]
    Timeout(Duration),

    #[error("response body is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),

    #[error("malformed XML: {0}")]
    Xml(#[from] xml::reader::Error),

    #[error("malformed XML-RPC payload: {0}")]
    Parse(String),

    #[error("XML-RPC fault {}: {}", .0.code, .0.message)]
    Fault(Fault),

    #[error("authentication failed for user `{username}` on database `{database}`")]
    AuthenticationFailed { database: String, username: String },

    #[error("unexpected result: expected {expected}, got {found}")]
    UnexpectedType { expected: &'static str, found: String },

    #[error("invalid domain: {0}")]
    InvalidDomain(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn unexpected(expected: &'static str, found: &crate::Value) -> Error {
        Error::UnexpectedType {
            expected,
            found: found.type_name().to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
