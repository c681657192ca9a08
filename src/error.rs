use std::io;

use http::status::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;
use url::ParseError as UrlParseError;

#[cfg(feature = "wasm")]
use serde_wasm_bindgen::Error as WasmError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum LoraSyncError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Custom error: {0}")]
    Custom(String),
    #[error("HTTP {status} from backend: {body}")]
    Http { status: u16, body: String },
    #[error("File System error: {0}")]
    Io(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
}

impl LoraSyncError {
    /// The backend status code, for errors that came back as an HTTP response.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            LoraSyncError::Http { status, .. } => StatusCode::from_u16(*status).ok(),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for LoraSyncError {
    fn from(src: toml::de::Error) -> LoraSyncError {
        LoraSyncError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for LoraSyncError {
    fn from(src: toml::ser::Error) -> LoraSyncError {
        LoraSyncError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for LoraSyncError {
    fn from(src: JsonError) -> LoraSyncError {
        LoraSyncError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<UrlParseError> for LoraSyncError {
    fn from(src: UrlParseError) -> LoraSyncError {
        LoraSyncError::Config(format!("Invalid URL: {src}"))
    }
}

impl From<io::Error> for LoraSyncError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => LoraSyncError::NotFound(format!("{x}")),
            _ => LoraSyncError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<reqwest::Error> for LoraSyncError {
    fn from(x: reqwest::Error) -> Self {
        match x.status() {
            Some(status) => LoraSyncError::Http {
                status: status.as_u16(),
                body: format!("{x}"),
            },
            None => LoraSyncError::Network(format!("{x}")),
        }
    }
}

#[cfg(feature = "wasm")]
impl From<WasmError> for LoraSyncError {
    fn from(wasm_error: WasmError) -> Self {
        LoraSyncError::Serialization(format!("Serde-wasm-bindgen error: {wasm_error}"))
    }
}
