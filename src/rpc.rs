//! Wire protocol envelope: request decoding, the closed method set, and the
//! uniform response wrapper.
//!
//! A response carries exactly one of `result` or `error`, enforced by the
//! [`Body`] enum rather than by convention. The correlation `id` is echoed
//! verbatim and never interpreted; a request without one is a one-way
//! notification and receives no response body.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;

pub const PROTOCOL_VERSION: &str = "2.0";

/// Error code for a body that did not decode as a request at all.
const CODE_PARSE_ERROR: i64 = -32700;

#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default, rename = "jsonrpc")]
    pub version: Option<String>,

    pub method: String,

    #[serde(default)]
    pub params: Value,

    /// Correlation token, echoed verbatim. Absent (or null) marks a
    /// notification.
    #[serde(default)]
    pub id: Option<Value>,
}

impl Request {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// The closed set of supported operations.
///
/// Dispatch is an exhaustive match over this enum, so adding a method is a
/// compile-time-checked change, not a string table edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    ExecuteCommand,
    ReadFile,
    WriteFile,
    ListDirectory,
    ManageService,
    DeployApplication,
    GetSystemInfo,
    HealthCheck,
}

impl Method {
    pub fn parse(name: &str) -> Option<Method> {
        match name {
            "execute_command" => Some(Method::ExecuteCommand),
            "read_file" => Some(Method::ReadFile),
            "write_file" => Some(Method::WriteFile),
            "list_directory" => Some(Method::ListDirectory),
            "manage_service" => Some(Method::ManageService),
            "deploy_application" => Some(Method::DeployApplication),
            "get_system_info" => Some(Method::GetSystemInfo),
            "health_check" => Some(Method::HealthCheck),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::ExecuteCommand => "execute_command",
            Method::ReadFile => "read_file",
            Method::WriteFile => "write_file",
            Method::ListDirectory => "list_directory",
            Method::ManageService => "manage_service",
            Method::DeployApplication => "deploy_application",
            Method::GetSystemInfo => "get_system_info",
            Method::HealthCheck => "health_check",
        }
    }
}

// Per-method parameter shapes. Decoding failures surface as
// MalformedRequest, never as a transport-level 4xx.

#[derive(Debug, Deserialize)]
pub struct ExecuteCommandParams {
    pub command: String,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ReadFileParams {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct WriteFileParams {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListDirectoryParams {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct ManageServiceParams {
    pub service: String,
    pub action: String,
}

#[derive(Debug, Deserialize)]
pub struct DeployApplicationParams {
    pub app: String,
    pub source_path: String,
}

/// Decode a method's parameter object, mapping failures to
/// `MalformedRequest`.
pub fn decode_params<T: serde::de::DeserializeOwned>(params: &Value) -> Result<T, GatewayError> {
    serde_json::from_value(params.clone())
        .map_err(|e| GatewayError::MalformedRequest(format!("invalid params: {e}")))
}

#[derive(Debug, Serialize)]
pub struct Response {
    #[serde(rename = "jsonrpc")]
    pub version: &'static str,
    pub id: Value,
    #[serde(flatten)]
    pub body: Body,
}

/// Exactly one of the two branches, never both.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Body {
    Result(Value),
    Error(ErrorObject),
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
}

impl Response {
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            id,
            body: Body::Result(result),
        }
    }

    pub fn error(id: Value, error: &GatewayError) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            id,
            body: Body::Error(ErrorObject {
                code: error.code(),
                message: error.to_string(),
            }),
        }
    }

    /// Envelope for a body that did not decode as a request at all. The id
    /// is unknowable, so it is null.
    pub fn parse_error(detail: &str) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            id: Value::Null,
            body: Body::Error(ErrorObject {
                code: CODE_PARSE_ERROR,
                message: format!("parse error: {detail}"),
            }),
        }
    }
}
