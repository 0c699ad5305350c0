//! HTTP listener and dispatcher for the gateway.
//!
//! Every connection is served on its own tokio task, so a slow command on
//! one connection never delays another. The envelope endpoint always
//! answers HTTP 200 — the status means "the gateway processed the
//! envelope", not "the operation succeeded"; outcomes live inside the
//! response body. A peer that hangs up before the response is written is
//! logged by the connection task and swallowed; it cannot take down the
//! listener or sibling workers.

use anyhow::Result;
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response as HttpResponse},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::{Config, HealthConfig};
use crate::deploy::Deployer;
use crate::error::GatewayError;
use crate::exec::{ExecOutcome, Executor};
use crate::fsops::FileAccess;
use crate::policy::Policy;
use crate::rpc::{self, Method, Request, Response};
use crate::service::{ServiceAction, ServiceControl};

pub struct Server {
    config: Config,
}

/// Shared per-process state: the immutable policy plus the delegates built
/// around it. Read-only after startup, so tasks share it without locking.
struct AppState {
    executor: Arc<Executor>,
    files: FileAccess,
    services: ServiceControl,
    deployer: Deployer,
    health: HealthConfig,
}

impl AppState {
    fn new(config: &Config) -> Self {
        let policy = Arc::new(Policy::from_config(&config.policy));
        let executor = Arc::new(Executor::new(Arc::clone(&policy), &config.exec));

        Self {
            files: FileAccess::new(Arc::clone(&policy)),
            services: ServiceControl::new(Arc::clone(&executor)),
            deployer: Deployer::new(Arc::clone(&policy), &config.deploy),
            executor,
            health: config.health.clone(),
        }
    }
}

impl Server {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
        })
    }

    pub async fn run(&self) -> Result<()> {
        let state = Arc::new(AppState::new(&self.config));

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = Router::new()
            .route("/", post(rpc_endpoint))
            .route("/health", get(health_endpoint))
            .fallback(not_found)
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(state);

        let addr: SocketAddr =
            format!("{}:{}", self.config.server.bind, self.config.server.port).parse()?;

        info!("Starting gateway on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Unknown transport paths get a generic not-found, no detail.
async fn not_found() -> HttpResponse {
    (StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))).into_response()
}

/// Transport-level liveness probe, same payload as the health_check method.
async fn health_endpoint(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(health_payload(&state).await)
}

/// The envelope endpoint. The body is decoded by hand so malformed JSON
/// becomes a structured error envelope rather than a framework 4xx.
async fn rpc_endpoint(State(state): State<Arc<AppState>>, body: Bytes) -> HttpResponse {
    let request: Request = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "undecodable request body");
            return Json(Response::parse_error(&e.to_string())).into_response();
        }
    };

    let is_notification = request.is_notification();
    let id = request.id.clone().unwrap_or(Value::Null);
    let method = request.method.clone();

    let outcome = dispatch(&state, &request).await;

    if let Err(ref error) = outcome {
        if error.is_expected() {
            debug!(method = %method, error = %error, "request refused");
        } else {
            warn!(
                method = %method,
                params = %truncated_params(&request.params),
                error = %error,
                "request failed"
            );
        }
    }

    // Notifications get no response body, whatever the outcome.
    if is_notification {
        return StatusCode::NO_CONTENT.into_response();
    }

    match outcome {
        Ok(result) => Json(Response::result(id, result)).into_response(),
        Err(error) => Json(Response::error(id, &error)).into_response(),
    }
}

/// Route a decoded request to its delegate. Exhaustive over the closed
/// method set; every branch ends in exactly one result or error.
async fn dispatch(state: &AppState, request: &Request) -> Result<Value, GatewayError> {
    let method = Method::parse(&request.method)
        .ok_or_else(|| GatewayError::UnknownMethod(request.method.clone()))?;

    match method {
        Method::ExecuteCommand => {
            let params: rpc::ExecuteCommandParams = rpc::decode_params(&request.params)?;
            let working_dir = params.working_dir.as_deref().map(Path::new);
            let result = state
                .executor
                .execute_line(&params.command, working_dir, params.timeout_secs)
                .await?;
            execution_value(&state.executor, result, params.timeout_secs)
        }
        Method::ReadFile => {
            let params: rpc::ReadFileParams = rpc::decode_params(&request.params)?;
            let read = state.files.read_file(Path::new(&params.path))?;
            Ok(json!({"content": read.content, "size": read.size}))
        }
        Method::WriteFile => {
            let params: rpc::WriteFileParams = rpc::decode_params(&request.params)?;
            let written = state.files.write_file(
                Path::new(&params.path),
                &params.content,
                params.mode.as_deref(),
            )?;
            Ok(json!({"path": written.path, "size": written.size}))
        }
        Method::ListDirectory => {
            let params: rpc::ListDirectoryParams = rpc::decode_params(&request.params)?;
            let items = state.files.list_directory(Path::new(&params.path))?;
            Ok(json!({"items": items}))
        }
        Method::ManageService => {
            let params: rpc::ManageServiceParams = rpc::decode_params(&request.params)?;
            let action: ServiceAction = params.action.parse()?;
            let result = state.services.manage(&params.service, action).await?;
            execution_value(&state.executor, result, None)
        }
        Method::DeployApplication => {
            let params: rpc::DeployApplicationParams = rpc::decode_params(&request.params)?;
            let deployed = state
                .deployer
                .deploy(&params.app, Path::new(&params.source_path))?;
            Ok(json!({
                "app": deployed.app,
                "path": deployed.path,
                "files_copied": deployed.files_copied,
            }))
        }
        Method::GetSystemInfo => Ok(Value::Object(crate::sysinfo::collect())),
        Method::HealthCheck => Ok(health_payload(state).await),
    }
}

/// Convert an execution result into the wire shape, folding a timeout into
/// the error branch — never a success with partial output.
fn execution_value(
    executor: &Executor,
    result: crate::exec::ExecutionResult,
    timeout_secs: Option<u64>,
) -> Result<Value, GatewayError> {
    if result.outcome == ExecOutcome::Timeout {
        return Err(GatewayError::Timeout(
            executor.effective_timeout(timeout_secs).as_secs(),
        ));
    }
    Ok(json!({
        "stdout": result.stdout,
        "stderr": result.stderr,
        "returncode": result.return_code,
    }))
}

async fn health_payload(state: &AppState) -> Value {
    let mut services = serde_json::Map::new();
    for name in &state.health.services {
        let status = match state
            .services
            .is_active(name, state.health.probe_timeout_secs)
            .await
        {
            Ok(result) if result.outcome == ExecOutcome::Success => "active",
            Ok(result) if result.outcome == ExecOutcome::Failure => "inactive",
            _ => "unknown",
        };
        services.insert(name.clone(), Value::String(status.to_string()));
    }

    json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "services": services,
    })
}

fn truncated_params(params: &Value) -> String {
    let rendered = params.to_string();
    match rendered.char_indices().nth(200) {
        Some((idx, _)) => format!("{}…", &rendered[..idx]),
        None => rendered,
    }
}
