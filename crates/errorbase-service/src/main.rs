use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use errorbase_api::{
    AddErrorRequest, AddErrorResponse, ApiError, DeleteErrorRequest, DeleteErrorResponse,
    ErrorBaseApi, SearchRequest, SearchResponse, DEFAULT_DB_PATH,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, Clone)]
struct ServiceState {
    api: ErrorBaseApi,
    static_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    success: Option<bool>,
    error: String,
}

#[derive(Debug, Clone)]
struct ServiceError {
    status: StatusCode,
    body: ErrorBody,
}

#[derive(Debug, Parser)]
#[command(name = "errorbase-service")]
#[command(about = "HTTP lookup service for the error knowledge base")]
struct Args {
    #[arg(long, env = "ERRORBASE_DB", default_value = DEFAULT_DB_PATH)]
    db: PathBuf,
    #[arg(long, env = "ERRORBASE_BIND", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,
    #[arg(long, env = "ERRORBASE_STATIC_DIR", default_value = "./static")]
    static_dir: PathBuf,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl ServiceError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, body: ErrorBody { success: None, error: message.into() } }
    }

    fn invalid_json() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Invalid JSON")
    }

    fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found")
    }

    fn from_api(err: &ApiError) -> Self {
        match err {
            ApiError::Store(_) => tracing::error!(error = %err, "store operation failed"),
            ApiError::InvalidInput(_) | ApiError::NotFound(_) => {
                tracing::debug!(error = %err, "rejected request");
            }
        }
        Self::new(err.status_code(), err.public_message())
    }

    /// Write endpoints report `"success": false` alongside the error.
    fn with_success_flag(mut self) -> Self {
        self.body.success = Some(false);
        self
    }
}

fn parse_json<T>(body: &Bytes) -> Result<T, ServiceError>
where
    T: DeserializeOwned,
{
    serde_json::from_slice(body).map_err(|err| {
        tracing::debug!(error = %err, "rejected malformed JSON body");
        ServiceError::invalid_json()
    })
}

fn app(state: ServiceState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/search", post(search))
        .route("/api/add", post(add_error))
        .route("/api/delete", post(delete_error))
        .route("/api/all", get(all_errors))
        .route("/", get(index_page))
        .route("/index.html", get(index_page))
        .route("/add", get(add_page))
        .route("/add.html", get(add_page))
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(cors))
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let api = ErrorBaseApi::new(args.db.clone());
    let report = api
        .bootstrap()
        .with_context(|| format!("failed to initialize error database at {}", args.db.display()))?;
    tracing::info!(
        db = %args.db.display(),
        records = report.records,
        seeded = report.seeded.is_some(),
        "error database ready"
    );

    let state = ServiceState { api, static_dir: args.static_dir };
    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    tracing::info!(bind = %args.bind, "errorbase service listening");

    axum::serve(listener, app(state)).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}

async fn cors(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return (
            StatusCode::OK,
            [
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"),
                (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
            ],
        )
            .into_response();
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn search(
    State(state): State<ServiceState>,
    body: Bytes,
) -> Result<Json<SearchResponse>, ServiceError> {
    let request: SearchRequest = parse_json(&body)?;
    let response = state.api.search(request).map_err(|err| ServiceError::from_api(&err))?;
    Ok(Json(response))
}

async fn add_error(
    State(state): State<ServiceState>,
    body: Bytes,
) -> Result<Json<AddErrorResponse>, ServiceError> {
    let request: AddErrorRequest =
        parse_json(&body).map_err(ServiceError::with_success_flag)?;
    let response = state
        .api
        .add(request)
        .map_err(|err| ServiceError::from_api(&err).with_success_flag())?;
    Ok(Json(response))
}

async fn delete_error(
    State(state): State<ServiceState>,
    body: Bytes,
) -> Result<Json<DeleteErrorResponse>, ServiceError> {
    let request: DeleteErrorRequest =
        parse_json(&body).map_err(ServiceError::with_success_flag)?;
    let response = state
        .api
        .delete(request)
        .map_err(|err| ServiceError::from_api(&err).with_success_flag())?;
    Ok(Json(response))
}

async fn all_errors(
    State(state): State<ServiceState>,
) -> Result<Json<SearchResponse>, ServiceError> {
    let response = state.api.all().map_err(|err| ServiceError::from_api(&err))?;
    Ok(Json(response))
}

async fn index_page(State(state): State<ServiceState>) -> Result<Html<String>, ServiceError> {
    static_page(&state, "index.html").await
}

async fn add_page(State(state): State<ServiceState>) -> Result<Html<String>, ServiceError> {
    static_page(&state, "add.html").await
}

async fn static_page(state: &ServiceState, name: &str) -> Result<Html<String>, ServiceError> {
    let path = state.static_dir.join(name);
    match tokio::fs::read_to_string(&path).await {
        Ok(body) => Ok(Html(body)),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "static page unavailable");
            Err(ServiceError::not_found())
        }
    }
}

async fn fallback() -> ServiceError {
    ServiceError::not_found()
}
