//! HTTP API for the validation gate
//!
//! Provides REST endpoints for:
//! - Validating a generated query spec against a column list
//! - Validating against the columns of a stored generator prompt
//! - Recording finished completions
//! - Health and Prometheus metrics

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use qspec_validate::{check_query, ValidationError};

use crate::config::Config;
use crate::metrics::Metrics;
use crate::prompt::extract_columns;
use crate::records::{Completion, RecordWriter};

#[derive(Clone)]
pub struct AppState {
    strict: bool,
    records: Arc<Mutex<RecordWriter>>,
    metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, prometheus::Error> {
        Ok(Self {
            strict: config.validation.strict,
            records: Arc::new(Mutex::new(RecordWriter::new(&config.records.path))),
            metrics: Arc::new(Metrics::new()?),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub query: String,
    pub columns: Vec<String>,
    pub strict: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PromptValidateRequest {
    pub prompt: String,
    pub query: String,
    pub strict: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionsRequest {
    pub choices: Vec<Completion>,
}

#[derive(Debug, Serialize)]
pub struct CompletionsResponse {
    pub written: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/validate", post(validate))
        .route("/validate/prompt", post(validate_prompt))
        .route("/completions", post(record_completions))
        .route("/metrics", get(metrics))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(request_span))
        .with_state(state)
}

pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = AppState::new(&config)?;
    let addr = config.bind_address();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        strict = config.validation.strict,
        records = %config.records.path,
        "qspec server listening on {}",
        addr
    );

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn request_span(request: Request, next: Next) -> Response {
    let span = info_span!(
        "request",
        request_id = %Uuid::new_v4(),
        method = %request.method(),
        path = %request.uri().path(),
    );
    next.run(request).instrument(span).await
}

fn respond(state: &AppState, outcome: Result<(), ValidationError>) -> (StatusCode, Json<ValidateResponse>) {
    state.metrics.observe(&outcome);

    match outcome {
        Ok(()) => (
            StatusCode::OK,
            Json(ValidateResponse {
                valid: true,
                kind: None,
                message: None,
            }),
        ),
        Err(err) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ValidateResponse {
                valid: false,
                kind: Some(err.kind().to_string()),
                message: Some(err.to_string()),
            }),
        ),
    }
}

pub async fn validate(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> (StatusCode, Json<ValidateResponse>) {
    let strict = req.strict.unwrap_or(state.strict);
    let outcome = check_query(&req.query, &req.columns, strict);
    respond(&state, outcome)
}

pub async fn validate_prompt(
    State(state): State<AppState>,
    Json(req): Json<PromptValidateRequest>,
) -> Result<(StatusCode, Json<ValidateResponse>), ApiError> {
    let columns =
        extract_columns(&req.prompt).map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;

    let strict = req.strict.unwrap_or(state.strict);
    let outcome = check_query(&req.query, &columns, strict);
    Ok(respond(&state, outcome))
}

pub async fn record_completions(
    State(state): State<AppState>,
    Json(req): Json<CompletionsRequest>,
) -> Result<Json<CompletionsResponse>, ApiError> {
    // Held across the write so batches from concurrent requests never interleave.
    let writer = state.records.lock().await;
    let batch = writer.clone();
    let written = tokio::task::spawn_blocking(move || batch.append(&req.choices))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?
        .map_err(|e| {
            error!(error = %e, path = %writer.path().display(), "failed to record completions");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
        })?;

    Ok(Json(CompletionsResponse { written }))
}

pub async fn metrics(State(state): State<AppState>) -> Result<String, ApiError> {
    state
        .metrics
        .render()
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))
}

pub async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::render_prompt;
    use crate::records::read_records;

    fn state_with_records(path: &str) -> AppState {
        let mut config = Config::default();
        config.records.path = path.to_string();
        AppState::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_validate_accepts_and_rejects() {
        let state = state_with_records("unused.jsonl");

        let (status, Json(body)) = validate(
            State(state.clone()),
            Json(ValidateRequest {
                query: r#"{"calculations":[{"op":"P99","column":"duration_ms"}]}"#.to_string(),
                columns: vec!["duration_ms".to_string()],
                strict: None,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.valid);

        let (status, Json(body)) = validate(
            State(state.clone()),
            Json(ValidateRequest {
                query: r#"{"breakdowns":["name"]}"#.to_string(),
                columns: vec!["duration_ms".to_string()],
                strict: None,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.kind.as_deref(), Some("invalid_column"));
        assert!(body.message.unwrap().contains("Invalid column: name"));

        let (status, _) = validate(
            State(state),
            Json(ValidateRequest {
                query: r#"{"breakdowns":["name"]}"#.to_string(),
                columns: vec![],
                strict: Some(false),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_validate_prompt_uses_prompt_columns() {
        let state = state_with_records("unused.jsonl");
        let prompt = render_prompt("slow requests", &["duration_ms".to_string()]);

        let (status, _) = validate_prompt(
            State(state.clone()),
            Json(PromptValidateRequest {
                prompt: prompt.clone(),
                query: r#"{"filters":[{"column":"duration_ms","op":">","value":1000}]}"#.to_string(),
                strict: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::OK);

        let (status, Json(body)) = validate_prompt(
            State(state.clone()),
            Json(PromptValidateRequest {
                prompt,
                query: r#"{"filters":[{"column":"status","op":"exists"}]}"#.to_string(),
                strict: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(!body.valid);

        let err = validate_prompt(
            State(state),
            Json(PromptValidateRequest {
                prompt: "no columns here".to_string(),
                query: "{}".to_string(),
                strict: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_record_completions() {
        let path = std::env::temp_dir().join("qspec_routes_records.jsonl");
        std::fs::remove_file(&path).ok();
        let state = state_with_records(&path.to_string_lossy());

        let Json(body) = record_completions(
            State(state),
            Json(CompletionsRequest {
                choices: vec![Completion {
                    finish_reason: Some("stop".to_string()),
                    content: Some("{\"limit\": 10}".to_string()),
                }],
            }),
        )
        .await
        .unwrap();
        assert_eq!(body.written, 1);
        assert_eq!(read_records(&path).unwrap().len(), 1);

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_concurrent_completions_are_all_recorded() {
        let path = std::env::temp_dir().join("qspec_routes_concurrent.jsonl");
        std::fs::remove_file(&path).ok();
        let state = state_with_records(&path.to_string_lossy());

        let request = |limit: u32| {
            let choices = (0..3)
                .map(|_| Completion {
                    finish_reason: Some("stop".to_string()),
                    content: Some(format!("{{\"limit\": {}}}", limit)),
                })
                .collect();
            record_completions(State(state.clone()), Json(CompletionsRequest { choices }))
        };

        // The writes run off the runtime thread, so both handlers make progress.
        let (first, second) = tokio::join!(request(1), request(2));
        assert_eq!(first.unwrap().0.written, 3);
        assert_eq!(second.unwrap().0.written, 3);

        let limits: Vec<_> = read_records(&path)
            .unwrap()
            .iter()
            .map(|record| record["limit"].as_u64().unwrap())
            .collect();
        assert_eq!(limits.len(), 6);
        assert!(limits[..3].iter().all(|l| *l == limits[0]));
        assert!(limits[3..].iter().all(|l| *l == limits[3]));
        assert_ne!(limits[0], limits[3]);

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_metrics_reflect_requests() {
        let state = state_with_records("unused.jsonl");
        validate(
            State(state.clone()),
            Json(ValidateRequest {
                query: "{}".to_string(),
                columns: vec![],
                strict: None,
            }),
        )
        .await;

        let text = metrics(State(state)).await.unwrap();
        assert!(text.contains(r#"qspec_rejections_total{kind="empty_spec"} 1"#));
        assert_eq!(health_check().await, "OK");
    }
}
