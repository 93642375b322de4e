//! HTTP front end for the assistant.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer `{"question": ...}` with `{"answer": ...}` |
//! | `GET`  | `/health` | Liveness and corpus size |
//!
//! Failures never leak details to the client: a missing question is a `400`
//! and anything that goes wrong while answering is a generic `500`, with the
//! cause logged server-side.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rag::{Assistant, RagError};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const NO_QUESTION: &str = "No question provided";
const GENERATION_FAILED: &str = "AI failed to generate a response";

#[derive(Clone)]
struct AppState {
    assistant: Arc<Assistant>,
    request_timeout: Duration,
}

pub async fn run_server(
    assistant: Arc<Assistant>,
    addr: SocketAddr,
    request_timeout: Duration,
) -> anyhow::Result<()> {
    let app = router(assistant, request_timeout);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(assistant: Arc<Assistant>, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask", post(handle_ask))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState {
            assistant,
            request_timeout,
        })
}

#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: Option<String>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

struct AppError {
    status: StatusCode,
    message: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn no_question() -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: NO_QUESTION,
    }
}

fn generation_failed() -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: GENERATION_FAILED,
    }
}

async fn handle_ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let question = match payload {
        Ok(Json(req)) => req.question.unwrap_or_default(),
        Err(rejection) => {
            warn!(error = %rejection, "rejected /ask body");
            return Err(no_question());
        }
    };
    if question.is_empty() {
        return Err(no_question());
    }

    let assistant = state.assistant.clone();
    let timeout = state.request_timeout;
    let task = tokio::task::spawn_blocking(move || assistant.answer_within(&question, timeout));
    match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(Ok(answer))) => Ok(Json(AskResponse { answer })),
        Ok(Ok(Err(err))) => {
            error!(error = %err, "failed to answer question");
            Err(generation_failed())
        }
        Ok(Err(join_err)) => {
            error!(error = %join_err, "answer task crashed");
            Err(generation_failed())
        }
        Err(_) => {
            let err = RagError::InferenceTimeout(state.request_timeout);
            error!(error = %err, "failed to answer question");
            Err(generation_failed())
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    chunks: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        chunks: state.assistant.index().len(),
    })
}
