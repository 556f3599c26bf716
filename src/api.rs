use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::commands::{self, Command, Reply};
use crate::service::NewsService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<NewsService>,
    pub api_key: Option<String>,
}

#[derive(Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default = "default_sender")]
    pub sender: String,
}

fn default_sender() -> String {
    "api".into()
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CommandResponse {
    Text { text: String },
    Image { path: String },
    Error { error: String },
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/command", post(handle_command))
        .route("/health", get(handle_health))
        .with_state(state)
}

async fn handle_command(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CommandRequest>,
) -> impl IntoResponse {
    let cmd: Command = match req.command.parse() {
        Ok(c) => c,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(CommandResponse::Error { error: e.to_string() }),
            );
        }
    };

    if cmd.requires_admin() && !is_admin(&headers, state.api_key.as_deref()) {
        tracing::warn!("Rejected admin command '{}' from {}", req.command, req.sender);
        let err = crate::error::CommandError::PermissionDenied(req.command);
        return (
            StatusCode::FORBIDDEN,
            Json(CommandResponse::Error { error: err.to_string() }),
        );
    }

    tracing::info!("[{}] {}", req.sender, req.command);
    let resp = match commands::execute(&state.service, cmd, &req.sender).await {
        Reply::Text(text) => CommandResponse::Text { text },
        Reply::Image(path) => CommandResponse::Image {
            path: path.display().to_string(),
        },
    };
    (StatusCode::OK, Json(resp))
}

/// Without a configured key only localhost can bind, so admin is open.
fn is_admin(headers: &HeaderMap, api_key: Option<&str>) -> bool {
    let Some(key) = api_key else {
        return true;
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == key)
}

async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let cfg = state.service.config();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "push_time": cfg.push_time.format("%H:%M").to_string(),
        "news_type": cfg.news_type,
        "targets": cfg.groups.len(),
    }))
}
