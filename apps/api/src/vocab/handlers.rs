//! Axum route handlers for the generation API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::state::AppState;
use crate::vocab::pipeline;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    /// Optional explicit section selection. Overrides any marker embedded in
    /// the prompt; omitted means all sections.
    #[serde(default)]
    pub sections: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub content: String,
}

/// POST /api/v1/generate
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    if req.prompt.trim().is_empty() {
        return Err(AppError::Validation("prompt must not be empty".into()));
    }

    let content = pipeline::run(state.llm.as_ref(), &req.prompt, req.sections.as_deref()).await?;
    Ok(Json(GenerateResponse { content }))
}
