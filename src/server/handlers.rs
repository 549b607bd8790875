//! Route handlers.
//!
//! Request bodies are parsed leniently. A body that is not a JSON object reads as
//! if every field were absent, and a field of the wrong type reads as absent
//! without affecting the other fields.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{error, info};

use super::error::ApiError;
use super::AppState;
use crate::inference::GenerationParams;
use crate::prompt;

const SUCCESS: &str = "success";

fn body_or_default<T: Default>(payload: Result<Json<T>, JsonRejection>) -> T {
    match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "unreadable request body");
            T::default()
        }
    }
}

/// A text field; any other JSON type reads as absent.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        _ => None,
    })
}

/// An identifier field; numbers are accepted and kept in their decimal form.
fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Drop empty strings so they count as absent.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: SUCCESS,
        message: "Concierge server is running normally",
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default, deserialize_with = "lenient_text")]
    pub prompt: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    status: &'static str,
    generated_text: String,
    session_id: String,
}

/// Answer a user message with event context and the session's prior turns.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let request = body_or_default(payload);
    let user_prompt = present(request.prompt)
        .ok_or_else(|| ApiError::bad_request("No prompt provided in request"))?;
    let session_id =
        present(request.session_id).unwrap_or_else(|| uuid::Uuid::now_v7().to_string());

    let history = state.conversations.history_or_empty(&session_id).await;
    let context = state
        .events
        .context_for(&user_prompt, state.config.retrieval.chat_context_results)
        .await;
    let full_prompt = prompt::chat_prompt(&context, &history, &user_prompt);

    let generated_text = state
        .inference
        .generate(&full_prompt, &GenerationParams::chat(&state.config.inference))
        .await
        .map_err(|e| {
            error!(%session_id, error = %e, "chat generation failed");
            ApiError::internal(e.to_string())
        })?;

    state
        .conversations
        .record_exchange(&session_id, &user_prompt, &generated_text)
        .await;

    Ok(Json(ChatResponse {
        status: SUCCESS,
        generated_text,
        session_id,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct GameRequest {
    #[serde(default, rename = "visitorId", deserialize_with = "lenient_id")]
    pub visitor_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub question: Option<String>,
    /// Kept raw so a malformed guess gets its own error instead of reading as absent.
    #[serde(default)]
    pub guess: Option<Value>,
}

/// A guess may arrive as a whole JSON number or a numeric string.
fn parse_guess(value: &Value) -> Result<i64, ApiError> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| ApiError::bad_request("Guess must be a whole number"))
}

#[derive(Serialize)]
pub struct StartResponse {
    status: &'static str,
    message: &'static str,
    debug_year: i32,
}

pub async fn start_game(
    State(state): State<AppState>,
    payload: Result<Json<GameRequest>, JsonRejection>,
) -> Result<Json<StartResponse>, ApiError> {
    let request = body_or_default(payload);
    let visitor_id = present(request.visitor_id)
        .ok_or_else(|| ApiError::bad_request("No visitor ID provided"))?;

    let debug_year = state.games.start(&visitor_id);
    Ok(Json(StartResponse {
        status: SUCCESS,
        message: "New game started",
        debug_year,
    }))
}

#[derive(Serialize)]
pub struct QuestionResponse {
    status: &'static str,
    answer: String,
}

/// Answer a question in character. The reply is cut to two sentences and any
/// literal mention of the hidden year is redacted.
pub async fn ask_question(
    State(state): State<AppState>,
    payload: Result<Json<GameRequest>, JsonRejection>,
) -> Result<Json<QuestionResponse>, ApiError> {
    let request = body_or_default(payload);
    let (Some(visitor_id), Some(question)) =
        (present(request.visitor_id), present(request.question))
    else {
        return Err(ApiError::bad_request("Missing required fields"));
    };

    let hidden_year = state
        .games
        .record_question(&visitor_id, &question)
        .ok_or_else(|| ApiError::not_found("No active game session"))?;

    let raw = state
        .inference
        .generate(
            &prompt::game_prompt(hidden_year, &question),
            &GenerationParams::game(&state.config.inference),
        )
        .await
        .map_err(|e| {
            error!(%visitor_id, error = %e, "game generation failed");
            ApiError::internal(e.to_string())
        })?;

    let answer = prompt::redact_year(&prompt::first_sentences(&raw, 2), hidden_year);
    Ok(Json(QuestionResponse {
        status: SUCCESS,
        answer,
    }))
}

#[derive(Serialize)]
pub struct GuessResponse {
    status: &'static str,
    correct: bool,
    message: String,
    questions_asked: usize,
    total_guesses: usize,
}

pub async fn make_guess(
    State(state): State<AppState>,
    payload: Result<Json<GameRequest>, JsonRejection>,
) -> Result<Json<GuessResponse>, ApiError> {
    let request = body_or_default(payload);
    let (Some(visitor_id), Some(guess)) = (present(request.visitor_id), request.guess) else {
        return Err(ApiError::bad_request("Missing required fields"));
    };
    let value = parse_guess(&guess)?;

    let outcome = state
        .games
        .guess(&visitor_id, value)
        .ok_or_else(|| ApiError::not_found("No active game session"))?;
    info!(%visitor_id, correct = outcome.correct, "guess evaluated");

    Ok(Json(GuessResponse {
        status: SUCCESS,
        correct: outcome.correct,
        message: outcome.message(),
        questions_asked: outcome.questions_asked,
        total_guesses: outcome.total_guesses,
    }))
}
