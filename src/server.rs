//! HTTP endpoint in front of the summariser.
//!
//! `POST /summarize` takes `{text, include_title, num_paragraph, compression_rate}`
//! and answers with the selected report as `{title, content}`.

use crate::document::Document;
use crate::llm::LlmClient;
use crate::prompt::PromptRenderer;
use crate::summarizer::{BestHitSummarizer, SummarizeError, Summarizer, SummarizerSettings};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::reject::{
    LengthRequired, MethodNotAllowed, PayloadTooLarge, Reject, UnsupportedMediaType,
};
use warp::{Filter, Rejection, Reply};

/// Largest accepted `POST /summarize` body, in bytes
pub const MAX_BODY_BYTES: u64 = 4 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Summarization failed: {0}")]
    Summarize(#[from] SummarizeError),
}

impl Reject for ApiError {}

#[derive(Debug, Clone, Deserialize)]
pub struct SummarizeRequest {
    pub text: String,
    pub include_title: bool,
    pub num_paragraph: usize,
    pub compression_rate: f64,
}

impl SummarizeRequest {
    /// Settings for this request on top of the server defaults
    pub fn settings(&self, base: &SummarizerSettings) -> SummarizerSettings {
        SummarizerSettings {
            has_title: self.include_title,
            min_paragraphs: self.num_paragraph.saturating_sub(1).max(1),
            max_paragraphs: self.num_paragraph.saturating_add(1),
            compression_rate: self.compression_rate,
            ..base.clone()
        }
    }
}

/// Long-lived collaborators shared by every request
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<dyn LlmClient>,
    pub renderer: Arc<dyn PromptRenderer>,
    pub settings: SummarizerSettings,
}

pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::json(&json!({"status": "healthy"})));

    let summarize = warp::path("summarize")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_state(state))
        .and_then(handle_summarize);

    health.or(summarize).recover(handle_rejection)
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

async fn handle_summarize(
    request: SummarizeRequest,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    if request.text.trim().is_empty() {
        return Err(warp::reject::custom(ApiError::BadRequest(
            "text must not be empty".to_string(),
        )));
    }

    let settings = request.settings(&state.settings);
    let summarizer =
        BestHitSummarizer::new(state.client.clone(), state.renderer.clone(), settings);
    let document = Document::new(request.text);

    match summarizer.summarize(&document).await {
        Ok(report) => Ok(warp::reply::json(&report)),
        Err(e) => {
            error!(error = %e, "summarization failed");
            Err(warp::reject::custom(ApiError::from(e)))
        }
    }
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message, details) = if let Some(e) = err.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, "Bad request", e.to_string())
    } else if err.find::<PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "Payload too large",
            format!("request body exceeds {} bytes", MAX_BODY_BYTES),
        )
    } else if err.find::<LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            "Length required",
            "missing content-length header".to_string(),
        )
    } else if err.find::<UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Unsupported media type",
            "expected application/json".to_string(),
        )
    } else if let Some(api_err) = err.find::<ApiError>() {
        let code = match api_err {
            ApiError::BadRequest(_) | ApiError::Summarize(SummarizeError::InvalidSettings(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Summarize(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if code == StatusCode::BAD_REQUEST {
            "Bad request"
        } else {
            "Internal server error"
        };
        (code, message, api_err.to_string())
    } else if err.find::<MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
            String::new(),
        )
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Resource not found", String::new())
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            format!("{:?}", err),
        )
    };

    let json = warp::reply::json(&json!({
        "error": message,
        "details": details,
    }));
    Ok(warp::reply::with_status(json, code))
}

/// Serve the routes until the process is stopped
pub async fn serve(addr: SocketAddr, state: AppState) {
    info!(%addr, "server listening");
    warp::serve(routes(state).with(warp::log("besthit::http")))
        .run(addr)
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_settings_bracket_paragraph_count() {
        let request = SummarizeRequest {
            text: "x".to_string(),
            include_title: false,
            num_paragraph: 1,
            compression_rate: 0.3,
        };
        let settings = request.settings(&SummarizerSettings::default());
        assert!(!settings.has_title);
        assert_eq!((settings.min_paragraphs, settings.max_paragraphs), (1, 2));
        assert_eq!(settings.compression_rate, 0.3);
        assert_eq!(settings.num_tries, 3);

        let request = SummarizeRequest {
            num_paragraph: 4,
            ..request
        };
        let settings = request.settings(&SummarizerSettings::default());
        assert_eq!((settings.min_paragraphs, settings.max_paragraphs), (3, 5));

        let request = SummarizeRequest {
            num_paragraph: usize::MAX,
            ..request
        };
        let settings = request.settings(&SummarizerSettings::default());
        assert_eq!(settings.max_paragraphs, usize::MAX);
    }
}
