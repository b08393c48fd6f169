//! Test utilities for tally-core
//!
//! A mock Ollama server for backend integration tests. It answers both
//! prompts by pulling the preview back out of the rendered prompt and
//! applying the same keyword rules as `MockBackend`.

use axum::{
    extract::{Json, State},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use tokio::sync::oneshot;

use crate::ai::mock::keyword_detection;
use crate::models::{Grid, Preview};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Behavior {
    WellBehaved,
    Garbage,
}

/// Mock Ollama server for testing and development
pub struct MockOllamaServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockOllamaServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        Self::spawn(Behavior::WellBehaved).await
    }

    /// Start a server whose generate endpoint answers with prose, not JSON
    pub async fn start_garbage() -> Self {
        Self::spawn(Behavior::Garbage).await
    }

    async fn spawn(behavior: Behavior) -> Self {
        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/generate", post(handle_generate))
            .with_state(behavior);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockOllamaServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_tags() -> Json<TagsResponse> {
    Json(TagsResponse {
        models: vec![ModelInfo {
            name: "llama3.2:latest".to_string(),
            modified_at: "2024-01-01T00:00:00Z".to_string(),
            size: 4_000_000_000,
        }],
    })
}

async fn handle_generate(
    State(behavior): State<Behavior>,
    Json(request): Json<GenerateRequest>,
) -> Json<GenerateResponse> {
    let response = if behavior == Behavior::Garbage {
        "Looking at the data, the headers seem to be on the third row.".to_string()
    } else {
        let preview = preview_from_prompt(&request.prompt).unwrap_or_default();
        let detection = keyword_detection(&preview);
        if request.prompt.contains("\"is_sales\"") {
            serde_json::json!({
                "is_sales": detection.is_some(),
                "confidence": if detection.is_some() { 0.9 } else { 0.1 },
            })
            .to_string()
        } else {
            match detection {
                Some(d) => serde_json::to_string(&d).unwrap(),
                None => "{}".to_string(),
            }
        }
    };

    Json(GenerateResponse {
        model: request.model,
        response,
        done: true,
    })
}

/// Recover the split-orientation preview embedded in a rendered prompt
fn preview_from_prompt(prompt: &str) -> Option<Preview> {
    let start = prompt.find("{\"columns\"")?;
    let value: Value = serde_json::Deserializer::from_str(&prompt[start..])
        .into_iter::<Value>()
        .next()?
        .ok()?;
    let rows: Vec<Vec<String>> = serde_json::from_value(value.get("data")?.clone()).ok()?;
    let n = rows.len();
    Some(Grid::new(rows).preview(n))
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    model: String,
    response: String,
    done: bool,
}

#[derive(Debug, Serialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
struct ModelInfo {
    name: String,
    modified_at: String,
    size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_from_prompt() {
        let preview = Grid::from(vec![vec!["Bill", "Amount"], vec!["B1", "5"]]).preview(5);
        let prompt = format!(
            "rows:\n\n{}\n\nRespond with {{\"header_row_index\": 0}}",
            preview.to_split_json()
        );
        assert_eq!(preview_from_prompt(&prompt), Some(preview));
        assert_eq!(preview_from_prompt("no json here"), None);
    }

    #[tokio::test]
    async fn test_server_health() {
        let server = MockOllamaServer::start().await;
        let response = reqwest::get(format!("{}/api/tags", server.url())).await.unwrap();
        assert!(response.status().is_success());
    }
}
