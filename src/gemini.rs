use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::GeminiConfig;
use crate::conversation::{Part, Turn};
use crate::error::ChatError;

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: &'a [Turn],
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct GeminiClient {
    api_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn with_config(config: &GeminiConfig) -> Self {
        GeminiClient {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            client: reqwest::Client::new(),
        }
    }

    pub fn get_model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_url, self.model)
    }

    /// Send the whole conversation and return the first candidate's text.
    ///
    /// Resolves to `ChatError::Cancelled` as soon as `cancel` fires, whatever
    /// state the request is in.
    pub async fn generate(
        &self,
        contents: Vec<Turn>,
        cancel: CancellationToken,
    ) -> Result<String, ChatError> {
        tracing::info!(
            "Sending {} turn(s) to {}",
            contents.len(),
            self.model
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Request to {} cancelled", self.model);
                Err(ChatError::Cancelled)
            }
            result = self.request(&contents) => {
                match &result {
                    Ok(text) => tracing::debug!("Received {} bytes of response text", text.len()),
                    Err(e) => tracing::warn!("Request to {} failed: {}", self.model, e),
                }
                result
            }
        }
    }

    async fn request(&self, contents: &[Turn]) -> Result<String, ChatError> {
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&GenerateContentRequest { contents })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ChatError::Api(api_error_message(status, &body)));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| ChatError::Transport(format!("Unexpected response body: {}", e)))?;

        first_text(parsed)
            .ok_or_else(|| ChatError::Transport("Response contained no text".to_string()))
    }
}

fn api_error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => err.error.message,
        Err(_) => format!("Gemini API error: {}", status),
    }
}

fn first_text(response: GenerateContentResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .next()
        .and_then(|part| match part {
            Part::Text { text } => Some(text),
            Part::InlineData { .. } => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ENDPOINT: &str = "/models/gemini-2.5-flash:generateContent";

    fn client_for(server: &MockServer) -> GeminiClient {
        GeminiClient::with_config(&GeminiConfig {
            api_url: server.uri(),
            model: "gemini-2.5-flash".to_string(),
            api_key: "test-key".to_string(),
        })
    }

    #[tokio::test]
    async fn test_returns_first_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({
                "contents": [{ "role": "user", "parts": [{ "text": "Hello" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [
                    { "content": { "parts": [{ "text": "**Hi!**" }, { "text": "ignored" }] } },
                    { "content": { "parts": [{ "text": "second" }] } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let text = client
            .generate(vec![Turn::user("Hello", None)], CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(text, "**Hi!**");
    }

    #[tokio::test]
    async fn test_error_status_carries_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "code": 400, "message": "API key not valid." }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate(vec![Turn::user("Hello", None)], CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            ChatError::Api(message) => assert_eq!(message, "API key not valid."),
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate(vec![Turn::user("Hello", None)], CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Transport(_)));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_in_flight_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(5))
                    .set_body_json(json!({
                        "candidates": [{ "content": { "parts": [{ "text": "late" }] } }]
                    })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = client
            .generate(vec![Turn::user("Hello", None)], cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let client = GeminiClient::with_config(&GeminiConfig {
            api_url: "http://127.0.0.1:1".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key: String::new(),
        });

        let err = client
            .generate(vec![Turn::user("Hello", None)], CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Transport(_)));
    }
}
