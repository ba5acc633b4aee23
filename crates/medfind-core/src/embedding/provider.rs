//! Embedding providers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default OpenAI-compatible API base URL.
pub const DEFAULT_EMBEDDING_ENDPOINT: &str = "https://api.openai.com/v1";

/// Default timeout for a single embedding request.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

/// Embedding provider errors.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Embedding provider unavailable: {0}")]
    Unavailable(String),

    #[error("Embedding provider rate limit exceeded")]
    RateLimited,

    #[error("Embedding request failed with status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding request timed out")]
    Timeout,

    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Source of embedding vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier, for logging.
    fn model(&self) -> &str;

    /// Embed a single input string.
    async fn embed(&self, input: &str) -> ProviderResult<Vec<f32>>;
}

/// Provider used when no embedding backend is configured.
#[derive(Debug, Default, Clone)]
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model(&self) -> &str {
        "disabled"
    }

    async fn embed(&self, _input: &str) -> ProviderResult<Vec<f32>> {
        Err(ProviderError::Unavailable(
            "no embedding API key configured".into(),
        ))
    }
}

/// OpenAI-compatible `/embeddings` client.
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingProvider {
    api_key: String,
    model: String,
    endpoint: String,
    client: Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbeddingProvider {
    pub fn new(
        api_key: String,
        model: String,
        endpoint: Option<String>,
        timeout: Duration,
    ) -> ProviderResult<Self> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::Unavailable(
                "embedding API key cannot be empty".into(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            model,
            endpoint: endpoint
                .unwrap_or_else(|| DEFAULT_EMBEDDING_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
            client,
        })
    }
}

fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Network(e.to_string())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, input: &str) -> ProviderResult<Vec<f32>> {
        debug!(model = %self.model, input, "Requesting embedding");

        let response = self
            .client
            .post(format!("{}/embeddings", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input,
            })
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ProviderError::InvalidResponse("response contained no embedding".into()))?;

        if embedding.is_empty() {
            return Err(ProviderError::InvalidResponse("embedding is empty".into()));
        }
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn provider(url: String) -> OpenAiEmbeddingProvider {
        OpenAiEmbeddingProvider::new(
            "test-api-key".into(),
            DEFAULT_EMBEDDING_MODEL.into(),
            Some(url),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let result = OpenAiEmbeddingProvider::new(
            "  ".into(),
            DEFAULT_EMBEDDING_MODEL.into(),
            None,
            DEFAULT_PROVIDER_TIMEOUT,
        );
        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_disabled_provider_fails() {
        let result = DisabledProvider.embed("paracetamol").await;
        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_embed_parses_vector() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/embeddings")
            .match_header("authorization", "Bearer test-api-key")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "text-embedding-3-small",
                "input": "paracetamol"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[{"embedding":[0.25,-0.5,1.0],"index":0}],"model":"text-embedding-3-small"}"#)
            .create_async()
            .await;

        let vector = provider(server.url()).embed("paracetamol").await.unwrap();
        assert_eq!(vector, vec![0.25, -0.5, 1.0]);

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_mapped() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/embeddings")
            .with_status(429)
            .with_body(r#"{"error":{"message":"Rate limit reached"}}"#)
            .create_async()
            .await;

        let result = provider(server.url()).embed("paracetamol").await;
        assert!(matches!(result, Err(ProviderError::RateLimited)));
    }

    #[tokio::test]
    async fn test_server_error_mapped() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/embeddings")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let result = provider(server.url()).embed("paracetamol").await;
        match result {
            Err(ProviderError::Http { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected Http error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_data_rejected() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[]}"#)
            .create_async()
            .await;

        let result = provider(server.url()).embed("paracetamol").await;
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }
}
