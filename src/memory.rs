//! Memory collaborator (Mem0-style REST API).
//!
//! Provides per-scope long-term facts used to augment the system prompt.
//! Every operation is best-effort: failures are logged and swallowed, and
//! the conversation proceeds unaugmented. Nothing in this module can fail a
//! send.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::types::MessageRole;

pub const DEFAULT_MEMORY_BASE_URL: &str = "https://api.mem0.ai/v1";

/// A conversation turn stored as memory input.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryMessage {
    pub role: MessageRole,
    pub content: String,
}

impl MemoryMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// A ranked fact returned by memory search.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryHit {
    pub id: String,
    pub memory: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// A stored memory record.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub memory: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// REST client for the memory service.
#[derive(Clone)]
pub struct MemoryClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl MemoryClient {
    pub fn new(http_client: reqwest::Client, api_key: SecretString) -> Self {
        Self::with_base_url(http_client, DEFAULT_MEMORY_BASE_URL.to_string(), api_key)
    }

    pub fn with_base_url(
        http_client: reqwest::Client,
        base_url: String,
        api_key: SecretString,
    ) -> Self {
        Self {
            http_client,
            base_url,
            api_key,
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url.trim_end_matches('/'))
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header(
            reqwest::header::AUTHORIZATION,
            format!("Token {}", self.api_key.expose_secret()),
        )
    }

    /// Search facts relevant to `query` within a memory scope.
    ///
    /// Returns an empty list on any failure.
    pub async fn search(&self, query: &str, scope_id: &str, limit: usize) -> Vec<MemoryHit> {
        let body = json!({
            "query": query,
            "user_id": scope_id,
            "limit": limit,
        });
        let request = self
            .authorized(self.http_client.post(self.url("/memories/search/")))
            .json(&body);

        match Self::read_json::<Vec<MemoryHit>>(request).await {
            Ok(hits) => {
                tracing::debug!("memory search returned {} hits", hits.len());
                hits
            }
            Err(err) => {
                tracing::warn!("memory search failed, continuing without context: {err}");
                Vec::new()
            }
        }
    }

    /// Store a conversation turn under a memory scope. Failures are logged
    /// and dropped.
    pub async fn add(
        &self,
        messages: &[MemoryMessage],
        scope_id: &str,
        metadata: Option<serde_json::Value>,
    ) {
        let body = json!({
            "messages": messages,
            "user_id": scope_id,
            "metadata": metadata,
        });
        let request = self
            .authorized(self.http_client.post(self.url("/memories/")))
            .json(&body);

        match Self::send_checked(request).await {
            Ok(_) => tracing::debug!("memory saved for scope {scope_id}"),
            Err(err) => tracing::warn!("memory save failed: {err}"),
        }
    }

    /// List every memory stored under a scope.
    pub async fn list(&self, scope_id: &str) -> Vec<MemoryRecord> {
        let endpoint = format!("/memories/?user_id={}", urlencoding::encode(scope_id));
        let request = self.authorized(self.http_client.get(self.url(&endpoint)));
        match Self::read_json::<Vec<MemoryRecord>>(request).await {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!("memory list failed: {err}");
                Vec::new()
            }
        }
    }

    /// Delete one memory by id. Returns whether the delete succeeded.
    pub async fn delete(&self, memory_id: &str) -> bool {
        let endpoint = format!("/memories/{}/", urlencoding::encode(memory_id));
        let request = self.authorized(self.http_client.delete(self.url(&endpoint)));
        match Self::send_checked(request).await {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!("memory delete failed: {err}");
                false
            }
        }
    }

    /// Delete every memory under a scope.
    pub async fn delete_all(&self, scope_id: &str) -> bool {
        let endpoint = format!("/memories/?user_id={}", urlencoding::encode(scope_id));
        let request = self.authorized(self.http_client.delete(self.url(&endpoint)));
        match Self::send_checked(request).await {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!("memory delete-all failed: {err}");
                false
            }
        }
    }

    async fn send_checked(request: reqwest::RequestBuilder) -> Result<reqwest::Response, String> {
        let response = request.send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("memory API error {status}: {body}"));
        }
        Ok(response)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        request: reqwest::RequestBuilder,
    ) -> Result<T, String> {
        let response = Self::send_checked(request).await?;
        response.json::<T>().await.map_err(|e| e.to_string())
    }
}

/// Format search hits as the context block merged into the system prompt.
/// Returns an empty string when there is nothing to add.
pub fn format_memories_for_context(hits: &[MemoryHit]) -> String {
    if hits.is_empty() {
        return String::new();
    }
    let memory_texts = hits
        .iter()
        .enumerate()
        .map(|(i, hit)| format!("{}. {}", i + 1, hit.memory))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "\n\n[User Memory - Things you remember about this user from past conversations:]\n{memory_texts}\n\nUse this information to personalize your responses, but don't explicitly mention that you're using memory unless asked."
    )
}
