//! File-upload collaborator for vendors with an upload-then-reference flow.
//!
//! Only the OpenAI-style backends use this: PDF attachments are uploaded to
//! the vendor's files endpoint and then referenced by id in the message.
//! Upload is strictly best-effort; a failed upload degrades the attachment
//! to a placeholder text block instead of failing the send.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Uploads raw bytes to a vendor file store, returning the vendor file id.
///
/// Returns `None` on any failure; callers degrade rather than abort.
#[async_trait]
pub trait FileUploadClient: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, filename: &str, mime_type: &str) -> Option<String>;
}

#[derive(Debug, Deserialize)]
struct FileUploadResponse {
    id: String,
}

/// OpenAI-style `/files` endpoint client (multipart, `purpose=user_data`).
pub struct OpenAiFileUpload {
    http_client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl OpenAiFileUpload {
    pub fn new(http_client: reqwest::Client, base_url: String, api_key: SecretString) -> Self {
        Self {
            http_client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl FileUploadClient for OpenAiFileUpload {
    async fn upload(&self, bytes: Vec<u8>, filename: &str, mime_type: &str) -> Option<String> {
        let part = match reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime_type)
        {
            Ok(part) => part,
            Err(err) => {
                tracing::warn!("invalid mime type for upload ({mime_type}): {err}");
                return None;
            }
        };
        let form = reqwest::multipart::Form::new()
            .text("purpose", "user_data")
            .part("file", part);

        let url = format!("{}/files", self.base_url.trim_end_matches('/'));
        let response = match self
            .http_client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!("file upload request failed: {err}");
                return None;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("file upload rejected ({status}): {body}");
            return None;
        }

        match response.json::<FileUploadResponse>().await {
            Ok(parsed) => {
                tracing::debug!("uploaded {filename} as {}", parsed.id);
                Some(parsed.id)
            }
            Err(err) => {
                tracing::warn!("file upload response unreadable: {err}");
                None
            }
        }
    }
}
