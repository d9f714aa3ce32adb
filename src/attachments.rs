//! Attachment normalization for vendors without native document blocks.
//!
//! Anthropic accepts base64 document blocks inline, so its adapter bypasses
//! this module. The OpenAI-style backends have no document type; before a
//! send their documents are rewritten:
//!
//! - text mimes are decoded and inlined as a labeled text block,
//! - PDFs go through upload-then-reference (file ids cached per source URI),
//! - anything else becomes a placeholder text block.
//!
//! Nothing here aborts a send; every failure path degrades to a placeholder.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use lru::LruCache;

use crate::files::FileUploadClient;
use crate::types::DocumentSource;
use crate::types::message::parse_data_url;

/// Upload-cache capacity. The cache is per-orchestrator, bounded so a long
/// session with many attachments cannot grow it without limit.
const UPLOAD_CACHE_CAPACITY: usize = 64;

/// A document part rewritten for a vendor without native document support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedPart {
    /// Inline text (decoded document content or a placeholder).
    Text(String),
    /// Vendor file id from the upload-then-reference flow.
    FileRef { file_id: String, name: String },
}

fn is_text_mime(mime: &str) -> bool {
    mime.starts_with("text/")
        || matches!(mime, "application/json" | "application/xml")
}

fn placeholder(doc: &DocumentSource, reason: &str) -> NormalizedPart {
    NormalizedPart::Text(format!(
        "[Attachment \"{}\" ({}) {}]",
        doc.name, doc.mime_type, reason
    ))
}

/// Rewrites document parts for OpenAI-style sends.
///
/// Owns the bounded file-id cache; uploads run through the injected
/// [`FileUploadClient`]. Constructed without one (e.g. on a runtime with no
/// binary upload capability), PDFs degrade to placeholders.
pub struct AttachmentNormalizer {
    uploader: Option<Arc<dyn FileUploadClient>>,
    upload_cache: Mutex<LruCache<String, String>>,
}

impl AttachmentNormalizer {
    pub fn new(uploader: Option<Arc<dyn FileUploadClient>>) -> Self {
        Self {
            uploader,
            upload_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(UPLOAD_CACHE_CAPACITY).unwrap(),
            )),
        }
    }

    /// Rewrite one document part.
    pub async fn normalize_document(&self, doc: &DocumentSource) -> NormalizedPart {
        if is_text_mime(&doc.mime_type) {
            return self.inline_text_document(doc);
        }
        if doc.mime_type == "application/pdf" {
            return self.upload_pdf(doc).await;
        }
        tracing::debug!("no inline strategy for {} ({})", doc.name, doc.mime_type);
        placeholder(doc, "is not supported by this model")
    }

    fn inline_text_document(&self, doc: &DocumentSource) -> NormalizedPart {
        let Some((_, payload)) = parse_data_url(&doc.url) else {
            return placeholder(doc, "could not be decoded");
        };
        match BASE64.decode(payload) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                NormalizedPart::Text(format!("[Content of {}]: {}", doc.name, text))
            }
            Err(err) => {
                tracing::warn!("failed to decode attachment {}: {err}", doc.name);
                placeholder(doc, "could not be decoded")
            }
        }
    }

    async fn upload_pdf(&self, doc: &DocumentSource) -> NormalizedPart {
        let Some(uploader) = &self.uploader else {
            tracing::debug!("no upload capability on this runtime, inlining placeholder");
            return placeholder(doc, "could not be uploaded");
        };

        let cache_key = doc.source_uri.clone().unwrap_or_else(|| doc.url.clone());
        if let Some(file_id) = self
            .upload_cache
            .lock()
            .expect("upload cache poisoned")
            .get(&cache_key)
            .cloned()
        {
            tracing::debug!("upload cache hit for {}", doc.name);
            return NormalizedPart::FileRef {
                file_id,
                name: doc.name.clone(),
            };
        }

        let Some((_, payload)) = parse_data_url(&doc.url) else {
            return placeholder(doc, "could not be decoded");
        };
        let bytes = match BASE64.decode(payload) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!("failed to decode attachment {}: {err}", doc.name);
                return placeholder(doc, "could not be decoded");
            }
        };

        match uploader.upload(bytes, &doc.name, &doc.mime_type).await {
            Some(file_id) => {
                self.upload_cache
                    .lock()
                    .expect("upload cache poisoned")
                    .put(cache_key, file_id.clone());
                NormalizedPart::FileRef {
                    file_id,
                    name: doc.name.clone(),
                }
            }
            None => placeholder(doc, "could not be uploaded"),
        }
    }
}
