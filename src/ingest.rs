//! Document fetching and text extraction for knowledge ingestion

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::{BrigadeError, Result};

/// Retrieves a source document's text.
///
/// The seam the knowledge base fetches through, so stores and tests can
/// substitute their own implementation.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// HTTP-backed fetcher used in production.
#[derive(Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        fetch_document(&self.client, url).await
    }
}

/// Minimum run of printable characters kept when salvaging text from a
/// binary document.
const MIN_PRINTABLE_RUN: usize = 4;

/// Fetch a source document and extract its text content.
#[instrument(skip(client))]
pub async fn fetch_document(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| BrigadeError::Ingestion(format!("failed to fetch '{url}': {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(BrigadeError::Ingestion(format!(
            "fetch of '{url}' returned {status}"
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| BrigadeError::Ingestion(format!("failed to read body of '{url}': {e}")))?;

    let text = extract_text(&bytes);
    if text.trim().is_empty() {
        return Err(BrigadeError::Ingestion(format!(
            "no extractable text in '{url}'"
        )));
    }

    debug!(bytes = bytes.len(), chars = text.len(), "Fetched document");
    Ok(text)
}

/// Extract text from a document body.
///
/// Valid UTF-8 passes through unchanged. Anything else is salvaged by
/// keeping runs of printable ASCII of at least [`MIN_PRINTABLE_RUN`]
/// characters, which recovers the readable strings embedded in formats
/// like PDF without a format-specific parser.
pub fn extract_text(bytes: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let mut out = String::new();
    let mut run = String::new();
    for &byte in bytes {
        let ch = byte as char;
        if byte.is_ascii() && (ch.is_ascii_graphic() || ch == ' ') {
            run.push(ch);
        } else {
            if run.trim().len() >= MIN_PRINTABLE_RUN {
                out.push_str(run.trim());
                out.push(' ');
            }
            run.clear();
        }
    }
    if run.trim().len() >= MIN_PRINTABLE_RUN {
        out.push_str(run.trim());
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_text_passes_through() {
        let text = "Pad thai uses tamarind, fish sauce and palm sugar.";
        assert_eq!(extract_text(text.as_bytes()), text);
    }

    #[test]
    fn binary_input_keeps_printable_runs() {
        let mut bytes = vec![0xff, 0xfe, 0x00];
        bytes.extend_from_slice(b"Green curry paste");
        bytes.push(0x01);
        bytes.extend_from_slice(b"ab"); // too short, dropped
        bytes.push(0x02);
        bytes.extend_from_slice(b"coconut milk");

        let text = extract_text(&bytes);
        assert!(text.contains("Green curry paste"));
        assert!(text.contains("coconut milk"));
        assert!(!text.contains("ab c"));
    }

    #[test]
    fn all_binary_yields_empty() {
        assert!(extract_text(&[0xff, 0x00, 0x01, 0xfe]).is_empty());
    }
}
