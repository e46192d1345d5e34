//! Source specification documents
//!
//! The resolver only needs two things from a document: its pages of text and
//! a fingerprint that changes whenever the content does.

use crate::error::ResolveError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Page separator in plain-text exports
pub const PAGE_BREAK: char = '\u{c}';

/// One page of extracted text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number
    pub number: usize,
    /// Page text
    pub text: String,
}

/// Text-bearing source document
#[async_trait::async_trait]
pub trait SourceDocument: Send + Sync {
    /// Pages in reading order
    async fn pages(&self) -> Result<Vec<Page>, ResolveError>;

    /// SHA-256 hex digest of the raw content
    async fn fingerprint(&self) -> Result<String, ResolveError>;

    /// Full text, pages joined by newlines
    async fn full_text(&self) -> Result<String, ResolveError> {
        let pages = self.pages().await?;
        Ok(pages
            .into_iter()
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

/// Hex SHA-256 of `bytes`
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn split_pages(text: &str) -> Vec<Page> {
    text.split(PAGE_BREAK)
        .enumerate()
        .map(|(i, chunk)| Page {
            number: i + 1,
            text: chunk.to_string(),
        })
        .collect()
}

/// Plain-text export of the specification on disk
///
/// Form feeds separate pages, as produced by `pdftotext`.
#[derive(Debug, Clone)]
pub struct TextFileDocument {
    path: PathBuf,
}

impl TextFileDocument {
    /// Create document for `path`
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path on disk
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Vec<u8>, ResolveError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| ResolveError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

#[async_trait::async_trait]
impl SourceDocument for TextFileDocument {
    async fn pages(&self) -> Result<Vec<Page>, ResolveError> {
        let bytes = self.read().await?;
        let text = String::from_utf8(bytes).map_err(|e| {
            ResolveError::Document(format!("{} is not UTF-8: {e}", self.path.display()))
        })?;
        Ok(split_pages(&text))
    }

    async fn fingerprint(&self) -> Result<String, ResolveError> {
        Ok(sha256_hex(&self.read().await?))
    }
}

/// Document held in memory; replaceable for tests and embedding hosts
#[derive(Debug, Default)]
pub struct InMemoryDocument {
    text: RwLock<String>,
}

impl InMemoryDocument {
    /// Create document
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: RwLock::new(text.into()),
        }
    }

    /// Replace content
    pub async fn replace(&self, text: impl Into<String>) {
        *self.text.write().await = text.into();
    }
}

#[async_trait::async_trait]
impl SourceDocument for InMemoryDocument {
    async fn pages(&self) -> Result<Vec<Page>, ResolveError> {
        Ok(split_pages(&self.text.read().await))
    }

    async fn fingerprint(&self) -> Result<String, ResolveError> {
        Ok(sha256_hex(self.text.read().await.as_bytes()))
    }
}
