//! Export targets: Google Docs upload and local Markdown files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const DOCS_BASE_URL: &str = "https://docs.googleapis.com/v1/documents";
const GOOGLE_SCOPES: &str =
    "https://www.googleapis.com/auth/drive https://www.googleapis.com/auth/documents";
const DOC_MIME_TYPE: &str = "application/vnd.google-apps.document";

/// Where an exported transcript ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportRef {
    /// Hosted document.
    Doc { id: String, url: String },
    /// Local file.
    File { path: PathBuf },
}

impl ExportRef {
    /// The string recorded on the job and in history: a URL or a path.
    pub fn reference(&self) -> String {
        match self {
            Self::Doc { url, .. } => url.clone(),
            Self::File { path } => path.display().to_string(),
        }
    }
}

/// External export collaborator.
#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(&self, title: &str, transcript: &str) -> Result<ExportRef>;
}

// ---------------------------------------------------------------------------
// Markdown
// ---------------------------------------------------------------------------

/// Writes transcripts as Markdown files under a fixed directory.
pub struct MarkdownExporter {
    output_dir: PathBuf,
}

impl MarkdownExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

/// Replace filesystem-hostile characters so any title maps to a valid name.
fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || "-_ ".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl Exporter for MarkdownExporter {
    async fn export(&self, title: &str, transcript: &str) -> Result<ExportRef> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self
            .output_dir
            .join(format!("{}.md", sanitize_title(title)));
        let contents = format!("# {}\n\n{}\n", title, transcript);
        tokio::fs::write(&path, contents).await?;
        Ok(ExportRef::File { path })
    }
}

// ---------------------------------------------------------------------------
// Google Docs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct TokenClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Creates a Google Doc in a Drive folder and fills it with the transcript.
///
/// Authenticates as a service account: a signed RS256 assertion is exchanged
/// for a short-lived access token, which is cached until close to expiry.
pub struct GoogleDocsExporter {
    http: reqwest::Client,
    client_email: String,
    token_uri: String,
    signing_key: EncodingKey,
    folder_id: String,
    token_cache: tokio::sync::Mutex<Option<CachedToken>>,
}

impl GoogleDocsExporter {
    /// Load and validate the service-account key file.
    ///
    /// Failures here invalidate the whole session, not a single job: the
    /// same credential would fail every export.
    pub fn new(key_path: impl AsRef<Path>, folder_id: impl Into<String>) -> Result<Self> {
        let key_path = key_path.as_ref();
        let raw = std::fs::read_to_string(key_path).map_err(|e| {
            Error::credential(format!(
                "Cannot read service account file {}: {}",
                key_path.display(),
                e
            ))
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&raw).map_err(|e| {
            Error::credential(format!(
                "Malformed service account file {}: {}",
                key_path.display(),
                e
            ))
        })?;
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| Error::credential(format!("Invalid service account key: {}", e)))?;

        Ok(Self {
            http: reqwest::Client::new(),
            client_email: key.client_email,
            token_uri: key.token_uri.unwrap_or_else(|| GOOGLE_TOKEN_URL.to_string()),
            signing_key,
            folder_id: folder_id.into(),
            token_cache: tokio::sync::Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String> {
        let mut cache = self.token_cache.lock().await;
        if let Some(token) = cache.as_ref()
            && token.expires_at > Utc::now() + ChronoDuration::seconds(60)
        {
            return Ok(token.access_token.clone());
        }

        let now = Utc::now();
        let claims = TokenClaims {
            iss: &self.client_email,
            scope: GOOGLE_SCOPES,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: (now + ChronoDuration::hours(1)).timestamp(),
        };
        let assertion = jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.signing_key,
        )
        .map_err(|e| Error::provider(format!("Failed to sign token assertion: {}", e)))?;

        let response = self
            .http
            .post(self.token_uri.as_str())
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(Error::provider(format!(
                "Google token exchange failed ({}): {}",
                status, snippet
            )));
        }
        let token: TokenResponse = response.json().await?;

        let expires_at = now + ChronoDuration::seconds(token.expires_in.unwrap_or(3600));
        *cache = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at,
        });
        Ok(token.access_token)
    }

    /// Create an empty document inside the configured folder, return its id.
    async fn create_doc(&self, token: &str, title: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct CreatedFile {
            id: String,
        }

        let response = self
            .http
            .post(DRIVE_FILES_URL)
            .query(&[("fields", "id")])
            .bearer_auth(token)
            .json(&serde_json::json!({
                "name": title,
                "mimeType": DOC_MIME_TYPE,
                "parents": [self.folder_id],
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(Error::provider(format!(
                "Drive document creation failed ({}): {}",
                status, snippet
            )));
        }
        let created: CreatedFile = response.json().await?;
        Ok(created.id)
    }

    /// Insert the transcript at the beginning of the document body.
    async fn insert_text(&self, token: &str, doc_id: &str, text: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/{}:batchUpdate", DOCS_BASE_URL, doc_id))
            .bearer_auth(token)
            .json(&serde_json::json!({
                "requests": [{
                    "insertText": {
                        "location": { "index": 1 },
                        "text": text,
                    }
                }]
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(Error::provider(format!(
                "Docs text insertion failed ({}): {}",
                status, snippet
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Exporter for GoogleDocsExporter {
    async fn export(&self, title: &str, transcript: &str) -> Result<ExportRef> {
        let token = self.access_token().await?;
        let doc_id = self.create_doc(&token, title).await?;
        self.insert_text(&token, &doc_id, transcript).await?;
        debug!(doc_id = %doc_id, title, "document created and filled");
        Ok(ExportRef::Doc {
            url: format!("https://docs.google.com/document/d/{}", doc_id),
            id: doc_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("Meeting 2024-01"), "Meeting 2024-01");
        assert_eq!(sanitize_title("a/b:c?d"), "a_b_c_d");
        assert_eq!(sanitize_title("víde0"), "víde0");
    }

    #[test]
    fn test_export_ref_reference() {
        let doc = ExportRef::Doc {
            id: "abc".into(),
            url: "https://docs.google.com/document/d/abc".into(),
        };
        assert_eq!(doc.reference(), "https://docs.google.com/document/d/abc");

        let file = ExportRef::File {
            path: PathBuf::from("/out/a.md"),
        };
        assert_eq!(file.reference(), "/out/a.md");
    }

    #[test]
    fn test_new_rejects_missing_key_file_as_credential_error() {
        let err = GoogleDocsExporter::new("/nonexistent/sa.json", "folder").unwrap_err();
        assert!(matches!(err, Error::InvalidCredential(_)));
        assert!(err.is_session_fatal());
    }

    #[test]
    fn test_new_rejects_malformed_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sa.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = GoogleDocsExporter::new(&path, "folder").unwrap_err();
        assert!(matches!(err, Error::InvalidCredential(_)));
    }

    #[tokio::test]
    async fn test_markdown_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = MarkdownExporter::new(dir.path().join("out"));
        let reference = exporter
            .export("Interview: Part 1", "hello world")
            .await
            .unwrap();

        let ExportRef::File { path } = reference else {
            panic!("markdown export must return a file reference");
        };
        assert_eq!(path.file_name().unwrap(), "Interview_ Part 1.md");
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents, "# Interview: Part 1\n\nhello world\n");
    }
}
