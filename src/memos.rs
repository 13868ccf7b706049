use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DRY_RUN_DIR: &str = "./dry-run-output";

#[derive(Debug, Serialize)]
struct CreateMemoRequest<'a> {
    content: &'a str,
    #[serde(rename = "createdTs")]
    created_ts: i64,
    #[serde(rename = "displayTime")]
    display_time: String,
}

#[derive(Debug, Deserialize)]
struct CreateMemoResponse {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Serialize)]
struct PatchMemoRequest {
    #[serde(rename = "displayTime")]
    display_time: String,
}

/// Memos API client. Creation is two-step: POST the memo, then PATCH the
/// display time onto the created note, since create does not always
/// honor the requested timestamp.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl Client {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// Create one memo with the given creation time. In dry-run mode the
    /// memo is written to a local file instead.
    pub async fn create_memo(
        &self,
        content: &str,
        created: DateTime<FixedOffset>,
        dry_run: bool,
    ) -> Result<()> {
        if dry_run {
            return write_dry_run(Path::new(DRY_RUN_DIR), content, created);
        }

        let payload = CreateMemoRequest {
            content,
            created_ts: created.timestamp(),
            display_time: created.to_rfc3339(),
        };

        let resp = self
            .http
            .post(format!("{}/api/v1/memos", self.base_url))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Transport {
                status: status.as_u16(),
                body,
            });
        }
        let created_memo: CreateMemoResponse =
            serde_json::from_str(&body).map_err(Error::Decode)?;
        debug!(memo = %created_memo.name, "created memo");

        if !created_memo.name.is_empty() {
            self.patch_display_time(&created_memo.name, created).await?;
        }
        Ok(())
    }

    async fn patch_display_time(
        &self,
        name: &str,
        created: DateTime<FixedOffset>,
    ) -> Result<()> {
        let payload = PatchMemoRequest {
            display_time: created.to_rfc3339(),
        };

        let resp = self
            .http
            .patch(format!("{}/api/v1/{name}", self.base_url))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await?;
            return Err(Error::Transport {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Write the memo to `<dir>/<YYYY-MM-DD-HHMMSS>.md` with a metadata
/// header instead of calling the API.
fn write_dry_run(dir: &Path, content: &str, created: DateTime<FixedOffset>) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    let filename = format!("{}.md", created.format("%Y-%m-%d-%H%M%S"));
    let full = format!(
        "---\nCreated: {}\nDry Run: true\n---\n\n{}",
        created.format("%Y-%m-%d %H:%M:%S"),
        content
    );
    std::fs::write(dir.join(filename), full)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn ts() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-03-01T10:00:00Z").unwrap()
    }

    #[tokio::test]
    async fn create_then_patch() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/memos"))
            .and(body_partial_json(serde_json::json!({
                "content": "# Note\n\nhello",
                "createdTs": ts().timestamp(),
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "memos/42",
                "content": "# Note\n\nhello"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PATCH"))
            .and(path("/api/v1/memos/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new(&server.uri(), "token");
        client
            .create_memo("# Note\n\nhello", ts(), false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_failure_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/memos"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = Client::new(&server.uri(), "token");
        let err = client.create_memo("x", ts(), false).await.unwrap_err();
        assert!(matches!(err, Error::Transport { status: 500, .. }));
    }

    #[test]
    fn dry_run_writes_timestamped_file() {
        let dir = tempfile::tempdir().unwrap();
        write_dry_run(dir.path(), "# Note\n\nhello", ts()).unwrap();

        let path = dir.path().join("2024-03-01-100000.md");
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.starts_with("---\nCreated: 2024-03-01 10:00:00\nDry Run: true\n---\n\n"));
        assert!(written.ends_with("# Note\n\nhello"));
    }
}
