use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::limiter::RateLimiter;

const NOTION_API_BASE: &str = "https://api.notion.com/v1";
const NOTION_API_VERSION: &str = "2025-09-03";
const PAGE_SIZE: u32 = 100;
const RATE_LIMIT_PER_SEC: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ── Wire types ──

#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub created_time: String,
    #[serde(default)]
    pub parent: Option<Parent>,
    #[serde(default)]
    pub properties: HashMap<String, Property>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Parent {
    #[serde(rename = "database_id")]
    Database { database_id: String },
    #[serde(rename = "page_id")]
    Page { page_id: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Property {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: Vec<RichText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: String,
    pub annotations: Option<Annotations>,
    pub href: Option<String>,
    pub text: Option<TextContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Annotations {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub code: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextContent {
    pub link: Option<Link>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub title: Vec<RichText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(default)]
    pub has_children: bool,
    #[serde(flatten)]
    pub content: BlockContent,
}

/// Block payloads sit under a field named after the `type` tag, so each
/// variant carries that one field. Anything we don't migrate (images,
/// embeds, tables, ...) lands in `Unsupported` and renders to nothing.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum BlockContent {
    #[serde(rename = "paragraph")]
    Paragraph { paragraph: RichTextContent },
    #[serde(rename = "heading_1")]
    Heading1 { heading_1: RichTextContent },
    #[serde(rename = "heading_2")]
    Heading2 { heading_2: RichTextContent },
    #[serde(rename = "heading_3")]
    Heading3 { heading_3: RichTextContent },
    #[serde(rename = "bulleted_list_item")]
    BulletedListItem { bulleted_list_item: RichTextContent },
    #[serde(rename = "numbered_list_item")]
    NumberedListItem { numbered_list_item: RichTextContent },
    #[serde(rename = "to_do")]
    ToDo { to_do: ToDoContent },
    #[serde(rename = "code")]
    Code { code: CodeContent },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RichTextContent {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToDoContent {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
    #[serde(default)]
    pub checked: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodeContent {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
    #[serde(default)]
    pub language: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Page>,
    next_cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct BlockResponse {
    #[serde(default)]
    results: Vec<Block>,
    next_cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

impl Page {
    /// Title lives in whichever property has type "title".
    pub fn title(&self) -> String {
        for prop in self.properties.values() {
            if prop.kind == "title" {
                if let Some(rt) = prop.title.first() {
                    return rt.plain_text.clone();
                }
            }
        }
        "Untitled".to_string()
    }

    pub fn parent_database_id(&self) -> Option<&str> {
        match &self.parent {
            Some(Parent::Database { database_id }) => Some(database_id),
            _ => None,
        }
    }

    pub fn parent_page_id(&self) -> Option<&str> {
        match &self.parent {
            Some(Parent::Page { page_id }) => Some(page_id),
            _ => None,
        }
    }
}

impl Database {
    pub fn title(&self) -> String {
        let title: String = self.title.iter().map(|rt| rt.plain_text.as_str()).collect();
        if title.is_empty() {
            "Untitled".to_string()
        } else {
            title
        }
    }
}

// ── Client ──

/// Notion API client. Holds no state beyond the reqwest client and the
/// rate limiter; every call acquires a limiter permit before going out.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    token: String,
    limiter: RateLimiter,
}

impl Client {
    pub fn new(token: &str) -> Self {
        Self::with_base_url(token, NOTION_API_BASE)
    }

    pub fn with_base_url(token: &str, base_url: &str) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            limiter: RateLimiter::new(RATE_LIMIT_PER_SEC),
        }
    }

    /// Search all pages matching `query` (empty = everything), following
    /// the cursor until the API reports no more results.
    pub async fn search_pages(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Page>> {
        let url = format!("{}/search", self.base_url);
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut payload = serde_json::json!({
                "page_size": PAGE_SIZE,
                "filter": { "property": "object", "value": "page" },
            });
            if !query.is_empty() {
                payload["query"] = query.into();
            }
            if let Some(c) = &cursor {
                payload["start_cursor"] = c.as_str().into();
            }

            let resp: SearchResponse = self.post_json(&url, &payload, cancel).await?;
            all.extend(resp.results);

            // A missing cursor with has_more set would refetch the first
            // page forever; treat it as the end of the results.
            match resp.next_cursor {
                Some(c) if resp.has_more => cursor = Some(c),
                _ => break,
            }
        }

        Ok(all)
    }

    /// Retrieve all child blocks of a page or block, following the cursor.
    /// Flat list only; nested children are not fetched.
    pub async fn retrieve_blocks(
        &self,
        block_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Block>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut url = format!(
                "{}/blocks/{}/children?page_size={}",
                self.base_url, block_id, PAGE_SIZE
            );
            if let Some(c) = &cursor {
                url.push_str("&start_cursor=");
                url.push_str(c);
            }

            let resp: BlockResponse = self.get_json(&url, cancel).await?;
            all.extend(resp.results);

            match resp.next_cursor {
                Some(c) if resp.has_more => cursor = Some(c),
                _ => break,
            }
        }

        Ok(all)
    }

    pub async fn retrieve_page(&self, page_id: &str, cancel: &CancellationToken) -> Result<Page> {
        let url = format!("{}/pages/{}", self.base_url, page_id);
        self.get_json(&url, cancel).await
    }

    pub async fn retrieve_database(
        &self,
        database_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Database> {
        let url = format!("{}/databases/{}", self.base_url, database_id);
        self.get_json(&url, cancel).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<T> {
        self.limiter.acquire(cancel).await?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_API_VERSION)
            .send()
            .await?;
        decode(resp).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        payload: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<T> {
        self.limiter.acquire(cancel).await?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_API_VERSION)
            .json(payload)
            .send()
            .await?;
        decode(resp).await
    }
}

/// Non-2xx is a terminal transport error carrying the raw body; a 2xx
/// body that fails to parse is a decode error. No retries either way.
async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(Error::Transport {
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(Error::Decode)
}
