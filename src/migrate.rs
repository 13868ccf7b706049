use std::collections::{HashMap, HashSet};

use anyhow::Context;
use chrono::{DateTime, FixedOffset, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::markdown::blocks_to_markdown;
use crate::memos;
use crate::notion::{self, Database, Page};
use crate::split::{split_content, MemoPart, MAX_MEMO_LEN};
use crate::state::State;

/// Hard bound on the ancestor walk; keeps termination obvious even if
/// the parent references form a cycle.
const MAX_ANCESTOR_HOPS: usize = 10;

pub struct MigrateOptions {
    pub resume: bool,
    pub filter_titles: Vec<String>,
}

/// Run-scoped memo of pages and databases fetched during tag resolution.
/// Entries are write-once per id and discarded with the resolver at the
/// end of the run.
struct TagResolver {
    pages: HashMap<String, Page>,
    databases: HashMap<String, Database>,
}

impl TagResolver {
    fn new() -> Self {
        Self {
            pages: HashMap::new(),
            databases: HashMap::new(),
        }
    }

    /// Derive hierarchy tags for `page`: walk the parent-page chain up to
    /// `MAX_ANCESTOR_HOPS`, prepending each title so the outermost
    /// ancestor lands first; the owning database's title, when there is
    /// one, is seeded before the walk and ends up last. Lookup failures
    /// are warnings; whatever was accumulated so far is returned.
    async fn resolve(
        &mut self,
        client: &notion::Client,
        page: &Page,
        cancel: &CancellationToken,
    ) -> Vec<String> {
        let mut tags = Vec::new();

        if let Some(db_id) = page.parent_database_id() {
            match self.database(client, db_id, cancel).await {
                Ok(db) => tags.push(db.title()),
                Err(e) => warn!(database = db_id, "failed to resolve database tag: {e}"),
            }
        }

        let mut current = page.parent_page_id().map(str::to_string);
        for _ in 0..MAX_ANCESTOR_HOPS {
            let Some(id) = current else { break };
            let parent = match self.page(client, &id, cancel).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(page = %id, "failed to resolve ancestor tag: {e}");
                    break;
                }
            };
            tags.insert(0, parent.title());
            current = parent.parent_page_id().map(str::to_string);
        }

        tags
    }

    async fn page(
        &mut self,
        client: &notion::Client,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<&Page> {
        if !self.pages.contains_key(id) {
            let page = client.retrieve_page(id, cancel).await?;
            self.pages.insert(id.to_string(), page);
        }
        Ok(&self.pages[id])
    }

    async fn database(
        &mut self,
        client: &notion::Client,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<&Database> {
        if !self.databases.contains_key(id) {
            let db = client.retrieve_database(id, cancel).await?;
            self.databases.insert(id.to_string(), db);
        }
        Ok(&self.databases[id])
    }
}

/// One known cosmetic correction, applied after resolution: the literal
/// tag "Tagebuch" is lowercased. Not a general casing rule.
fn apply_tag_fixups(tags: &mut [String]) {
    for tag in tags.iter_mut() {
        if tag == "Tagebuch" {
            *tag = "tagebuch".to_string();
            break;
        }
    }
}

/// Keep only pages whose title exactly equals one of `titles`.
fn filter_by_title(pages: Vec<Page>, titles: &[String]) -> Vec<Page> {
    let allowed: HashSet<&str> = titles.iter().map(String::as_str).collect();
    pages
        .into_iter()
        .filter(|p| allowed.contains(p.title().as_str()))
        .collect()
}

/// Drives the whole migration: search, filter, then per page fetch →
/// tag → render → (split →) dispatch → persist.
pub struct Migrator {
    notion: notion::Client,
    memos: memos::Client,
    state: State,
    dry_run: bool,
    cancel: CancellationToken,
}

impl Migrator {
    pub fn new(
        notion: notion::Client,
        memos: memos::Client,
        state: State,
        dry_run: bool,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            notion,
            memos,
            state,
            dry_run,
            cancel,
        }
    }

    /// Returns the number of pages migrated in this run.
    pub async fn run(&self, opts: MigrateOptions) -> anyhow::Result<usize> {
        info!("starting migration from Notion to Memos");
        if self.dry_run {
            println!("DRY RUN MODE: memos will be saved to ./dry-run-output/ instead of created");
        }

        println!("Searching for pages in Notion...");
        let mut pages = self
            .notion
            .search_pages("", &self.cancel)
            .await
            .context("failed to search pages")?;
        println!("Found {} pages", pages.len());

        if !opts.filter_titles.is_empty() {
            pages = filter_by_title(pages, &opts.filter_titles);
            println!("Filtered to {} pages matching specified titles", pages.len());
        }

        if opts.resume {
            let before = pages.len();
            pages.retain(|p| !self.state.is_processed(&p.id));
            let skipped = before - pages.len();
            if skipped > 0 {
                println!("Skipping {skipped} already processed pages (resume mode)");
            }
        }

        if pages.is_empty() {
            println!("No pages to migrate");
            return Ok(0);
        }

        let pb = ProgressBar::new(pages.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
                .progress_chars("=> "),
        );

        let mut resolver = TagResolver::new();
        let mut migrated = 0usize;

        for page in &pages {
            if let Err(e) = self.migrate_page(page, &mut resolver).await {
                pb.finish_and_clear();
                return Err(e).with_context(|| {
                    format!("failed to migrate page {} ({})", page.title(), page.id)
                });
            }

            self.state.mark_processed(&page.id);
            self.state.save().context("failed to save state")?;

            migrated += 1;
            pb.inc(1);
        }

        pb.finish_and_clear();
        println!("Migration completed successfully! Migrated {migrated} pages");
        if self.dry_run {
            println!("Check ./dry-run-output/ for the generated markdown files");
        }

        Ok(migrated)
    }

    async fn migrate_page(&self, page: &Page, resolver: &mut TagResolver) -> Result<()> {
        let title = page.title();

        let blocks = self.notion.retrieve_blocks(&page.id, &self.cancel).await?;
        if blocks.is_empty() {
            info!(page = %title, "skipping page with no blocks");
            return Ok(());
        }

        let nested = blocks.iter().filter(|b| b.has_children).count();
        if nested > 0 {
            debug!(page = %title, nested, "nested child blocks are not migrated");
        }

        let mut tags = resolver.resolve(&self.notion, page, &self.cancel).await;
        apply_tag_fixups(&mut tags);

        let markdown = blocks_to_markdown(&blocks, &page.created_time, &title, &tags);
        if markdown.is_empty() {
            info!(page = %title, "skipping page that rendered empty");
            return Ok(());
        }

        let created = parse_created_time(&page.created_time, &title);

        if markdown.len() > MAX_MEMO_LEN {
            info!(
                page = %title,
                chars = markdown.len(),
                "page exceeds memo limit, splitting"
            );
            let parts = split_content(&markdown, &title, created);
            self.dispatch_parts(&parts).await?;
        } else {
            self.memos
                .create_memo(&markdown, created, self.dry_run)
                .await?;
        }

        Ok(())
    }

    async fn dispatch_parts(&self, parts: &[MemoPart]) -> Result<()> {
        let total = parts.len();
        for (i, part) in parts.iter().enumerate() {
            self.memos
                .create_memo(&part.content, part.created, self.dry_run)
                .await
                .map_err(|e| Error::SplitDispatch {
                    part: i + 1,
                    total,
                    source: Box::new(e),
                })?;
        }
        Ok(())
    }
}

fn parse_created_time(created_time: &str, title: &str) -> DateTime<FixedOffset> {
    match DateTime::parse_from_rfc3339(created_time) {
        Ok(t) => t,
        Err(e) => {
            warn!(
                page = %title,
                "failed to parse created time, falling back to now: {e}"
            );
            Utc::now().fixed_offset()
        }
    }
}
