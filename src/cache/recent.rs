//! Recent-articles cache.
//!
//! Holds one snapshot of the recent listing (hottest article first, then the
//! two next most recent) with every entry enriched by its tags. Reads serve the
//! snapshot until it expires; an expired or missing snapshot is rebuilt inline
//! by the reader. A failed rebuild never touches the cell, so readers keep
//! getting the last good snapshot, or nothing if there never was one.
//!
//! Concurrent readers that all observe an expired cell each rebuild on their
//! own. Whichever rebuild finishes last is what later reads see.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use futures::future::try_join_all;
use metrics::{counter, histogram};
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::application::repos::{ArticlesRepo, RepoError, TagsRepo};
use crate::domain::entities::{ArticleId, EnrichedArticle};

use super::clock::Clock;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::recent";

/// How long a snapshot is served before the next read rebuilds it.
pub const DEFAULT_RECENT_WINDOW: Duration = Duration::from_secs(2 * 60 * 60);

/// Immutable view of the recent listing at the moment it was built.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentSnapshot {
    articles: Vec<EnrichedArticle>,
    built_at: OffsetDateTime,
}

impl RecentSnapshot {
    pub fn articles(&self) -> &[EnrichedArticle] {
        &self.articles
    }

    pub fn article_ids(&self) -> Vec<ArticleId> {
        self.articles.iter().map(|entry| entry.article.id).collect()
    }

    pub fn built_at(&self) -> OffsetDateTime {
        self.built_at
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

/// Result of a rebuild attempt.
#[derive(Debug)]
pub enum RefreshOutcome {
    Refreshed(Arc<RecentSnapshot>),
    /// The cell was left untouched; `retained` is whatever it held before.
    Failed {
        error: RepoError,
        retained: Option<Arc<RecentSnapshot>>,
    },
}

impl RefreshOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, RefreshOutcome::Refreshed(_))
    }

    pub fn into_snapshot(self) -> Option<Arc<RecentSnapshot>> {
        match self {
            RefreshOutcome::Refreshed(snapshot) => Some(snapshot),
            RefreshOutcome::Failed { retained, .. } => retained,
        }
    }
}

#[derive(Debug, Default)]
struct CacheCell {
    snapshot: Option<Arc<RecentSnapshot>>,
    expires_at: Option<OffsetDateTime>,
}

impl CacheCell {
    fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_none_or(|deadline| now >= deadline)
    }
}

pub struct RecentArticlesCache {
    articles: Arc<dyn ArticlesRepo>,
    tags: Arc<dyn TagsRepo>,
    clock: Arc<dyn Clock>,
    window: time::Duration,
    cell: RwLock<CacheCell>,
}

impl RecentArticlesCache {
    pub fn new(
        articles: Arc<dyn ArticlesRepo>,
        tags: Arc<dyn TagsRepo>,
        clock: Arc<dyn Clock>,
        window: Duration,
    ) -> Self {
        Self {
            articles,
            tags,
            clock,
            window: time::Duration::try_from(window).unwrap_or(time::Duration::MAX),
            cell: RwLock::new(CacheCell::default()),
        }
    }

    /// Serve the snapshot, rebuilding it first when missing or expired.
    ///
    /// Rebuild failures are logged and swallowed; the caller then gets the
    /// previous snapshot, which is `None` until a rebuild has succeeded once.
    pub async fn recent_articles(&self) -> Option<Arc<RecentSnapshot>> {
        if let Some(snapshot) = self.fresh_snapshot(self.clock.now()) {
            counter!("chronicle_recent_cache_hit_total").increment(1);
            return Some(snapshot);
        }

        counter!("chronicle_recent_cache_miss_total").increment(1);
        self.refresh().await.into_snapshot()
    }

    /// Rebuild the snapshot from the data sources and swap it in.
    pub async fn refresh(&self) -> RefreshOutcome {
        let started = Instant::now();

        match self.rebuild().await {
            Ok(articles) => {
                let now = self.clock.now();
                let snapshot = Arc::new(RecentSnapshot {
                    articles,
                    built_at: now,
                });
                let expires_at = now.saturating_add(self.window);

                {
                    let mut cell = rw_write(&self.cell, SOURCE, "refresh");
                    cell.snapshot = Some(Arc::clone(&snapshot));
                    cell.expires_at = Some(expires_at);
                }

                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                histogram!("chronicle_recent_cache_refresh_ms").record(elapsed_ms);
                debug!(
                    target = SOURCE,
                    articles = snapshot.len(),
                    elapsed_ms,
                    expires_at = %expires_at,
                    "recent articles refreshed"
                );

                RefreshOutcome::Refreshed(snapshot)
            }
            Err(error) => {
                counter!("chronicle_recent_cache_refresh_failed_total").increment(1);
                let retained = self.current();
                warn!(
                    target = SOURCE,
                    error = %error,
                    retained = retained.is_some(),
                    "recent articles refresh failed; keeping previous snapshot"
                );

                RefreshOutcome::Failed { error, retained }
            }
        }
    }

    /// Run a refresh in the background; writers use this after mutations.
    pub fn spawn_refresh(self: &Arc<Self>) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            cache.refresh().await;
        })
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(self.clock.now())
    }

    /// Expired when `now` has reached the deadline, or when nothing was ever
    /// loaded.
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        rw_read(&self.cell, SOURCE, "is_expired_at").is_expired_at(now)
    }

    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        rw_read(&self.cell, SOURCE, "expires_at").expires_at
    }

    /// The held snapshot, regardless of expiry.
    pub fn current(&self) -> Option<Arc<RecentSnapshot>> {
        rw_read(&self.cell, SOURCE, "current").snapshot.clone()
    }

    fn fresh_snapshot(&self, now: OffsetDateTime) -> Option<Arc<RecentSnapshot>> {
        let cell = rw_read(&self.cell, SOURCE, "fresh_snapshot");
        if cell.is_expired_at(now) {
            return None;
        }
        cell.snapshot.clone()
    }

    async fn rebuild(&self) -> Result<Vec<EnrichedArticle>, RepoError> {
        let listing = self.articles.recent_listing().await?;

        let lookups = listing
            .iter()
            .map(|entry| self.tags.list_for_article(entry.article.id));
        let tag_lists = try_join_all(lookups).await?;

        Ok(listing
            .into_iter()
            .zip(tag_lists)
            .map(|(entry, tags)| EnrichedArticle {
                article: entry.article,
                hottest: entry.hottest,
                tags,
            })
            .collect())
    }
}
