//! Odds and event sources.
//!
//! The core never talks to a provider directly. A source hands over one
//! snapshot per fetch; [`CachedSource`] wraps any source with an on-disk
//! cache and guarantees that a failing provider degrades to cached or empty
//! data instead of an error.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::domain::{Event, EventRef, FeedPrice, Market, OddsQuote, QuoteBook, Side};
use crate::error::{EdgeError, Result};
use crate::telemetry::{SharedTelemetry, Signal, TracingTelemetry};

pub const DEFAULT_CACHE_TTL_SECS: u64 = 900;

/// Everything one provider published in one fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSnapshot {
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    pub events: Vec<Event>,
    pub quotes: Vec<OddsQuote>,
}

impl SourceSnapshot {
    pub fn empty(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            fetched_at: Utc::now(),
            events: Vec::new(),
            quotes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.quotes.is_empty()
    }

    pub fn quote_book(&self) -> QuoteBook {
        QuoteBook::from_quotes(self.quotes.iter().cloned())
    }

    /// Keep only events of `sport` (and `league` if given) and their quotes
    pub fn filtered(mut self, sport: &str, league: Option<&str>) -> Self {
        self.events.retain(|e| {
            e.sport.eq_ignore_ascii_case(sport)
                && league.map_or(true, |l| {
                    e.league.as_deref().is_some_and(|el| el.eq_ignore_ascii_case(l))
                })
        });
        let kept: Vec<EventRef> = self.events.iter().map(Event::event_ref).collect();
        self.quotes.retain(|q| kept.contains(&q.event_ref));
        self
    }
}

#[async_trait]
pub trait OddsSource: Send + Sync {
    fn name(&self) -> &str;

    /// Identifies what this source reads, for cache file names. Two sources
    /// with the same key share cached snapshots.
    fn cache_key(&self) -> String {
        self.name().to_string()
    }

    async fn fetch(&self, sport: &str, league: Option<&str>) -> Result<SourceSnapshot>;
}

/// Quote as written in a snapshot file: scoped to the file's source, price
/// in whatever format the provider used
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuote {
    pub event_id: String,
    pub book: String,
    pub market: Market,
    pub side: Side,
    #[serde(default)]
    pub line: Option<f64>,
    #[serde(default)]
    pub price: Option<FeedPrice>,
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotFile {
    pub source: String,
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub quotes: Vec<RawQuote>,
}

impl SnapshotFile {
    /// Normalize into a snapshot. Quotes without a usable price are dropped
    /// and therefore read as not quoted.
    pub fn into_snapshot(self) -> SourceSnapshot {
        let fetched_at = self.fetched_at.unwrap_or_else(Utc::now);
        let source = self.source;
        let mut quotes = Vec::with_capacity(self.quotes.len());

        for raw in self.quotes {
            let decimal = match raw.price.as_ref().map(FeedPrice::to_decimal) {
                Some(Ok(d)) => d,
                Some(Err(e)) => {
                    debug!(event_id = %raw.event_id, book = %raw.book, "Unusable price: {}", e);
                    continue;
                }
                None => continue,
            };
            if raw.market != Market::Moneyline && raw.line.is_none() {
                debug!(event_id = %raw.event_id, market = %raw.market, "Line market without a line");
                continue;
            }
            quotes.push(OddsQuote {
                event_ref: EventRef::new(source.clone(), raw.event_id),
                book: raw.book,
                market: raw.market,
                side: raw.side,
                line: if raw.market == Market::Moneyline { None } else { raw.line },
                decimal_price: decimal,
                fetched_at: raw.fetched_at.unwrap_or(fetched_at),
            });
        }

        let events = self
            .events
            .into_iter()
            .map(|mut e| {
                e.source = source.clone();
                e
            })
            .collect();

        SourceSnapshot {
            source,
            fetched_at,
            events,
            quotes,
        }
    }
}

/// Reads a provider dump from a JSON file
pub struct SnapshotFileSource {
    name: String,
    path: PathBuf,
}

impl SnapshotFileSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole file without filtering
    pub async fn load(&self) -> Result<SourceSnapshot> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| EdgeError::source_failed(&self.name, format!("{}: {}", self.path.display(), e)))?;
        let file: SnapshotFile = serde_json::from_str(&content)?;
        Ok(file.into_snapshot())
    }
}

#[async_trait]
impl OddsSource for SnapshotFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    /// Name plus a digest of the file path, so two files never share a cache
    fn cache_key(&self) -> String {
        let path = std::fs::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone());
        let digest = Sha256::digest(path.to_string_lossy().as_bytes());
        format!("{}_{}", self.name, &hex::encode(digest)[..12])
    }

    async fn fetch(&self, sport: &str, league: Option<&str>) -> Result<SourceSnapshot> {
        let snapshot = self.load().await?.filtered(sport, league);
        info!(
            source = %self.name,
            events = snapshot.events.len(),
            quotes = snapshot.quotes.len(),
            "Loaded snapshot from {}",
            self.path.display()
        );
        Ok(snapshot)
    }
}

/// What is stored on disk: the snapshot and when it was written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub cached_at: DateTime<Utc>,
    pub snapshot: SourceSnapshot,
}

/// Any source behind an on-disk cache.
///
/// A cache written less than the TTL ago is served without a live fetch.
/// Otherwise the live result is served and cached; if the live fetch fails the
/// cache is served however old it is, and with no cache an empty snapshot.
/// `fetch` never returns an error.
pub struct CachedSource<S> {
    inner: S,
    cache_dir: PathBuf,
    ttl: Duration,
    telemetry: SharedTelemetry,
}

impl<S: OddsSource> CachedSource<S> {
    pub fn new(inner: S, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            cache_dir: cache_dir.into(),
            ttl: Duration::seconds(DEFAULT_CACHE_TTL_SECS as i64),
            telemetry: TracingTelemetry::shared(),
        }
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl = Duration::seconds(ttl_secs as i64);
        self
    }

    pub fn with_telemetry(mut self, telemetry: SharedTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn cache_path(&self, sport: &str, league: Option<&str>) -> PathBuf {
        self.cache_dir.join(format!(
            "{}_{}_{}.json",
            self.inner.cache_key(),
            sport,
            league.unwrap_or("all")
        ))
    }

    async fn read_cache(path: &Path) -> Option<CacheEntry> {
        let content = tokio::fs::read_to_string(path).await.ok()?;
        match serde_json::from_str(&content) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(path = %path.display(), "Ignoring unreadable cache: {}", e);
                None
            }
        }
    }

    async fn write_cache(path: &Path, entry: &CacheEntry) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, serde_json::to_vec_pretty(entry)?).await?;
        Ok(())
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        Utc::now() - entry.cached_at < self.ttl
    }
}

#[async_trait]
impl<S: OddsSource> OddsSource for CachedSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn cache_key(&self) -> String {
        self.inner.cache_key()
    }

    async fn fetch(&self, sport: &str, league: Option<&str>) -> Result<SourceSnapshot> {
        let path = self.cache_path(sport, league);
        let cached = Self::read_cache(&path).await;

        if let Some(entry) = cached.as_ref().filter(|e| self.is_fresh(e)) {
            info!(source = %self.name(), path = %path.display(), "Using cached snapshot");
            return Ok(entry.snapshot.clone());
        }

        match self.inner.fetch(sport, league).await {
            Ok(live) => {
                let entry = CacheEntry {
                    cached_at: Utc::now(),
                    snapshot: live,
                };
                if let Err(e) = Self::write_cache(&path, &entry).await {
                    warn!(path = %path.display(), "Failed to write cache: {}", e);
                }
                Ok(entry.snapshot)
            }
            Err(e) => {
                self.telemetry.emit(Signal::SourceFallback {
                    source: self.name().to_string(),
                    reason: e.to_string(),
                    served_cache: cached.is_some(),
                });
                Ok(cached
                    .map(|entry| entry.snapshot)
                    .unwrap_or_else(|| SourceSnapshot::empty(self.name())))
            }
        }
    }
}
