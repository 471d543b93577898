//! Stale-while-revalidate cache for category batches.
//!
//! Two horizons per entry: inside the soft TTL a read is fresh, between
//! soft and hard it is served stale (callers may arm one background
//! refresh), past the hard TTL it is a plain miss. Writes replace the
//! entry wholesale, readers only ever clone an `Arc`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use metrics::counter;

use crate::model::{Article, Variant};

/// Time source, injected so tests can step it by hand.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Deterministic clock for tests.
#[derive(Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self(AtomicU64::new(start_ms))
    }

    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

struct CacheEntry {
    articles: Arc<Vec<Article>>,
    captured_at_ms: u64,
    refresh_in_flight: AtomicBool,
}

#[derive(Debug)]
pub enum CacheRead {
    Miss,
    Hit {
        articles: Arc<Vec<Article>>,
        stale: bool,
    },
}

pub struct SwrCache {
    entries: RwLock<HashMap<(String, Variant), Arc<CacheEntry>>>,
    clock: Arc<dyn Clock>,
    soft_ttl_ms: u64,
    hard_ttl_ms: u64,
}

fn key(category: &str, variant: Variant) -> (String, Variant) {
    // Same normalization as the registry lookup, so one category cannot
    // occupy two entries.
    (category.trim().to_ascii_lowercase(), variant)
}

impl SwrCache {
    pub fn new(soft_ttl_ms: u64, hard_ttl_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            soft_ttl_ms,
            hard_ttl_ms: hard_ttl_ms.max(soft_ttl_ms),
        }
    }

    pub fn with_system_clock(soft_ttl_ms: u64, hard_ttl_ms: u64) -> Self {
        Self::new(soft_ttl_ms, hard_ttl_ms, Arc::new(SystemClock))
    }

    pub fn get(&self, category: &str, variant: Variant) -> CacheRead {
        let now = self.clock.now_ms();
        let Ok(map) = self.entries.read() else {
            return CacheRead::Miss;
        };
        let Some(entry) = map.get(&key(category, variant)) else {
            counter!("cache_reads_total", "outcome" => "miss").increment(1);
            return CacheRead::Miss;
        };
        let age = now.saturating_sub(entry.captured_at_ms);
        if age > self.hard_ttl_ms {
            counter!("cache_reads_total", "outcome" => "miss").increment(1);
            return CacheRead::Miss;
        }
        let stale = age > self.soft_ttl_ms;
        let outcome = if stale { "stale" } else { "fresh" };
        counter!("cache_reads_total", "outcome" => outcome).increment(1);
        CacheRead::Hit {
            articles: Arc::clone(&entry.articles),
            stale,
        }
    }

    /// Replaces the entry wholesale. The fresh entry carries a cleared
    /// refresh flag, so staleness can arm a refresh again later.
    pub fn set(&self, category: &str, variant: Variant, articles: Vec<Article>) {
        let entry = Arc::new(CacheEntry {
            articles: Arc::new(articles),
            captured_at_ms: self.clock.now_ms(),
            refresh_in_flight: AtomicBool::new(false),
        });
        if let Ok(mut map) = self.entries.write() {
            map.insert(key(category, variant), entry);
        }
    }

    /// Claims the single background refresh slot for an entry. Returns
    /// true for exactly one caller until the flag is released by a new
    /// `set` or an `abort_refresh`.
    pub fn begin_refresh(&self, category: &str, variant: Variant) -> bool {
        let Ok(map) = self.entries.read() else {
            return false;
        };
        let Some(entry) = map.get(&key(category, variant)) else {
            return false;
        };
        let armed = entry
            .refresh_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if armed {
            counter!("cache_refresh_armed_total").increment(1);
        }
        armed
    }

    /// Releases the refresh slot without publishing new data, used when
    /// a background refresh fails.
    pub fn abort_refresh(&self, category: &str, variant: Variant) {
        if let Ok(map) = self.entries.read() {
            if let Some(entry) = map.get(&key(category, variant)) {
                entry.refresh_in_flight.store(false, Ordering::Release);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_at(start_ms: u64, soft: u64, hard: u64) -> (SwrCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start_ms));
        let cache = SwrCache::new(soft, hard, clock.clone());
        (cache, clock)
    }

    #[test]
    fn fresh_then_stale_then_miss() {
        let (cache, clock) = cache_at(1_000, 60_000, 600_000);
        cache.set("politics", Variant::Fast, Vec::new());

        match cache.get("politics", Variant::Fast) {
            CacheRead::Hit { stale, .. } => assert!(!stale),
            CacheRead::Miss => panic!("expected fresh hit"),
        }

        clock.advance(60_001);
        match cache.get("politics", Variant::Fast) {
            CacheRead::Hit { stale, .. } => assert!(stale),
            CacheRead::Miss => panic!("expected stale hit"),
        }

        clock.advance(540_000);
        assert!(matches!(
            cache.get("politics", Variant::Fast),
            CacheRead::Miss
        ));
    }

    #[test]
    fn soft_ttl_boundary_is_still_fresh() {
        let (cache, clock) = cache_at(0, 60_000, 600_000);
        cache.set("world", Variant::Full, Vec::new());
        // Staleness starts strictly after the soft TTL.
        clock.advance(60_000);
        match cache.get("world", Variant::Full) {
            CacheRead::Hit { stale, .. } => assert!(!stale),
            CacheRead::Miss => panic!("expected fresh hit"),
        }
    }

    #[test]
    fn hard_ttl_boundary_is_still_served() {
        let (cache, clock) = cache_at(0, 60_000, 600_000);
        cache.set("world", Variant::Full, Vec::new());
        clock.advance(600_000);
        match cache.get("world", Variant::Full) {
            CacheRead::Hit { stale, .. } => assert!(stale),
            CacheRead::Miss => panic!("expected stale hit at the hard boundary"),
        }
        clock.advance(1);
        assert!(matches!(cache.get("world", Variant::Full), CacheRead::Miss));
    }

    #[test]
    fn variants_and_categories_are_separate_entries() {
        let (cache, _clock) = cache_at(0, 60_000, 600_000);
        cache.set("politics", Variant::Fast, Vec::new());
        assert!(matches!(
            cache.get("politics", Variant::Full),
            CacheRead::Miss
        ));
        assert!(matches!(cache.get("world", Variant::Fast), CacheRead::Miss));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn category_lookup_is_case_insensitive() {
        let (cache, _clock) = cache_at(0, 60_000, 600_000);
        cache.set("Politics", Variant::Fast, Vec::new());
        assert!(matches!(
            cache.get("POLITICS", Variant::Fast),
            CacheRead::Hit { .. }
        ));
    }

    #[test]
    fn padded_category_shares_the_entry() {
        let (cache, _clock) = cache_at(0, 60_000, 600_000);
        cache.set(" politics ", Variant::Fast, Vec::new());
        assert!(matches!(
            cache.get("politics", Variant::Fast),
            CacheRead::Hit { .. }
        ));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn refresh_slot_is_claimed_once() {
        let (cache, clock) = cache_at(0, 60_000, 600_000);
        cache.set("politics", Variant::Fast, Vec::new());
        clock.advance(61_000);

        assert!(cache.begin_refresh("politics", Variant::Fast));
        assert!(!cache.begin_refresh("politics", Variant::Fast));

        // A published refresh re-arms the slot.
        cache.set("politics", Variant::Fast, Vec::new());
        assert!(cache.begin_refresh("politics", Variant::Fast));
    }

    #[test]
    fn aborted_refresh_re_arms_the_slot() {
        let (cache, _clock) = cache_at(0, 60_000, 600_000);
        cache.set("politics", Variant::Fast, Vec::new());
        assert!(cache.begin_refresh("politics", Variant::Fast));
        cache.abort_refresh("politics", Variant::Fast);
        assert!(cache.begin_refresh("politics", Variant::Fast));
    }

    #[test]
    fn refresh_on_unknown_key_is_refused() {
        let (cache, _clock) = cache_at(0, 60_000, 600_000);
        assert!(!cache.begin_refresh("nowhere", Variant::Fast));
    }

    #[test]
    fn hard_ttl_never_undercuts_soft_ttl() {
        let (cache, clock) = cache_at(0, 60_000, 10_000);
        cache.set("politics", Variant::Fast, Vec::new());
        clock.advance(30_000);
        // Misconfigured hard TTL is raised to the soft TTL, so this read
        // still hits.
        assert!(matches!(
            cache.get("politics", Variant::Fast),
            CacheRead::Hit { .. }
        ));
    }
}
