use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::Instant};
use tracing::info;

/// Process-wide play counts keyed by track title.
///
/// Counts only live in memory and are wiped by [`SongStats::reset`], which
/// the background task from [`spawn_reset_task`] calls on a fixed period.
#[derive(Debug)]
pub struct SongStats {
    counts: DashMap<String, u64>,
    last_reset: RwLock<DateTime<Utc>>,
}

impl SongStats {
    pub fn new() -> Self {
        Self {
            counts: DashMap::new(),
            last_reset: RwLock::new(Utc::now()),
        }
    }

    /// Counts one more play of `title` and returns the new total.
    pub fn record(&self, title: &str) -> u64 {
        let mut count = self.counts.entry(title.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn count(&self, title: &str) -> u64 {
        self.counts.get(title).map(|c| *c).unwrap_or(0)
    }

    /// The `limit` most played titles, highest first. Ties sort by title.
    pub fn top(&self, limit: usize) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64)> = self
            .counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();

        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(limit);
        entries
    }

    pub fn reset(&self) {
        self.counts.clear();
        *self.last_reset.write() = Utc::now();
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn last_reset(&self) -> DateTime<Utc> {
        *self.last_reset.read()
    }
}

impl Default for SongStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears `stats` every `period`, first one full period after start.
pub fn spawn_reset_task(stats: Arc<SongStats>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            stats.reset();
            info!("🧹 Song statistics reset at {}", stats.last_reset());
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn top_sorts_by_count_then_title() {
        let stats = SongStats::new();
        for title in ["b", "a", "c", "c", "a", "c"] {
            stats.record(title);
        }

        assert_eq!(
            stats.top(5),
            vec![("c".to_string(), 3), ("a".to_string(), 2), ("b".to_string(), 1)]
        );
        assert_eq!(stats.top(1), vec![("c".to_string(), 3)]);
    }

    #[test]
    fn unknown_title_counts_zero() {
        let stats = SongStats::new();
        assert_eq!(stats.count("never played"), 0);
        assert!(stats.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn counts_are_cleared_after_reset_period() {
        let stats = Arc::new(SongStats::new());
        stats.record("song");
        stats.record("song");
        let before = stats.last_reset();

        let period = Duration::from_secs(12 * 60 * 60);
        let task = spawn_reset_task(stats.clone(), period);

        tokio::time::sleep(period / 2).await;
        assert_eq!(stats.count("song"), 2);

        tokio::time::sleep(period / 2 + Duration::from_secs(1)).await;
        assert_eq!(stats.count("song"), 0);
        assert!(stats.top(5).is_empty());
        assert!(stats.last_reset() >= before);

        task.abort();
    }
}
