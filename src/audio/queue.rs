use std::collections::VecDeque;
use tracing::{debug, info};

/// A resolved, playable track together with what we show about it.
///
/// Built once from the resolver's answer and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRequest {
    source_url: String,
    title: String,
    thumbnail: String,
    requested_by: String,
}

impl TrackRequest {
    pub fn new(
        source_url: impl Into<String>,
        title: impl Into<String>,
        thumbnail: impl Into<String>,
        requested_by: impl Into<String>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            title: title.into(),
            thumbnail: thumbnail.into(),
            requested_by: requested_by.into(),
        }
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn thumbnail(&self) -> &str {
        &self.thumbnail
    }
    pub fn requested_by(&self) -> &str {
        &self.requested_by
    }
}

/// FIFO queue of a single guild plus its loop flag.
///
/// Looping is "requeue-after-play": the track that finishes goes back to the
/// tail before the next one is popped. With nothing else queued the same
/// track therefore plays again; otherwise it waits behind everything queued.
#[derive(Debug, Default)]
pub struct GuildQueue {
    items: VecDeque<TrackRequest>,
    loop_enabled: bool,
}

impl GuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loop(loop_enabled: bool) -> Self {
        Self {
            items: VecDeque::new(),
            loop_enabled,
        }
    }

    /// Appends a track and returns its 1-based position in the queue.
    pub fn push(&mut self, track: TrackRequest) -> usize {
        info!("➕ Added to queue: {}", track.title());
        self.items.push_back(track);
        self.items.len()
    }

    /// Pops the next track, requeueing `finished` first when looping.
    pub fn next_track(&mut self, finished: Option<TrackRequest>) -> Option<TrackRequest> {
        if let Some(finished) = finished {
            if self.loop_enabled {
                debug!("🔁 Requeueing {} for loop", finished.title());
                self.items.push_back(finished);
            }
        }

        let next = self.items.pop_front();
        match &next {
            Some(track) => debug!("➡️ Next in queue: {}", track.title()),
            None => debug!("📭 Queue is empty"),
        }
        next
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.loop_enabled = !self.loop_enabled;
        self.loop_enabled
    }

    pub fn is_loop(&self) -> bool {
        self.loop_enabled
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.loop_enabled = false;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn tracks(&self) -> impl Iterator<Item = &TrackRequest> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(title: &str) -> TrackRequest {
        TrackRequest::new(format!("https://cdn.example/{title}"), title, "", "tester")
    }

    fn titles(queue: &GuildQueue) -> Vec<&str> {
        queue.tracks().map(TrackRequest::title).collect()
    }

    #[test]
    fn pops_in_insertion_order() {
        let mut queue = GuildQueue::new();
        assert_eq!(queue.push(track("a")), 1);
        assert_eq!(queue.push(track("b")), 2);

        assert_eq!(queue.next_track(None).map(|t| t.title().to_string()), Some("a".into()));
        assert_eq!(queue.next_track(Some(track("a"))).map(|t| t.title().to_string()), Some("b".into()));
        assert!(queue.next_track(Some(track("b"))).is_none());
    }

    #[test]
    fn loop_requeues_finished_track_behind_queued_ones() {
        let mut queue = GuildQueue::with_loop(true);
        queue.push(track("b"));
        queue.push(track("c"));

        let next = queue.next_track(Some(track("a")));
        assert_eq!(next, Some(track("b")));
        assert_eq!(titles(&queue), vec!["c", "a"]);
    }

    #[test]
    fn loop_with_empty_queue_replays_same_track() {
        let mut queue = GuildQueue::with_loop(true);
        let mut playing = track("only");

        for _ in 0..3 {
            playing = queue.next_track(Some(playing)).expect("loop keeps the track");
            assert_eq!(playing.title(), "only");
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn toggle_twice_restores_flag_and_keeps_items() {
        let mut queue = GuildQueue::new();
        queue.push(track("a"));

        assert!(queue.toggle_loop());
        assert!(!queue.toggle_loop());
        assert_eq!(titles(&queue), vec!["a"]);
    }

    #[test]
    fn clear_drops_items_and_loop() {
        let mut queue = GuildQueue::with_loop(true);
        queue.push(track("a"));
        queue.clear();

        assert!(queue.is_empty());
        assert!(!queue.is_loop());
    }
}
