use serenity::model::id::GuildId;
use std::{fmt, sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::Instant};
use tracing::{debug, info, warn};

use super::{coordinator::SessionCoordinator, session::SessionState};

/// What the reaper knows about a session when deciding to tear it down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepCandidate {
    pub guild_id: GuildId,
    pub state: SessionState,
    pub queue_len: usize,
    pub human_listeners: usize,
}

type Eligibility = dyn Fn(&SweepCandidate) -> bool + Send + Sync;

/// How often the reaper runs and which sessions it removes.
#[derive(Clone)]
pub struct ReaperPolicy {
    interval: Duration,
    eligibility: Arc<Eligibility>,
}

impl ReaperPolicy {
    /// Policy with the default rule: not playing, and nobody listening or nothing queued.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            eligibility: Arc::new(idle_and_abandoned),
        }
    }

    pub fn with_eligibility(
        mut self,
        eligibility: impl Fn(&SweepCandidate) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.eligibility = Arc::new(eligibility);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_eligible(&self, candidate: &SweepCandidate) -> bool {
        (self.eligibility)(candidate)
    }
}

impl fmt::Debug for ReaperPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaperPolicy")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

pub fn idle_and_abandoned(candidate: &SweepCandidate) -> bool {
    candidate.state != SessionState::Playing
        && (candidate.human_listeners == 0 || candidate.queue_len == 0)
}

/// Sweeps `coordinator` every policy interval until the coordinator goes away.
pub fn spawn(coordinator: SessionCoordinator, policy: ReaperPolicy) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("🧹 Idle session reaper running every {:?}", policy.interval());
        let mut ticker = tokio::time::interval_at(Instant::now() + policy.interval(), policy.interval());

        loop {
            ticker.tick().await;
            match coordinator.sweep(policy.clone()).await {
                Ok(reaped) if reaped.is_empty() => debug!("Reaper sweep found nothing idle"),
                Ok(reaped) => info!("🧹 Reaper closed {} idle session(s)", reaped.len()),
                Err(e) => {
                    warn!("Reaper stopping: {}", e);
                    break;
                }
            }
        }
    })
}
