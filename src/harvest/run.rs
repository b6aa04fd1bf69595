use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::store::ContactStore;
use crate::core::config::ScrollTuning;
use crate::core::types::{ContactRecord, RunState};

/// Scroll-loop counters. Mutated once per iteration, rebuilt for every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollState {
    /// Pixels per scroll attempt.
    pub current_speed: u32,
    /// Failed scroll attempts since the container last moved.
    pub attempts_since_progress: u32,
    pub total_scrolls: u64,
    pub successful_scrolls: u64,
    pub consecutive_no_yield: u32,
    pub optimal_speed_found: bool,
}

impl ScrollState {
    pub fn new(tuning: &ScrollTuning) -> Self {
        Self {
            current_speed: tuning
                .initial_speed
                .clamp(tuning.min_speed, tuning.max_speed.max(tuning.min_speed)),
            attempts_since_progress: 0,
            total_scrolls: 0,
            successful_scrolls: 0,
            consecutive_no_yield: 0,
            optimal_speed_found: false,
        }
    }
}

/// Everything one run owns. Created at start, handed back when the run ends so the
/// results stay exportable whatever the terminal state was.
#[derive(Debug)]
pub struct RunSession {
    pub id: Uuid,
    pub state: RunState,
    pub started_at: Instant,
    pub started_wall: DateTime<Utc>,
    pub store: Arc<ContactStore>,
    pub scroll: ScrollState,
}

impl RunSession {
    pub fn new(tuning: &ScrollTuning) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: RunState::Idle,
            started_at: Instant::now(),
            started_wall: Utc::now(),
            store: Arc::new(ContactStore::new()),
            scroll: ScrollState::new(tuning),
        }
    }

    pub fn results(&self) -> Vec<ContactRecord> {
        self.store.snapshot()
    }

    pub fn total(&self) -> usize {
        self.store.len()
    }
}
