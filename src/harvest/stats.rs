use std::fmt;
use std::time::{Duration, Instant};

use super::run::RunSession;

/// Derived run statistics. A pure function of the session and a clock reading.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    pub elapsed: Duration,
    pub total_contacts: usize,
    /// 0 until a full minute has elapsed.
    pub contacts_per_minute: f64,
    pub total_scrolls: u64,
    pub successful_scrolls: u64,
    /// 0 when nothing has been scrolled yet.
    pub scroll_success_rate: f64,
    pub current_speed: u32,
    pub optimal_speed_found: bool,
}

impl RunStats {
    pub fn capture(session: &RunSession, now: Instant) -> Self {
        let elapsed = now.saturating_duration_since(session.started_at);
        let total_contacts = session.total();
        let scroll = &session.scroll;

        let contacts_per_minute = if elapsed >= Duration::from_secs(60) {
            total_contacts as f64 / (elapsed.as_secs_f64() / 60.0)
        } else {
            0.0
        };
        let scroll_success_rate = if scroll.total_scrolls == 0 {
            0.0
        } else {
            scroll.successful_scrolls as f64 / scroll.total_scrolls as f64
        };

        Self {
            elapsed,
            total_contacts,
            contacts_per_minute,
            total_scrolls: scroll.total_scrolls,
            successful_scrolls: scroll.successful_scrolls,
            scroll_success_rate,
            current_speed: scroll.current_speed,
            optimal_speed_found: scroll.optimal_speed_found,
        }
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.elapsed.as_secs();
        write!(
            f,
            "Running {:02}:{:02} | {} contacts | {:.1}/min | {:.0}% scroll success | speed {}px{}",
            secs / 60,
            secs % 60,
            self.total_contacts,
            self.contacts_per_minute,
            self.scroll_success_rate * 100.0,
            self.current_speed,
            if self.optimal_speed_found { " (optimal)" } else { "" }
        )
    }
}
