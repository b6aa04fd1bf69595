//! The adaptive scroll-and-extract loop.
//!
//! One controller drives one [`RunSession`] from `Running` to a `Stopped(_)` state:
//! extract visible rows, adapt the scroll speed to the yield, scroll, publish stats,
//! suspend, repeat. The session is owned by the loop and handed back at the end.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::control::RunControl;
use super::run::RunSession;
use super::speed::{adapt_speed, apply_stall_backoff, SpeedChange};
use super::stats::RunStats;
use super::status::{StatusEvent, StatusSink};
use crate::core::config::ScrollTuning;
use crate::core::types::{RunState, StopReason};
use crate::core::ScoutResult;
use crate::scraping::page_adapter::PageAdapter;

/// Outcome of one loop iteration that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Iteration {
    Continue,
    Finished(StopReason),
}

pub struct ScrollController<A: PageAdapter> {
    adapter: Arc<A>,
    tuning: ScrollTuning,
    status: Arc<dyn StatusSink>,
    control: RunControl,
}

impl<A: PageAdapter> ScrollController<A> {
    pub fn new(
        adapter: Arc<A>,
        tuning: ScrollTuning,
        status: Arc<dyn StatusSink>,
        control: RunControl,
    ) -> Self {
        Self {
            adapter,
            tuning,
            status,
            control,
        }
    }

    pub fn control(&self) -> &RunControl {
        &self.control
    }

    fn say(&self, msg: impl Into<String>) {
        self.status.publish(StatusEvent::Message(msg.into()));
    }

    /// Sleep for `delay` unless stopped first. Returns whether the run should go on.
    async fn suspend(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.control.stopped() => {}
            }
        }
        self.control.is_running()
    }

    async fn settle(&self) {
        let delay = self.tuning.settle_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Drive `session` until it reaches a terminal state and hand it back.
    pub async fn run(self, mut session: RunSession) -> RunSession {
        session.state = RunState::Running;
        info!(
            "🚀 Run {} started (speed {}px, target {}/scroll, exhaustion after {} empty passes)",
            session.id,
            session.scroll.current_speed,
            self.tuning.target_contacts_per_scroll,
            self.tuning.exhaustion_threshold
        );
        self.say("Starting contact extraction...");

        self.prepare().await;

        let mut failures: u32 = 0;
        let reason = loop {
            if !self.control.is_running() {
                break StopReason::User;
            }

            match self.iterate(&mut session).await {
                Ok(Iteration::Finished(reason)) => break reason,
                Ok(Iteration::Continue) => failures = 0,
                Err(e) => {
                    failures += 1;
                    warn!(
                        "Run {}: iteration failed ({}/{} retries, {} contacts so far): {}",
                        session.id,
                        failures,
                        self.tuning.max_loop_retries,
                        session.total(),
                        e
                    );
                    if failures > self.tuning.max_loop_retries {
                        break StopReason::Error(e.to_string());
                    }
                    self.say("Error occurred. Retrying...");
                    if !self.suspend(self.tuning.retry_delay()).await {
                        break StopReason::User;
                    }
                    continue;
                }
            }

            self.status
                .publish(StatusEvent::Stats(RunStats::capture(&session, Instant::now())));

            if !self.suspend(self.tuning.iteration_delay()).await {
                break StopReason::User;
            }
        };

        self.finish(&mut session, reason);
        session
    }

    /// Let the page load, then bring the container back to the top. Best effort.
    async fn prepare(&self) {
        if !self.suspend(self.tuning.initial_load_delay()).await {
            return;
        }
        match self.adapter.locate_container().await {
            Ok(container) => match self.adapter.scroll_to_top(&container).await {
                Ok(()) => self.settle().await,
                Err(e) => debug!("scroll to top failed: {}", e),
            },
            Err(e) => warn!("Container not ready before first pass: {}", e),
        }
    }

    async fn iterate(&self, session: &mut RunSession) -> ScoutResult<Iteration> {
        let container = self.adapter.locate_container().await?;

        // Extraction
        let nodes = self.adapter.list_visible_contact_nodes(&container).await?;
        let candidates: Vec<_> = nodes
            .iter()
            .filter_map(|node| self.adapter.candidate(node))
            .collect();
        let yielded = session.store.extract_batch(candidates);
        let total = session.total();

        // Speed adaptation
        let change = adapt_speed(&mut session.scroll, yielded, &self.tuning);

        // No-yield tracking
        let scroll = &mut session.scroll;
        if yielded > 0 {
            scroll.consecutive_no_yield = 0;
            self.say(format!("Found {} new contacts. Total: {}", yielded, total));
        } else {
            scroll.consecutive_no_yield += 1;
            self.say(format!(
                "No new contacts found. Attempt {}/{}",
                scroll.consecutive_no_yield, self.tuning.exhaustion_threshold
            ));
        }
        debug!(
            "pass: {} rows, {} new, {} total, speed {}px",
            nodes.len(),
            yielded,
            total,
            scroll.current_speed
        );
        if !matches!(change, SpeedChange::Unchanged(_)) {
            info!("{}", change);
            self.say(change.to_string());
        }

        if scroll.consecutive_no_yield >= self.tuning.exhaustion_threshold {
            self.say(format!(
                "No new contacts found after {} attempts. Stopping...",
                scroll.consecutive_no_yield
            ));
            return Ok(Iteration::Finished(StopReason::Exhausted));
        }

        // Scroll attempt
        let moved = self.scroll_once(&container, scroll.current_speed).await?;
        scroll.total_scrolls += 1;
        if moved {
            scroll.successful_scrolls += 1;
            scroll.attempts_since_progress = 0;
            return Ok(Iteration::Continue);
        }

        scroll.attempts_since_progress += 1;
        self.say(format!(
            "Failed to scroll. Attempt {}/{}",
            scroll.attempts_since_progress, self.tuning.max_scroll_attempts
        ));

        if let Some(change) = apply_stall_backoff(scroll, &self.tuning) {
            info!("stalled ({} empty passes): {}", scroll.consecutive_no_yield, change);
            self.say(change.to_string());
        }

        if scroll.attempts_since_progress >= self.tuning.max_scroll_attempts {
            self.say("Max scroll attempts reached. Stopping...");
            return Ok(Iteration::Finished(StopReason::MaxAttempts));
        }

        Ok(Iteration::Continue)
    }

    /// Try each scroll strategy until the offset strictly increases.
    async fn scroll_once(&self, container: &A::Container, speed: u32) -> ScoutResult<bool> {
        let before = self.adapter.current_scroll_offset(container).await?;
        for &method in self.adapter.scroll_methods() {
            if let Err(e) = self.adapter.scroll_by(container, speed, method).await {
                debug!("scroll method {:?} failed: {}", method, e);
                continue;
            }
            self.settle().await;
            let after = self.adapter.current_scroll_offset(container).await?;
            if after > before {
                debug!("scrolled {} → {} via {:?}", before, after, method);
                return Ok(true);
            }
        }
        debug!("No scrolling method was successful (offset {}, speed {}px)", before, speed);
        Ok(false)
    }

    fn finish(&self, session: &mut RunSession, reason: StopReason) {
        self.control.stop();
        let stats = RunStats::capture(session, Instant::now());
        match &reason {
            StopReason::Error(_) | StopReason::MaxAttempts => warn!(
                "Run {} ended: {} ({} contacts, {}/{} scrolls ok)",
                session.id, reason, stats.total_contacts, stats.successful_scrolls, stats.total_scrolls
            ),
            _ => info!(
                "✅ Run {} ended: {} ({} contacts, {}/{} scrolls ok)",
                session.id, reason, stats.total_contacts, stats.successful_scrolls, stats.total_scrolls
            ),
        }
        session.state = RunState::Stopped(reason);
        self.status.publish(StatusEvent::Stats(stats));
        self.status.publish(StatusEvent::Finished {
            state: session.state.clone(),
            total: session.total(),
        });
    }
}
