//! Page-specific, read-only view of a directory page plus the scroll primitives.
//!
//! The controller only talks to this trait, so the loop can run against a live CDP page
//! ([`super::cdp_adapter::ChromiumPageAdapter`]) or an in-memory fake in tests.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::core::types::ContactRecord;
use crate::core::ScoutResult;

/// One way of moving the container down. Adapters try these in order until the offset moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollMethod {
    /// `scrollTop += delta`
    DirectOffset,
    /// `scrollTo({ top: current + delta, behavior: 'smooth' })`
    SmoothScrollTo,
    /// `scrollBy(0, delta)`
    ScrollBy,
    /// Scroll the last rendered row into view; ignores `delta`.
    LastItemIntoView,
}

impl ScrollMethod {
    pub const ALL: [ScrollMethod; 4] = [
        ScrollMethod::DirectOffset,
        ScrollMethod::SmoothScrollTo,
        ScrollMethod::ScrollBy,
        ScrollMethod::LastItemIntoView,
    ];
}

#[async_trait]
pub trait PageAdapter: Send + Sync {
    /// Handle to the scrollable contact container.
    type Container: Send + Sync;
    /// Snapshot of one rendered contact row.
    type Node: Send;

    /// Fails with [`crate::core::ScoutError::ContainerNotFound`] when the container is absent.
    async fn locate_container(&self) -> ScoutResult<Self::Container>;

    async fn list_visible_contact_nodes(
        &self,
        container: &Self::Container,
    ) -> ScoutResult<Vec<Self::Node>>;

    fn read_email(&self, node: &Self::Node) -> Option<String>;

    /// Cleaned display name (see [`clean_display_name`]); empty when the row has none.
    fn read_display_name(&self, node: &Self::Node) -> String;

    async fn current_scroll_offset(&self, container: &Self::Container) -> ScoutResult<i64>;

    /// Apply one scroll and return the offset read right after applying it.
    async fn scroll_by(
        &self,
        container: &Self::Container,
        delta: u32,
        method: ScrollMethod,
    ) -> ScoutResult<i64>;

    /// Scroll back to the top before a run. Best effort.
    async fn scroll_to_top(&self, _container: &Self::Container) -> ScoutResult<()> {
        Ok(())
    }

    /// Strategies tried in order on every scroll attempt.
    fn scroll_methods(&self) -> &[ScrollMethod] {
        &ScrollMethod::ALL
    }

    /// Build a candidate record from a row. Rows without a usable email yield `None`.
    fn candidate(&self, node: &Self::Node) -> Option<ContactRecord> {
        let email = self.read_email(node)?;
        if email.trim().is_empty() {
            return None;
        }
        Some(ContactRecord::new(self.read_display_name(node), email))
    }
}

static ID_SUFFIX: OnceLock<Regex> = OnceLock::new();

fn id_suffix() -> &'static Regex {
    ID_SUFFIX.get_or_init(|| Regex::new(r"\s*-\s*-\s*\([^)]+\)\s*$").expect("valid id-suffix regex"))
}

/// Strip a trailing directory id of the form `- - (PA2433017013001)` and trim.
pub fn clean_display_name(raw: &str) -> String {
    id_suffix().replace(raw.trim(), "").trim().to_string()
}
