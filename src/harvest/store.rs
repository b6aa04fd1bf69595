use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use crate::core::types::ContactRecord;

#[derive(Default)]
struct Inner {
    seen: HashSet<String>,
    records: Vec<ContactRecord>,
}

/// Seen-email set plus results in acceptance order. Append-only for one run.
///
/// DOM extraction and the response interceptor write concurrently, so the
/// check-then-insert in [`ContactStore::try_add`] happens under one lock.
#[derive(Default)]
pub struct ContactStore {
    inner: Mutex<Inner>,
}

impl ContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic elsewhere must not lose what was already harvested.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Accept `record` iff its email is non-empty and unseen.
    pub fn try_add(&self, record: ContactRecord) -> bool {
        if record.email().is_empty() {
            return false;
        }
        let mut inner = self.lock();
        if !inner.seen.insert(record.email().to_string()) {
            return false;
        }
        inner.records.push(record);
        true
    }

    /// Feed a batch of candidates; returns how many were accepted.
    pub fn extract_batch<I>(&self, candidates: I) -> usize
    where
        I: IntoIterator<Item = ContactRecord>,
    {
        let mut inner = self.lock();
        let mut accepted = 0;
        for record in candidates {
            if record.email().is_empty() || !inner.seen.insert(record.email().to_string()) {
                continue;
            }
            inner.records.push(record);
            accepted += 1;
        }
        accepted
    }

    pub fn contains(&self, email: &str) -> bool {
        self.lock().seen.contains(email)
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the results in acceptance order.
    pub fn snapshot(&self) -> Vec<ContactRecord> {
        self.lock().records.clone()
    }
}

impl std::fmt::Debug for ContactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactStore")
            .field("records", &self.len())
            .finish()
    }
}
