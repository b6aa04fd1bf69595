//! In-memory stand-in for a virtualized directory page.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use contact_scout::core::config::ScrollTuning;
use contact_scout::core::{ScoutError, ScoutResult};
use contact_scout::scraping::{clean_display_name, PageAdapter, ScrollMethod};

pub fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Default tuning with every delay zeroed.
pub fn fast_tuning() -> ScrollTuning {
    ScrollTuning::default().without_delays()
}

/// No delays and a speed pinned to `px`, so every scroll moves exactly `px`.
pub fn pinned_speed(px: u32) -> ScrollTuning {
    ScrollTuning {
        initial_speed: px,
        min_speed: px,
        max_speed: px,
        fallback_speed: px,
        ..fast_tuning()
    }
}

pub fn email_of(i: usize) -> String {
    format!("user{:03}@corp.io", i)
}

pub fn name_of(i: usize) -> String {
    format!("Person {:03}", i)
}

#[derive(Debug, Clone)]
pub struct FakeRow {
    pub email: Option<String>,
    pub raw_name: String,
}

#[derive(Debug)]
pub struct FakeContainer;

type ScrollHook = Box<dyn Fn(usize) + Send + Sync>;

/// `rows` contacts of `row_height` px, `visible_rows` of them rendered at a time.
pub struct FakeDirectory {
    rows: Vec<FakeRow>,
    row_height: i64,
    visible_rows: usize,
    offset: Mutex<i64>,
    stuck: AtomicBool,
    container_present: AtomicBool,
    failing_lists: AtomicU32,
    list_calls: AtomicUsize,
    scroll_calls: AtomicUsize,
    on_scroll: Mutex<Option<ScrollHook>>,
}

impl FakeDirectory {
    /// Rows named `Person NNN - - (IDNNN)` with emails `userNNN@corp.io`.
    pub fn new(count: usize, row_height: i64, visible_rows: usize) -> Self {
        let rows = (0..count)
            .map(|i| FakeRow {
                email: Some(email_of(i)),
                raw_name: format!("{} - - (ID{:03})", name_of(i), i),
            })
            .collect();
        Self::with_rows(rows, row_height, visible_rows)
    }

    pub fn with_rows(rows: Vec<FakeRow>, row_height: i64, visible_rows: usize) -> Self {
        Self {
            rows,
            row_height,
            visible_rows,
            offset: Mutex::new(0),
            stuck: AtomicBool::new(false),
            container_present: AtomicBool::new(true),
            failing_lists: AtomicU32::new(0),
            list_calls: AtomicUsize::new(0),
            scroll_calls: AtomicUsize::new(0),
            on_scroll: Mutex::new(None),
        }
    }

    /// The container ignores every scroll.
    pub fn stuck(self) -> Self {
        self.stuck.store(true, Ordering::SeqCst);
        self
    }

    pub fn without_container(self) -> Self {
        self.container_present.store(false, Ordering::SeqCst);
        self
    }

    /// The next `n` row listings fail.
    pub fn fail_next_lists(&self, n: u32) {
        self.failing_lists.store(n, Ordering::SeqCst);
    }

    /// Called with the 1-based scroll call count after each scroll is applied.
    pub fn on_scroll(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        *self.on_scroll.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn scroll_calls(&self) -> usize {
        self.scroll_calls.load(Ordering::SeqCst)
    }

    pub fn offset(&self) -> i64 {
        *self.offset.lock().unwrap()
    }

    fn max_offset(&self) -> i64 {
        let hidden = self.rows.len().saturating_sub(self.visible_rows) as i64;
        hidden * self.row_height
    }
}

#[async_trait]
impl PageAdapter for FakeDirectory {
    type Container = FakeContainer;
    type Node = FakeRow;

    async fn locate_container(&self) -> ScoutResult<FakeContainer> {
        if self.container_present.load(Ordering::SeqCst) {
            Ok(FakeContainer)
        } else {
            Err(ScoutError::ContainerNotFound {
                selector: ".fake-container".to_string(),
            })
        }
    }

    async fn list_visible_contact_nodes(&self, _container: &FakeContainer) -> ScoutResult<Vec<FakeRow>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_lists
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ScoutError::Evaluation("row listing failed".to_string()));
        }
        let first = (self.offset() / self.row_height) as usize;
        Ok(self
            .rows
            .iter()
            .skip(first)
            .take(self.visible_rows)
            .cloned()
            .collect())
    }

    fn read_email(&self, node: &FakeRow) -> Option<String> {
        node.email.clone()
    }

    fn read_display_name(&self, node: &FakeRow) -> String {
        clean_display_name(&node.raw_name)
    }

    async fn current_scroll_offset(&self, _container: &FakeContainer) -> ScoutResult<i64> {
        Ok(self.offset())
    }

    async fn scroll_by(&self, _container: &FakeContainer, delta: u32, method: ScrollMethod) -> ScoutResult<i64> {
        let calls = self.scroll_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let after = {
            let mut offset = self.offset.lock().unwrap();
            if !self.stuck.load(Ordering::SeqCst) {
                let step = match method {
                    ScrollMethod::LastItemIntoView => self.visible_rows as i64 * self.row_height,
                    _ => i64::from(delta),
                };
                *offset = (*offset + step).min(self.max_offset());
            }
            *offset
        };
        if let Some(hook) = self.on_scroll.lock().unwrap().as_ref() {
            hook(calls);
        }
        Ok(after)
    }

    async fn scroll_to_top(&self, _container: &FakeContainer) -> ScoutResult<()> {
        *self.offset.lock().unwrap() = 0;
        Ok(())
    }
}
