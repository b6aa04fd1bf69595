//! Run management: the start/stop/download surface a front end talks to.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use super::control::{RunControl, RunFeed};
use super::controller::ScrollController;
use super::export::write_csv;
use super::run::RunSession;
use super::status::{StatusEvent, StatusSink};
use super::store::ContactStore;
use crate::core::config::ScrollTuning;
use crate::core::types::ContactRecord;
use crate::core::{ScoutError, ScoutResult};
use crate::scraping::page_adapter::PageAdapter;

/// Check that `current_url` is the page runs are allowed to start from.
pub fn validate_location(current_url: &str, expected: &str) -> ScoutResult<()> {
    let wrong = || ScoutError::WrongPage {
        expected: expected.to_string(),
        actual: current_url.to_string(),
    };
    let parsed = Url::parse(current_url).map_err(|_| wrong())?;
    let host_and_path = format!("{}{}", parsed.host_str().unwrap_or_default(), parsed.path());
    if host_and_path.contains(expected) || current_url.contains(expected) {
        Ok(())
    } else {
        Err(wrong())
    }
}

struct ActiveRun {
    id: Uuid,
    control: RunControl,
    store: Arc<ContactStore>,
    task: JoinHandle<RunSession>,
}

/// Owns at most one run at a time over a shared page adapter.
pub struct Harvester<A: PageAdapter + 'static> {
    adapter: Arc<A>,
    tuning: ScrollTuning,
    expected_location: String,
    status: Arc<dyn StatusSink>,
    feed_tx: watch::Sender<Option<RunFeed>>,
    active: Option<ActiveRun>,
    /// Store of the most recent run, kept after it finishes for export.
    latest: Option<Arc<ContactStore>>,
}

impl<A: PageAdapter + 'static> Harvester<A> {
    pub fn new(
        adapter: Arc<A>,
        tuning: ScrollTuning,
        expected_location: impl Into<String>,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        let (feed_tx, _rx) = watch::channel(None);
        Self {
            adapter,
            tuning,
            expected_location: expected_location.into(),
            status,
            feed_tx,
            active: None,
            latest: None,
        }
    }

    /// Where the response interceptor should write: always the current run.
    pub fn feed(&self) -> watch::Receiver<Option<RunFeed>> {
        self.feed_tx.subscribe()
    }

    fn say(&self, msg: impl Into<String>) {
        self.status.publish(StatusEvent::Message(msg.into()));
    }

    /// Start a fresh run from `current_url`, superseding any run still going.
    pub async fn start(&mut self, current_url: &str) -> ScoutResult<Uuid> {
        if let Err(e) = validate_location(current_url, &self.expected_location) {
            self.say(format!("Please navigate to {} first!", self.expected_location));
            return Err(e);
        }
        if let Err(e) = self.tuning.validate() {
            self.say(format!("Invalid scroll settings: {}", e));
            return Err(e);
        }

        if self.active.is_some() {
            info!("Superseding the previous run");
            self.shutdown().await;
        }

        let session = RunSession::new(&self.tuning);
        let id = session.id;
        let control = RunControl::new();
        let store = Arc::clone(&session.store);

        self.feed_tx.send_replace(Some(RunFeed {
            store: Arc::clone(&store),
            control: control.clone(),
        }));

        let controller = ScrollController::new(
            Arc::clone(&self.adapter),
            self.tuning.clone(),
            Arc::clone(&self.status),
            control.clone(),
        );
        let task = tokio::spawn(controller.run(session));

        self.latest = Some(Arc::clone(&store));
        self.active = Some(ActiveRun {
            id,
            control,
            store,
            task,
        });
        Ok(id)
    }

    /// Ask the active run to stop. Idempotent; returns `true` only when this call stopped it.
    pub fn stop(&self) -> bool {
        let Some(run) = self.active.as_ref() else {
            return false;
        };
        if run.control.stop() {
            info!("Stop requested for run {}", run.id);
            self.say("Process stopped by user");
            true
        } else {
            false
        }
    }

    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|run| run.control.is_running())
    }

    pub fn active_run_id(&self) -> Option<Uuid> {
        self.active.as_ref().map(|run| run.id)
    }

    /// Wait for the active run to reach its terminal state and return its session.
    pub async fn wait(&mut self) -> Option<RunSession> {
        let run = self.active.take()?;
        match run.task.await {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Run {} task failed: {}", run.id, e);
                run.control.stop();
                None
            }
        }
    }

    /// Stop the active run (if any) and wait for it to finish.
    pub async fn shutdown(&mut self) -> Option<RunSession> {
        if let Some(run) = self.active.as_ref() {
            run.control.stop();
        }
        self.wait().await
    }

    /// Results of the current or most recent run, in acceptance order.
    pub fn results(&self) -> Vec<ContactRecord> {
        self.active
            .as_ref()
            .map(|run| &run.store)
            .or(self.latest.as_ref())
            .map(|store| store.snapshot())
            .unwrap_or_default()
    }

    /// Write the results as `contacts_<date>.csv` into `dir`.
    /// `Ok(None)` (with a status message) when there is nothing to write.
    pub fn download(&self, dir: &Path, date: NaiveDate) -> ScoutResult<Option<PathBuf>> {
        let records = self.results();
        if records.is_empty() {
            self.say("No data to download");
            return Ok(None);
        }
        match write_csv(dir, &records, date) {
            Ok(path) => {
                info!("💾 Wrote {} contacts to {}", records.len(), path.display());
                self.say(format!("Downloaded {} contacts", records.len()));
                Ok(Some(path))
            }
            Err(e) => {
                warn!("Export to {} failed: {}", dir.display(), e);
                self.say("Error downloading data");
                Err(e)
            }
        }
    }
}
