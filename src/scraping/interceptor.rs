//! Network response interception.
//!
//! Every response the directory page receives is observed over CDP (`Network.responseReceived`
//! + `Network.loadingFinished` + `Network.getResponseBody`). Delivery to the page is never
//! touched. Bodies from contact-like endpoints are decoded as JSON and walked for objects
//! carrying an `email`; hits go into the active run's store like DOM rows do.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use aho_corasick::AhoCorasick;
use base64::Engine as _;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventResponseReceived,
    GetResponseBodyParams, RequestId,
};
use chromiumoxide::Page;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::page_adapter::clean_display_name;
use crate::core::types::ContactRecord;
use crate::core::ScoutResult;
use crate::harvest::control::RunFeed;
use crate::harvest::status::{StatusEvent, StatusSink};

/// URL fragments that mark a response as possibly carrying contacts.
pub const CONTACT_URL_KEYWORDS: &[&str] = &["contacts", "directory", "search", "users", "members"];

/// Nesting ceiling for the JSON walk.
pub const MAX_JSON_DEPTH: usize = 64;

const NAME_FIELDS: [&str; 3] = ["name", "displayName", "fullName"];

static KEYWORD_MATCHER: OnceLock<AhoCorasick> = OnceLock::new();

fn keyword_matcher() -> &'static AhoCorasick {
    KEYWORD_MATCHER
        .get_or_init(|| AhoCorasick::new(CONTACT_URL_KEYWORDS).expect("valid keyword patterns"))
}

/// `true` when the URL textually contains one of [`CONTACT_URL_KEYWORDS`].
pub fn is_contact_endpoint(url: &str) -> bool {
    keyword_matcher().is_match(url)
}

/// Decode a response body as JSON. `None` for anything that is not JSON.
pub fn decode_body(body: &str, base64_encoded: bool) -> Option<Value> {
    if base64_encoded {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(body.trim())
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    } else {
        serde_json::from_str(body).ok()
    }
}

fn name_of(obj: &serde_json::Map<String, Value>) -> String {
    NAME_FIELDS
        .iter()
        .filter_map(|key| match obj.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .next()
        .map(|raw| clean_display_name(&raw))
        .unwrap_or_default()
}

fn walk(value: &Value, depth: usize, out: &mut Vec<ContactRecord>) {
    if depth > MAX_JSON_DEPTH {
        return;
    }
    match value {
        Value::Object(obj) => {
            if let Some(Value::String(email)) = obj.get("email") {
                if !email.trim().is_empty() {
                    out.push(ContactRecord::new(name_of(obj), email));
                }
            }
            for child in obj.values() {
                walk(child, depth + 1, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                walk(child, depth + 1, out);
            }
        }
        _ => {}
    }
}

/// Every email-bearing object in `value`, in document order.
pub fn contacts_from_json(value: &Value) -> Vec<ContactRecord> {
    let mut out = Vec::new();
    walk(value, 0, &mut out);
    out
}

/// Push one decoded response into the active run. Returns the number of new contacts.
pub fn ingest_response(feed: &RunFeed, value: &Value) -> usize {
    if !feed.is_live() {
        return 0;
    }
    feed.store.extract_batch(contacts_from_json(value))
}

/// Network lifecycle events the interceptor follows, reduced to what it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    Response { request_id: String, url: String },
    Finished { request_id: String },
    Failed { request_id: String, error: String },
}

/// Next event across the three streams; `None` once all of them have closed.
///
/// Polled in lifecycle order: a request's `Response` is always taken before its
/// `Finished` or `Failed` when both are already buffered.
pub async fn next_network_event<R, X, F>(
    responses: &mut R,
    failed: &mut X,
    finished: &mut F,
) -> Option<NetworkEvent>
where
    R: Stream<Item = NetworkEvent> + Unpin,
    X: Stream<Item = NetworkEvent> + Unpin,
    F: Stream<Item = NetworkEvent> + Unpin,
{
    tokio::select! {
        biased;
        Some(ev) = responses.next() => Some(ev),
        Some(ev) = failed.next() => Some(ev),
        Some(ev) = finished.next() => Some(ev),
        else => None,
    }
}

/// Contact requests whose response headers arrived but whose body is not complete yet.
#[derive(Debug, Default)]
pub struct PendingBodies {
    by_request: HashMap<String, String>,
}

impl PendingBodies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track one event. Returns `(request_id, url)` when a contact response body is ready.
    pub fn observe(&mut self, event: NetworkEvent) -> Option<(String, String)> {
        match event {
            NetworkEvent::Response { request_id, url } => {
                debug!("Intercepted response: {}", url);
                if is_contact_endpoint(&url) {
                    self.by_request.insert(request_id, url);
                }
                None
            }
            NetworkEvent::Failed { request_id, error } => {
                if let Some(url) = self.by_request.remove(&request_id) {
                    debug!("contact request failed ({}): {}", error, url);
                }
                None
            }
            NetworkEvent::Finished { request_id } => self
                .by_request
                .remove(&request_id)
                .map(|url| (request_id, url)),
        }
    }

    pub fn len(&self) -> usize {
        self.by_request.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_request.is_empty()
    }
}

/// Subscribe to the page's network events and feed matching responses into whichever run
/// `feed` currently points at. The task lives as long as the page's event streams.
pub async fn spawn_response_interceptor(
    page: &Page,
    feed: watch::Receiver<Option<RunFeed>>,
    status: Arc<dyn StatusSink>,
) -> ScoutResult<tokio::task::JoinHandle<()>> {
    // Listeners first, so nothing slips through between enable and subscribe.
    let mut responses = page
        .event_listener::<EventResponseReceived>()
        .await?
        .map(|ev| NetworkEvent::Response {
            request_id: ev.request_id.inner().clone(),
            url: ev.response.url.clone(),
        })
        .boxed();
    let mut finished = page
        .event_listener::<EventLoadingFinished>()
        .await?
        .map(|ev| NetworkEvent::Finished {
            request_id: ev.request_id.inner().clone(),
        })
        .boxed();
    let mut failed = page
        .event_listener::<EventLoadingFailed>()
        .await?
        .map(|ev| NetworkEvent::Failed {
            request_id: ev.request_id.inner().clone(),
            error: ev.error_text.clone(),
        })
        .boxed();
    page.execute(EnableParams::default()).await?;

    let page = page.clone();
    let handle = tokio::spawn(async move {
        let mut pending = PendingBodies::new();
        while let Some(event) = next_network_event(&mut responses, &mut failed, &mut finished).await {
            let Some((request_id, url)) = pending.observe(event) else {
                continue;
            };
            let Some(active) = feed.borrow().clone() else {
                continue;
            };
            if !active.is_live() {
                continue;
            }
            let body = match page
                .execute(GetResponseBodyParams::new(RequestId::new(request_id)))
                .await
            {
                Ok(resp) => resp.result,
                Err(e) => {
                    debug!("response body unavailable for {}: {}", url, e);
                    continue;
                }
            };
            let Some(json) = decode_body(&body.body, body.base64_encoded) else {
                debug!("response from {} is not JSON, ignored", url);
                continue;
            };
            let accepted = ingest_response(&active, &json);
            if accepted > 0 {
                let total = active.store.len();
                info!("📡 {} contacts from API response {} (total {})", accepted, url, total);
                status.publish(StatusEvent::Message(format!(
                    "Found {} contacts in API response. Total: {}",
                    accepted, total
                )));
            }
        }
        warn!("response interceptor: page event streams closed");
    });

    Ok(handle)
}
