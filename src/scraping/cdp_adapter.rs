use async_trait::async_trait;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::dom::{parse_contact_nodes, CompiledSelectors, ContactNode};
use super::page_adapter::{clean_display_name, PageAdapter, ScrollMethod};
use crate::core::config::PageSelectors;
use crate::core::{ScoutError, ScoutResult};

/// Result shape every container script returns, so a missing container never arrives as `null`.
#[derive(Deserialize)]
struct Probe<T> {
    found: bool,
    value: Option<T>,
}

/// Container handle: the selector as a ready-to-embed JS string literal.
#[derive(Debug, Clone)]
pub struct CdpContainer {
    selector_js: String,
}

/// [`PageAdapter`] over a live CDP tab. DOM reads are `outerHTML` snapshots parsed locally.
pub struct ChromiumPageAdapter {
    page: Page,
    selectors: CompiledSelectors,
    anchor_js: String,
}

fn js_string(s: &str) -> String {
    // serde_json string encoding is a valid JS string literal.
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

impl ChromiumPageAdapter {
    pub fn new(page: Page, selectors: &PageSelectors) -> ScoutResult<Self> {
        Ok(Self {
            page,
            anchor_js: js_string(&selectors.scroll_anchor),
            selectors: CompiledSelectors::compile(selectors)?,
        })
    }

    async fn eval<T: DeserializeOwned>(&self, js: String) -> ScoutResult<T> {
        let result = self.page.evaluate(js).await?;
        result
            .into_value::<T>()
            .map_err(|e| ScoutError::Evaluation(format!("unexpected script result: {}", e)))
    }

    /// Run `body` with `c` bound to the container; `body` must `return` the value.
    async fn with_container<T: DeserializeOwned>(
        &self,
        container: &CdpContainer,
        body: &str,
    ) -> ScoutResult<T> {
        let js = format!(
            "(() => {{ const c = document.querySelector({sel}); if (!c) return {{ found: false }}; \
             return {{ found: true, value: (() => {{ {body} }})() }}; }})()",
            sel = container.selector_js,
        );
        let probe: Probe<T> = self.eval(js).await?;
        match (probe.found, probe.value) {
            (true, Some(v)) => Ok(v),
            (true, None) => Err(ScoutError::Evaluation(
                "container script returned no value".to_string(),
            )),
            (false, _) => Err(self.not_found()),
        }
    }

    fn not_found(&self) -> ScoutError {
        ScoutError::ContainerNotFound {
            selector: self.selectors.source.container.clone(),
        }
    }

    fn scroll_script(&self, delta: u32, method: ScrollMethod) -> String {
        match method {
            ScrollMethod::DirectOffset => format!("c.scrollTop += {delta}; return c.scrollTop;"),
            ScrollMethod::SmoothScrollTo => format!(
                "c.scrollTo({{ top: c.scrollTop + {delta}, behavior: 'smooth' }}); return c.scrollTop;"
            ),
            ScrollMethod::ScrollBy => format!("c.scrollBy(0, {delta}); return c.scrollTop;"),
            ScrollMethod::LastItemIntoView => format!(
                "const rows = document.querySelectorAll({anchor}); \
                 if (rows.length > 0) rows[rows.length - 1].scrollIntoView({{ behavior: 'smooth', block: 'end' }}); \
                 return c.scrollTop;",
                anchor = self.anchor_js,
            ),
        }
    }
}

#[async_trait]
impl PageAdapter for ChromiumPageAdapter {
    type Container = CdpContainer;
    type Node = ContactNode;

    async fn locate_container(&self) -> ScoutResult<CdpContainer> {
        let selector_js = js_string(&self.selectors.source.container);
        let present: bool = self
            .eval(format!("document.querySelector({}) !== null", selector_js))
            .await?;
        if present {
            Ok(CdpContainer { selector_js })
        } else {
            Err(self.not_found())
        }
    }

    async fn list_visible_contact_nodes(
        &self,
        container: &CdpContainer,
    ) -> ScoutResult<Vec<ContactNode>> {
        let html: String = self.with_container(container, "return c.outerHTML;").await?;
        let nodes = parse_contact_nodes(&html, &self.selectors);
        debug!("Found {} contact elements ({} bytes of markup)", nodes.len(), html.len());
        Ok(nodes)
    }

    fn read_email(&self, node: &ContactNode) -> Option<String> {
        node.email.clone()
    }

    fn read_display_name(&self, node: &ContactNode) -> String {
        clean_display_name(&node.raw_name)
    }

    async fn current_scroll_offset(&self, container: &CdpContainer) -> ScoutResult<i64> {
        let top: f64 = self.with_container(container, "return c.scrollTop;").await?;
        Ok(top.round() as i64)
    }

    async fn scroll_by(
        &self,
        container: &CdpContainer,
        delta: u32,
        method: ScrollMethod,
    ) -> ScoutResult<i64> {
        let script = self.scroll_script(delta, method);
        let top: f64 = self.with_container(container, &script).await?;
        Ok(top.round() as i64)
    }

    async fn scroll_to_top(&self, container: &CdpContainer) -> ScoutResult<()> {
        let _: f64 = self
            .with_container(container, "c.scrollTop = 0; window.scrollTo(0, 0); return c.scrollTop;")
            .await?;
        Ok(())
    }
}
