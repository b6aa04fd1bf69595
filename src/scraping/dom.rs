//! Snapshot parsing of the contact container's markup.
//!
//! The live page hands back `outerHTML` of the container; everything after that is plain
//! `scraper` work so it can be exercised against static fixtures.

use scraper::{ElementRef, Html, Selector};

use crate::core::config::PageSelectors;
use crate::core::{ScoutError, ScoutResult};

/// One contact row as it was rendered at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactNode {
    pub email: Option<String>,
    pub raw_name: String,
}

/// [`PageSelectors`] parsed once, up front.
#[derive(Debug)]
pub struct CompiledSelectors {
    pub source: PageSelectors,
    contact_item: Selector,
    email_carrier: Selector,
    display_name: Selector,
}

fn compile(selector: &str) -> ScoutResult<Selector> {
    Selector::parse(selector).map_err(|e| ScoutError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

impl CompiledSelectors {
    pub fn compile(source: &PageSelectors) -> ScoutResult<Self> {
        // The container selector only runs in the page, but a typo should fail here too.
        compile(&source.container)?;
        compile(&source.scroll_anchor)?;
        Ok(Self {
            contact_item: compile(&source.contact_item)?,
            email_carrier: compile(&format!("[{}]", source.email_attribute))?,
            display_name: compile(&source.display_name)?,
            source: source.clone(),
        })
    }

    fn email_of(&self, item: ElementRef<'_>) -> Option<String> {
        let attr = self.source.email_attribute.as_str();
        item.value()
            .attr(attr)
            .or_else(|| {
                item.select(&self.email_carrier)
                    .next()
                    .and_then(|el| el.value().attr(attr))
            })
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn name_of(&self, item: ElementRef<'_>) -> String {
        item.select(&self.display_name)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default()
    }
}

/// Every contact row in `html`, in document order. Rows without an email are kept with
/// `email: None`; the caller decides to skip them.
pub fn parse_contact_nodes(html: &str, selectors: &CompiledSelectors) -> Vec<ContactNode> {
    let fragment = Html::parse_fragment(html);
    fragment
        .select(&selectors.contact_item)
        .map(|item| ContactNode {
            email: selectors.email_of(item),
            raw_name: selectors.name_of(item),
        })
        .collect()
}
