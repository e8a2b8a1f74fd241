//! HTML document queries
//!
//! This module parses page markup and answers the two questions the pipeline
//! asks of a page:
//! - Which links does a locator match (as absolute URLs with their text)?
//! - What text does a locator match?

mod locator;

pub use locator::Locator;

use scraper::{ElementRef, Html};
use thiserror::Error;
use url::Url;

/// Errors raised while building document queries
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// A link found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Visible text, whitespace collapsed
    pub text: String,

    /// Absolute target URL
    pub href: Url,
}

/// Links matched by a locator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSet {
    pub links: Vec<Link>,

    /// Matched anchors skipped because their `href` was missing or unparsable
    pub malformed: usize,
}

/// A parsed page
///
/// Relative links are resolved against the URL the page was loaded from.
pub struct Document {
    html: Html,
    base: Url,
}

impl Document {
    /// Parses page markup
    ///
    /// # Example
    ///
    /// ```
    /// use nestcrawl::document::{Document, Locator};
    /// use url::Url;
    ///
    /// let base = Url::parse("https://example.com/states").unwrap();
    /// let doc = Document::parse(r#"<a class="link" href="/ca">California</a>"#, &base);
    /// let found = doc.links(&Locator::links("a.link").unwrap());
    /// assert_eq!(found.links[0].text, "California");
    /// assert_eq!(found.links[0].href.as_str(), "https://example.com/ca");
    /// ```
    pub fn parse(content: &str, base: &Url) -> Self {
        Self {
            html: Html::parse_document(content),
            base: base.clone(),
        }
    }

    /// Returns every link the locator matches
    ///
    /// A `Labelled` locator matches values, not links, and yields nothing.
    pub fn links(&self, locator: &Locator) -> LinkSet {
        let mut found = LinkSet::default();

        match locator {
            Locator::Links { anchors } => {
                for anchor in self.html.select(anchors) {
                    self.push_link(&mut found, anchor);
                }
            }
            Locator::Section {
                heading,
                heading_text,
                block,
                anchors,
            } => {
                for anchor in self.section_anchors(heading, heading_text, block, anchors) {
                    self.push_link(&mut found, anchor);
                }
            }
            Locator::Labelled { .. } => {}
        }

        found
    }

    /// Returns the first non-empty text the locator matches
    pub fn text(&self, locator: &Locator) -> Option<String> {
        match locator {
            Locator::Labelled { label, label_text } => {
                let label = self
                    .html
                    .select(label)
                    .find(|el| collapse_text(el.text()).contains(label_text.as_str()))?;

                label
                    .prev_siblings()
                    .find_map(ElementRef::wrap)
                    .map(|value| collapse_text(value.text()))
                    .filter(|value| !value.is_empty())
            }
            Locator::Links { anchors } => self
                .html
                .select(anchors)
                .map(|el| collapse_text(el.text()))
                .find(|text| !text.is_empty()),
            Locator::Section {
                heading,
                heading_text,
                block,
                anchors,
            } => self
                .section_anchors(heading, heading_text, block, anchors)
                .into_iter()
                .map(|el| collapse_text(el.text()))
                .find(|text| !text.is_empty()),
        }
    }

    fn section_anchors<'a>(
        &'a self,
        heading: &scraper::Selector,
        heading_text: &str,
        block: &scraper::Selector,
        anchors: &scraper::Selector,
    ) -> Vec<ElementRef<'a>> {
        let mut found = Vec::new();

        for title in self.html.select(heading) {
            if !collapse_text(title.text()).contains(heading_text) {
                continue;
            }
            let Some(parent) = title.parent().and_then(ElementRef::wrap) else {
                continue;
            };
            if !block.matches(&parent) {
                continue;
            }
            for sibling in parent
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .filter(|sibling| block.matches(sibling))
            {
                found.extend(sibling.select(anchors));
            }
        }

        found
    }

    fn push_link(&self, found: &mut LinkSet, anchor: ElementRef<'_>) {
        let text = collapse_text(anchor.text());

        let Some(href) = anchor.value().attr("href") else {
            found.malformed += 1;
            tracing::warn!("Skipping link '{}' without href on {}", text, self.base);
            return;
        };

        match resolve_link(href, &self.base) {
            Ok(Some(href)) => found.links.push(Link { text, href }),
            Ok(None) => tracing::trace!("Ignoring non-page link {} on {}", href, self.base),
            Err(e) => {
                found.malformed += 1;
                tracing::warn!(
                    "Skipping link '{}' with bad href '{}' on {}: {}",
                    text,
                    href,
                    self.base,
                    e
                );
            }
        }
    }
}

/// Resolves a link href to an absolute URL
///
/// Returns `Ok(None)` if the link does not point at a crawlable page:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Result<Option<Url>, url::ParseError> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return Ok(None);
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return Ok(None);
    }

    let absolute_url = base_url.join(href)?;
    if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
        Ok(Some(absolute_url))
    } else {
        Ok(None)
    }
}

/// Joins text fragments and collapses runs of whitespace
fn collapse_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
