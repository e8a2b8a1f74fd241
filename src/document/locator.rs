use crate::document::DocumentError;
use scraper::Selector;

/// A compiled expression identifying elements or text within a page
#[derive(Debug, Clone)]
pub enum Locator {
    /// Every anchor matching a selector
    Links { anchors: Selector },

    /// Anchors inside the `block` siblings that follow the `block` parent
    /// of a heading whose text contains `heading_text`
    Section {
        heading: Selector,
        heading_text: String,
        block: Selector,
        anchors: Selector,
    },

    /// Text of the element immediately preceding the first label whose
    /// text contains `label_text`
    Labelled { label: Selector, label_text: String },
}

impl Locator {
    /// Anchors matching `anchors`
    pub fn links(anchors: &str) -> Result<Self, DocumentError> {
        Ok(Locator::Links {
            anchors: compile(anchors)?,
        })
    }

    /// Anchors under the section introduced by a heading
    ///
    /// # Example
    ///
    /// ```
    /// use nestcrawl::document::Locator;
    ///
    /// let nearby = Locator::section("h2", "Nearby neighborhoods", "div", "a").unwrap();
    /// ```
    pub fn section(
        heading: &str,
        heading_text: &str,
        block: &str,
        anchors: &str,
    ) -> Result<Self, DocumentError> {
        Ok(Locator::Section {
            heading: compile(heading)?,
            heading_text: heading_text.to_string(),
            block: compile(block)?,
            anchors: compile(anchors)?,
        })
    }

    /// Value shown next to a visible label
    pub fn labelled(label: &str, label_text: &str) -> Result<Self, DocumentError> {
        Ok(Locator::Labelled {
            label: compile(label)?,
            label_text: label_text.to_string(),
        })
    }
}

fn compile(selector: &str) -> Result<Selector, DocumentError> {
    Selector::parse(selector).map_err(|e| DocumentError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}
