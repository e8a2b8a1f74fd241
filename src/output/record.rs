use serde::Serialize;

/// Value written for a detail the leaf page did not provide
pub const NOT_AVAILABLE: &str = "N/A";

/// One flattened leaf item
///
/// Field order is the CSV column order. Detail values are kept exactly as the
/// page displays them (e.g. `"1,203"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeafRecord {
    pub state: String,
    pub city: String,
    pub neighborhood: String,
    pub residents: String,
    pub homeowners: String,
    pub url: String,
}

impl LeafRecord {
    /// Whether neither detail value was found
    pub fn is_unavailable(&self) -> bool {
        self.residents == NOT_AVAILABLE && self.homeowners == NOT_AVAILABLE
    }
}
