use std::fmt;

use serde::{Deserialize, Serialize};

/// Disaster category classifying a feed record (`event_type` on the wire).
///
/// String-backed so categories the client has never heard of still flow
/// through untouched.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    /// Every category the feed currently publishes.
    pub const KNOWN: [&'static str; 13] = [
        "earthquake",
        "wildfire",
        "volcano",
        "storm",
        "flood",
        "cyclone",
        "tornado",
        "hurricane",
        "winter_storm",
        "tsunami",
        "drought",
        "iceberg",
        "landslide",
    ];

    pub fn new(name: impl Into<String>) -> Self {
        Category(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn all_known() -> impl Iterator<Item = Category> {
        Self::KNOWN.iter().map(|name| Category::new(*name))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(name: &str) -> Self {
        Category::new(name)
    }
}
