use foundation::{QueryParams, format_timestamp};

use crate::protocol::FeedFormat;

/// Path of the events endpoint, relative to the API base URL.
pub const EVENTS_PATH: &str = "/api/v1/events";

/// Largest `limit` the feed honours.
pub const MAX_LIMIT: u32 = 1000;

/// One concrete request against the feed: parameters plus response mode.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedQuery {
    pub params: QueryParams,
    pub format: FeedFormat,
    /// Only sent in complete mode.
    pub limit: Option<u32>,
}

impl FeedQuery {
    pub fn incremental(params: QueryParams) -> Self {
        Self {
            params,
            format: FeedFormat::Sse,
            limit: None,
        }
    }

    pub fn complete(params: QueryParams, limit: Option<u32>) -> Self {
        Self {
            params,
            format: FeedFormat::GeoJson,
            limit: limit.map(|l| l.clamp(1, MAX_LIMIT)),
        }
    }

    /// Query-string pairs in a stable order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("format", self.format.as_str().to_string())];

        // Naming every known category is the same as naming none.
        if !self.params.covers_all_known() {
            let types: Vec<&str> = self.params.categories.iter().map(|c| c.as_str()).collect();
            pairs.push(("types", types.join(",")));
        }

        if let Some(since) = &self.params.since {
            pairs.push(("since", format_timestamp(since)));
        }

        if let Some(viewport) = &self.params.viewport {
            pairs.push(("bbox", viewport.to_string()));
        }

        if self.format == FeedFormat::GeoJson {
            if let Some(limit) = self.limit {
                pairs.push(("limit", limit.to_string()));
            }
        }

        pairs
    }

    pub fn endpoint(api_url: &str) -> String {
        format!("{}{}", api_url.trim_end_matches('/'), EVENTS_PATH)
    }
}
