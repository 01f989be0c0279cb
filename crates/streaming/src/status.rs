use std::collections::BTreeSet;
use std::sync::Arc;

use foundation::{Category, QueryParams};
use runtime::Epoch;

use crate::protocol::Feature;

/// Lifecycle of the current logical query.
///
/// Idle → Loading → Streaming* → Settled, or → Errored. Superseded queries
/// never publish a transition of their own.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QueryStatus {
    #[default]
    Idle,
    Loading,
    Streaming,
    Settled,
    Errored(String),
}

impl QueryStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading | Self::Streaming)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled | Self::Errored(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Errored(message) => Some(message),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Streaming => "streaming",
            Self::Settled => "settled",
            Self::Errored(_) => "errored",
        }
    }
}

/// Snapshot published to the presentation layer after every transition.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    /// `None` until the first query starts.
    pub epoch: Option<Epoch>,
    pub params: QueryParams,
    pub status: QueryStatus,
    pub features: Arc<[Feature]>,
    pub categories: BTreeSet<Category>,
    /// Total reported by the feed's `done` frame, if it sent one.
    pub server_total: Option<u64>,
}

impl Default for QueryState {
    fn default() -> Self {
        Self::idle()
    }
}

impl QueryState {
    pub fn idle() -> Self {
        Self {
            epoch: None,
            params: QueryParams::default(),
            status: QueryStatus::Idle,
            features: Arc::from(Vec::new()),
            categories: BTreeSet::new(),
            server_total: None,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// One-line status indicator: loading (with the interim count once data
    /// has streamed in), the error text, or the event count. Never both
    /// loading and error. Before the first query it says so rather than
    /// reporting zero events.
    pub fn status_line(&self) -> String {
        if self.status.is_loading() {
            return match self.len() {
                0 => "Loading events...".to_string(),
                n => format!("Loading events... ({n} so far)"),
            };
        }
        match &self.status {
            QueryStatus::Errored(message) => message.clone(),
            QueryStatus::Idle => "No query yet".to_string(),
            _ => match self.len() {
                1 => "1 event".to_string(),
                n => format!("{n} events"),
            },
        }
    }
}
