//! Request coordination for the feed.
//!
//! The coordinator is a plain state machine: it never touches the network or a
//! clock. Callers run the work described by a [`QueryTicket`] and report back
//! through the `on_*` callbacks, each tagged with the epoch the work was
//! started under. Deliveries for anything but the current, still-open epoch
//! are dropped.

use std::sync::Arc;

use foundation::{ParamIntent, QueryParams};
use runtime::{Counter, Epoch, EpochClock, Metrics};
use tracing::{debug, info, warn};

use crate::accumulator::FeatureAccumulator;
use crate::config::FeedMode;
use crate::error::FeedError;
use crate::protocol::Feature;
use crate::request::FeedQuery;
use crate::status::{QueryState, QueryStatus};

/// Network work for one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTicket {
    pub epoch: Epoch,
    pub query: FeedQuery,
}

#[derive(Debug)]
pub struct Coordinator {
    mode: FeedMode,
    clock: EpochClock,
    accumulator: FeatureAccumulator,
    state: QueryState,
    metrics: Metrics,
    /// Records were ingested since `state.features` was last rebuilt.
    snapshot_stale: bool,
    /// A transition was published since the last `take_published`.
    published: bool,
}

impl Coordinator {
    pub fn new(mode: FeedMode) -> Self {
        Self {
            mode,
            clock: EpochClock::new(),
            accumulator: FeatureAccumulator::new(),
            state: QueryState::idle(),
            metrics: Metrics::new(),
            snapshot_stale: false,
            published: false,
        }
    }

    /// Current state. The published collection is rebuilt here, at most once
    /// per read, rather than on every batch.
    pub fn state(&mut self) -> &QueryState {
        if self.snapshot_stale {
            self.state.features = Arc::from(self.accumulator.snapshot());
            self.snapshot_stale = false;
            self.metrics.inc(Counter::SnapshotsBuilt);
        }
        &self.state
    }

    pub fn params(&self) -> &QueryParams {
        &self.state.params
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn current_epoch(&self) -> Option<Epoch> {
        self.clock.current()
    }

    /// Whether a transition was published since the last call.
    pub fn take_published(&mut self) -> bool {
        std::mem::take(&mut self.published)
    }

    /// Starts a new logical query, superseding whatever was in flight.
    ///
    /// Returns `None` when the outcome is already known: an empty category
    /// filter settles immediately and invalid parameters error immediately.
    pub fn begin(&mut self, params: QueryParams) -> Option<QueryTicket> {
        if let Some(previous) = self.clock.current() {
            if !self.state.status.is_terminal() {
                self.metrics.inc(Counter::QueriesSuperseded);
                debug!("query {previous} superseded");
            }
        }

        let epoch = self.clock.advance();
        self.accumulator.reset();
        self.snapshot_stale = false;
        self.metrics.inc(Counter::QueriesStarted);
        self.state = QueryState {
            epoch: Some(epoch),
            params: params.clone(),
            ..QueryState::idle()
        };
        self.publish(QueryStatus::Loading);

        if let Err(err) = params.validate() {
            self.fail(&FeedError::from(err));
            return None;
        }

        if params.excludes_everything() {
            debug!("query {epoch} has no categories selected, settling without a request");
            self.metrics.inc(Counter::QueriesShortCircuited);
            self.settle();
            return None;
        }

        let query = match self.mode {
            FeedMode::Incremental => FeedQuery::incremental(params),
            FeedMode::Complete { limit } => FeedQuery::complete(params, limit),
        };
        info!("query {epoch} started ({})", query.format.as_str());
        Some(QueryTicket { epoch, query })
    }

    /// Derives the next parameters from an intent and starts a query for them.
    ///
    /// Intents that leave the parameters unchanged do nothing once a query has
    /// run, except `Refetch`.
    pub fn apply(&mut self, intent: ParamIntent) -> Option<QueryTicket> {
        let force = matches!(intent, ParamIntent::Refetch);
        let next = self.state.params.apply(intent);
        if !force && self.state.epoch.is_some() && next == self.state.params {
            debug!("intent left parameters unchanged");
            return None;
        }
        self.begin(next)
    }

    /// Ingests one incremental batch. Returns whether published state changed.
    pub fn on_batch(&mut self, epoch: Epoch, features: Vec<Feature>) -> bool {
        if !self.accepts(epoch) {
            return false;
        }
        self.metrics.inc(Counter::BatchesIngested);
        self.metrics.record_batch(features.len());
        if features.is_empty() {
            return false;
        }

        self.ingest(features);
        self.publish(QueryStatus::Streaming);
        true
    }

    /// Ingests a complete-mode response and settles the query.
    pub fn on_collection(&mut self, epoch: Epoch, features: Vec<Feature>) -> bool {
        if !self.accepts(epoch) {
            return false;
        }
        self.metrics.inc(Counter::BatchesIngested);
        self.metrics.record_batch(features.len());
        self.ingest(features);
        self.settle();
        true
    }

    /// Records the total announced by a `done` frame.
    pub fn on_done_frame(&mut self, epoch: Epoch, total: Option<u64>) -> bool {
        if !self.accepts(epoch) {
            return false;
        }
        debug!("query {epoch} done frame, total {total:?}");
        self.state.server_total = total;
        total.is_some()
    }

    pub fn on_ignored_frame(&mut self, epoch: Epoch) {
        if self.clock.is_current(epoch) {
            self.metrics.inc(Counter::FramesIgnored);
        }
    }

    /// The stream ended normally.
    pub fn on_complete(&mut self, epoch: Epoch) -> bool {
        if !self.accepts(epoch) {
            return false;
        }
        self.settle();
        true
    }

    /// The query failed. Whatever was already accumulated stays published.
    pub fn on_failure(&mut self, epoch: Epoch, error: &FeedError) -> bool {
        if !self.accepts(epoch) {
            return false;
        }
        self.fail(error);
        true
    }

    /// Invalidates the current epoch without starting another one.
    ///
    /// Published state is left as it was; cancellation is never surfaced.
    pub fn cancel(&mut self) -> Option<Epoch> {
        let retired = self.clock.retire();
        if let Some(epoch) = retired {
            if !self.state.status.is_terminal() {
                self.metrics.inc(Counter::QueriesSuperseded);
                debug!("query {epoch} cancelled");
            }
        }
        retired
    }

    fn accepts(&mut self, epoch: Epoch) -> bool {
        if self.clock.is_current(epoch) && !self.state.status.is_terminal() {
            return true;
        }
        self.metrics.inc(Counter::StaleDeliveriesDropped);
        debug!("dropping delivery for stale query {epoch}");
        false
    }

    fn ingest(&mut self, features: Vec<Feature>) {
        let count = features.len();
        let summary = self.accumulator.ingest(features);
        self.metrics.add(Counter::RecordsIngested, count as u64);
        self.metrics.add(Counter::RecordsReplaced, summary.replaced as u64);

        self.snapshot_stale = true;
        if self.accumulator.take_categories_changed() {
            self.state.categories = self.accumulator.categories().clone();
        }
    }

    fn settle(&mut self) {
        self.metrics.inc(Counter::QueriesSettled);
        self.publish(QueryStatus::Settled);
        if let Some(epoch) = self.state.epoch {
            info!("query {epoch} settled with {} events", self.accumulator.len());
        }
    }

    fn fail(&mut self, error: &FeedError) {
        self.metrics.inc(Counter::QueriesFailed);
        if let Some(epoch) = self.state.epoch {
            warn!("query {epoch} failed: {error}");
        }
        self.publish(QueryStatus::Errored(error.to_string()));
    }

    fn publish(&mut self, status: QueryStatus) {
        self.state.status = status;
        self.published = true;
        if let Some(epoch) = self.state.epoch {
            debug!(
                %epoch,
                status = self.state.status.label(),
                records = self.accumulator.len(),
                "query transition"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::tests::record;
    use crate::protocol::FeedFormat;
    use chrono::{TimeZone, Utc};
    use foundation::GeoBounds;
    use pretty_assertions::assert_eq;
    use runtime::BatchSizes;

    fn earthquakes() -> QueryParams {
        QueryParams::with_categories(["earthquake"])
            .since(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn begin_publishes_loading_and_issues_ticket() {
        let mut c = Coordinator::new(FeedMode::Incremental);
        let ticket = c.begin(earthquakes()).unwrap();

        assert_eq!(ticket.query.format, FeedFormat::Sse);
        assert_eq!(ticket.query.params, earthquakes());
        assert_eq!(c.state().status, QueryStatus::Loading);
        assert_eq!(c.state().epoch, Some(ticket.epoch));
        assert!(c.state().is_empty());
    }

    #[test]
    fn complete_mode_issues_capped_geojson_query() {
        let mut c = Coordinator::new(FeedMode::Complete { limit: Some(50) });
        let ticket = c.begin(earthquakes()).unwrap();
        assert_eq!(ticket.query.format, FeedFormat::GeoJson);
        assert_eq!(ticket.query.limit, Some(50));

        assert!(c.on_collection(ticket.epoch, vec![record("eq-1", "earthquake", 1)]));
        assert_eq!(c.state().status, QueryStatus::Settled);
        assert_eq!(c.state().len(), 1);
    }

    #[test]
    fn empty_categories_settle_without_a_ticket() {
        let mut c = Coordinator::new(FeedMode::Incremental);
        assert_eq!(c.begin(QueryParams::default()), None);

        assert_eq!(c.state().status, QueryStatus::Settled);
        assert!(c.state().is_empty());
        assert_eq!(c.metrics().get(Counter::QueriesShortCircuited), 1);
        assert_eq!(c.metrics().get(Counter::QueriesSettled), 1);
        assert!(c.take_published());
    }

    #[test]
    fn invalid_viewport_errors_without_a_ticket() {
        let mut c = Coordinator::new(FeedMode::Incremental);
        let params = earthquakes().viewport(GeoBounds::new(10.0, 0.0, -10.0, 5.0));
        assert_eq!(c.begin(params), None);
        assert!(c.state().status.error().is_some());
        assert_eq!(c.metrics().get(Counter::QueriesFailed), 1);
    }

    #[test]
    fn later_update_for_same_id_wins() {
        let mut c = Coordinator::new(FeedMode::Incremental);
        let t = c.begin(earthquakes()).unwrap();

        assert!(c.on_batch(t.epoch, vec![record("eq-1", "earthquake", 1)]));
        assert_eq!(c.state().status, QueryStatus::Streaming);
        assert!(c.on_batch(t.epoch, vec![record("eq-1", "earthquake", 5)]));
        assert!(c.on_complete(t.epoch));

        assert_eq!(c.state().status, QueryStatus::Settled);
        assert_eq!(c.state().features.as_ref(), &[record("eq-1", "earthquake", 5)]);
        assert_eq!(c.metrics().get(Counter::RecordsReplaced), 1);
    }

    #[test]
    fn stale_epoch_never_reaches_state() {
        let mut c = Coordinator::new(FeedMode::Incremental);
        let first = c.begin(earthquakes()).unwrap();
        let second = c.begin(QueryParams::with_categories(["flood"])).unwrap();
        assert!(second.epoch > first.epoch);
        assert_eq!(c.metrics().get(Counter::QueriesSuperseded), 1);

        assert!(!c.on_batch(first.epoch, vec![record("eq-1", "earthquake", 1)]));
        assert!(!c.on_complete(first.epoch));
        assert!(!c.on_failure(first.epoch, &FeedError::Network("late".into())));
        assert_eq!(c.state().status, QueryStatus::Loading);
        assert!(c.state().is_empty());

        assert!(c.on_batch(second.epoch, vec![record("fl-1", "flood", 1)]));
        assert_eq!(c.state().features[0].id(), "fl-1");
        assert_eq!(c.metrics().get(Counter::StaleDeliveriesDropped), 3);
    }

    #[test]
    fn terminal_state_ignores_further_deliveries() {
        let mut c = Coordinator::new(FeedMode::Incremental);
        let t = c.begin(earthquakes()).unwrap();
        c.on_complete(t.epoch);

        assert!(!c.on_batch(t.epoch, vec![record("eq-9", "earthquake", 1)]));
        assert!(!c.on_failure(t.epoch, &FeedError::Network("reset".into())));
        assert_eq!(c.state().status, QueryStatus::Settled);
        assert!(c.state().is_empty());
    }

    #[test]
    fn failure_keeps_accumulated_snapshot() {
        let mut c = Coordinator::new(FeedMode::Incremental);
        let t = c.begin(earthquakes()).unwrap();
        c.on_batch(t.epoch, vec![record("eq-1", "earthquake", 1)]);

        let err = FeedError::from_status(500, br#"{"error":"upstream down"}"#);
        assert!(c.on_failure(t.epoch, &err));
        assert_eq!(
            c.state().status,
            QueryStatus::Errored("upstream down".to_string())
        );
        assert_eq!(c.state().len(), 1);
        assert_eq!(c.state().status_line(), "upstream down");
    }

    #[test]
    fn empty_batch_changes_nothing() {
        let mut c = Coordinator::new(FeedMode::Incremental);
        let t = c.begin(earthquakes()).unwrap();
        assert!(c.take_published());
        assert!(!c.on_batch(t.epoch, Vec::new()));
        assert!(!c.take_published());
        assert_eq!(c.state().status, QueryStatus::Loading);
        assert_eq!(c.metrics().get(Counter::BatchesIngested), 1);
        assert_eq!(
            c.metrics().batch_sizes(),
            BatchSizes { count: 1, sum: 0, min: 0, max: 0 }
        );
    }

    #[test]
    fn done_frame_records_server_total() {
        let mut c = Coordinator::new(FeedMode::Incremental);
        let t = c.begin(earthquakes()).unwrap();
        assert!(c.on_done_frame(t.epoch, Some(7)));
        assert_eq!(c.state().server_total, Some(7));
        assert_eq!(c.state().status, QueryStatus::Loading);
    }

    #[test]
    fn discovered_categories_follow_the_data() {
        let mut c = Coordinator::new(FeedMode::Incremental);
        let t = c.begin(QueryParams::all_categories()).unwrap();
        c.on_batch(
            t.epoch,
            vec![record("a", "wildfire", 1), record("b", "earthquake", 1)],
        );
        let names: Vec<_> = c.state().categories.iter().map(|c| c.as_str()).collect();
        assert_eq!(names, vec!["earthquake", "wildfire"]);

        c.begin(QueryParams::all_categories());
        assert!(c.state().categories.is_empty());
    }

    #[test]
    fn apply_skips_unchanged_parameters_unless_refetching() {
        let mut c = Coordinator::new(FeedMode::Incremental);
        let first = c.apply(ParamIntent::SetCategories(earthquakes().categories)).unwrap();
        assert!(c.apply(ParamIntent::SetCategories(earthquakes().categories)).is_none());

        let again = c.apply(ParamIntent::Refetch).unwrap();
        assert!(again.epoch > first.epoch);

        assert!(c.apply(ParamIntent::ClearCategories).is_none());
        assert_eq!(c.state().status, QueryStatus::Settled);
    }

    #[test]
    fn cancel_retires_without_publishing() {
        let mut c = Coordinator::new(FeedMode::Incremental);
        let t = c.begin(earthquakes()).unwrap();
        assert!(c.take_published());

        assert_eq!(c.cancel(), Some(t.epoch));
        assert_eq!(c.state().status, QueryStatus::Loading);
        assert!(!c.take_published());
        assert!(!c.on_batch(t.epoch, vec![record("eq-1", "earthquake", 1)]));
    }

    #[test]
    fn collection_is_rebuilt_once_per_read_not_per_batch() {
        let mut c = Coordinator::new(FeedMode::Incremental);
        let t = c.begin(QueryParams::all_categories()).unwrap();

        for i in 0..10_000 {
            assert!(c.on_batch(t.epoch, vec![record(&format!("eq-{i:05}"), "earthquake", 1)]));
        }
        assert_eq!(c.metrics().get(Counter::SnapshotsBuilt), 0);
        assert!(c.take_published());

        assert_eq!(c.state().len(), 10_000);
        assert_eq!(c.state().features[9_999].id(), "eq-09999");
        assert_eq!(c.metrics().get(Counter::SnapshotsBuilt), 1);

        c.on_complete(t.epoch);
        assert_eq!(c.state().status, QueryStatus::Settled);
        assert_eq!(c.metrics().get(Counter::SnapshotsBuilt), 1);
    }
}
