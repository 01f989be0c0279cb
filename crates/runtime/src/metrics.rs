use std::collections::BTreeMap;

/// Named counters tracked over the lifetime of a feed session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Counter {
    QueriesStarted,
    QueriesShortCircuited,
    QueriesSettled,
    QueriesFailed,
    QueriesSuperseded,
    BatchesIngested,
    RecordsIngested,
    RecordsReplaced,
    StaleDeliveriesDropped,
    FramesIgnored,
    SnapshotsBuilt,
}

impl Counter {
    pub fn name(self) -> &'static str {
        match self {
            Counter::QueriesStarted => "queries_started",
            Counter::QueriesShortCircuited => "queries_short_circuited",
            Counter::QueriesSettled => "queries_settled",
            Counter::QueriesFailed => "queries_failed",
            Counter::QueriesSuperseded => "queries_superseded",
            Counter::BatchesIngested => "batches_ingested",
            Counter::RecordsIngested => "records_ingested",
            Counter::RecordsReplaced => "records_replaced",
            Counter::StaleDeliveriesDropped => "stale_deliveries_dropped",
            Counter::FramesIgnored => "frames_ignored",
            Counter::SnapshotsBuilt => "snapshots_built",
        }
    }
}

/// Min/max/sum summary of observed batch sizes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct BatchSizes {
    pub count: u64,
    pub sum: u64,
    pub min: u64,
    pub max: u64,
}

impl BatchSizes {
    pub fn record(&mut self, size: u64) {
        if self.count == 0 {
            self.min = size;
            self.max = size;
        } else {
            self.min = self.min.min(size);
            self.max = self.max.max(size);
        }
        self.count += 1;
        self.sum += size;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }
}

/// Deterministic session metrics.
///
/// Sorted maps keep snapshots stable for logs and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metrics {
    counters: BTreeMap<Counter, u64>,
    batch_sizes: BatchSizes,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters.get(&counter).copied().unwrap_or(0)
    }

    pub fn inc(&mut self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&mut self, counter: Counter, by: u64) {
        if by == 0 {
            return;
        }
        *self.counters.entry(counter).or_insert(0) += by;
    }

    pub fn record_batch(&mut self, size: usize) {
        self.batch_sizes.record(size as u64);
    }

    pub fn batch_sizes(&self) -> BatchSizes {
        self.batch_sizes
    }

    /// Non-zero counters in stable order.
    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        self.counters.iter().map(|(k, v)| (k.name(), *v)).collect()
    }
}
