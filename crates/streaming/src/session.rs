//! Async driver around the [`Coordinator`].
//!
//! One tokio task owns the coordinator and the viewport debouncer. Network
//! work for each query runs in its own task and reports back over a channel,
//! tagged with the epoch it was started under. Starting a new query aborts the
//! previous task.

use std::sync::Arc;
use std::time::Duration;

use foundation::{GeoBounds, ParamIntent, QueryParams};
use futures_util::StreamExt;
use runtime::{Debouncer, Epoch, Metrics};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

use crate::batch::{FeedFrame, parse_frame};
use crate::config::SessionConfig;
use crate::coordinator::{Coordinator, QueryTicket};
use crate::decoder::decode_frames;
use crate::error::FeedError;
use crate::protocol::{Feature, FeedFormat};
use crate::status::QueryState;
use crate::transport::FeedTransport;

const COMMAND_CAPACITY: usize = 64;
const DELIVERY_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Apply(ParamIntent),
    /// Debounced before it turns into a query.
    ViewportChanged(GeoBounds),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("feed session has shut down")]
pub struct SessionClosed;

#[derive(Debug)]
enum Delivery {
    Batch(Vec<Feature>),
    Collection(Vec<Feature>),
    Done(Option<u64>),
    Ignored,
    Complete,
    Failed(FeedError),
}

#[derive(Debug)]
struct Tagged {
    epoch: Epoch,
    delivery: Delivery,
}

pub struct FeedSession {
    coordinator: Coordinator,
    transport: Arc<dyn FeedTransport>,
    debouncer: Debouncer<GeoBounds>,
    commands: mpsc::Receiver<SessionCommand>,
    deliveries_tx: mpsc::Sender<Tagged>,
    deliveries_rx: mpsc::Receiver<Tagged>,
    state_tx: watch::Sender<QueryState>,
    task: Option<JoinHandle<()>>,
}

impl FeedSession {
    /// Spawns the session on the current runtime and starts the first query.
    pub fn spawn(
        config: &SessionConfig,
        transport: Arc<dyn FeedTransport>,
        initial: QueryParams,
    ) -> SessionHandle {
        let (commands_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (deliveries_tx, deliveries_rx) = mpsc::channel(DELIVERY_CAPACITY);
        let (state_tx, state_rx) = watch::channel(QueryState::idle());

        let session = FeedSession {
            coordinator: Coordinator::new(config.mode),
            transport,
            debouncer: Debouncer::new(config.debounce()),
            commands,
            deliveries_tx,
            deliveries_rx,
            state_tx,
            task: None,
        };
        let join = tokio::spawn(session.run(initial));

        SessionHandle {
            commands: commands_tx,
            state: state_rx,
            join,
        }
    }

    async fn run(mut self, initial: QueryParams) -> Metrics {
        let ticket = self.coordinator.begin(initial);
        self.spawn_query(ticket);
        self.flush(false);

        loop {
            // The timer future is built even when its branch is disabled.
            let wake = self
                .debouncer
                .deadline()
                .map(Instant::from_std)
                .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));
            let mut force = false;

            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(SessionCommand::Apply(intent)) => self.launch(intent),
                    Some(SessionCommand::ViewportChanged(bounds)) => {
                        self.debouncer.notify(bounds, Instant::now().into_std());
                    }
                    Some(SessionCommand::Shutdown) | None => break,
                },
                Some(tagged) = self.deliveries_rx.recv() => {
                    force = self.deliver(tagged);
                    // Deliveries already queued share one publish.
                    while let Ok(tagged) = self.deliveries_rx.try_recv() {
                        force |= self.deliver(tagged);
                    }
                }
                _ = sleep_until(wake), if self.debouncer.is_pending() => {
                    if let Some(bounds) = self.debouncer.poll(Instant::now().into_std()) {
                        debug!("viewport settled at {bounds}");
                        self.launch(ParamIntent::SetViewport(Some(bounds)));
                    }
                }
            }

            self.flush(force);
        }

        self.debouncer.cancel();
        self.abort_task();
        self.coordinator.cancel();
        info!("feed session stopped");
        self.coordinator.metrics().clone()
    }

    fn launch(&mut self, intent: ParamIntent) {
        let before = self.coordinator.current_epoch();
        let ticket = self.coordinator.apply(intent);
        if self.coordinator.current_epoch() != before {
            self.abort_task();
        }
        self.spawn_query(ticket);
    }

    fn spawn_query(&mut self, ticket: Option<QueryTicket>) {
        if let Some(ticket) = ticket {
            let transport = Arc::clone(&self.transport);
            let tx = self.deliveries_tx.clone();
            self.task = Some(tokio::spawn(run_query(transport, ticket, tx)));
        }
    }

    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Returns true when state changed without a published transition.
    fn deliver(&mut self, tagged: Tagged) -> bool {
        let Tagged { epoch, delivery } = tagged;
        match delivery {
            Delivery::Done(total) => return self.coordinator.on_done_frame(epoch, total),
            Delivery::Batch(features) => {
                self.coordinator.on_batch(epoch, features);
            }
            Delivery::Collection(features) => {
                self.coordinator.on_collection(epoch, features);
            }
            Delivery::Ignored => self.coordinator.on_ignored_frame(epoch),
            Delivery::Complete => {
                self.coordinator.on_complete(epoch);
            }
            Delivery::Failed(err) => {
                self.coordinator.on_failure(epoch, &err);
            }
        }
        false
    }

    fn flush(&mut self, force: bool) {
        if self.coordinator.take_published() || force {
            self.state_tx.send_replace(self.coordinator.state().clone());
        }
    }
}

async fn run_query(transport: Arc<dyn FeedTransport>, ticket: QueryTicket, tx: mpsc::Sender<Tagged>) {
    let QueryTicket { epoch, query } = ticket;
    let send = |delivery| tx.send(Tagged { epoch, delivery });

    if query.format == FeedFormat::GeoJson {
        let delivery = match transport.fetch_collection(query).await {
            Ok(features) => Delivery::Collection(features),
            Err(err) => Delivery::Failed(err),
        };
        let _ = send(delivery).await;
        return;
    }

    let bytes = match transport.open_stream(query).await {
        Ok(bytes) => bytes,
        Err(err) => {
            let _ = send(Delivery::Failed(err)).await;
            return;
        }
    };

    let frames = decode_frames(bytes);
    tokio::pin!(frames);
    while let Some(frame) = frames.next().await {
        let delivery = match frame.and_then(|text| parse_frame(&text)) {
            Ok(FeedFrame::Batch(features)) => Delivery::Batch(features),
            Ok(FeedFrame::Done { total }) => Delivery::Done(total),
            Ok(FeedFrame::Ignored) => Delivery::Ignored,
            Err(err) => {
                let _ = send(Delivery::Failed(err)).await;
                return;
            }
        };
        if send(delivery).await.is_err() {
            return;
        }
    }
    let _ = send(Delivery::Complete).await;
}

/// Caller's side of a running [`FeedSession`].
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    state: watch::Receiver<QueryState>,
    join: JoinHandle<Metrics>,
}

impl SessionHandle {
    pub async fn send(&self, command: SessionCommand) -> Result<(), SessionClosed> {
        self.commands.send(command).await.map_err(|_| SessionClosed)
    }

    pub async fn apply(&self, intent: ParamIntent) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Apply(intent)).await
    }

    pub async fn viewport_changed(&self, bounds: GeoBounds) -> Result<(), SessionClosed> {
        self.send(SessionCommand::ViewportChanged(bounds)).await
    }

    /// Latest published state.
    pub fn state(&self) -> QueryState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.state.clone()
    }

    /// Waits for a settled or errored state from a query newer than `after`.
    ///
    /// Returns `None` if the session stops first.
    pub async fn next_terminal(&mut self, after: Option<Epoch>) -> Option<QueryState> {
        self.state
            .wait_for(|s| s.status.is_terminal() && s.epoch > after)
            .await
            .ok()
            .map(|s| (*s).clone())
    }

    /// Stops the session and returns its metrics.
    pub async fn shutdown(self) -> Result<Metrics, JoinError> {
        let _ = self.commands.send(SessionCommand::Shutdown).await;
        self.join.await
    }
}
