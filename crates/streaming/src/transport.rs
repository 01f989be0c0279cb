use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use tracing::debug;

use crate::config::SessionConfig;
use crate::error::FeedError;
use crate::protocol::{Feature, FeatureCollection, FeedFormat};
use crate::request::FeedQuery;

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Raw response body, chunked however the network delivered it.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, FeedError>> + Send>>;

/// Issues requests against the events endpoint.
///
/// Implementations must be `Send + Sync` so a session can share one across
/// query tasks. Methods return boxed futures for dyn-compatibility.
pub trait FeedTransport: Send + Sync {
    /// Complete mode: one bounded response decoded as a feature collection.
    fn fetch_collection(&self, query: FeedQuery) -> BoxFuture<'_, Result<Vec<Feature>, FeedError>>;

    /// Incremental mode: resolves once the response headers arrive, yielding
    /// the body as a byte stream.
    fn open_stream(&self, query: FeedQuery) -> BoxFuture<'_, Result<ByteStream, FeedError>>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(api_url: &str, timeout: Option<Duration>) -> Result<Self, FeedError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(FeedError::network)?;
        Ok(Self {
            endpoint: FeedQuery::endpoint(api_url),
            client,
        })
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, FeedError> {
        Self::new(&config.api_url, config.request_timeout())
    }

    async fn send(&self, query: &FeedQuery) -> Result<reqwest::Response, FeedError> {
        let accept = match query.format {
            FeedFormat::Sse => "text/event-stream",
            FeedFormat::GeoJson => "application/geo+json, application/json",
        };
        debug!("GET {} {:?}", self.endpoint, query.query_pairs());

        let resp = self
            .client
            .get(&self.endpoint)
            .header(ACCEPT, accept)
            .query(&query.query_pairs())
            .send()
            .await
            .map_err(FeedError::network)?;

        let status = resp.status();
        if !status.is_success() {
            // The body only feeds the error message; failing to read it
            // falls back to the status code.
            let body = resp.bytes().await.unwrap_or_default();
            return Err(FeedError::from_status(status.as_u16(), &body));
        }
        Ok(resp)
    }
}

impl FeedTransport for HttpTransport {
    fn fetch_collection(&self, query: FeedQuery) -> BoxFuture<'_, Result<Vec<Feature>, FeedError>> {
        Box::pin(async move {
            let resp = self.send(&query).await?;
            let body = resp.bytes().await.map_err(FeedError::network)?;
            let collection: FeatureCollection =
                serde_json::from_slice(&body).map_err(FeedError::decode)?;
            Ok(collection.features)
        })
    }

    fn open_stream(&self, query: FeedQuery) -> BoxFuture<'_, Result<ByteStream, FeedError>> {
        Box::pin(async move {
            let resp = self.send(&query).await?;
            let stream = resp.bytes_stream().map(|chunk| chunk.map_err(FeedError::network));
            Ok(Box::pin(stream) as ByteStream)
        })
    }
}
