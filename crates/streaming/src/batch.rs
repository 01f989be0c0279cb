use crate::error::FeedError;
use crate::protocol::{BATCH_EVENT, BatchDocument, DONE_EVENT, DoneDocument, Feature};

const EVENT_PREFIX: &str = "event: ";
const DATA_PREFIX: &str = "data: ";

/// What one decoded frame means to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedFrame {
    /// A batch of records (possibly empty).
    Batch(Vec<Feature>),
    /// Terminal summary sent by the feed. Informational only.
    Done { total: Option<u64> },
    /// Unknown event names, frames without an event or data line, or an empty
    /// payload.
    Ignored,
}

fn split_frame(frame: &str) -> (Option<&str>, Option<&str>) {
    let mut event = None;
    let mut data = None;
    for line in frame.lines() {
        if event.is_none() {
            if let Some(name) = line.strip_prefix(EVENT_PREFIX) {
                event = Some(name);
                continue;
            }
        }
        if data.is_none() {
            if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
                data = Some(payload);
            }
        }
    }
    (event, data)
}

/// Classifies one frame.
///
/// Only a malformed payload in a `features` frame is an error; a malformed
/// `done` payload just loses its total.
pub fn parse_frame(frame: &str) -> Result<FeedFrame, FeedError> {
    let (Some(event), Some(data)) = split_frame(frame) else {
        return Ok(FeedFrame::Ignored);
    };
    if data.trim().is_empty() {
        return Ok(FeedFrame::Ignored);
    }

    match event {
        BATCH_EVENT => {
            let doc: BatchDocument = serde_json::from_str(data).map_err(FeedError::decode)?;
            Ok(FeedFrame::Batch(doc.features.unwrap_or_default()))
        }
        DONE_EVENT => {
            let total = serde_json::from_str::<DoneDocument>(data)
                .ok()
                .and_then(|d| d.total);
            Ok(FeedFrame::Done { total })
        }
        _ => Ok(FeedFrame::Ignored),
    }
}

/// Records carried by a frame, or nothing if the frame is not a batch.
pub fn extract_batch(frame: &str) -> Result<Vec<Feature>, FeedError> {
    match parse_frame(frame)? {
        FeedFrame::Batch(features) => Ok(features),
        FeedFrame::Done { .. } | FeedFrame::Ignored => Ok(Vec::new()),
    }
}
