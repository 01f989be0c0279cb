//! Wire types for the disaster-event feed.
//!
//! The feed speaks GeoJSON:
//! - complete mode returns one `FeatureCollection`
//! - incremental mode sends `event: features` frames whose `data:` line holds
//!   `{ "features": [...] }`, then a final `event: done` with `{ "total": n }`
//! - failures carry `{ "error": "..." }`

use foundation::{Category, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event name of frames that carry a batch of records.
pub const BATCH_EVENT: &str = "features";

/// Event name of the terminal summary frame.
pub const DONE_EVENT: &str = "done";

/// Response format requested with the `format` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    /// One complete `FeatureCollection`.
    GeoJson,
    /// Server-sent event frames, one batch per frame.
    Sse,
}

impl FeedFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeoJson => "geojson",
            Self::Sse => "sse",
        }
    }
}

/// Point geometry: `[lon, lat]` or `[lon, lat, elevation]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type", default = "point_type")]
    pub kind: String,
    pub coordinates: Vec<f64>,
}

fn point_type() -> String {
    "Point".to_string()
}

impl Geometry {
    pub fn point(lon: f64, lat: f64) -> Self {
        Self {
            kind: point_type(),
            coordinates: vec![lon, lat],
        }
    }

    pub fn lon(&self) -> Option<f64> {
        self.coordinates.first().copied()
    }

    pub fn lat(&self) -> Option<f64> {
        self.coordinates.get(1).copied()
    }

    pub fn elevation(&self) -> Option<f64> {
        self.coordinates.get(2).copied()
    }
}

/// Alert level assigned by the upstream source.
///
/// Levels this client does not know are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Extreme,
    Severe,
    Moderate,
    Minor,
    Other(String),
}

impl From<String> for Severity {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "extreme" => Self::Extreme,
            "severe" => Self::Severe,
            "moderate" => Self::Moderate,
            "minor" => Self::Minor,
            _ => Self::Other(raw),
        }
    }
}

impl From<Severity> for String {
    fn from(s: Severity) -> Self {
        match s {
            Severity::Extreme => "extreme".to_string(),
            Severity::Severe => "severe".to_string(),
            Severity::Moderate => "moderate".to_string(),
            Severity::Minor => "minor".to_string(),
            Severity::Other(raw) => raw,
        }
    }
}

/// Descriptive attributes of one disaster event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventProperties {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "event_type")]
    pub category: Category,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<f64>,
    pub started_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// One feed record. Identity is `properties.id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "feature_type")]
    pub kind: String,
    pub geometry: Geometry,
    pub properties: EventProperties,
}

fn feature_type() -> String {
    "Feature".to_string()
}

impl Feature {
    pub fn new(geometry: Geometry, properties: EventProperties) -> Self {
        Self {
            kind: feature_type(),
            geometry,
            properties,
        }
    }

    pub fn id(&self) -> &str {
        &self.properties.id
    }

    pub fn category(&self) -> &Category {
        &self.properties.category
    }
}

/// Complete-mode response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "collection_type")]
    pub kind: String,
    #[serde(default)]
    pub features: Vec<Feature>,
}

fn collection_type() -> String {
    "FeatureCollection".to_string()
}

/// Payload of a `features` frame. A missing or null list is an empty batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchDocument {
    #[serde(default)]
    pub features: Option<Vec<Feature>>,
}

/// Payload of the terminal `done` frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoneDocument {
    #[serde(default)]
    pub total: Option<u64>,
}

/// Body of a non-success response.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [142.3, 38.1, -10.0] },
            "properties": {
                "id": "usgs-us7000abcd",
                "title": "M 6.1 - off the east coast of Honshu",
                "event_type": "earthquake",
                "source": "usgs",
                "severity": "severe",
                "magnitude": 6.1,
                "started_at": "2024-03-15T10:00:00Z",
                "updated_at": "2024-03-15T10:05:00Z",
                "metadata": { "depth_km": 10 }
            }
        })
    }

    #[test]
    fn decodes_feed_feature() {
        let f: Feature = serde_json::from_value(sample()).unwrap();
        assert_eq!(f.id(), "usgs-us7000abcd");
        assert_eq!(f.category().as_str(), "earthquake");
        assert_eq!(f.properties.severity, Some(Severity::Severe));
        assert_eq!(f.geometry.elevation(), Some(-10.0));
        assert_eq!(f.properties.url, None);
    }

    #[test]
    fn unknown_severity_is_preserved() {
        let mut v = sample();
        v["properties"]["severity"] = json!("catastrophic");
        let f: Feature = serde_json::from_value(v).unwrap();
        assert_eq!(
            f.properties.severity,
            Some(Severity::Other("catastrophic".to_string()))
        );
        let back = serde_json::to_value(&f).unwrap();
        assert_eq!(back["properties"]["severity"], json!("catastrophic"));
    }

    #[test]
    fn optional_attributes_are_omitted_on_output() {
        let mut v = sample();
        v["properties"].as_object_mut().unwrap().remove("severity");
        let f: Feature = serde_json::from_value(v).unwrap();
        let out = serde_json::to_value(&f).unwrap();
        assert!(out["properties"].get("severity").is_none());
        assert!(out["properties"].get("url").is_none());
        assert_eq!(out["type"], json!("Feature"));
    }

    #[test]
    fn batch_document_tolerates_missing_and_null_features() {
        let a: BatchDocument = serde_json::from_str("{}").unwrap();
        let b: BatchDocument = serde_json::from_str(r#"{"features":null}"#).unwrap();
        assert!(a.features.is_none());
        assert!(b.features.is_none());
    }

    #[test]
    fn format_strings() {
        assert_eq!(FeedFormat::GeoJson.as_str(), "geojson");
        assert_eq!(FeedFormat::Sse.as_str(), "sse");
    }
}
