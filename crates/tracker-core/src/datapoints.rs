//! Datapoint usage reduction over "store" events.
//!
//! Each store event reports the datapoints an asset carried when it was
//! written. The summary keeps one entry per event row, in result order. A row
//! whose datapoint list is shorter than the most recent entry already recorded
//! for the same asset inherits that entry's list; a row with an equal or
//! longer list keeps its own. Earlier entries are never rewritten and lists
//! are never merged, so an asset may appear several times in the output.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Result, TrackerError};

/// A row from the distinct `(asset, data)` projection of store events.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreEvent {
    pub asset: String,
    pub data: StoreEventData,
}

/// The payload recorded with a store event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreEventData {
    pub datapoints: Vec<String>,
}

impl StoreEvent {
    /// Decode a storage row, rejecting rows without a string `asset` or a
    /// `data.datapoints` list of strings.
    pub fn from_row(row: Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(row)).map_err(|e| {
            TrackerError::ValidationError(format!("Malformed store event row: {}", e))
        })
    }
}

/// Datapoints reported for one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetDatapointSummary {
    pub asset: String,
    pub datapoints: Vec<String>,
}

/// Response body for the datapoint usage endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatapointUsage {
    /// Sum of the datapoint list lengths across every entry in `assets`
    pub count: usize,
    pub assets: Vec<AssetDatapointSummary>,
}

/// Reduce store events into a datapoint usage summary.
pub fn summarize_datapoints<I>(events: I) -> DatapointUsage
where
    I: IntoIterator<Item = StoreEvent>,
{
    let mut assets: Vec<AssetDatapointSummary> = Vec::new();

    for event in events {
        let mut candidate = AssetDatapointSummary {
            asset: event.asset,
            datapoints: event.data.datapoints,
        };

        // Only the latest entry for the asset is compared against.
        if let Some(existing) = assets.iter().rev().find(|s| s.asset == candidate.asset) {
            if candidate.datapoints.len() < existing.datapoints.len() {
                candidate.datapoints = existing.datapoints.clone();
            }
        }

        assets.push(candidate);
    }

    let count = assets.iter().map(|s| s.datapoints.len()).sum();
    DatapointUsage { count, assets }
}
