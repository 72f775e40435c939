//! Outbound publication of frame results
//!
//! Every processed frame produces one analysis event, a lighter brand event
//! when brands were found, and one durable record keyed by the frame's
//! content hash and stream id.

use crate::error::Result;
use crate::session::StreamSessionManager;
use crate::types::{BrandDetection, FrameResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

pub const ANALYSIS_TOPIC: &str = "stream.video.analysis";
pub const BRAND_TOPIC: &str = "stream.brand.detections";

/// Message bus collaborator
pub trait EventSink: Send + Sync {
    fn publish(&self, topic: &str, payload: &Value) -> Result<()>;
}

/// Persistence collaborator
pub trait FrameStore: Send + Sync {
    fn store(&self, record: FrameRecord) -> Result<()>;
}

/// One durable row per processed frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub stream_id: String,
    /// Hex SHA-256 of the raw frame bytes
    pub frame_hash: String,
    pub detections: Value,
    pub tracked_objects: Value,
    pub brand_detections: Value,
    pub processing_time: f64,
    pub frame_width: u32,
    pub frame_height: u32,
    pub timestamp: DateTime<Utc>,
}

impl FrameRecord {
    pub fn from_result(result: &FrameResult, frame_bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            stream_id: result.stream_id.clone(),
            frame_hash: frame_hash(frame_bytes),
            detections: serde_json::to_value(&result.detections)?,
            tracked_objects: serde_json::to_value(&result.tracked_objects)?,
            brand_detections: serde_json::to_value(&result.brand_detections)?,
            processing_time: result.frame_info.processing_time,
            frame_width: result.frame_info.original_width,
            frame_height: result.frame_info.original_height,
            timestamp: result.timestamp,
        })
    }

    /// Storage key: (frame hash, stream id)
    pub fn key(&self) -> (String, String) {
        (self.frame_hash.clone(), self.stream_id.clone())
    }
}

pub fn frame_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Payload of the brand event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandEvent {
    pub stream_id: String,
    pub brands: Vec<BrandDetection>,
    pub timestamp: DateTime<Utc>,
}

/// Publishes frame results of sessions that are still live
pub struct ResultPublisher {
    events: Arc<dyn EventSink>,
    store: Arc<dyn FrameStore>,
    sessions: Arc<StreamSessionManager>,
}

impl ResultPublisher {
    pub fn new(
        events: Arc<dyn EventSink>,
        store: Arc<dyn FrameStore>,
        sessions: Arc<StreamSessionManager>,
    ) -> Self {
        Self {
            events,
            store,
            sessions,
        }
    }

    /// Publish one frame result.
    ///
    /// Returns `Ok(false)` when the result was produced by a session that has
    /// since been stopped (including one replaced by a restart under the same
    /// stream id) and was discarded. A failing store is logged and does not
    /// fail the frame; a failing event sink does.
    pub fn publish(&self, result: &FrameResult, frame_bytes: &[u8]) -> Result<bool> {
        if !self.sessions.is_current(&result.stream_id, result.session) {
            log::debug!(
                "[{}] Discarding result of frame {} from stopped session {}",
                result.stream_id,
                result.frame_index,
                result.session
            );
            return Ok(false);
        }

        self.events
            .publish(ANALYSIS_TOPIC, &serde_json::to_value(result)?)?;

        if !result.brand_detections.is_empty() {
            let event = BrandEvent {
                stream_id: result.stream_id.clone(),
                brands: result.brand_detections.clone(),
                timestamp: result.timestamp,
            };
            self.events
                .publish(BRAND_TOPIC, &serde_json::to_value(&event)?)?;
        }

        let record = FrameRecord::from_result(result, frame_bytes)?;
        if let Err(e) = self.store.store(record) {
            log::warn!(
                "[{}] Failed to store frame {}: {}",
                result.stream_id,
                result.frame_index,
                e
            );
        }
        Ok(true)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-process event sink keeping every event in publication order
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<(String, Value)>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, Value)> {
        lock(&self.events).clone()
    }

    pub fn topic(&self, topic: &str) -> Vec<Value> {
        lock(&self.events)
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

impl EventSink for MemoryEventSink {
    fn publish(&self, topic: &str, payload: &Value) -> Result<()> {
        lock(&self.events).push((topic.to_string(), payload.clone()));
        Ok(())
    }
}

/// In-process frame store; a repeated key overwrites the earlier record
#[derive(Debug, Default)]
pub struct MemoryFrameStore {
    records: Mutex<HashMap<(String, String), FrameRecord>>,
}

impl MemoryFrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, frame_hash: &str, stream_id: &str) -> Option<FrameRecord> {
        lock(&self.records)
            .get(&(frame_hash.to_string(), stream_id.to_string()))
            .cloned()
    }

    pub fn records(&self) -> Vec<FrameRecord> {
        lock(&self.records).values().cloned().collect()
    }
}

impl FrameStore for MemoryFrameStore {
    fn store(&self, record: FrameRecord) -> Result<()> {
        lock(&self.records).insert(record.key(), record);
        Ok(())
    }
}
