//! Bounded analysis history and user feedback lists.

use crate::kv::{
    load_json, store_json, KeyValueStore, StorageScope, KEY_ANALYSIS_HISTORY, KEY_USER_FEEDBACK,
};
use chrono::Utc;
use scamguard_core::{
    AnalysisResult, FeedbackVerdict, RiskLevel, StorageError, ThreatKind, Timestamp,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Most history entries kept.
pub const MAX_HISTORY_ENTRIES: usize = 100;

/// Most feedback records kept.
pub const MAX_FEEDBACK_ENTRIES: usize = 100;

/// Summary of one completed analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub domain: String,
    pub target: String,
    pub risk_level: RiskLevel,
    pub threats: BTreeSet<ThreatKind>,
    pub confidence: f32,
    pub timestamp: Timestamp,
}

impl HistoryEntry {
    pub fn from_result(domain: impl Into<String>, target: impl Into<String>, result: &AnalysisResult) -> Self {
        Self {
            domain: domain.into(),
            target: target.into(),
            risk_level: result.risk_level,
            threats: result.threats.clone(),
            confidence: result.confidence,
            timestamp: result.timestamp,
        }
    }
}

/// A user's judgement on a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub domain: String,
    pub reported_risk: RiskLevel,
    pub verdict: FeedbackVerdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub timestamp: Timestamp,
}

impl FeedbackRecord {
    pub fn new(domain: impl Into<String>, reported_risk: RiskLevel, verdict: FeedbackVerdict) -> Self {
        Self {
            domain: domain.into(),
            reported_risk,
            verdict,
            note: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Append-only, newest-last lists in the local scope.
///
/// Appends are serialized through one async lock so concurrent writers do
/// not lose each other's entries.
pub struct HistoryLog {
    store: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl HistoryLog {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn record(&self, entry: HistoryEntry) -> Result<(), StorageError> {
        self.append(KEY_ANALYSIS_HISTORY, entry, MAX_HISTORY_ENTRIES).await
    }

    pub async fn entries(&self) -> Result<Vec<HistoryEntry>, StorageError> {
        self.list(KEY_ANALYSIS_HISTORY).await
    }

    pub async fn record_feedback(&self, record: FeedbackRecord) -> Result<(), StorageError> {
        self.append(KEY_USER_FEEDBACK, record, MAX_FEEDBACK_ENTRIES).await
    }

    pub async fn feedback(&self) -> Result<Vec<FeedbackRecord>, StorageError> {
        self.list(KEY_USER_FEEDBACK).await
    }

    pub async fn clear_history(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.store.remove(StorageScope::Local, KEY_ANALYSIS_HISTORY).await
    }

    async fn list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StorageError> {
        Ok(load_json(self.store.as_ref(), StorageScope::Local, key)
            .await?
            .unwrap_or_default())
    }

    async fn append<T>(&self, key: &str, item: T, cap: usize) -> Result<(), StorageError>
    where
        T: Serialize + DeserializeOwned + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut items: Vec<T> = self.list(key).await?;
        items.push(item);
        if items.len() > cap {
            let excess = items.len() - cap;
            items.drain(..excess);
        }
        store_json(self.store.as_ref(), StorageScope::Local, key, &items).await
    }
}

impl std::fmt::Debug for HistoryLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryLog").finish_non_exhaustive()
    }
}
