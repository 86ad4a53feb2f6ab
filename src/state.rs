//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;

use crate::config::ServerConfig;

/// Shared application state.
pub struct AppState {
    pub config: ServerConfig,
    /// Call bookkeeping for the control endpoints and the relay handler.
    pub calls: CallRegistry,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            calls: CallRegistry::default(),
        })
    }
}

/// Lifecycle status of a call as the registry sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Minted by the start endpoint, no relay socket yet.
    Created,
    /// A relay session is (or was) running for this id.
    Active,
    /// The relay session ended.
    Ended,
}

#[derive(Debug, Clone)]
pub struct CallRecord {
    pub status: CallStatus,
    pub started_at: Instant,
}

/// In-process registry of known calls.
///
/// An explicit per-state object rather than a process-wide map, so multiple
/// server instances (tests in particular) never share call state. The
/// registry records metadata only; sockets stay owned by their session's
/// tasks.
#[derive(Default)]
pub struct CallRegistry {
    calls: DashMap<String, CallRecord>,
}

impl CallRegistry {
    /// Record a freshly minted call id.
    pub fn register(&self, session_id: &str) {
        self.calls.insert(
            session_id.to_string(),
            CallRecord {
                status: CallStatus::Created,
                started_at: Instant::now(),
            },
        );
    }

    /// A relay session started for this id. Upserts: clients may open the
    /// relay socket without having called the start endpoint first.
    pub fn mark_active(&self, session_id: &str) {
        self.calls
            .entry(session_id.to_string())
            .and_modify(|record| record.status = CallStatus::Active)
            .or_insert(CallRecord {
                status: CallStatus::Active,
                started_at: Instant::now(),
            });
    }

    /// The relay session for this id ended.
    pub fn mark_ended(&self, session_id: &str) {
        if let Some(mut record) = self.calls.get_mut(session_id) {
            record.status = CallStatus::Ended;
        }
    }

    /// Drop a call record, returning it if it existed.
    pub fn remove(&self, session_id: &str) -> Option<CallRecord> {
        self.calls.remove(session_id).map(|(_, record)| record)
    }

    pub fn status(&self, session_id: &str) -> Option<CallStatus> {
        self.calls.get(session_id).map(|record| record.status)
    }

    /// Number of calls currently in the `Active` state.
    pub fn active_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|entry| entry.status == CallStatus::Active)
            .count()
    }
}
