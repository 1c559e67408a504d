//! Activity records consumed by network viewers

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use subnet_lte_core::types::{now_ms, Timestamp};
use subnet_lte_core::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityCategory {
    IpPacketsReceived,
    MacPacketsModulated,
    RetransmittedPacket,
    QueuedPacket,
    RejectedPacket,
    SortedPacket,
    SchedulerEmptyState,
    SchedulerAllocatedState,
    ScheduledPackets,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub timestamp: Timestamp,
    pub category: ActivityCategory,
    pub session_id: Option<SessionId>,
    pub message: String,
}

/// Bounded, append-only record of pipeline events. Oldest records go first.
#[derive(Debug)]
pub struct ActivityLog {
    records: VecDeque<ActivityRecord>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::new(),
            capacity,
        }
    }

    pub fn record(&mut self, category: ActivityCategory, session_id: Option<SessionId>, message: String) {
        if self.capacity == 0 {
            return;
        }
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(ActivityRecord {
            timestamp: now_ms(),
            category,
            session_id,
            message,
        });
    }

    /// Up to `limit` of the newest records, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<ActivityRecord> {
        let skip = self.records.len().saturating_sub(limit);
        self.records.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
