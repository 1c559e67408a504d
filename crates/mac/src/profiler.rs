//! Frame integrity check and the retry budget

use serde::Serialize;
use subnet_lte_core::{MacFrame, UeSession};

use crate::ingestion::retry_session;

/// What the profiler did with one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProfileOutcome {
    Queued { bits: usize },
    Retransmitted { bits: usize, retransmit_count: u32 },
    Rejected { bits: usize },
}

impl ProfileOutcome {
    pub fn status_code(&self) -> u16 {
        match self {
            ProfileOutcome::Queued { .. } => 201,
            ProfileOutcome::Retransmitted { .. } => 200,
            ProfileOutcome::Rejected { .. } => 204,
        }
    }
}

/// Where a profiled frame goes next.
#[derive(Debug)]
pub enum Verdict {
    /// Intact; on to the transmission queue.
    Queue(MacFrame),
    /// Corrupted within budget; the session re-enters the air interface.
    Retransmit(UeSession),
    /// Corrupted with the budget spent; terminal.
    Reject(MacFrame),
}

pub fn judge(mut frame: MacFrame, retransmission_limit: u32, packet_duplication: usize) -> Verdict {
    if frame.is_intact() {
        return Verdict::Queue(frame);
    }
    if frame.retransmit_count + 1 > retransmission_limit {
        return Verdict::Reject(frame);
    }
    frame.retransmit_count += 1;
    Verdict::Retransmit(retry_session(&frame, packet_duplication))
}
