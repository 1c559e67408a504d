//! MAC sublayer of the simulated LTE sub-network

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod activity;
pub mod framing;
pub mod ingestion;
pub mod network_core;
pub mod profiler;
pub mod qos;
pub mod scheduler;
pub mod simulated;
pub mod sorter;
pub mod store;

pub use activity::{ActivityCategory, ActivityLog, ActivityRecord};
pub use framing::{transcoding_plan, Transcoder};
pub use network_core::{MacNetworkCore, Modulation, Operation, Registration, Response, SortedFrame};
pub use profiler::ProfileOutcome;
pub use qos::{PolicyReport, QosAggregate, QosReport, TransmissionRecord};
pub use scheduler::{CycleSummary, MacScheduler, Policy};
pub use simulated::{FixedNoise, NoiseSource, ScriptedNoise, SimulatedChannel};
pub use store::{NetworkStore, QueueDepths, Section};

/// Named buffers an operation can find empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Buffer {
    UeRegister,
    QueuedMacPackets,
    TransmissionQueue,
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Buffer::UeRegister => "UERegister",
            Buffer::QueuedMacPackets => "QueuedMACPackets",
            Buffer::TransmissionQueue => "TransmissionQueue",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MacError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("nothing to take from {0}")]
    NotFound(Buffer),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MacError {
    /// Result code reported to the trigger layer.
    pub fn status_code(&self) -> u16 {
        match self {
            MacError::InvalidInput(_) => 400,
            MacError::NotFound(_) => 404,
            MacError::Internal(_) => 400,
        }
    }
}

/// Whether a scheduler claim on a session outlives the round that took it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimPolicy {
    /// A session is claimed at most once for its lifetime.
    #[default]
    OneShot,
    /// The busy flag is cleared once the round has committed.
    ReleaseAfterRound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacConfig {
    /// Bits the scheduler may send per TTI.
    pub tti_bit_budget: usize,
    pub subcarrier_count: usize,
    /// A packet is corrupted when its noise draw exceeds this.
    pub ber_baseline: f64,
    pub retransmission_limit: u32,
    pub packet_duplication: usize,
    pub effective_delay_budget_ms: u64,
    pub min_ip_packet_size: usize,
    pub max_ip_packet_size: usize,
    /// Largest packet count one registration may request.
    pub max_packets_per_registration: usize,
    pub claim_policy: ClaimPolicy,
    pub activity_log_capacity: usize,
}

impl Default for MacConfig {
    fn default() -> Self {
        // 100 RBs x 180 bits per 1ms TTI on a 20MHz carrier
        Self {
            tti_bit_budget: 18_000,
            subcarrier_count: 12,
            ber_baseline: 0.2,
            retransmission_limit: 4,
            packet_duplication: 1,
            effective_delay_budget_ms: 300,
            min_ip_packet_size: 3_000,
            max_ip_packet_size: 5_000,
            max_packets_per_registration: 10_000,
            claim_policy: ClaimPolicy::OneShot,
            activity_log_capacity: 10_000,
        }
    }
}

impl MacConfig {
    /// Largest chunk one MAC frame carries.
    pub fn mac_frame_capacity(&self) -> usize {
        self.tti_bit_budget / self.subcarrier_count.max(1)
    }

    pub fn validate(&self) -> Result<(), MacError> {
        if self.tti_bit_budget == 0 {
            return Err(MacError::InvalidInput("tti_bit_budget must be positive".into()));
        }
        if self.subcarrier_count == 0 || self.mac_frame_capacity() == 0 {
            return Err(MacError::InvalidInput(
                "subcarrier_count must leave a non-empty MAC frame".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.ber_baseline) {
            return Err(MacError::InvalidInput(format!(
                "ber_baseline {} outside [0, 1]",
                self.ber_baseline
            )));
        }
        if self.packet_duplication == 0 {
            return Err(MacError::InvalidInput("packet_duplication must be at least 1".into()));
        }
        if self.max_packets_per_registration == 0 {
            return Err(MacError::InvalidInput(
                "max_packets_per_registration must be at least 1".into(),
            ));
        }
        if self.min_ip_packet_size > self.max_ip_packet_size {
            return Err(MacError::InvalidInput(format!(
                "min_ip_packet_size {} exceeds max_ip_packet_size {}",
                self.min_ip_packet_size, self.max_ip_packet_size
            )));
        }
        Ok(())
    }
}
