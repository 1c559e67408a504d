//! Per-policy transmission records and the derived QoS report

use serde::Serialize;
use subnet_lte_core::types::DelayMs;
use subnet_lte_core::{MacFrame, SessionId};

use crate::scheduler::Policy;

/// Running totals for one session under one policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QosAggregate {
    pub packets_received: u64,
    pub total_packet_delay: u64,
    pub total_retransmissions: u64,
    pub total_scheduler_delay: u64,
    pub total_bits: u64,
    pub lost_packets: u64,
}

impl QosAggregate {
    fn per_packet(&self, total: u64) -> f64 {
        if self.packets_received == 0 {
            0.0
        } else {
            total as f64 / self.packets_received as f64
        }
    }

    pub fn average_packet_delay(&self) -> f64 {
        self.per_packet(self.total_packet_delay)
    }

    pub fn average_scheduler_delay(&self) -> f64 {
        self.per_packet(self.total_scheduler_delay)
    }

    pub fn average_retransmissions(&self) -> f64 {
        self.per_packet(self.total_retransmissions)
    }

    /// Lost frames as a percentage of everything the session offered.
    pub fn packet_loss_ratio(&self) -> f64 {
        let offered = self.lost_packets + self.packets_received;
        if offered == 0 {
            0.0
        } else {
            self.lost_packets as f64 * 100.0 / offered as f64
        }
    }
}

/// One frame as it left the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub bits: u64,
    pub packet_delay: DelayMs,
    pub retransmissions: u64,
    pub scheduler_delay: DelayMs,
}

impl Delivery {
    pub fn of(frame: &MacFrame, scheduler_delay: DelayMs) -> Self {
        Self {
            bits: frame.chunk_size_bits as u64,
            packet_delay: frame.accumulated_delay,
            retransmissions: frame.retransmit_count as u64,
            scheduler_delay,
        }
    }
}

/// Everything one scheduling round commits, applied in one step.
#[derive(Debug, Clone, Default)]
pub struct RoundUpdate {
    pub locked: Option<SessionId>,
    pub working_set: Vec<MacFrame>,
    pub deliveries: Vec<Delivery>,
    /// Rejected frames of the locked session at commit time.
    pub lost_packets: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionQos {
    pub session_id: SessionId,
    pub qos: QosAggregate,
}

/// What one policy has transmitted so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransmissionRecord {
    pub locked: Option<SessionId>,
    pub packets: Vec<MacFrame>,
    pub sessions: Vec<SessionQos>,
    pub cumulative_bits_sent: u64,
}

impl TransmissionRecord {
    #[cfg(test)]
    pub fn qos(&self, session_id: &SessionId) -> Option<&QosAggregate> {
        self.sessions
            .iter()
            .find(|s| &s.session_id == session_id)
            .map(|s| &s.qos)
    }

    fn qos_mut(&mut self, session_id: &SessionId) -> &mut QosAggregate {
        let idx = match self.sessions.iter().position(|s| &s.session_id == session_id) {
            Some(idx) => idx,
            None => {
                self.sessions.push(SessionQos {
                    session_id: session_id.clone(),
                    qos: QosAggregate::default(),
                });
                self.sessions.len() - 1
            }
        };
        &mut self.sessions[idx].qos
    }

    pub fn apply(&mut self, update: RoundUpdate) {
        self.locked = update.locked.clone();
        self.packets = update.working_set;
        let Some(session_id) = update.locked else {
            return;
        };
        if update.deliveries.is_empty() {
            return;
        }
        let mut bits_sent = 0;
        let qos = self.qos_mut(&session_id);
        for d in &update.deliveries {
            qos.packets_received += 1;
            qos.total_packet_delay += d.packet_delay;
            qos.total_retransmissions += d.retransmissions;
            qos.total_scheduler_delay += d.scheduler_delay;
            qos.total_bits += d.bits;
            bits_sent += d.bits;
        }
        qos.lost_packets = update.lost_packets;
        self.cumulative_bits_sent += bits_sent;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub packets_received: u64,
    pub avg_packet_delay_ms: f64,
    pub avg_scheduler_delay_ms: f64,
    pub avg_retransmissions: f64,
    pub packet_loss_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyReport {
    pub policy: Policy,
    pub bits_sent: u64,
    pub sessions_served: usize,
    pub sessions: Vec<SessionReport>,
    pub mean_packet_delay_ms: f64,
    pub mean_scheduler_delay_ms: f64,
    pub mean_retransmissions: f64,
    pub mean_packet_loss_ratio: f64,
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

impl PolicyReport {
    pub fn from_record(policy: Policy, record: &TransmissionRecord) -> Self {
        let sessions: Vec<SessionReport> = record
            .sessions
            .iter()
            .map(|s| SessionReport {
                session_id: s.session_id.clone(),
                packets_received: s.qos.packets_received,
                avg_packet_delay_ms: s.qos.average_packet_delay(),
                avg_scheduler_delay_ms: s.qos.average_scheduler_delay(),
                avg_retransmissions: s.qos.average_retransmissions(),
                packet_loss_ratio: s.qos.packet_loss_ratio(),
            })
            .collect();
        Self {
            policy,
            bits_sent: record.cumulative_bits_sent,
            sessions_served: sessions.len(),
            mean_packet_delay_ms: mean(sessions.iter().map(|s| s.avg_packet_delay_ms)),
            mean_scheduler_delay_ms: mean(sessions.iter().map(|s| s.avg_scheduler_delay_ms)),
            mean_retransmissions: mean(sessions.iter().map(|s| s.avg_retransmissions)),
            mean_packet_loss_ratio: mean(sessions.iter().map(|s| s.packet_loss_ratio)),
            sessions,
        }
    }
}

/// Side-by-side comparison of the three policies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QosReport {
    pub policies: Vec<PolicyReport>,
}

impl QosReport {
    pub fn policy(&self, policy: Policy) -> Option<&PolicyReport> {
        self.policies.iter().find(|p| p.policy == policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery(bits: u64, delay: u64, retransmissions: u64) -> Delivery {
        Delivery {
            bits,
            packet_delay: delay,
            retransmissions,
            scheduler_delay: 5,
        }
    }

    #[test]
    fn aggregates_two_frames_of_one_session() {
        let mut record = TransmissionRecord::default();
        let session = SessionId::from("ue-1");
        record.apply(RoundUpdate {
            locked: Some(session.clone()),
            working_set: vec![],
            deliveries: vec![delivery(1_000, 50, 0), delivery(2_000, 100, 1)],
            lost_packets: 0,
        });
        let qos = record.qos(&session).unwrap();
        assert_eq!(qos.packets_received, 2);
        assert_eq!(qos.total_packet_delay, 150);
        assert_eq!(qos.total_retransmissions, 1);
        assert_eq!(qos.total_scheduler_delay, 10);
        assert_eq!(qos.total_bits, 3_000);
        assert_eq!(record.cumulative_bits_sent, 3_000);
    }

    #[test]
    fn later_rounds_accumulate_and_refresh_loss() {
        let mut record = TransmissionRecord::default();
        let session = SessionId::from("ue-1");
        for lost in [1, 3] {
            record.apply(RoundUpdate {
                locked: Some(session.clone()),
                working_set: vec![],
                deliveries: vec![delivery(500, 10, 0)],
                lost_packets: lost,
            });
        }
        let qos = record.qos(&session).unwrap();
        assert_eq!(qos.packets_received, 2);
        assert_eq!(qos.lost_packets, 3);
        assert_eq!(qos.packet_loss_ratio(), 60.0);
        assert_eq!(record.sessions.len(), 1);
    }

    #[test]
    fn empty_round_records_lock_only() {
        let mut record = TransmissionRecord::default();
        record.apply(RoundUpdate::default());
        assert!(record.sessions.is_empty());
        assert_eq!(record.cumulative_bits_sent, 0);
        assert!(record.locked.is_none());
    }

    #[test]
    fn report_averages() {
        let mut record = TransmissionRecord::default();
        record.apply(RoundUpdate {
            locked: Some(SessionId::from("a")),
            working_set: vec![],
            deliveries: vec![delivery(100, 40, 2), delivery(100, 60, 0)],
            lost_packets: 0,
        });
        record.apply(RoundUpdate {
            locked: Some(SessionId::from("b")),
            working_set: vec![],
            deliveries: vec![delivery(300, 100, 0)],
            lost_packets: 1,
        });
        let report = PolicyReport::from_record(Policy::ProportionalFair, &record);
        assert_eq!(report.bits_sent, 500);
        assert_eq!(report.sessions_served, 2);
        assert_eq!(report.sessions[0].avg_packet_delay_ms, 50.0);
        assert_eq!(report.sessions[0].avg_retransmissions, 1.0);
        assert_eq!(report.sessions[1].packet_loss_ratio, 50.0);
        assert_eq!(report.mean_packet_delay_ms, 75.0);
        assert_eq!(report.mean_packet_loss_ratio, 25.0);
    }

    #[test]
    fn empty_aggregate_has_zero_ratios() {
        let qos = QosAggregate::default();
        assert_eq!(qos.average_packet_delay(), 0.0);
        assert_eq!(qos.packet_loss_ratio(), 0.0);
    }
}
