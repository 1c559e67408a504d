//! MAC network core driving sessions from registration to the scheduler

use std::sync::Arc;

use log::{debug, error, info};
use serde::Serialize;
use serde_json::Value;
use subnet_lte_core::types::{ms_elapsed, now_ms, DelayMs};
use subnet_lte_core::SessionId;

use crate::activity::{ActivityCategory, ActivityRecord};
use crate::framing::Transcoder;
use crate::ingestion::{check_packet_count, create_session, parse_packet_count};
use crate::profiler::{judge, ProfileOutcome, Verdict};
use crate::qos::QosReport;
use crate::scheduler::{CycleSummary, MacScheduler};
use crate::simulated::{NoiseSource, SimulatedChannel};
use crate::store::{NetworkStore, QueueDepths, Section};
use crate::{Buffer, MacConfig, MacError};

/// Closed set of operations a trigger layer can invoke.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// `packet_count` is taken verbatim from the caller and parsed here.
    Register { source_address: String, packet_count: String },
    ModulateNext,
    ProfileNext,
    SortNext,
    RunCycle,
    Reset,
    Inspect { section: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub session_id: SessionId,
    pub packets: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Modulation {
    pub session_id: SessionId,
    pub frames: usize,
    pub delay_ms: DelayMs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortedFrame {
    pub session_id: SessionId,
    pub bits: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Registered(Registration),
    Modulated(Modulation),
    Profiled(ProfileOutcome),
    Sorted(SortedFrame),
    Scheduled(CycleSummary),
    Reset,
    Snapshot(Value),
}

impl Response {
    pub fn status_code(&self) -> u16 {
        match self {
            Response::Profiled(outcome) => outcome.status_code(),
            Response::Sorted(_) => 201,
            _ => 200,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Response::Registered(r) => format!("session {} registered with {} packets", r.session_id, r.packets),
            Response::Modulated(m) => format!("{} MAC frames modulated for session {}", m.frames, m.session_id),
            Response::Profiled(ProfileOutcome::Queued { bits }) => format!("{bits} bit frame queued"),
            Response::Profiled(ProfileOutcome::Retransmitted { bits, retransmit_count }) => {
                format!("{bits} bit frame retransmitted (attempt {retransmit_count})")
            }
            Response::Profiled(ProfileOutcome::Rejected { bits }) => format!("{bits} bit frame rejected"),
            Response::Sorted(s) => format!("{} bit frame sorted for session {}", s.bits, s.session_id),
            Response::Scheduled(c) => format!("{} sent {} bits", c.policy, c.bits_sent),
            Response::Reset => "network reset".to_string(),
            Response::Snapshot(_) => "snapshot".to_string(),
        }
    }
}

pub struct MacNetworkCore {
    config: MacConfig,
    store: Arc<NetworkStore>,
    transcoder: Transcoder,
    scheduler: MacScheduler,
}

impl MacNetworkCore {
    pub fn new(config: MacConfig, noise: Arc<dyn NoiseSource>) -> Result<Arc<Self>, MacError> {
        config.validate()?;
        info!("MacNetworkCore initialized with config: {:?}", config);
        let transcoder = Transcoder::new(config.mac_frame_capacity(), config.ber_baseline, noise);
        Ok(Arc::new(Self {
            store: Arc::new(NetworkStore::new(config.activity_log_capacity)),
            transcoder,
            scheduler: MacScheduler::new(config.clone()),
            config,
        }))
    }

    /// Core backed by the random uplink channel.
    pub fn simulated(config: MacConfig) -> Result<Arc<Self>, MacError> {
        Self::new(config, Arc::new(SimulatedChannel::new()))
    }

    pub fn config(&self) -> &MacConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<NetworkStore> {
        &self.store
    }

    pub async fn register(
        &self,
        source_address: &str,
        packet_count: usize,
    ) -> Result<Registration, MacError> {
        let packet_count = check_packet_count(packet_count, self.config.max_packets_per_registration)?;
        let session = create_session(&self.config, source_address, packet_count);
        let registration = Registration {
            session_id: session.session_id.clone(),
            packets: session.packets.len(),
        };
        debug!(
            "registering session {} from {} ({} packets, {} bits)",
            registration.session_id,
            source_address,
            registration.packets,
            session.total_bits()
        );
        self.store.enqueue_session(session).await;
        self.store
            .record(
                ActivityCategory::IpPacketsReceived,
                Some(registration.session_id.clone()),
                format!("{} IP packets received from {}", registration.packets, source_address),
            )
            .await;
        Ok(registration)
    }

    pub async fn modulate_next(&self) -> Result<Modulation, MacError> {
        let session = self
            .store
            .next_session()
            .await
            .ok_or(MacError::NotFound(Buffer::UeRegister))?;
        let frames = match self.transcoder.modulate_session(&session) {
            Ok(frames) => frames,
            Err(e) => {
                error!("modulating session {} failed: {}", session.session_id, e);
                self.store.enqueue_retry(session).await;
                return Err(e);
            }
        };
        let modulation = Modulation {
            session_id: session.session_id.clone(),
            frames: frames.len(),
            delay_ms: ms_elapsed(session.created_at),
        };
        self.store.stage_frames(frames).await;
        self.store
            .record(
                ActivityCategory::MacPacketsModulated,
                Some(modulation.session_id.clone()),
                format!(
                    "{} MAC packets modulated after {} ms",
                    modulation.frames, modulation.delay_ms
                ),
            )
            .await;
        Ok(modulation)
    }

    pub async fn profile_next(&self) -> Result<ProfileOutcome, MacError> {
        let frame = self
            .store
            .next_staged_frame()
            .await
            .ok_or(MacError::NotFound(Buffer::QueuedMacPackets))?;
        let bits = frame.chunk_size_bits;
        let session_id = frame.session_id.clone();

        let (outcome, category, message) = match judge(
            frame,
            self.config.retransmission_limit,
            self.config.packet_duplication,
        ) {
            Verdict::Queue(frame) => {
                self.store.queue_for_transmission(frame).await;
                (
                    ProfileOutcome::Queued { bits },
                    ActivityCategory::QueuedPacket,
                    format!("{bits} bit MAC packet queued for transmission"),
                )
            }
            Verdict::Retransmit(session) => {
                let retransmit_count = session.packets.first().map_or(0, |p| p.retransmit_count);
                self.store.enqueue_retry(session).await;
                (
                    ProfileOutcome::Retransmitted { bits, retransmit_count },
                    ActivityCategory::RetransmittedPacket,
                    format!("{bits} bit MAC packet corrupted, retransmission {retransmit_count}"),
                )
            }
            Verdict::Reject(frame) => {
                let attempts = frame.retransmit_count;
                self.store.reject(frame).await;
                (
                    ProfileOutcome::Rejected { bits },
                    ActivityCategory::RejectedPacket,
                    format!("{bits} bit MAC packet rejected after {attempts} retransmissions"),
                )
            }
        };
        debug!("session {}: {}", session_id, message);
        self.store.record(category, Some(session_id), message).await;
        Ok(outcome)
    }

    pub async fn sort_next(&self) -> Result<SortedFrame, MacError> {
        let frame = self
            .store
            .next_ready_frame()
            .await
            .ok_or(MacError::NotFound(Buffer::TransmissionQueue))?;
        let sorted = SortedFrame {
            session_id: frame.session_id.clone(),
            bits: frame.chunk_size_bits,
        };
        self.store.sorted_packets.lock().await.file(frame, now_ms());
        self.store
            .record(
                ActivityCategory::SortedPacket,
                Some(sorted.session_id.clone()),
                format!("{} bit MAC packet sorted", sorted.bits),
            )
            .await;
        Ok(sorted)
    }

    pub async fn run_cycle(&self) -> Result<CycleSummary, MacError> {
        self.scheduler.run_cycle(&self.store).await
    }

    /// Back to the state of a freshly constructed core.
    pub async fn reset(&self) {
        self.store.reset().await;
        self.scheduler.reset();
        info!("MacNetworkCore reset");
    }

    pub async fn inspect(&self, section: Section) -> Result<Value, MacError> {
        self.store.snapshot(section).await
    }

    pub async fn report(&self) -> QosReport {
        self.store.report().await
    }

    pub async fn activity(&self, limit: usize) -> Vec<ActivityRecord> {
        self.store.recent_activity(limit).await
    }

    pub async fn depths(&self) -> QueueDepths {
        self.store.depths().await
    }

    /// Cycles run since the last reset.
    pub fn cycles(&self) -> u64 {
        self.scheduler.cycles()
    }

    pub async fn execute(&self, operation: Operation) -> Result<Response, MacError> {
        match operation {
            Operation::Register { source_address, packet_count } => {
                let count = parse_packet_count(&packet_count)?;
                self.register(&source_address, count).await.map(Response::Registered)
            }
            Operation::ModulateNext => self.modulate_next().await.map(Response::Modulated),
            Operation::ProfileNext => self.profile_next().await.map(Response::Profiled),
            Operation::SortNext => self.sort_next().await.map(Response::Sorted),
            Operation::RunCycle => self.run_cycle().await.map(Response::Scheduled),
            Operation::Reset => {
                self.reset().await;
                Ok(Response::Reset)
            }
            Operation::Inspect { section } => {
                let section = section.parse::<Section>()?;
                self.inspect(section).await.map(Response::Snapshot)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::FixedNoise;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn quiet_core() -> Arc<MacNetworkCore> {
        MacNetworkCore::new(MacConfig::default(), Arc::new(FixedNoise(0.0))).unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = MacConfig {
            packet_duplication: 0,
            ..Default::default()
        };
        assert!(MacNetworkCore::new(config, Arc::new(FixedNoise(0.0))).is_err());
    }

    #[tokio::test]
    async fn malformed_registration_mutates_nothing() {
        let core = quiet_core();
        let err = assert_err!(
            core.execute(Operation::Register {
                source_address: "10.0.0.1".into(),
                packet_count: "many".into(),
            })
            .await
        );
        assert_eq!(err.status_code(), 400);
        assert_eq!(core.depths().await, QueueDepths::default());
        assert!(core.activity(10).await.is_empty());
    }

    #[tokio::test]
    async fn oversized_registration_enqueues_nothing() {
        let core = quiet_core();
        let err = assert_err!(
            core.execute(Operation::Register {
                source_address: "10.0.0.1".into(),
                packet_count: "18446744073709551615".into(),
            })
            .await
        );
        assert!(matches!(err, MacError::InvalidInput(_)));
        assert_err!(core.register("10.0.0.1", 10_001).await);
        assert_eq!(core.depths().await, QueueDepths::default());
        assert!(core.activity(10).await.is_empty());
        assert_eq!(
            core.modulate_next().await,
            Err(MacError::NotFound(Buffer::UeRegister))
        );
    }

    #[tokio::test]
    async fn empty_buffers_report_not_found() {
        let core = quiet_core();
        assert_eq!(
            core.modulate_next().await,
            Err(MacError::NotFound(Buffer::UeRegister))
        );
        assert_eq!(
            core.profile_next().await,
            Err(MacError::NotFound(Buffer::QueuedMacPackets))
        );
        assert_eq!(
            core.sort_next().await,
            Err(MacError::NotFound(Buffer::TransmissionQueue))
        );
    }

    #[tokio::test]
    async fn status_codes_follow_outcomes() {
        let core = quiet_core();
        let registered = assert_ok!(
            core.execute(Operation::Register {
                source_address: "10.0.0.1".into(),
                packet_count: "1".into(),
            })
            .await
        );
        assert_eq!(registered.status_code(), 200);
        assert_eq!(assert_ok!(core.execute(Operation::ModulateNext).await).status_code(), 200);
        let profiled = assert_ok!(core.execute(Operation::ProfileNext).await);
        assert_eq!(profiled.status_code(), 201);
        assert_eq!(assert_ok!(core.execute(Operation::SortNext).await).status_code(), 201);
        assert_eq!(assert_ok!(core.execute(Operation::RunCycle).await).status_code(), 200);
        assert_eq!(assert_ok!(core.execute(Operation::Reset).await).status_code(), 200);
    }

    #[tokio::test]
    async fn corrupted_frame_is_retransmitted_ahead_of_new_sessions() {
        let core = MacNetworkCore::new(MacConfig::default(), Arc::new(FixedNoise(0.9))).unwrap();
        assert_ok!(core.register("10.0.0.1", 1).await);
        let first = assert_ok!(core.modulate_next().await);
        assert_ok!(core.register("10.0.0.2", 1).await);
        let outcome = assert_ok!(core.profile_next().await);
        assert!(matches!(outcome, ProfileOutcome::Retransmitted { retransmit_count: 1, .. }));
        let retry = assert_ok!(core.modulate_next().await);
        assert_eq!(retry.session_id, first.session_id);
        assert_eq!(retry.frames, 1);
    }

    #[tokio::test]
    async fn inspect_parses_sections() {
        let core = quiet_core();
        let pending = assert_ok!(
            core.execute(Operation::Inspect {
                section: "Pending".into()
            })
            .await
        );
        assert_eq!(pending, Response::Snapshot(json!(0)));
        let err = assert_err!(
            core.execute(Operation::Inspect {
                section: "Nowhere".into()
            })
            .await
        );
        assert!(matches!(err, MacError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn activity_follows_the_pipeline() {
        let core = quiet_core();
        assert_ok!(core.register("10.0.0.1", 1).await);
        assert_ok!(core.modulate_next().await);
        let categories: Vec<ActivityCategory> = core.activity(10).await.into_iter().map(|r| r.category).collect();
        assert_eq!(
            categories,
            vec![ActivityCategory::IpPacketsReceived, ActivityCategory::MacPacketsModulated]
        );
    }
}
