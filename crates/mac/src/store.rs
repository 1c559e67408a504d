//! Shared buffers of one network instance

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{json, Map, Value};
use subnet_lte_core::{MacFrame, SessionId, UeSession};
use tokio::sync::Mutex;

use crate::activity::{ActivityCategory, ActivityLog, ActivityRecord};
use crate::qos::{PolicyReport, QosReport, TransmissionRecord};
use crate::scheduler::Policy;
use crate::sorter::SortedSessions;
use crate::MacError;

/// A named view accepted by `inspect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    UeRegister,
    QueuedMacPackets,
    TransmissionQueue,
    RejectedPackets,
    SortedPackets,
    Transmission,
    /// Frames waiting for the profiler.
    Pending,
    /// Session ids of rejected frames.
    Rejected,
    Report,
    /// Every section except `Report`.
    All,
}

impl Section {
    pub const NAMED: [Section; 8] = [
        Section::UeRegister,
        Section::QueuedMacPackets,
        Section::TransmissionQueue,
        Section::RejectedPackets,
        Section::SortedPackets,
        Section::Transmission,
        Section::Pending,
        Section::Rejected,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Section::UeRegister => "UERegister",
            Section::QueuedMacPackets => "QueuedMACPackets",
            Section::TransmissionQueue => "TransmissionQueue",
            Section::RejectedPackets => "RejectedPackets",
            Section::SortedPackets => "SortedPackets",
            Section::Transmission => "Transmission",
            Section::Pending => "Pending",
            Section::Rejected => "Rejected",
            Section::Report => "Report",
            Section::All => "all",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Section {
    type Err = MacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Section::All);
        }
        if s == Section::Report.name() {
            return Ok(Section::Report);
        }
        Section::NAMED
            .into_iter()
            .find(|section| section.name() == s)
            .ok_or_else(|| MacError::InvalidInput(format!("unknown section {s:?}")))
    }
}

/// Buffer sizes at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueDepths {
    pub ue_register: usize,
    pub queued_mac_packets: usize,
    pub transmission_queue: usize,
    pub sorted_sessions: usize,
    pub sorted_frames: usize,
    pub sorted_bits: usize,
    pub rejected_packets: usize,
}

/// Owns every buffer of the pipeline. Each buffer sits behind its own lock.
pub struct NetworkStore {
    pub(crate) ue_register: Mutex<VecDeque<UeSession>>,
    pub(crate) queued_mac_packets: Mutex<VecDeque<MacFrame>>,
    pub(crate) transmission_queue: Mutex<VecDeque<MacFrame>>,
    pub(crate) rejected_packets: Mutex<VecDeque<MacFrame>>,
    pub(crate) sorted_packets: Mutex<SortedSessions>,
    /// Indexed by `Policy::index`.
    pub(crate) transmission: [Mutex<TransmissionRecord>; 3],
    activity: Mutex<ActivityLog>,
    activity_capacity: usize,
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, MacError> {
    serde_json::to_value(value).map_err(|e| MacError::Internal(format!("snapshot failed: {e}")))
}

impl NetworkStore {
    pub fn new(activity_capacity: usize) -> Self {
        Self {
            ue_register: Mutex::new(VecDeque::new()),
            queued_mac_packets: Mutex::new(VecDeque::new()),
            transmission_queue: Mutex::new(VecDeque::new()),
            rejected_packets: Mutex::new(VecDeque::new()),
            sorted_packets: Mutex::new(SortedSessions::new()),
            transmission: Default::default(),
            activity: Mutex::new(ActivityLog::new(activity_capacity)),
            activity_capacity,
        }
    }

    pub async fn record(&self, category: ActivityCategory, session_id: Option<SessionId>, message: String) {
        self.activity.lock().await.record(category, session_id, message);
    }

    pub async fn recent_activity(&self, limit: usize) -> Vec<ActivityRecord> {
        self.activity.lock().await.recent(limit)
    }

    /// New sessions enter at the head; the modulator consumes from the tail.
    pub async fn enqueue_session(&self, session: UeSession) {
        self.ue_register.lock().await.push_front(session);
    }

    /// Retries go to the consume end so they are modulated next.
    pub async fn enqueue_retry(&self, session: UeSession) {
        self.ue_register.lock().await.push_back(session);
    }

    pub async fn next_session(&self) -> Option<UeSession> {
        self.ue_register.lock().await.pop_back()
    }

    /// Stages the frames of one session so they come out in chunk order.
    pub async fn stage_frames(&self, frames: Vec<MacFrame>) {
        let mut staged = self.queued_mac_packets.lock().await;
        for frame in frames {
            staged.push_front(frame);
        }
    }

    pub async fn next_staged_frame(&self) -> Option<MacFrame> {
        self.queued_mac_packets.lock().await.pop_back()
    }

    pub async fn queue_for_transmission(&self, frame: MacFrame) {
        self.transmission_queue.lock().await.push_front(frame);
    }

    pub async fn next_ready_frame(&self) -> Option<MacFrame> {
        self.transmission_queue.lock().await.pop_back()
    }

    pub async fn reject(&self, frame: MacFrame) {
        self.rejected_packets.lock().await.push_back(frame);
    }

    pub async fn rejected_count(&self, session_id: &SessionId) -> usize {
        self.rejected_packets
            .lock()
            .await
            .iter()
            .filter(|f| &f.session_id == session_id)
            .count()
    }

    pub async fn depths(&self) -> QueueDepths {
        let (sorted_sessions, sorted_frames, sorted_bits) = {
            let sorted = self.sorted_packets.lock().await;
            (sorted.len(), sorted.waiting_frames(), sorted.waiting_bits())
        };
        QueueDepths {
            ue_register: self.ue_register.lock().await.len(),
            queued_mac_packets: self.queued_mac_packets.lock().await.len(),
            transmission_queue: self.transmission_queue.lock().await.len(),
            sorted_sessions,
            sorted_frames,
            sorted_bits,
            rejected_packets: self.rejected_packets.lock().await.len(),
        }
    }

    pub async fn report(&self) -> QosReport {
        let mut policies = Vec::with_capacity(Policy::ALL.len());
        for policy in Policy::ALL {
            let record = self.transmission[policy.index()].lock().await;
            policies.push(PolicyReport::from_record(policy, &record));
        }
        QosReport { policies }
    }

    /// Empties every buffer and record, then starts a fresh activity log.
    pub async fn reset(&self) {
        self.ue_register.lock().await.clear();
        self.queued_mac_packets.lock().await.clear();
        self.transmission_queue.lock().await.clear();
        self.rejected_packets.lock().await.clear();
        *self.sorted_packets.lock().await = SortedSessions::new();
        for record in &self.transmission {
            *record.lock().await = TransmissionRecord::default();
        }
        *self.activity.lock().await = ActivityLog::new(self.activity_capacity);
    }

    pub async fn snapshot(&self, section: Section) -> Result<Value, MacError> {
        if section != Section::All {
            return self.section_value(section).await;
        }
        let mut all = Map::new();
        for section in Section::NAMED {
            all.insert(section.name().to_string(), self.section_value(section).await?);
        }
        Ok(Value::Object(all))
    }

    async fn section_value(&self, section: Section) -> Result<Value, MacError> {
        match section {
            Section::UeRegister => to_value(&*self.ue_register.lock().await),
            Section::QueuedMacPackets => to_value(&*self.queued_mac_packets.lock().await),
            Section::TransmissionQueue => to_value(&*self.transmission_queue.lock().await),
            Section::RejectedPackets => to_value(&*self.rejected_packets.lock().await),
            Section::SortedPackets => to_value(&*self.sorted_packets.lock().await),
            Section::Transmission => {
                let mut records = Map::new();
                for policy in Policy::ALL {
                    let record = self.transmission[policy.index()].lock().await;
                    records.insert(policy.short_name().to_string(), to_value(&*record)?);
                }
                Ok(Value::Object(records))
            }
            Section::Pending => Ok(json!(self.queued_mac_packets.lock().await.len())),
            Section::Rejected => {
                let rejected = self.rejected_packets.lock().await;
                let ids: Vec<&SessionId> = rejected.iter().map(|f| &f.session_id).collect();
                to_value(&ids)
            }
            Section::Report => to_value(&self.report().await),
            Section::All => Err(MacError::Internal("\"all\" is not a single section".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subnet_lte_core::PacketId;

    fn frame(session: &str, chunk_index: usize) -> MacFrame {
        MacFrame {
            session_id: SessionId::from(session),
            accumulated_delay: 0,
            source_address: "10.0.0.1".into(),
            created_at: 0,
            source_bits: vec![true; 8],
            retransmit_count: 0,
            packet_id: PacketId::generate(),
            chunk_index,
            total_chunks: 3,
            chunk_size_bits: 8,
            transcoded_bits: vec![true; 8],
            scheduler_enqueued_at: None,
        }
    }

    fn session(id: &str) -> UeSession {
        UeSession {
            source_address: "10.0.0.1".into(),
            created_at: 0,
            session_id: SessionId::from(id),
            requested_packet_count: 0,
            packets: Vec::new(),
        }
    }

    #[test]
    fn section_names_parse() {
        for section in Section::NAMED {
            assert_eq!(section.name().parse::<Section>().unwrap(), section);
        }
        assert_eq!("all".parse::<Section>().unwrap(), Section::All);
        assert_eq!("Report".parse::<Section>().unwrap(), Section::Report);
        assert!(matches!("Bogus".parse::<Section>(), Err(MacError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn register_is_fifo_and_retries_jump_ahead() {
        let store = NetworkStore::new(16);
        store.enqueue_session(session("first")).await;
        store.enqueue_session(session("second")).await;
        store.enqueue_retry(session("retry")).await;
        let order: Vec<String> = [
            store.next_session().await.unwrap(),
            store.next_session().await.unwrap(),
            store.next_session().await.unwrap(),
        ]
        .into_iter()
        .map(|s| s.session_id.0)
        .collect();
        assert_eq!(order, vec!["retry", "first", "second"]);
        assert!(store.next_session().await.is_none());
    }

    #[tokio::test]
    async fn staged_frames_keep_chunk_order() {
        let store = NetworkStore::new(16);
        store.stage_frames(vec![frame("a", 0), frame("a", 1), frame("a", 2)]).await;
        store.stage_frames(vec![frame("b", 0)]).await;
        let mut seen = Vec::new();
        while let Some(f) = store.next_staged_frame().await {
            seen.push((f.session_id.0, f.chunk_index));
        }
        assert_eq!(
            seen,
            vec![("a".into(), 0), ("a".into(), 1), ("a".into(), 2), ("b".into(), 0)]
        );
    }

    #[tokio::test]
    async fn rejected_count_is_per_session() {
        let store = NetworkStore::new(16);
        store.reject(frame("a", 0)).await;
        store.reject(frame("a", 1)).await;
        store.reject(frame("b", 0)).await;
        assert_eq!(store.rejected_count(&SessionId::from("a")).await, 2);
        assert_eq!(store.rejected_count(&SessionId::from("c")).await, 0);
        let rejected = store.snapshot(Section::Rejected).await.unwrap();
        assert_eq!(rejected, json!(["a", "a", "b"]));
    }

    #[tokio::test]
    async fn reset_empties_everything() {
        let store = NetworkStore::new(16);
        store.enqueue_session(session("a")).await;
        store.stage_frames(vec![frame("a", 0)]).await;
        store.reject(frame("a", 1)).await;
        store.record(ActivityCategory::QueuedPacket, None, "x".into()).await;
        store.reset().await;
        assert_eq!(store.depths().await, QueueDepths::default());
        assert!(store.recent_activity(10).await.is_empty());
        assert_eq!(store.snapshot(Section::Pending).await.unwrap(), json!(0));
    }

    #[tokio::test]
    async fn all_covers_named_sections_without_report() {
        let store = NetworkStore::new(16);
        let all = store.snapshot(Section::All).await.unwrap();
        let object = all.as_object().unwrap();
        assert_eq!(object.len(), Section::NAMED.len());
        assert!(object.contains_key("SortedPackets"));
        assert!(!object.contains_key("Report"));
        assert_eq!(object["Transmission"]["PF"]["cumulative_bits_sent"], json!(0));
    }
}
