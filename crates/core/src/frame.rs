use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::{serde_bits, Bits, DelayMs, PacketId, SessionId, Timestamp};

/// One MAC-sized chunk of an IP packet after transcoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacFrame {
    pub session_id: SessionId,
    pub accumulated_delay: DelayMs,
    pub source_address: String,
    pub created_at: Timestamp,
    /// The chunk as it left the UE, before channel errors.
    #[serde(with = "serde_bits")]
    pub source_bits: Bits,
    pub retransmit_count: u32,
    pub packet_id: PacketId,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub chunk_size_bits: usize,
    /// The chunk as received, possibly corrupted.
    #[serde(with = "serde_bits")]
    pub transcoded_bits: Bits,
    /// Set by the sorter when the frame is filed under its session.
    pub scheduler_enqueued_at: Option<Timestamp>,
}

impl MacFrame {
    pub fn is_intact(&self) -> bool {
        self.transcoded_bits == self.source_bits
    }
}

/// Frames filed under one session, newest first, plus the scheduler claim flag.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionQueue {
    pub busy: bool,
    pub packets: VecDeque<MacFrame>,
}

impl SessionQueue {
    pub fn total_bits(&self) -> usize {
        self.packets.iter().map(|f| f.chunk_size_bits).sum()
    }
}
