use serde::{Deserialize, Serialize};

use crate::types::{serde_bits, Bits, DelayMs, SessionId, Timestamp};

/// An uplink IP packet as it enters the air interface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpPacket {
    pub session_id: SessionId,
    /// Size in bits, always equal to `payload_bits.len()`.
    pub size: usize,
    pub source_address: String,
    pub created_at: Timestamp,
    /// Delay carried over from earlier, failed transmissions of the same bits.
    pub accumulated_retransmit_delay: DelayMs,
    pub retransmit_count: u32,
    #[serde(with = "serde_bits")]
    pub payload_bits: Bits,
}

impl IpPacket {
    pub fn new(
        session_id: SessionId,
        source_address: impl Into<String>,
        created_at: Timestamp,
        payload_bits: Bits,
    ) -> Self {
        Self {
            session_id,
            size: payload_bits.len(),
            source_address: source_address.into(),
            created_at,
            accumulated_retransmit_delay: 0,
            retransmit_count: 0,
            payload_bits,
        }
    }
}

/// A registered UE session waiting for modulation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UeSession {
    pub source_address: String,
    pub created_at: Timestamp,
    pub session_id: SessionId,
    pub requested_packet_count: usize,
    pub packets: Vec<IpPacket>,
}

impl UeSession {
    pub fn total_bits(&self) -> usize {
        self.packets.iter().map(|p| p.size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_follows_payload() {
        let packet = IpPacket::new(SessionId::from("ue-1"), "10.0.0.1", 7, vec![true; 42]);
        assert_eq!(packet.size, 42);
        assert_eq!(packet.retransmit_count, 0);
        assert_eq!(packet.accumulated_retransmit_delay, 0);
    }

    #[test]
    fn session_bits_sum_packets() {
        let id = SessionId::from("ue-1");
        let session = UeSession {
            source_address: "10.0.0.1".into(),
            created_at: 0,
            session_id: id.clone(),
            requested_packet_count: 2,
            packets: vec![
                IpPacket::new(id.clone(), "10.0.0.1", 0, vec![false; 3_000]),
                IpPacket::new(id, "10.0.0.1", 0, vec![false; 4_200]),
            ],
        };
        assert_eq!(session.total_bits(), 7_200);
    }
}
