//! UE registration and retransmission sessions

use rand::Rng;
use subnet_lte_core::types::{now_ms, random_bits};
use subnet_lte_core::{IpPacket, MacFrame, SessionId, UeSession};

use crate::{MacConfig, MacError};

/// Parses the requested packet count of a registration.
pub fn parse_packet_count(raw: &str) -> Result<usize, MacError> {
    raw.trim()
        .parse::<usize>()
        .map_err(|_| MacError::InvalidInput(format!("packet count {raw:?} is not a non-negative integer")))
}

/// Refuses registrations larger than `max`.
pub fn check_packet_count(count: usize, max: usize) -> Result<usize, MacError> {
    if count > max {
        return Err(MacError::InvalidInput(format!(
            "packet count {count} exceeds the per-registration limit of {max}"
        )));
    }
    Ok(count)
}

fn duplicate(packets: Vec<IpPacket>, times: usize) -> Vec<IpPacket> {
    packets
        .into_iter()
        .flat_map(|p| std::iter::repeat(p).take(times))
        .collect()
}

/// Builds a fresh session of `packet_count` random IP packets.
pub fn create_session(config: &MacConfig, source_address: &str, packet_count: usize) -> UeSession {
    let session_id = SessionId::generate();
    let created_at = now_ms();
    let mut rng = rand::rng();
    let packets = (0..packet_count)
        .map(|_| {
            let size = rng.random_range(config.min_ip_packet_size..=config.max_ip_packet_size);
            let bits = random_bits(size, &mut rng);
            IpPacket::new(session_id.clone(), source_address, created_at, bits)
        })
        .collect();

    UeSession {
        source_address: source_address.to_string(),
        created_at,
        session_id,
        requested_packet_count: packet_count,
        packets: duplicate(packets, config.packet_duplication),
    }
}

/// Converts a failed frame back into a one-packet session for another pass
/// through the uplink.
///
/// `frame.retransmit_count` must already count this retransmission.
pub fn retry_session(frame: &MacFrame, packet_duplication: usize) -> UeSession {
    let created_at = now_ms();
    let mut packet = IpPacket::new(
        frame.session_id.clone(),
        frame.source_address.clone(),
        created_at,
        frame.source_bits.clone(),
    );
    packet.accumulated_retransmit_delay = frame.accumulated_delay;
    packet.retransmit_count = frame.retransmit_count;

    UeSession {
        source_address: frame.source_address.clone(),
        created_at,
        session_id: frame.session_id.clone(),
        requested_packet_count: 1,
        packets: duplicate(vec![packet], packet_duplication),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subnet_lte_core::PacketId;

    #[test]
    fn packet_count_parsing() {
        assert_eq!(parse_packet_count("10").unwrap(), 10);
        assert_eq!(parse_packet_count(" 0 ").unwrap(), 0);
        assert!(matches!(parse_packet_count("-3"), Err(MacError::InvalidInput(_))));
        assert!(parse_packet_count("ten").is_err());
        assert!(parse_packet_count("").is_err());
        assert!(parse_packet_count("2.5").is_err());
    }

    #[test]
    fn oversized_counts_are_refused() {
        assert_eq!(check_packet_count(10_000, 10_000).unwrap(), 10_000);
        assert_eq!(check_packet_count(0, 10_000).unwrap(), 0);
        let huge = parse_packet_count("18446744073709551615").unwrap();
        assert!(matches!(
            check_packet_count(huge, MacConfig::default().max_packets_per_registration),
            Err(MacError::InvalidInput(_))
        ));
        assert!(check_packet_count(10_001, 10_000).is_err());
    }

    #[test]
    fn session_packets_respect_size_range() {
        let config = MacConfig::default();
        let session = create_session(&config, "10.0.0.7", 25);
        assert_eq!(session.packets.len(), 25);
        assert_eq!(session.requested_packet_count, 25);
        for p in &session.packets {
            assert!((3_000..=5_000).contains(&p.size));
            assert_eq!(p.payload_bits.len(), p.size);
            assert_eq!(p.session_id, session.session_id);
            assert_eq!(p.retransmit_count, 0);
        }
    }

    #[test]
    fn session_packets_are_duplicated() {
        let config = MacConfig {
            packet_duplication: 3,
            ..Default::default()
        };
        let session = create_session(&config, "10.0.0.7", 2);
        assert_eq!(session.packets.len(), 6);
        assert_eq!(session.packets[0], session.packets[2]);
        assert_ne!(session.packets[2], session.packets[3]);
    }

    #[test]
    fn retry_carries_delay_and_count() {
        let frame = MacFrame {
            session_id: SessionId::from("ue-9"),
            accumulated_delay: 42,
            source_address: "10.0.0.9".into(),
            created_at: 0,
            source_bits: vec![true, false, true],
            retransmit_count: 2,
            packet_id: PacketId::generate(),
            chunk_index: 0,
            total_chunks: 1,
            chunk_size_bits: 3,
            transcoded_bits: vec![false, true, false],
            scheduler_enqueued_at: None,
        };
        let session = retry_session(&frame, 1);
        assert_eq!(session.session_id, frame.session_id);
        assert_eq!(session.packets.len(), 1);
        let packet = &session.packets[0];
        assert_eq!(packet.size, 3);
        assert_eq!(packet.payload_bits, frame.source_bits);
        assert_eq!(packet.accumulated_retransmit_delay, 42);
        assert_eq!(packet.retransmit_count, 2);
    }
}
