use std::sync::Arc;

use log::{debug, trace};
use subnet_lte_core::types::{flip_bits, ms_elapsed, now_ms, Bits, DelayMs};
use subnet_lte_core::{IpPacket, MacFrame, PacketId, UeSession};

use crate::simulated::{is_transcoding_error, NoiseSource};
use crate::MacError;

/// Splits `bits` into chunks of at most `capacity`, remainder last.
pub fn transcoding_plan(bits: usize, capacity: usize) -> Result<Vec<usize>, MacError> {
    if capacity == 0 {
        return Err(MacError::Internal("transcoding plan with zero frame capacity".into()));
    }
    let full = bits / capacity;
    let rem = bits % capacity;
    if full == 0 {
        return Ok(vec![bits]);
    }
    let mut plan = vec![capacity; full];
    if rem > 0 {
        plan.push(rem);
    }
    Ok(plan)
}

/// Turns IP packets into MAC frames through the noisy uplink.
pub struct Transcoder {
    frame_capacity: usize,
    ber_baseline: f64,
    noise: Arc<dyn NoiseSource>,
}

impl Transcoder {
    pub fn new(frame_capacity: usize, ber_baseline: f64, noise: Arc<dyn NoiseSource>) -> Self {
        Self {
            frame_capacity,
            ber_baseline,
            noise,
        }
    }

    /// Frames for one IP packet, in chunk order.
    ///
    /// The noise level is drawn once for the whole packet, so either every
    /// chunk is flipped or none is.
    pub fn transcode(&self, packet: &IpPacket, delay: DelayMs) -> Result<Vec<MacFrame>, MacError> {
        let plan = transcoding_plan(packet.payload_bits.len(), self.frame_capacity)?;
        let noise_level = self.noise.draw();
        let corrupted = is_transcoding_error(noise_level, self.ber_baseline);
        let packet_id = PacketId::generate();
        let total_chunks = plan.len();
        let created_at = now_ms();

        let mut frames = Vec::with_capacity(total_chunks);
        let mut offset = 0;
        for (chunk_index, size) in plan.into_iter().enumerate() {
            let source_bits: Bits = packet.payload_bits[offset..offset + size].to_vec();
            offset += size;
            let transcoded_bits = if corrupted {
                flip_bits(&source_bits)
            } else {
                source_bits.clone()
            };
            trace!(
                "chunk {}/{} of packet {} ({} bits)",
                chunk_index + 1,
                total_chunks,
                packet_id,
                size
            );
            frames.push(MacFrame {
                session_id: packet.session_id.clone(),
                accumulated_delay: delay,
                source_address: packet.source_address.clone(),
                created_at,
                source_bits,
                retransmit_count: packet.retransmit_count,
                packet_id: packet_id.clone(),
                chunk_index,
                total_chunks,
                chunk_size_bits: size,
                transcoded_bits,
                scheduler_enqueued_at: None,
            });
        }

        debug!(
            "packet {} -> {} frames, noise {:.3} ({})",
            packet_id,
            total_chunks,
            noise_level,
            if corrupted { "corrupted" } else { "clean" }
        );
        Ok(frames)
    }

    /// Frames for every packet of a session, in packet then chunk order.
    pub fn modulate_session(&self, session: &UeSession) -> Result<Vec<MacFrame>, MacError> {
        let queued_for = ms_elapsed(session.created_at);
        let mut frames = Vec::new();
        for packet in &session.packets {
            let delay = queued_for + packet.accumulated_retransmit_delay;
            frames.extend(self.transcode(packet, delay)?);
        }
        Ok(frames)
    }
}

/// Rebuilds the source payload from the frames of one packet.
///
/// Frames may arrive in any order; `None` if a chunk is missing or the
/// frames belong to different packets.
#[cfg(test)]
pub fn reassemble(frames: &[MacFrame]) -> Option<Bits> {
    let first = frames.first()?;
    if frames.len() != first.total_chunks || frames.iter().any(|f| f.packet_id != first.packet_id) {
        return None;
    }
    let mut ordered: Vec<&MacFrame> = frames.iter().collect();
    ordered.sort_by_key(|f| f.chunk_index);
    if ordered.iter().enumerate().any(|(i, f)| f.chunk_index != i) {
        return None;
    }
    Some(ordered.iter().flat_map(|f| f.source_bits.iter().copied()).collect())
}
