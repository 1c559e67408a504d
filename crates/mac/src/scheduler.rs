//! TTI scheduler rotating round robin, proportional fair and the inverted CQI policy

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use subnet_lte_core::types::now_ms;
use subnet_lte_core::{MacFrame, SessionId};

use crate::activity::ActivityCategory;
use crate::qos::{Delivery, RoundUpdate};
use crate::store::NetworkStore;
use crate::{ClaimPolicy, MacConfig, MacError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Policy {
    #[serde(rename = "RR")]
    RoundRobin,
    #[serde(rename = "PF")]
    ProportionalFair,
    #[serde(rename = "NV")]
    InvertedCqi,
}

impl Policy {
    /// Rotation order of the scheduler.
    pub const ALL: [Policy; 3] = [Policy::RoundRobin, Policy::ProportionalFair, Policy::InvertedCqi];

    pub fn for_cycle(cycle: u64) -> Self {
        Self::ALL[(cycle % Self::ALL.len() as u64) as usize]
    }

    pub fn index(self) -> usize {
        match self {
            Policy::RoundRobin => 0,
            Policy::ProportionalFair => 1,
            Policy::InvertedCqi => 2,
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Policy::RoundRobin => "RR",
            Policy::ProportionalFair => "PF",
            Policy::InvertedCqi => "NV",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Zero becomes the neutral 1.
pub fn limit_of_zero(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        x
    }
}

/// Zero becomes -1, marking an exhausted budget.
pub fn limit_of_zero_signed(x: f64) -> f64 {
    if x == 0.0 {
        -1.0
    } else {
        x
    }
}

/// log10 for positive inputs; non-positive inputs score as themselves.
fn log_term(x: f64) -> f64 {
    if x > 0.0 {
        x.log10()
    } else {
        x
    }
}

fn delay_ratio(budget_ms: u64, delay_ms: u64) -> f64 {
    if delay_ms == 0 {
        1.0
    } else {
        budget_ms as f64 / delay_ms as f64
    }
}

/// Log-domain channel quality score of a frame.
///
/// Proportional fair adds the delay and retransmission terms, the inverted
/// policy subtracts them. Bigger, fresher, less retried frames score higher
/// under proportional fair.
pub fn cqi(frame: &MacFrame, config: &MacConfig, policy: Policy) -> f64 {
    let size = log_term(limit_of_zero(frame.chunk_size_bits as f64));
    let delay = log_term(limit_of_zero(delay_ratio(
        config.effective_delay_budget_ms,
        frame.accumulated_delay,
    )));
    let limit = config.retransmission_limit.max(1) as f64;
    let retries = log_term(limit_of_zero_signed(1.0 - frame.retransmit_count as f64 / limit));
    match policy {
        Policy::InvertedCqi => size - delay - retries,
        _ => size + delay + retries,
    }
}

/// Puts the claimed frames into transmission order.
///
/// The working set arrives newest first. Round robin drains it from the tail,
/// i.e. in arrival order; the CQI policies sort by descending score, ties
/// keeping their working-set order.
pub fn order_frames(policy: Policy, working_set: VecDeque<MacFrame>, config: &MacConfig) -> Vec<MacFrame> {
    match policy {
        Policy::RoundRobin => working_set.into_iter().rev().collect(),
        Policy::ProportionalFair | Policy::InvertedCqi => {
            let mut scored: Vec<(f64, MacFrame)> = working_set
                .into_iter()
                .map(|f| (cqi(&f, config, policy), f))
                .collect();
            scored.sort_by(|a, b| b.0.total_cmp(&a.0));
            scored.into_iter().map(|(_, f)| f).collect()
        }
    }
}

/// Cuts ordered frames into batches of at most `budget` bits.
///
/// A frame larger than the budget on its own still goes out, alone.
pub fn form_batches(ordered: Vec<MacFrame>, budget: usize) -> Vec<Vec<MacFrame>> {
    if ordered.is_empty() {
        return Vec::new();
    }
    let total: usize = ordered.iter().map(|f| f.chunk_size_bits).sum();
    if total <= budget {
        return vec![ordered];
    }

    let mut batches = Vec::new();
    let mut current = Vec::new();
    let mut current_bits = 0;
    for frame in ordered {
        if !current.is_empty() && current_bits + frame.chunk_size_bits > budget {
            batches.push(std::mem::take(&mut current));
            current_bits = 0;
        }
        current_bits += frame.chunk_size_bits;
        current.push(frame);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Result of one scheduler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub cycle: u64,
    pub policy: Policy,
    pub locked_session: Option<SessionId>,
    pub packets_sent: usize,
    pub batches: usize,
    pub bits_sent: u64,
    pub largest_batch: usize,
    pub largest_batch_bits: u64,
}

/// Rotates the three policies over the sorted session queues.
pub struct MacScheduler {
    config: MacConfig,
    cycles: AtomicU64,
}

impl MacScheduler {
    pub fn new(config: MacConfig) -> Self {
        Self {
            config,
            cycles: AtomicU64::new(0),
        }
    }

    /// Cycles started so far, failed ones included.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.cycles.store(0, Ordering::SeqCst);
    }

    /// Cycle numbers start at 1, so a fresh or reset scheduler opens with PF.
    pub async fn run_cycle(&self, store: &NetworkStore) -> Result<CycleSummary, MacError> {
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let policy = Policy::for_cycle(cycle);

        let (claimed, nothing_sorted) = {
            let mut sorted = store.sorted_packets.lock().await;
            let nothing_sorted = sorted.is_empty();
            (sorted.claim(), nothing_sorted)
        };
        let (locked, working_set) = match claimed {
            Some((id, frames)) => (Some(id), frames),
            None => (None, VecDeque::new()),
        };

        match &locked {
            Some(id) => {
                store
                    .record(
                        ActivityCategory::SchedulerAllocatedState,
                        Some(id.clone()),
                        format!("Scheduler {} has been allocated {} packets", policy, working_set.len()),
                    )
                    .await
            }
            None => {
                store
                    .record(
                        ActivityCategory::SchedulerEmptyState,
                        None,
                        if nothing_sorted {
                            format!("Scheduler {} found no sorted sessions", policy)
                        } else {
                            format!("Scheduler {} found no free session", policy)
                        },
                    )
                    .await
            }
        }

        if let Some(frame) = working_set.iter().find(|f| f.scheduler_enqueued_at.is_none()) {
            let err = MacError::Internal(format!(
                "frame {}#{} reached the scheduler without being sorted",
                frame.packet_id, frame.chunk_index
            ));
            error!("scheduler cycle {} ({}) failed: {}", cycle, policy, err);
            if let Some(id) = &locked {
                let mut sorted = store.sorted_packets.lock().await;
                sorted.restore(id, working_set);
                sorted.release(id);
            }
            return Err(err);
        }

        let ordered = order_frames(policy, working_set, &self.config);
        let batches = form_batches(ordered, self.config.tti_bit_budget);

        let now = now_ms();
        let mut deliveries = Vec::new();
        let mut largest_batch = 0;
        let mut largest_batch_bits = 0;
        for (i, batch) in batches.iter().enumerate() {
            let batch_bits: u64 = batch.iter().map(|f| f.chunk_size_bits as u64).sum();
            debug!("{} batch {}: {} frames, {} bits", policy, i, batch.len(), batch_bits);
            if batch_bits > largest_batch_bits || (batch_bits == largest_batch_bits && batch.len() > largest_batch) {
                largest_batch = batch.len();
                largest_batch_bits = batch_bits;
            }
            for frame in batch {
                let enqueued = frame.scheduler_enqueued_at.unwrap_or(now);
                deliveries.push(Delivery::of(frame, now.saturating_sub(enqueued)));
            }
        }
        let bits_sent: u64 = deliveries.iter().map(|d| d.bits).sum();
        let packets_sent = deliveries.len();
        let batch_count = batches.len();

        let lost_packets = match &locked {
            Some(id) => store.rejected_count(id).await as u64,
            None => 0,
        };
        store.transmission[policy.index()].lock().await.apply(RoundUpdate {
            locked: locked.clone(),
            working_set: batches.into_iter().flatten().collect(),
            deliveries,
            lost_packets,
        });

        if let (Some(id), ClaimPolicy::ReleaseAfterRound) = (&locked, self.config.claim_policy) {
            store.sorted_packets.lock().await.release(id);
        }

        store
            .record(
                ActivityCategory::ScheduledPackets,
                locked.clone(),
                format!(
                    "{} packets with total size: {} bits were scheduled by: {}",
                    packets_sent, bits_sent, policy
                ),
            )
            .await;
        info!(
            "cycle {} ({}): {} packets in {} batches, {} bits",
            cycle, policy, packets_sent, batch_count, bits_sent
        );

        Ok(CycleSummary {
            cycle,
            policy,
            locked_session: locked,
            packets_sent,
            batches: batch_count,
            bits_sent,
            largest_batch,
            largest_batch_bits,
        })
    }
}
