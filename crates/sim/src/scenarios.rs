//! Traffic scenarios driving a MAC network core tick by tick

use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;
use subnet_lte_mac::{MacConfig, MacError, MacNetworkCore, NoiseSource, ProfileOutcome, QosReport, SimulatedChannel};

/// Shape of the offered load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioPlan {
    pub ticks: usize,
    /// A burst is registered every `burst_interval` ticks, starting at tick 0.
    pub burst_interval: usize,
    /// Packets per burst.
    pub burst_size: usize,
    /// Modulate, profile and sort calls per tick, each.
    pub stage_steps: usize,
    /// Distinct UE addresses the bursts rotate through.
    pub ue_count: usize,
}

impl Default for ScenarioPlan {
    fn default() -> Self {
        Self {
            ticks: 60,
            burst_interval: 5,
            burst_size: 4,
            stage_steps: 16,
            ue_count: 4,
        }
    }
}

impl ScenarioPlan {
    pub fn heavy() -> Self {
        Self {
            ticks: 60,
            burst_interval: 2,
            burst_size: 10,
            stage_steps: 24,
            ue_count: 8,
        }
    }

    fn bursts_at(&self, tick: usize) -> bool {
        tick % self.burst_interval.max(1) == 0
    }

    fn address(&self, tick: usize) -> String {
        let ue = (tick / self.burst_interval.max(1)) % self.ue_count.max(1);
        format!("10.45.0.{}", ue + 1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub ok: u64,
    /// NotFound: the stage had nothing to do.
    pub idle: u64,
    pub failed: u64,
}

impl Tally {
    fn count<T>(&mut self, stage: &str, result: Result<T, MacError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.ok += 1;
                Some(value)
            }
            Err(MacError::NotFound(_)) => {
                self.idle += 1;
                None
            }
            Err(e) => {
                warn!("{} failed: {}", stage, e);
                self.failed += 1;
                None
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileTally {
    pub queued: u64,
    pub retransmitted: u64,
    pub rejected: u64,
    pub idle: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioOutcome {
    pub registrations: u64,
    pub packets_offered: u64,
    pub modulate: Tally,
    pub profile: ProfileTally,
    pub sort: Tally,
    pub cycles: Tally,
    pub bits_sent: u64,
    pub report: QosReport,
}

/// Runs `plan` on a fresh core over the random uplink channel.
pub async fn run_scenario(config: MacConfig, plan: ScenarioPlan) -> Result<ScenarioOutcome, MacError> {
    run_scenario_with_noise(config, plan, Arc::new(SimulatedChannel::new())).await
}

pub async fn run_scenario_with_noise(
    config: MacConfig,
    plan: ScenarioPlan,
    noise: Arc<dyn NoiseSource>,
) -> Result<ScenarioOutcome, MacError> {
    let core = MacNetworkCore::new(config, noise)?;
    Ok(drive(&core, &plan, |_| {}).await)
}

/// Drives an existing core, calling `on_tick` after every tick.
pub async fn drive(core: &MacNetworkCore, plan: &ScenarioPlan, mut on_tick: impl FnMut(usize)) -> ScenarioOutcome {
    info!("running scenario: {:?}", plan);
    let mut registrations = 0;
    let mut packets_offered = 0;
    let mut modulate = Tally::default();
    let mut profile = ProfileTally::default();
    let mut sort = Tally::default();
    let mut cycles = Tally::default();
    let mut bits_sent = 0;

    for tick in 0..plan.ticks {
        if plan.bursts_at(tick) {
            match core.register(&plan.address(tick), plan.burst_size).await {
                Ok(registration) => {
                    registrations += 1;
                    packets_offered += registration.packets as u64;
                }
                Err(e) => warn!("registration at tick {} failed: {}", tick, e),
            }
        }

        for _ in 0..plan.stage_steps {
            modulate.count("modulate", core.modulate_next().await);
        }
        for _ in 0..plan.stage_steps {
            match core.profile_next().await {
                Ok(ProfileOutcome::Queued { .. }) => profile.queued += 1,
                Ok(ProfileOutcome::Retransmitted { .. }) => profile.retransmitted += 1,
                Ok(ProfileOutcome::Rejected { .. }) => profile.rejected += 1,
                Err(MacError::NotFound(_)) => profile.idle += 1,
                Err(e) => {
                    warn!("profile failed: {}", e);
                    profile.failed += 1;
                }
            }
        }
        for _ in 0..plan.stage_steps {
            sort.count("sort", core.sort_next().await);
        }
        if let Some(summary) = cycles.count("cycle", core.run_cycle().await) {
            debug!("tick {}: {} bits sent by {}", tick, summary.bits_sent, summary.policy);
            bits_sent += summary.bits_sent;
        }
        on_tick(tick);
    }

    info!(
        "scenario done: {} sessions, {} packets offered, {} bits sent",
        registrations, packets_offered, bits_sent
    );
    ScenarioOutcome {
        registrations,
        packets_offered,
        modulate,
        profile,
        sort,
        cycles,
        bits_sent,
        report: core.report().await,
    }
}
