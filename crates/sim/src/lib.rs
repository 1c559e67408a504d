//! simulation tools for the LTE sub-network MAC layer

pub mod scenarios;

use subnet_lte_mac::MacConfig;

use scenarios::ScenarioPlan;

pub struct SimulationPresets;

impl SimulationPresets {
    pub fn clear_channel() -> MacConfig {
        MacConfig {
            ber_baseline: 0.6,
            ..MacConfig::default()
        }
    }

    pub fn baseline() -> MacConfig {
        MacConfig::default()
    }

    pub fn noisy_channel() -> MacConfig {
        MacConfig {
            ber_baseline: 0.05,
            ..MacConfig::default()
        }
    }

    /// Half the air interface of the default cell, fed by heavy bursts.
    pub fn congested_cell() -> MacConfig {
        MacConfig {
            tti_bit_budget: 9_000,
            subcarrier_count: 6,
            ..MacConfig::default()
        }
    }

    /// Every preset with the traffic plan it is meant to run under.
    pub fn all() -> Vec<(&'static str, MacConfig, ScenarioPlan)> {
        vec![
            ("Clear Channel", Self::clear_channel(), ScenarioPlan::default()),
            ("Baseline", Self::baseline(), ScenarioPlan::default()),
            ("Noisy Channel", Self::noisy_channel(), ScenarioPlan::default()),
            ("Congested Cell", Self::congested_cell(), ScenarioPlan::heavy()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        for (name, config, _) in SimulationPresets::all() {
            assert!(config.validate().is_ok(), "{name} preset is invalid");
        }
    }

    #[test]
    fn congested_cell_keeps_frame_capacity() {
        assert_eq!(
            SimulationPresets::congested_cell().mac_frame_capacity(),
            SimulationPresets::baseline().mac_frame_capacity()
        );
    }
}
