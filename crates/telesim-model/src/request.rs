//! The closed request descriptor consumed by the engine.
//!
//! Each request carries a `task` tag selecting one pipeline. Every parameter
//! has a default, and unknown fields are rejected so a misspelled key never
//! silently falls back to its default.

use crate::ModelError;
use serde::{Deserialize, Serialize};
use telesim_ber::{default_snr_list, ConstellationConfig, LinkBerConfig, MimoBerConfig};
use telesim_link::{default_emitters, CombineMode, Emitter, PropagationParams};
use telesim_phy::{AntennaConfig, ChannelKind, CombiningWeights, DemapperKind, Modulation};

// ============================================================================
// Request Descriptor
// ============================================================================

/// One simulation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum SimulationRequest {
    /// Noisy constellation samples.
    Constellation(ConstellationParams),
    /// Single-link BER curve.
    Ber(BerParams),
    /// MIMO repetition-diversity BER comparison.
    MimoComparison(MimoParams),
    /// Single-emitter radio map.
    #[serde(rename = "radiomap")]
    RadioMap(RadioMapParams),
    /// Multi-emitter radio map.
    MultiRadioMap(MultiRadioMapParams),
}

impl SimulationRequest {
    /// The `task` tag of this request.
    pub fn task(&self) -> &'static str {
        match self {
            SimulationRequest::Constellation(_) => "constellation",
            SimulationRequest::Ber(_) => "ber",
            SimulationRequest::MimoComparison(_) => "mimo_comparison",
            SimulationRequest::RadioMap(_) => "radiomap",
            SimulationRequest::MultiRadioMap(_) => "multi_radio_map",
        }
    }
}

// ============================================================================
// Per-task Parameters
// ============================================================================

/// Constellation scatter parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConstellationParams {
    pub modulation: String,
    /// Es/N0 in dB.
    pub snr_db: f64,
    pub n_symbols: usize,
}

impl Default for ConstellationParams {
    fn default() -> Self {
        Self {
            modulation: "16qam".to_string(),
            snr_db: 15.0,
            n_symbols: 2000,
        }
    }
}

impl ConstellationParams {
    pub fn to_config(&self) -> Result<ConstellationConfig, ModelError> {
        Ok(ConstellationConfig {
            modulation: Modulation::parse(&self.modulation)?,
            snr_db: self.snr_db,
            n_symbols: self.n_symbols,
        })
    }
}

/// Single-link BER parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BerParams {
    pub modulation: String,
    /// `"awgn"` or `"rayleigh"`.
    pub channel: String,
    pub snr_db_list: Vec<f64>,
    pub n_bits: u64,
    pub batch_size: usize,
    /// `"app"` (soft) or `"hard"`.
    pub demapper: String,
}

impl Default for BerParams {
    fn default() -> Self {
        Self {
            modulation: "qpsk".to_string(),
            channel: "awgn".to_string(),
            snr_db_list: default_snr_list(),
            n_bits: 200_000,
            batch_size: 2000,
            demapper: "app".to_string(),
        }
    }
}

impl BerParams {
    pub fn to_config(&self) -> Result<LinkBerConfig, ModelError> {
        Ok(LinkBerConfig {
            modulation: Modulation::parse(&self.modulation)?,
            channel: ChannelKind::parse(&self.channel)?,
            snr_db: self.snr_db_list.clone(),
            n_bits: self.n_bits,
            batch_size: self.batch_size,
            demapper: DemapperKind::parse(&self.demapper)?,
        })
    }
}

/// Antenna counts as written in a request. Signed so negative counts reach
/// validation instead of failing to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AntennaSpec {
    pub nt: i64,
    pub nr: i64,
}

impl AntennaSpec {
    pub fn to_config(&self) -> Result<AntennaConfig, ModelError> {
        Ok(AntennaConfig::new(self.nt, self.nr)?)
    }
}

/// MIMO comparison parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MimoParams {
    pub modulation: String,
    pub snr_db_list: Vec<f64>,
    pub configs: Vec<AntennaSpec>,
    pub n_bits: u64,
    pub batch_size: usize,
    /// `"effective"` or `"per_path"`.
    pub combining: String,
}

impl Default for MimoParams {
    fn default() -> Self {
        Self {
            modulation: "64qam".to_string(),
            snr_db_list: default_snr_list(),
            configs: vec![AntennaSpec { nt: 1, nr: 1 }, AntennaSpec { nt: 4, nr: 4 }],
            n_bits: 30_000,
            batch_size: 200,
            combining: "effective".to_string(),
        }
    }
}

impl MimoParams {
    pub fn to_config(&self) -> Result<MimoBerConfig, ModelError> {
        if self.configs.is_empty() {
            return Err(ModelError::InvalidRequest("configs must not be empty".to_string()));
        }
        Ok(MimoBerConfig {
            modulation: Modulation::parse(&self.modulation)?,
            snr_db: self.snr_db_list.clone(),
            configs: self
                .configs
                .iter()
                .map(AntennaSpec::to_config)
                .collect::<Result<_, _>>()?,
            n_bits: self.n_bits,
            batch_size: self.batch_size,
            combining: CombiningWeights::parse(&self.combining)?,
        })
    }
}

/// Single-emitter radio map parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RadioMapParams {
    /// Emitter `(x, y, z)` in meters.
    pub tx_pos: [f64; 3],
    pub rx_grid_size: usize,
    /// `(width, height)` in meters.
    pub area_size: [f64; 2],
    pub frequency_hz: f64,
    pub tx_power_dbm: f64,
    pub pathloss_exp: f64,
    pub rx_height_m: f64,
}

impl Default for RadioMapParams {
    fn default() -> Self {
        let p = PropagationParams::default();
        Self {
            tx_pos: [0.0, 0.0, 10.0],
            rx_grid_size: p.rx_grid_size,
            area_size: [p.area_size_m.0, p.area_size_m.1],
            frequency_hz: p.frequency_hz,
            tx_power_dbm: p.tx_power_dbm,
            pathloss_exp: p.pathloss_exp,
            rx_height_m: p.rx_height_m,
        }
    }
}

impl RadioMapParams {
    pub fn propagation(&self) -> Result<PropagationParams, ModelError> {
        let params = PropagationParams {
            rx_grid_size: self.rx_grid_size,
            area_size_m: (self.area_size[0], self.area_size[1]),
            frequency_hz: self.frequency_hz,
            tx_power_dbm: self.tx_power_dbm,
            pathloss_exp: self.pathloss_exp,
            rx_height_m: self.rx_height_m,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn emitter(&self) -> Emitter {
        Emitter::from(self.tx_pos)
    }
}

/// Multi-emitter radio map parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MultiRadioMapParams {
    /// Emitter positions; absent means the three-emitter default line.
    pub tx_positions: Option<Vec<[f64; 3]>>,
    pub rx_grid_size: usize,
    pub area_size: [f64; 2],
    pub frequency_hz: f64,
    pub tx_power_dbm: f64,
    pub pathloss_exp: f64,
    pub rx_height_m: f64,
    /// `"max"` or `"sum"`.
    pub combine_mode: String,
}

impl Default for MultiRadioMapParams {
    fn default() -> Self {
        let single = RadioMapParams::default();
        Self {
            tx_positions: None,
            rx_grid_size: single.rx_grid_size,
            area_size: single.area_size,
            frequency_hz: single.frequency_hz,
            tx_power_dbm: single.tx_power_dbm,
            pathloss_exp: single.pathloss_exp,
            rx_height_m: single.rx_height_m,
            combine_mode: "max".to_string(),
        }
    }
}

impl MultiRadioMapParams {
    pub fn propagation(&self) -> Result<PropagationParams, ModelError> {
        RadioMapParams {
            tx_pos: [0.0; 3],
            rx_grid_size: self.rx_grid_size,
            area_size: self.area_size,
            frequency_hz: self.frequency_hz,
            tx_power_dbm: self.tx_power_dbm,
            pathloss_exp: self.pathloss_exp,
            rx_height_m: self.rx_height_m,
        }
        .propagation()
    }

    pub fn emitters(&self) -> Result<Vec<Emitter>, ModelError> {
        match &self.tx_positions {
            None => Ok(default_emitters()),
            Some(list) if list.is_empty() => Err(ModelError::InvalidRequest(
                "tx_positions must contain at least one emitter".to_string(),
            )),
            Some(list) => Ok(list.iter().copied().map(Emitter::from).collect()),
        }
    }

    pub fn mode(&self) -> Result<CombineMode, ModelError> {
        Ok(CombineMode::parse(&self.combine_mode)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telesim_phy::PhyError;

    #[test]
    fn test_defaults_from_minimal_yaml() {
        let req: SimulationRequest = serde_yaml::from_str("task: ber").unwrap();
        assert_eq!(req, SimulationRequest::Ber(BerParams::default()));
        assert_eq!(req.task(), "ber");

        let req: SimulationRequest = serde_yaml::from_str("task: mimo_comparison").unwrap();
        let SimulationRequest::MimoComparison(p) = req else {
            panic!("wrong variant");
        };
        let config = p.to_config().unwrap();
        assert_eq!(config.configs, vec![AntennaConfig::siso(), AntennaConfig { nt: 4, nr: 4 }]);
        assert_eq!(config.modulation, Modulation::Qam { order: 64 });
        assert_eq!(config.n_bits, 30_000);
        assert_eq!(config.batch_size, 200);
    }

    #[test]
    fn test_task_tags() {
        for (tag, task) in [
            ("constellation", "constellation"),
            ("radiomap", "radiomap"),
            ("multi_radio_map", "multi_radio_map"),
        ] {
            let req: SimulationRequest = serde_json::from_str(&format!("{{\"task\": \"{}\"}}", tag)).unwrap();
            assert_eq!(req.task(), task);
        }
        assert!(serde_json::from_str::<SimulationRequest>(r#"{"task": "ray_tracing"}"#).is_err());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = serde_yaml::from_str::<SimulationRequest>("task: ber\nsnr_list: [1, 2]");
        assert!(err.is_err());
    }

    #[test]
    fn test_ber_conversion() {
        let yaml = "task: ber\nmodulation: 16-QAM\nchannel: rayleigh\nsnr_db_list: [0, 10]\ndemapper: hard\n";
        let SimulationRequest::Ber(p) = serde_yaml::from_str(yaml).unwrap() else {
            panic!("wrong variant");
        };
        let config = p.to_config().unwrap();
        assert_eq!(config.modulation, Modulation::Qam { order: 16 });
        assert_eq!(config.channel, ChannelKind::FlatFading);
        assert_eq!(config.snr_db, vec![0.0, 10.0]);
        assert_eq!(config.demapper, DemapperKind::Hard);
    }

    #[test]
    fn test_invalid_values_surface_as_errors() {
        let p = BerParams {
            modulation: "32qam".to_string(),
            ..Default::default()
        };
        assert!(matches!(p.to_config(), Err(ModelError::Phy(PhyError::NonSquareOrder(32)))));

        let p = MimoParams {
            configs: vec![AntennaSpec { nt: 0, nr: 4 }],
            ..Default::default()
        };
        assert!(matches!(
            p.to_config(),
            Err(ModelError::Phy(PhyError::InvalidAntennaConfig { nt: 0, nr: 4 }))
        ));

        let p = MimoParams {
            configs: vec![],
            ..Default::default()
        };
        assert!(matches!(p.to_config(), Err(ModelError::InvalidRequest(_))));
    }

    #[test]
    fn test_radio_map_params() {
        let yaml = "task: radiomap\ntx_pos: [5, -5, 20]\nrx_grid_size: 10\n";
        let SimulationRequest::RadioMap(p) = serde_yaml::from_str(yaml).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(p.emitter(), Emitter::new(5.0, -5.0, 20.0));
        let prop = p.propagation().unwrap();
        assert_eq!(prop.rx_grid_size, 10);
        assert_eq!(prop.area_size_m, (200.0, 200.0));

        let zero = RadioMapParams {
            rx_grid_size: 0,
            ..Default::default()
        };
        assert!(matches!(zero.propagation(), Err(ModelError::Link(_))));
    }

    #[test]
    fn test_multi_map_emitters() {
        let p = MultiRadioMapParams::default();
        assert_eq!(p.emitters().unwrap().len(), 3);
        assert_eq!(p.mode().unwrap(), CombineMode::Max);

        let p: MultiRadioMapParams =
            serde_json::from_str(r#"{"tx_positions": [[-50, 0, 10], [50, 0, 10]], "combine_mode": "sum"}"#).unwrap();
        assert_eq!(p.emitters().unwrap()[1], Emitter::new(50.0, 0.0, 10.0));
        assert_eq!(p.mode().unwrap(), CombineMode::Sum);

        let empty = MultiRadioMapParams {
            tx_positions: Some(vec![]),
            ..Default::default()
        };
        assert!(empty.emitters().is_err());

        // A two-element position is malformed.
        assert!(serde_json::from_str::<MultiRadioMapParams>(r#"{"tx_positions": [[1, 2]]}"#).is_err());
    }
}
