//! Climate scenario parameters and the risk model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::species::SpeciesRecord;

/// Habitat loss is given in percent; this brings it to the temperature scale.
pub const HABITAT_LOSS_SCALE: f64 = 10.0;

/// CO₂ is given in ppm above baseline; this brings it to the temperature scale.
pub const CO2_SCALE: f64 = 100.0;

/// The current climate scenario.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClimateParameters {
    /// Warming in °C.
    pub temp: f64,
    /// Habitat loss in percent.
    pub habitat_loss: f64,
    /// Additional CO₂ in ppm.
    pub co2: f64,
}

impl ClimateParameters {
    pub fn new(temp: f64, habitat_loss: f64, co2: f64) -> Self {
        Self {
            temp,
            habitat_loss,
            co2,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn get(&self, param: ClimateParameter) -> f64 {
        match param {
            ClimateParameter::Temp => self.temp,
            ClimateParameter::HabitatLoss => self.habitat_loss,
            ClimateParameter::Co2 => self.co2,
        }
    }

    pub fn set(&mut self, param: ClimateParameter, value: f64) {
        match param {
            ClimateParameter::Temp => self.temp = value,
            ClimateParameter::HabitatLoss => self.habitat_loss = value,
            ClimateParameter::Co2 => self.co2 = value,
        }
    }
}

/// Names one field of [`ClimateParameters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClimateParameter {
    Temp,
    HabitatLoss,
    Co2,
}

impl ClimateParameter {
    pub const ALL: [ClimateParameter; 3] = [
        ClimateParameter::Temp,
        ClimateParameter::HabitatLoss,
        ClimateParameter::Co2,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ClimateParameter::Temp => "temp",
            ClimateParameter::HabitatLoss => "habitatLoss",
            ClimateParameter::Co2 => "co2",
        }
    }
}

impl fmt::Display for ClimateParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ClimateParameter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "temp" | "temperature" => Ok(ClimateParameter::Temp),
            "habitatloss" | "habitat_loss" | "habitat-loss" => Ok(ClimateParameter::HabitatLoss),
            "co2" => Ok(ClimateParameter::Co2),
            other => Err(format!("unknown climate parameter: {}", other)),
        }
    }
}

/// Climate-adjusted risk score for one species.
pub fn score(record: &SpeciesRecord, params: &ClimateParameters) -> f64 {
    record.risk_score
        + record.temp_sensitivity * params.temp
        + record.habitat_loss_sens * (params.habitat_loss / HABITAT_LOSS_SCALE)
        + record.co2_sens * (params.co2 / CO2_SCALE)
}
