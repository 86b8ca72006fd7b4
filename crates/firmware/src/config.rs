//! Firmware configuration
//!
//! Defaults match the reference board (1 ms tick). A TOML file and `FW_*`
//! environment variables can override any field, e.g.
//! `FW_IDLE_TIMEOUT_TICKS=20` or `FW_SIM__RUN_TICKS=10000`.

use mcu_hal::Tick;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Source could not be read or parsed
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A scheduling period or timeout of zero
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Scheduling and framing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirmwareConfig {
    /// Line silence that ends a frame
    pub idle_timeout_ticks: Tick,
    /// How often the frame-timeout check runs
    pub frame_check_period_ticks: Tick,
    /// How often the bulk ring is drained
    pub bulk_drain_period_ticks: Tick,
    /// Thermocouple sampling period
    pub sensor_period_ticks: Tick,
    /// ADC sampling period
    pub adc_period_ticks: Tick,
    /// Host simulator settings
    pub sim: SimConfig,
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ticks: uart_rx::DEFAULT_IDLE_TIMEOUT_TICKS,
            frame_check_period_ticks: 1,
            bulk_drain_period_ticks: 5,
            sensor_period_ticks: max6675::DEFAULT_SAMPLE_PERIOD_TICKS,
            adc_period_ticks: 100,
            sim: SimConfig::default(),
        }
    }
}

/// Host simulator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Wall-clock length of one tick
    pub tick_interval_us: u64,
    /// Ticks to run before stopping
    pub run_ticks: Tick,
    /// Gap between short command frames on the byte-interrupt path
    pub frame_interval_ticks: Tick,
    /// Gap between blocks on the DMA path
    pub bulk_interval_ticks: Tick,
    /// Tick at which the simulated probe is unplugged
    pub open_circuit_at_tick: Option<Tick>,
    /// Tick at which it is plugged back in
    pub reconnect_at_tick: Option<Tick>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_interval_us: 1000,
            run_ticks: 5000,
            frame_interval_ticks: 200,
            bulk_interval_ticks: 300,
            open_circuit_at_tick: Some(2000),
            reconnect_at_tick: Some(3000),
        }
    }
}

impl FirmwareConfig {
    /// Load from an optional TOML file, then `FW_*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("FW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from TOML text (no environment overrides)
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the scheduler cannot honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("idle_timeout_ticks", self.idle_timeout_ticks),
            ("frame_check_period_ticks", self.frame_check_period_ticks),
            ("bulk_drain_period_ticks", self.bulk_drain_period_ticks),
            ("sensor_period_ticks", self.sensor_period_ticks),
            ("adc_period_ticks", self.adc_period_ticks),
            ("sim.frame_interval_ticks", self.sim.frame_interval_ticks),
            ("sim.bulk_interval_ticks", self.sim.bulk_interval_ticks),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        Ok(())
    }
}
