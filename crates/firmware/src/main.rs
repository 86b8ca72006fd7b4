//! Thermocouple Logger Firmware - Host Simulator Entry Point

use firmware::sim::run_simulation;
use firmware::{init_logging, FirmwareConfig};
use std::path::PathBuf;
use tracing::{info, warn};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;

    info!("=== Thermocouple Logger Firmware v{} (host simulation) ===", env!("CARGO_PKG_VERSION"));

    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = FirmwareConfig::load(path.as_deref())?;
    info!("Configuration: {:?}", config);

    let report = run_simulation(&config)?;

    info!(
        "UART frames: {} delivered, {} discarded ({} bytes)",
        report.frames.delivered, report.frames.discarded, report.frames.bytes_delivered
    );
    info!(
        "DMA path: {} bytes drained, {} bytes dropped, {} re-arm failures",
        report.bulk_drained, report.bulk_dropped, report.dma_rearm_failures
    );
    info!(
        "Thermocouple: {} samples, {} faults, last reading {} (fault={}, tick={})",
        report.sensor.samples,
        report.sensor.faults,
        report.reading.temperature,
        report.reading.fault,
        report.reading.sampled_at
    );
    info!("ADC level: {} ({} errors)", report.adc_level, report.adc_errors);

    for (name, stats) in &report.tasks {
        info!(
            "Task {:<14} runs={} overruns={} skipped={}",
            name, stats.runs, stats.overruns, stats.skipped_slots
        );
        if stats.overruns > 0 {
            warn!("Task '{}' overran {} times", name, stats.overruns);
        }
    }

    Ok(())
}
