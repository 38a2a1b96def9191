//! # Prometheus Metrics
//!
//! Per-block figures of the run, mirrored into Prometheus gauges. There is
//! no scrape endpoint: the text exposition is written to a file at the end
//! of the run when `--metrics-out` is given.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};

use trail_protocol::simulation::BlockReport;

/// Holds all Prometheus metric handles for one run.
#[derive(Clone)]
pub struct SimulatorMetrics {
    registry: Registry,
    /// Total number of blocks simulated, genesis included.
    pub blocks_simulated_total: IntCounter,
    /// Height of the last simulated block.
    pub block_height: IntGauge,
    /// Addresses the last block's producer wrote.
    pub updated_branches: IntGauge,
    pub new_objects: IntGauge,
    pub used_objects: IntGauge,
    /// Largest per-client unspent count after the last block.
    pub max_unused: IntGauge,
    pub max_used: IntGauge,
    /// Largest per-client memory size (block hashes) after the last block.
    pub max_memory: IntGauge,
    pub max_archive: IntGauge,
    /// Wall time per simulation phase, labelled by phase.
    pub phase_duration_seconds: HistogramVec,
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge, prometheus::Error> {
    let gauge = IntGauge::new(name, help)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

impl SimulatorMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("trail".into()), None)?;

        let blocks_simulated_total = IntCounter::new(
            "blocks_simulated_total",
            "Total number of blocks simulated, genesis included",
        )?;
        registry.register(Box::new(blocks_simulated_total.clone()))?;

        let phase_duration_seconds = HistogramVec::new(
            HistogramOpts::from(Opts::new(
                "phase_duration_seconds",
                "Wall time spent in each simulation phase",
            ))
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["phase"],
        )?;
        registry.register(Box::new(phase_duration_seconds.clone()))?;

        Ok(Self {
            block_height: gauge(&registry, "block_height", "Height of the last simulated block")?,
            updated_branches: gauge(
                &registry,
                "updated_branches",
                "Accumulator addresses written by the last block",
            )?,
            new_objects: gauge(&registry, "new_objects", "Objects created by the last block")?,
            used_objects: gauge(&registry, "used_objects", "Objects spent by the last block")?,
            max_unused: gauge(&registry, "max_unused", "Largest per-client unspent count")?,
            max_used: gauge(&registry, "max_used", "Largest per-client spent count")?,
            max_memory: gauge(
                &registry,
                "max_memory",
                "Largest per-client count of cached branch updates",
            )?,
            max_archive: gauge(
                &registry,
                "max_archive",
                "Largest per-client count of archived branch updates",
            )?,
            blocks_simulated_total,
            phase_duration_seconds,
            registry,
        })
    }

    /// Mirror one block's report.
    pub fn observe(&self, report: &BlockReport) {
        self.blocks_simulated_total.inc();
        self.block_height.set(report.height as i64);
        self.updated_branches
            .set(report.number_of_updated_branchs as i64);
        self.new_objects.set(report.number_of_new_utxo as i64);
        self.used_objects.set(report.number_of_used_utxo as i64);
        self.max_unused.set(report.max_unused as i64);
        self.max_used.set(report.max_used as i64);
        self.max_memory.set(report.max_memory as i64);
        self.max_archive.set(report.max_archiive as i64);
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
