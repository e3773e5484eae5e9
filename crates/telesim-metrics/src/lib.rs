//! Metric declarations for the telesim engine.
//!
//! Every metric the engine emits is declared here as a const [`Metric`] so
//! names, units and label keys live in one place. The crate re-exports
//! `metrics`; whichever recorder the host installs receives the values.
//!
//! # Example
//!
//! ```rust,ignore
//! use telesim_metrics::{describe_metrics, metric_defs, RunLabels};
//!
//! describe_metrics();
//!
//! let labels = RunLabels::new("ber").with_modulation("qpsk");
//! metrics::counter!(metric_defs::BER_BITS.name, &labels.to_labels()).increment(2000);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// Counter, gauge or histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name, kind, unit and label keys of one engine metric.
///
/// Built in `const` context so every declaration lives in [`metric_defs`]:
///
/// ```rust
/// use telesim_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const BATCHES: Metric = Metric::counter("telesim.ber.batches")
///     .with_description("Monte-Carlo batches simulated")
///     .with_unit(Unit::Count)
///     .with_labels(&["task"]);
///
/// assert_eq!(BATCHES.name, "telesim.ber.batches");
/// assert_eq!(BATCHES.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// Dotted name, e.g. `telesim.ber.bits`.
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    pub unit: Option<Unit>,
    /// Label keys attached at the emission sites.
    pub labels: &'static [&'static str],
}

impl Metric {
    pub const fn counter(name: &'static str) -> Self {
        Self::of_kind(name, MetricKind::Counter)
    }

    pub const fn gauge(name: &'static str) -> Self {
        Self::of_kind(name, MetricKind::Gauge)
    }

    pub const fn histogram(name: &'static str) -> Self {
        Self::of_kind(name, MetricKind::Histogram)
    }

    const fn of_kind(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Hand the description and unit to the installed recorder.
    pub fn describe(&self) {
        let (name, text) = (self.name, self.description);
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => describe_counter!(name, unit, text),
            (MetricKind::Counter, None) => describe_counter!(name, text),
            (MetricKind::Gauge, Some(unit)) => describe_gauge!(name, unit, text),
            (MetricKind::Gauge, None) => describe_gauge!(name, text),
            (MetricKind::Histogram, Some(unit)) => describe_histogram!(name, unit, text),
            (MetricKind::Histogram, None) => describe_histogram!(name, text),
        }
    }

    /// Unit name as used by `metrics` (`"count"`, `"milliseconds"`), or empty.
    pub fn unit_label(&self) -> &'static str {
        self.unit.as_ref().map_or("", Unit::as_str)
    }
}

/// All metric definitions for the engine.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Standard Label Keys
    // ========================================================================

    /// Labels present on every request-scoped metric.
    pub const STANDARD_LABELS: &[&str] = &["task"];

    /// Labels on Monte-Carlo metrics.
    pub const LINK_LABELS: &[&str] = &["task", "modulation", "channel"];

    // ========================================================================
    // Request Metrics
    // ========================================================================

    /// Requests handled, by outcome.
    ///
    /// Labels: task, outcome (`ok` or an error kind)
    pub const REQUESTS: Metric = Metric::counter("telesim.requests")
        .with_description("Simulation requests handled")
        .with_unit(Unit::Count)
        .with_labels(&["task", "outcome"]);

    /// Wall time spent on one request.
    pub const REQUEST_WALL_TIME: Metric = Metric::histogram("telesim.request.wall_time_ms")
        .with_description("Wall time per simulation request in milliseconds")
        .with_unit(Unit::Milliseconds)
        .with_labels(STANDARD_LABELS);

    // ========================================================================
    // Monte-Carlo Metrics
    // ========================================================================

    /// Monte-Carlo batches simulated.
    pub const BER_BATCHES: Metric = Metric::counter("telesim.ber.batches")
        .with_description("Monte-Carlo batches simulated")
        .with_unit(Unit::Count)
        .with_labels(LINK_LABELS);

    /// Bits pushed through the channel.
    pub const BER_BITS: Metric = Metric::counter("telesim.ber.bits")
        .with_description("Bits simulated across all operating points")
        .with_unit(Unit::Count)
        .with_labels(LINK_LABELS);

    /// Bits recovered incorrectly.
    pub const BER_ERRORS: Metric = Metric::counter("telesim.ber.errors")
        .with_description("Bit errors observed across all operating points")
        .with_unit(Unit::Count)
        .with_labels(LINK_LABELS);

    /// Last BER estimate per operating point.
    ///
    /// Labels: task, modulation, channel, snr_db
    pub const BER_ESTIMATE: Metric = Metric::gauge("telesim.ber.estimate")
        .with_description("Most recent finalized bit error rate")
        .with_labels(&["task", "modulation", "channel", "snr_db"]);

    // ========================================================================
    // Radio Map Metrics
    // ========================================================================

    /// Grid cells evaluated by the propagation model.
    pub const RADIO_GRID_CELLS: Metric = Metric::counter("telesim.radio.grid_cells")
        .with_description("Radio map grid cells evaluated")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// Emitters per radio map.
    pub const RADIO_EMITTERS: Metric = Metric::histogram("telesim.radio.emitters")
        .with_description("Emitters combined into one radio map")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// Every declaration above.
    pub const ALL: &[&Metric] = &[
        &REQUESTS,
        &REQUEST_WALL_TIME,
        &BER_BATCHES,
        &BER_BITS,
        &BER_ERRORS,
        &BER_ESTIMATE,
        &RADIO_GRID_CELLS,
        &RADIO_EMITTERS,
    ];
}

/// Labels identifying the run a metric belongs to.
///
/// ```rust
/// use telesim_metrics::RunLabels;
///
/// let labels = RunLabels::new("ber").with_modulation("qpsk").with_channel("awgn");
/// assert_eq!(labels.to_labels().len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RunLabels {
    /// Request task (constellation, ber, mimo_comparison, ...)
    pub task: String,
    /// Modulation tag, when the task has one
    pub modulation: Option<String>,
    /// Channel label, when the task has one
    pub channel: Option<String>,
}

impl RunLabels {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Default::default()
        }
    }

    /// Adds a modulation label.
    pub fn with_modulation(mut self, modulation: impl Into<String>) -> Self {
        self.modulation = Some(modulation.into());
        self
    }

    /// Adds a channel label.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Converts to the `(key, value)` pairs the `metrics` macros accept.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        let mut labels = vec![("task", self.task.clone())];
        if let Some(m) = &self.modulation {
            labels.push(("modulation", m.clone()));
        }
        if let Some(c) = &self.channel {
            labels.push(("channel", c.clone()));
        }
        labels
    }

    /// [`to_labels`](Self::to_labels) plus `extra`.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }
}

/// Register every declaration in [`metric_defs::ALL`] with the recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
