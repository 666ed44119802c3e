use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Discriminant for the four collection strategies. Serializes and
/// displays as the human-facing algorithm label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Algorithm {
    #[serde(rename = "Mark-Sweep")]
    MarkSweep,
    #[serde(rename = "Reference Counting")]
    RefCounting,
    #[serde(rename = "Generational")]
    Generational,
    #[serde(rename = "Copying (Semi-space)")]
    Copying,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::MarkSweep,
        Algorithm::RefCounting,
        Algorithm::Generational,
        Algorithm::Copying,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Algorithm::MarkSweep => "Mark-Sweep",
            Algorithm::RefCounting => "Reference Counting",
            Algorithm::Generational => "Generational",
            Algorithm::Copying => "Copying (Semi-space)",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Scope of one generational cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CollectionKind {
    Minor,
    Major,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKind::Minor => f.write_str("Minor"),
            CollectionKind::Major => f.write_str("Major"),
        }
    }
}

/// Strategy-specific payload of a cycle result. Serializes untagged so the
/// extra fields sit next to the common header, the shape embedding layers
/// expect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CollectionDetail {
    MarkSweep {
        marked_objects: usize,
    },
    RefCounting {
        cycles_detected: usize,
    },
    Generational {
        objects_promoted: usize,
        collection_type: CollectionKind,
    },
    Copying {
        objects_copied: usize,
        compaction: bool,
    },
}

/// Outcome of one collection cycle: a fixed header shared by every
/// strategy plus the strategy's own [`CollectionDetail`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleResult {
    pub algorithm: Algorithm,
    pub objects_scanned: usize,
    pub objects_freed: usize,
    pub bytes_reclaimed: usize,
    /// Wall-clock stop-the-world pause in milliseconds, 3-decimal precision.
    #[serde(rename = "pause_duration")]
    pub pause_ms: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub detail: CollectionDetail,
}

impl CycleResult {
    pub fn marked_objects(&self) -> Option<usize> {
        match self.detail {
            CollectionDetail::MarkSweep { marked_objects } => Some(marked_objects),
            _ => None,
        }
    }

    pub fn cycles_detected(&self) -> Option<usize> {
        match self.detail {
            CollectionDetail::RefCounting { cycles_detected } => Some(cycles_detected),
            _ => None,
        }
    }

    pub fn objects_promoted(&self) -> Option<usize> {
        match self.detail {
            CollectionDetail::Generational {
                objects_promoted, ..
            } => Some(objects_promoted),
            _ => None,
        }
    }

    pub fn objects_copied(&self) -> Option<usize> {
        match self.detail {
            CollectionDetail::Copying { objects_copied, .. } => Some(objects_copied),
            _ => None,
        }
    }
}

/// Measures the stop-the-world pause around one `collect` call.
pub(crate) struct PauseTimer(Instant);

impl PauseTimer {
    pub fn start() -> Self {
        Self(Instant::now())
    }

    pub fn stop_ms(self) -> f64 {
        round3(self.0.elapsed().as_secs_f64() * 1000.0)
    }
}

pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A recorded cycle: the tracker-assigned sequence number plus the result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleRecord {
    pub cycle_id: u64,
    #[serde(flatten)]
    pub result: CycleResult,
}

/// Aggregate numbers over every recorded cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub total_cycles: usize,
    pub total_objects_freed: usize,
    pub total_bytes_reclaimed: usize,
    pub avg_pause_ms: f64,
    pub max_pause_ms: f64,
    pub min_pause_ms: f64,
}

/// Per-strategy aggregate used by [`MetricsTracker::comparison`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlgorithmStats {
    pub cycles: usize,
    pub total_objects_freed: usize,
    pub total_bytes_reclaimed: usize,
    pub avg_pause_ms: f64,
    pub max_pause_ms: f64,
    /// Objects freed per cycle, 2-decimal precision.
    pub throughput: f64,
}

/// Records cycle results in arrival order and aggregates them.
#[derive(Debug, Default)]
pub struct MetricsTracker {
    cycles: Vec<CycleRecord>,
    current_cycle: u64,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a result under the next sequential cycle id and returns that
    /// id. Records are never reordered or deduplicated.
    pub fn record(&mut self, result: CycleResult) -> u64 {
        self.current_cycle += 1;
        let cycle_id = self.current_cycle;
        self.cycles.push(CycleRecord { cycle_id, result });
        cycle_id
    }

    pub fn cycles(&self) -> &[CycleRecord] {
        &self.cycles
    }

    pub fn summary(&self) -> MetricsSummary {
        if self.cycles.is_empty() {
            return MetricsSummary {
                total_cycles: 0,
                total_objects_freed: 0,
                total_bytes_reclaimed: 0,
                avg_pause_ms: 0.0,
                max_pause_ms: 0.0,
                min_pause_ms: 0.0,
            };
        }

        let mut freed = 0;
        let mut bytes = 0;
        let mut pause_sum = 0.0;
        let mut pause_max = f64::MIN;
        let mut pause_min = f64::MAX;
        for record in &self.cycles {
            freed += record.result.objects_freed;
            bytes += record.result.bytes_reclaimed;
            pause_sum += record.result.pause_ms;
            pause_max = pause_max.max(record.result.pause_ms);
            pause_min = pause_min.min(record.result.pause_ms);
        }

        MetricsSummary {
            total_cycles: self.cycles.len(),
            total_objects_freed: freed,
            total_bytes_reclaimed: bytes,
            avg_pause_ms: round3(pause_sum / self.cycles.len() as f64),
            max_pause_ms: round3(pause_max),
            min_pause_ms: round3(pause_min),
        }
    }

    /// Aggregates the recorded cycles per strategy.
    pub fn comparison(&self) -> BTreeMap<Algorithm, AlgorithmStats> {
        struct Group {
            cycles: usize,
            freed: usize,
            bytes: usize,
            pause_sum: f64,
            pause_max: f64,
        }

        let mut groups: BTreeMap<Algorithm, Group> = BTreeMap::new();
        for record in &self.cycles {
            let group = groups.entry(record.result.algorithm).or_insert(Group {
                cycles: 0,
                freed: 0,
                bytes: 0,
                pause_sum: 0.0,
                pause_max: 0.0,
            });
            group.cycles += 1;
            group.freed += record.result.objects_freed;
            group.bytes += record.result.bytes_reclaimed;
            group.pause_sum += record.result.pause_ms;
            group.pause_max = group.pause_max.max(record.result.pause_ms);
        }

        groups
            .into_iter()
            .map(|(algorithm, group)| {
                let stats = AlgorithmStats {
                    cycles: group.cycles,
                    total_objects_freed: group.freed,
                    total_bytes_reclaimed: group.bytes,
                    avg_pause_ms: round3(group.pause_sum / group.cycles as f64),
                    max_pause_ms: round3(group.pause_max),
                    throughput: round2(group.freed as f64 / group.cycles as f64),
                };
                (algorithm, stats)
            })
            .collect()
    }

    /// Fixed-column CSV rendering of the recorded cycles, header first.
    /// Empty string when nothing has been recorded.
    pub fn export(&self) -> String {
        if self.cycles.is_empty() {
            return String::new();
        }

        let mut lines = Vec::with_capacity(self.cycles.len() + 1);
        lines.push(
            "cycle_id,algorithm,timestamp,objects_scanned,objects_freed,\
             bytes_reclaimed,pause_duration"
                .to_string(),
        );
        for record in &self.cycles {
            let result = &record.result;
            lines.push(format!(
                "{},{},{},{},{},{},{}",
                record.cycle_id,
                result.algorithm,
                result
                    .timestamp
                    .to_rfc3339_opts(SecondsFormat::Micros, false),
                result.objects_scanned,
                result.objects_freed,
                result.bytes_reclaimed,
                result.pause_ms,
            ));
        }
        lines.join("\n")
    }

    /// Clears the history and the cycle counter.
    pub fn reset(&mut self) {
        self.cycles.clear();
        self.current_cycle = 0;
    }
}

struct FormattedSize {
    size: usize,
}

impl fmt::Display for FormattedSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let ksize = (self.size as f64) / 1024f64;

        if ksize < 1f64 {
            return write!(f, "{}B", self.size);
        }

        let msize = ksize / 1024f64;

        if msize < 1f64 {
            return write!(f, "{:.1}K", ksize);
        }

        let gsize = msize / 1024f64;

        if gsize < 1f64 {
            write!(f, "{:.1}M", msize)
        } else {
            write!(f, "{:.1}G", gsize)
        }
    }
}

fn formatted_size(size: usize) -> FormattedSize {
    FormattedSize { size }
}

impl fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Collection summary:")?;
        writeln!(f, "  Cycles recorded: {}", self.total_cycles)?;
        writeln!(f, "  Objects freed: {}", self.total_objects_freed)?;
        writeln!(
            f,
            "  Memory reclaimed: {}",
            formatted_size(self.total_bytes_reclaimed)
        )?;
        writeln!(
            f,
            "  Pause avg/min/max: {:.3}ms / {:.3}ms / {:.3}ms",
            self.avg_pause_ms, self.min_pause_ms, self.max_pause_ms
        )
    }
}
