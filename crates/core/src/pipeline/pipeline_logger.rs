use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

/// Orchestration stages a batch passes through, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Detect,
    Extract,
    Predict,
    Reproject,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Detect, Stage::Extract, Stage::Predict, Stage::Reproject];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Detect => "detect",
            Stage::Extract => "extract",
            Stage::Predict => "predict",
            Stage::Reproject => "reproject",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Observer for analysis runs, so callers pick where progress and timings
/// go without touching the orchestration code.
pub trait PipelineLogger: Send {
    /// Frames analyzed so far; `total` is unknown for open-ended loaders.
    fn progress(&mut self, frames_done: usize, total: Option<usize>);

    /// Wall time one stage took for one batch.
    fn timing(&mut self, stage: Stage, duration_ms: f64);

    /// Per-batch measurement such as the number of faces found.
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Called once when a run finishes.
    fn summary(&self) {}
}

/// Discards everything. Used by tests and library callers that only want
/// the table.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _frames_done: usize, _total: Option<usize>) {}
    fn timing(&mut self, _stage: Stage, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running count / sum / max of a series of samples.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Accumulator {
    pub count: usize,
    pub total: f64,
    pub max: f64,
}

impl Accumulator {
    fn record(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.max = if self.count == 1 { value } else { self.max.max(value) };
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Reports through the `log` facade: throttled progress lines while the run
/// is going, a per-stage breakdown at the end.
pub struct StdoutPipelineLogger {
    report_every: usize,
    last_reported: usize,
    frames_done: usize,
    stages: BTreeMap<Stage, Accumulator>,
    metrics: BTreeMap<String, Accumulator>,
    started: Instant,
}

impl StdoutPipelineLogger {
    /// Logs progress at most once per `report_every` frames.
    pub fn new(report_every: usize) -> Self {
        Self {
            report_every: report_every.max(1),
            last_reported: 0,
            frames_done: 0,
            stages: BTreeMap::new(),
            metrics: BTreeMap::new(),
            started: Instant::now(),
        }
    }

    pub fn stage(&self, stage: Stage) -> Option<&Accumulator> {
        self.stages.get(&stage)
    }

    pub fn metric_values(&self, name: &str) -> Option<&Accumulator> {
        self.metrics.get(name)
    }

    pub fn summary_string(&self) -> Option<String> {
        if self.stages.is_empty() && self.metrics.is_empty() {
            return None;
        }
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Analyzed {} frames in {:.2}s",
            self.frames_done,
            elapsed_ms / 1000.0
        )];

        let staged_ms: f64 = self.stages.values().map(|a| a.total).sum();
        for stage in Stage::ALL {
            let Some(acc) = self.stages.get(&stage) else {
                continue;
            };
            let share = if staged_ms > 0.0 {
                acc.total / staged_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "  {:<10} {:>8.1}ms/batch  max {:>8.1}ms  total {:>9.0}ms  {share:5.1}%",
                stage.name(),
                acc.mean(),
                acc.max,
                acc.total,
            ));
        }
        for (name, acc) in &self.metrics {
            lines.push(format!(
                "  {name}: mean {:.2}, max {:.0}, total {:.0}",
                acc.mean(),
                acc.max,
                acc.total
            ));
        }
        if self.frames_done > 0 && elapsed_ms > 0.0 {
            let fps = self.frames_done as f64 * 1000.0 / elapsed_ms;
            lines.push(format!("  {fps:.1} frames/s"));
        }
        Some(lines.join("\n"))
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, frames_done: usize, total: Option<usize>) {
        self.frames_done = frames_done;
        let finished = total == Some(frames_done);
        if frames_done.saturating_sub(self.last_reported) < self.report_every && !finished {
            return;
        }
        self.last_reported = frames_done;
        match total {
            Some(total) if total > 0 => {
                let pct = frames_done as f64 / total as f64 * 100.0;
                log::info!("Analyzed {frames_done}/{total} frames ({pct:.0}%)");
            }
            _ => log::info!("Analyzed {frames_done} frames"),
        }
    }

    fn timing(&mut self, stage: Stage, duration_ms: f64) {
        self.stages.entry(stage).or_default().record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().record(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("{text}");
        }
    }
}
