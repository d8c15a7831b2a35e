use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for pipeline events, so use cases stay independent of where
/// progress and diagnostics end up.
pub trait PipelineLogger: Send {
    fn progress(&mut self, current: usize, total: usize);

    /// Duration of one named stage, in milliseconds. Per-frame stages are
    /// recorded once per frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Point-in-time value such as a replaced-outlier count.
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Non-fatal problem worth surfacing to the user.
    fn warn(&mut self, message: &str) {
        self.info(message);
    }

    fn summary(&self) {}
}

/// Discards everything. Used by tests and library callers with their own
/// progress reporting.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Forwards events to the `log` facade and aggregates stage timings and
/// metrics into an end-of-run summary.
///
/// Progress lines are emitted every `throttle_frames` frames, unless the
/// caller reports progress itself.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    report_progress: bool,
    timings: BTreeMap<String, Vec<f64>>,
    metrics: BTreeMap<String, Vec<f64>>,
    warnings: Vec<String>,
    start_time: Instant,
    frames_seen: usize,
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            report_progress: true,
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            warnings: Vec::new(),
            start_time: Instant::now(),
            frames_seen: 0,
        }
    }

    /// Counts frames for the summary but leaves progress output to the
    /// caller's callback.
    pub fn without_progress() -> Self {
        Self {
            report_progress: false,
            ..Self::default()
        }
    }

    fn progress_line(&self, current: usize, total: usize) -> Option<String> {
        if !self.report_progress {
            return None;
        }
        let due = current % self.throttle_frames == 0 || current == total;
        match total {
            0 if current % self.throttle_frames == 0 => Some(format!("Exported {current} frames")),
            0 => None,
            _ if due => {
                let pct = current as f64 / total as f64 * 100.0;
                Some(format!("Exported {current}/{total} frames ({pct:.1}%)"))
            }
            _ => None,
        }
    }

    /// `None` until a timing or metric has been recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Reframe summary ({} frames, {elapsed_s:.1}s):",
            self.frames_seen
        )];

        for (stage, durations) in &self.timings {
            let total_ms: f64 = durations.iter().sum();
            lines.push(format!(
                "  {stage:14}: avg {:7.2}ms  total {total_ms:8.0}ms",
                average(durations)
            ));
        }
        for (name, values) in &self.metrics {
            lines.push(format!("  {name}: {}", format_metric(values)));
        }
        if self.frames_seen > 0 && elapsed_s > 0.0 {
            lines.push(format!(
                "  Throughput: {:.1} fps",
                self.frames_seen as f64 / elapsed_s
            ));
        }
        if !self.warnings.is_empty() {
            lines.push(format!("  Warnings: {}", self.warnings.len()));
        }
        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(Vec::as_slice)
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(Vec::as_slice)
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Single values print as-is; repeated ones as their average.
fn format_metric(values: &[f64]) -> String {
    match values {
        [v] => format!("{v}"),
        _ => format!("avg {:.1}", average(values)),
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_seen = current;
        if let Some(line) = self.progress_line(current, total) {
            log::info!("{line}");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().push(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn warn(&mut self, message: &str) {
        self.warnings.push(message.to_string());
        log::warn!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
