//! Observed pipelines: an ordered list of processors with logging and alert hooks.
//!
//! [`Evaluation::apply_pipeline`] runs processors silently. A [`Pipeline`] runs the same fold
//! but reports every stage to an optional [`PipelineObserver`]:
//!
//! - `on_stage_finished` after each successful stage
//! - `on_failure` when a stage fails, with a computed [`Severity`]
//! - `on_alert` as well when that severity is `>=` [`Pipeline::alert_at_or_above`]
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use perf_pipeline::evaluation::Evaluation;
//! use perf_pipeline::pipeline::{Pipeline, Severity, StdErrObserver};
//! use perf_pipeline::processing::{MinusOne, Reindex};
//!
//! let records: Vec<_> = serde_json::from_str(r#"[{"project": "a", "lut": 3}]"#).unwrap();
//! let eval = Evaluation::from_records(&records, None).unwrap();
//!
//! let pipeline = Pipeline::named("luts")
//!     .then(Reindex::new(["project"]).unwrap())
//!     .then(MinusOne::all_numeric())
//!     .with_observer(Arc::new(StdErrObserver))
//!     .alert_at_or_above(Severity::Critical);
//! let out = pipeline.run(&eval).unwrap();
//! assert_eq!(out.table().get(0, "lut").and_then(|v| v.as_f64()), Some(2.0));
//! ```

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::error::{PipelineError, PipelineResult};
use crate::evaluation::Evaluation;
use crate::processing::Processor;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (a stage failed).
    Error,
    /// Critical error (I/O or other infrastructure failures).
    Critical,
}

/// Which stage of which pipeline an event refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageContext {
    pub pipeline: String,
    /// Zero-based stage position.
    pub stage: usize,
    pub processor: &'static str,
    /// Id of the evaluation entering the stage.
    pub eval_id: Option<i64>,
}

/// Shape of a stage's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageStats {
    pub rows_in: usize,
    pub rows_out: usize,
    pub columns_out: usize,
    pub elapsed: Duration,
}

/// Observer interface for pipeline stages.
pub trait PipelineObserver: Send + Sync {
    fn on_stage_finished(&self, _ctx: &StageContext, _stats: StageStats) {}

    fn on_failure(&self, _ctx: &StageContext, _severity: Severity, _error: &PipelineError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &StageContext, severity: Severity, error: &PipelineError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Fans callbacks out to several observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn PipelineObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl PipelineObserver for CompositeObserver {
    fn on_stage_finished(&self, ctx: &StageContext, stats: StageStats) {
        for o in &self.observers {
            o.on_stage_finished(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &StageContext, severity: Severity, error: &PipelineError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &StageContext, severity: Severity, error: &PipelineError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Logs stage events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl PipelineObserver for StdErrObserver {
    fn on_stage_finished(&self, ctx: &StageContext, stats: StageStats) {
        eprintln!(
            "[pipeline][ok] {}#{} {} rows={}->{} cols={} elapsed={:?}",
            ctx.pipeline, ctx.stage, ctx.processor, stats.rows_in, stats.rows_out, stats.columns_out, stats.elapsed
        );
    }

    fn on_failure(&self, ctx: &StageContext, severity: Severity, error: &PipelineError) {
        eprintln!(
            "[pipeline][{severity:?}] {}#{} {} err={error}",
            ctx.pipeline, ctx.stage, ctx.processor
        );
    }

    fn on_alert(&self, ctx: &StageContext, severity: Severity, error: &PipelineError) {
        eprintln!(
            "[ALERT][pipeline][{severity:?}] {}#{} {} err={error}",
            ctx.pipeline, ctx.stage, ctx.processor
        );
    }
}

/// Forwards stage events to the [`log`] facade.
#[derive(Debug, Default)]
pub struct LogObserver;

impl PipelineObserver for LogObserver {
    fn on_stage_finished(&self, ctx: &StageContext, stats: StageStats) {
        log::debug!(
            "{}#{} {}: {} -> {} rows, {} columns in {:?}",
            ctx.pipeline, ctx.stage, ctx.processor, stats.rows_in, stats.rows_out, stats.columns_out, stats.elapsed
        );
    }

    fn on_failure(&self, ctx: &StageContext, severity: Severity, error: &PipelineError) {
        log::warn!("{}#{} {} failed ({severity:?}): {error}", ctx.pipeline, ctx.stage, ctx.processor);
    }

    fn on_alert(&self, ctx: &StageContext, severity: Severity, error: &PipelineError) {
        log::error!("{}#{} {} failed ({severity:?}): {error}", ctx.pipeline, ctx.stage, ctx.processor);
    }
}

/// Appends stage events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Writes are best-effort; failures to open or write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl PipelineObserver for FileObserver {
    fn on_stage_finished(&self, ctx: &StageContext, stats: StageStats) {
        self.append_line(&format!(
            "{} ok pipeline={} stage={} processor={} rows_in={} rows_out={} cols={}",
            unix_ts(),
            ctx.pipeline,
            ctx.stage,
            ctx.processor,
            stats.rows_in,
            stats.rows_out,
            stats.columns_out
        ));
    }

    fn on_failure(&self, ctx: &StageContext, severity: Severity, error: &PipelineError) {
        self.append_line(&format!(
            "{} fail severity={severity:?} pipeline={} stage={} processor={} err={error}",
            unix_ts(),
            ctx.pipeline,
            ctx.stage,
            ctx.processor
        ));
    }

    fn on_alert(&self, ctx: &StageContext, severity: Severity, error: &PipelineError) {
        self.append_line(&format!(
            "{} ALERT severity={severity:?} pipeline={} stage={} processor={} err={error}",
            unix_ts(),
            ctx.pipeline,
            ctx.stage,
            ctx.processor
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Severity reported for a failed stage.
pub fn severity_for_error(e: &PipelineError) -> Severity {
    match e {
        PipelineError::Io(_) => Severity::Critical,
        PipelineError::Csv(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => Severity::Critical,
        PipelineError::Json(e) if e.is_io() => Severity::Critical,
        _ => Severity::Error,
    }
}

/// A named, ordered sequence of processors.
///
/// A pipeline is itself a [`Processor`], so pipelines nest.
pub struct Pipeline {
    name: String,
    stages: Vec<Box<dyn Processor>>,
    observer: Option<Arc<dyn PipelineObserver>>,
    alert_at_or_above: Severity,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::named("pipeline")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            observer: None,
            alert_at_or_above: Severity::Critical,
        }
    }

    /// Append a stage.
    pub fn then(mut self, processor: impl Processor + 'static) -> Self {
        self.stages.push(Box::new(processor));
        self
    }

    pub fn push(&mut self, processor: Box<dyn Processor>) {
        self.stages.push(processor);
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Severity threshold at which `on_alert` is invoked. Defaults to [`Severity::Critical`].
    pub fn alert_at_or_above(mut self, severity: Severity) -> Self {
        self.alert_at_or_above = severity;
        self
    }

    pub fn pipeline_name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Processor names in stage order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order on `input`, stopping at the first failure.
    pub fn run(&self, input: &Evaluation) -> PipelineResult<Evaluation> {
        let mut current = input.clone();
        for (stage, processor) in self.stages.iter().enumerate() {
            let ctx = StageContext {
                pipeline: self.name.clone(),
                stage,
                processor: processor.name(),
                eval_id: current.eval_id(),
            };
            let started = Instant::now();
            match processor.process(&current) {
                Ok(next) => {
                    if let Some(obs) = &self.observer {
                        let stats = StageStats {
                            rows_in: current.row_count(),
                            rows_out: next.row_count(),
                            columns_out: next.table().schema().fields.len(),
                            elapsed: started.elapsed(),
                        };
                        obs.on_stage_finished(&ctx, stats);
                    }
                    current = next;
                }
                Err(e) => {
                    if let Some(obs) = &self.observer {
                        let sev = severity_for_error(&e);
                        obs.on_failure(&ctx, sev, &e);
                        if sev >= self.alert_at_or_above {
                            obs.on_alert(&ctx, sev, &e);
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(current)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .field("has_observer", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Processor for Pipeline {
    fn name(&self) -> &'static str {
        "pipeline"
    }

    fn process(&self, input: &Evaluation) -> PipelineResult<Evaluation> {
        self.run(input)
    }
}
