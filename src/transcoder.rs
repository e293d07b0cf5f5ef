//! Recipe orchestration.
//!
//! [`Transcoder::execute`] drives one job: it verifies the input file,
//! resolves each stage template against the tool registry and option set,
//! runs the stages in order under the watchdog executor, aggregates per-tool
//! progress into a single job percentage, and finishes with a duration-based
//! integrity check of the output file.
//!
//! The first stage failure aborts the job. Integrity findings are softer:
//! the stages did run, so they are recorded on the [`JobReport`] and the
//! caller decides what a failed check means.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::OnceCell;

use crate::config::{MonitoredStream, TranscoderConfig};
use crate::error::Result;
use crate::exec::CommandExecutor;
use crate::options::Options;
use crate::probe::MediaInspector;
use crate::recipe::Recipe;
use crate::resolve::{OriginalMedia, VariableResolver};
use crate::tools::{ProgressContext, Tool, ToolRegistry, ToolReport};
use crate::Error;

/// Outcome of one executed stage.
#[derive(Debug, Clone)]
pub struct StageResult {
    /// The fully resolved command line that ran.
    pub command: String,
    /// Token of the tool that ran it.
    pub tool: String,
    /// Structured fields the tool reported.
    pub report: ToolReport,
}

/// Everything a completed (or integrity-flagged) job reports back.
#[derive(Debug, Clone, Default)]
pub struct JobReport {
    /// Stages that ran, in order.
    pub executed: Vec<StageResult>,
    /// Integrity-check failures. Empty means the job passed.
    pub errors: Vec<String>,
    /// Non-fatal findings, e.g. a skipped integrity check.
    pub warnings: Vec<String>,
    /// Wall-clock time for the whole job.
    pub total_time: Duration,
}

impl JobReport {
    /// `true` when the job ran and passed its integrity check.
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Sums per-stage percentages into one job percentage, reporting only on
/// change. Stages whose tool emits no progress are excluded from the
/// divisor; a finished stage saturates to 100 regardless of what its last
/// progress line said.
struct ProgressAggregator {
    per_stage: Vec<u32>,
    divisor: u32,
    last: Option<u32>,
}

impl ProgressAggregator {
    fn new(stage_count: usize, progress_capable: u32) -> Self {
        Self {
            per_stage: vec![0; stage_count],
            divisor: progress_capable,
            last: None,
        }
    }

    /// Record a stage percentage; returns the new job total when it changed.
    fn update(&mut self, stage: usize, pct: u32) -> Option<u32> {
        if self.divisor == 0 || self.per_stage.get(stage).copied() == Some(pct) {
            return None;
        }
        self.per_stage[stage] = pct;
        let total = self.per_stage.iter().sum::<u32>() / self.divisor;
        if self.last != Some(total) {
            self.last = Some(total);
            Some(total)
        } else {
            None
        }
    }

    fn complete(&mut self, stage: usize) -> Option<u32> {
        self.update(stage, 100)
    }
}

/// Drives recipes end to end.
pub struct Transcoder {
    config: TranscoderConfig,
    registry: ToolRegistry,
    inspector: Arc<dyn MediaInspector>,
}

impl Transcoder {
    /// A transcoder with the built-in tool registry.
    pub fn new(config: TranscoderConfig, inspector: Arc<dyn MediaInspector>) -> Self {
        Self::with_registry(config, ToolRegistry::builtin(), inspector)
    }

    /// A transcoder with a caller-supplied registry.
    pub fn with_registry(
        config: TranscoderConfig,
        registry: ToolRegistry,
        inspector: Arc<dyn MediaInspector>,
    ) -> Self {
        Self {
            config,
            registry,
            inspector,
        }
    }

    /// Run `recipe` with `options`, reporting the job's total progress
    /// percentage to `progress` as it changes, together with the token of
    /// the tool whose output moved it.
    ///
    /// # Errors
    ///
    /// Fails fast on a missing input file, an unregistered tool token, a
    /// resolution failure, a hung process, or a stage whose output the tool
    /// classifies as an error. Anything outside the defined taxonomy is
    /// wrapped into [`Error::Unknown`] with its message preserved.
    pub async fn execute(
        &self,
        recipe: &Recipe,
        options: &Options,
        mut progress: impl FnMut(&str, u32),
    ) -> Result<JobReport> {
        let started = Instant::now();

        let input = options
            .get_non_empty("input_file")
            .ok_or_else(|| Error::parameter("no input_file option provided"))?;
        let input_path = Path::new(strip_quotes(input));
        if !input_path.exists() {
            return Err(Error::input_file_not_found(input_path));
        }

        tracing::info!(
            input = %input_path.display(),
            stages = recipe.len(),
            "starting recipe"
        );

        let cell = OnceCell::new();
        let original = OriginalMedia::probed(self.inspector.as_ref(), input_path, &cell);

        let executed = match self
            .run_stages(recipe, options, &original, &cell, &mut progress)
            .await
        {
            Ok(executed) => executed,
            Err(e) if e.is_classified() => return Err(e),
            Err(e) => {
                tracing::error!(error = %e, "unclassified failure during recipe run");
                return Err(Error::unknown(e.to_string()));
            }
        };

        let mut report = JobReport {
            executed,
            errors: Vec::new(),
            warnings: Vec::new(),
            total_time: started.elapsed(),
        };
        self.check_integrity(options, &original, &mut report).await;
        report.total_time = started.elapsed();

        tracing::info!(
            stages = report.executed.len(),
            errors = report.errors.len(),
            elapsed = ?report.total_time,
            "recipe finished"
        );
        Ok(report)
    }

    async fn run_stages(
        &self,
        recipe: &Recipe,
        options: &Options,
        original: &OriginalMedia<'_>,
        cell: &OnceCell<crate::probe::MediaInfo>,
        progress: &mut impl FnMut(&str, u32),
    ) -> Result<Vec<StageResult>> {
        let executor = CommandExecutor::new(self.config.executor.clone());
        let monitored = self.config.executor.monitored;

        let progress_capable = recipe
            .stages
            .iter()
            .filter(|s| {
                self.registry
                    .get(&s.tool_token)
                    .is_some_and(|t| t.supports_progress())
            })
            .count() as u32;
        let mut aggregator = ProgressAggregator::new(recipe.len(), progress_capable);

        let mut executed = Vec::with_capacity(recipe.len());

        for (idx, stage) in recipe.stages.iter().enumerate() {
            let tool = self.registry.require(&stage.tool_token)?;
            let resolver = VariableResolver::new(tool.as_ref(), options, original);
            let command = resolver.resolve(&stage.template).await?;

            tracing::info!(stage = idx, tool = tool.token(), "running stage");

            let raw = if tool.supports_progress() {
                self.run_with_progress(
                    &executor,
                    monitored,
                    tool.as_ref(),
                    &command,
                    idx,
                    cell,
                    &mut aggregator,
                    progress,
                )
                .await?
            } else {
                executor.execute_tailing_stderr(&command).await?
            };

            if tool.supports_progress() {
                if let Some(total) = aggregator.complete(idx) {
                    progress(tool.token(), total);
                }
            }

            tracing::debug!(stage = idx, bytes = raw.len(), "stage output captured");

            let report = tool.parse_result(&raw)?;
            executed.push(StageResult {
                command,
                tool: tool.token().to_string(),
                report,
            });
        }

        Ok(executed)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_with_progress(
        &self,
        executor: &CommandExecutor,
        monitored: MonitoredStream,
        tool: &dyn Tool,
        command: &str,
        idx: usize,
        cell: &OnceCell<crate::probe::MediaInfo>,
        aggregator: &mut ProgressAggregator,
        progress: &mut impl FnMut(&str, u32),
    ) -> Result<String> {
        // Seed the duration from the original's metadata when it has already
        // been probed; tools that print their own duration banner overwrite
        // it anyway.
        let mut ctx = ProgressContext {
            duration_ms: cell.get().map(|i| i.duration_ms).unwrap_or(0),
        };

        let output = executor
            .execute_streaming(command, tool.progress_separator(), monitored, |line| {
                if let Some(pct) = tool.parse_progress(line, &mut ctx) {
                    if let Some(total) = aggregator.update(idx, pct) {
                        progress(tool.token(), total);
                    }
                }
            })
            .await?;

        Ok(match monitored {
            MonitoredStream::Stderr => output.stderr,
            MonitoredStream::Stdout => output.stdout,
        })
    }

    /// Compare input and output durations after all stages ran. Findings
    /// land on the report. An absent `output_file` option is a warning,
    /// since some recipes legitimately produce none; once the option names
    /// a file, anything the inspector cannot read, including a file that
    /// was never written, is an error.
    async fn check_integrity(
        &self,
        options: &Options,
        original: &OriginalMedia<'_>,
        report: &mut JobReport,
    ) {
        let Some(output) = options.get_non_empty("output_file") else {
            report
                .warnings
                .push("no output_file option; integrity check skipped".to_string());
            return;
        };

        let output_path = Path::new(strip_quotes(output));
        let processed = match self.inspector.inspect(output_path).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(error = %e, "output file failed inspection");
                report.errors.push("Output file invalid".to_string());
                return;
            }
        };

        let original_info = match original.get().await {
            Ok(info) => info,
            Err(e) => {
                report.errors.push(e.to_string());
                return;
            }
        };

        let tolerance = self.config.integrity.duration_tolerance;
        let o = original_info.duration_ms as f64;
        let p = processed.duration_ms as f64;
        if p >= o * tolerance || p <= o / tolerance {
            report.errors.push(format!(
                "Original file has a duration of {}, but processed file has a duration of {}",
                original_info.duration_ms, processed.duration_ms
            ));
        }
    }
}

/// Strip one layer of surrounding shell quotes from a path option.
fn strip_quotes(value: &str) -> &str {
    let value = value.trim();
    for q in ['\'', '"'] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
