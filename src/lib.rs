//! reelforge: process supervision and command orchestration for external
//! media tools.
//!
//! The engine runs multi-stage transcoding recipes. Each stage names a tool
//! and a command template; templates are resolved against caller options and
//! the original file's probed metadata, then executed through the shell
//! under a per-line inactivity watchdog that kills the whole process group
//! of a stalled tool. Tool adapters translate progress chatter into job
//! percentages and classify diagnostic output into typed errors. A finished
//! job gets a duration-based integrity check of its output file.
//!
//! ```no_run
//! use std::sync::Arc;
//! use reelforge::{
//!     FfprobeInspector, Options, Recipe, Transcoder, TranscoderConfig,
//! };
//!
//! # async fn run() -> reelforge::Result<()> {
//! let inspector = FfprobeInspector::from_path()
//!     .ok_or_else(|| reelforge::Error::unknown("ffprobe not on PATH"))?;
//! let transcoder = Transcoder::new(TranscoderConfig::default(), Arc::new(inspector));
//!
//! let recipe = Recipe::parse("ffmpeg -i $input_file$ -ab 128k -y $output_file$");
//! let options = Options::new()
//!     .with("input_file", "in.mp4")
//!     .with("output_file", "out.flv");
//!
//! let report = transcoder
//!     .execute(&recipe, &options, |tool, pct| println!("{tool}: {pct}%"))
//!     .await?;
//! assert!(report.success());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod exec;
pub mod options;
pub mod probe;
pub mod recipe;
pub mod resolve;
pub mod tools;
pub mod transcoder;

pub use config::{ExecutorConfig, IntegrityConfig, MonitoredStream, TranscoderConfig};
pub use error::{Error, Result};
pub use exec::{CommandExecutor, ExecOutput};
pub use options::Options;
pub use probe::{FfprobeInspector, MediaInfo, MediaInspector};
pub use recipe::{Recipe, Stage};
pub use resolve::{OriginalMedia, VariableResolver};
pub use tools::{Tool, ToolRegistry, ToolReport};
pub use transcoder::{JobReport, StageResult, Transcoder};
