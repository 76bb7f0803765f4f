use anyhow::Context;
use benchgate_adapters::{StdHostProbe, StdProcessRunner, SystemClock};
use benchgate_app::{
    CheckRequest, CheckUseCase, CompareRequest, CompareUseCase, exit_code_for,
    github_annotations, render_markdown,
};
use benchgate_config::{
    DEFAULT_CONFIG_FILE, Overrides, expand_candidates, load_config_file, parse_duration,
};
use benchgate_types::{
    CompareReceipt, DEFAULT_ALPHA, DEFAULT_MAX_ROUNDS, DEFAULT_MIN_ROUNDS, MetricSpec, ToolInfo,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "BENCHGATE_LOG";

#[derive(Debug, Parser)]
#[command(
    name = "benchgate",
    version,
    about = "Sequential A/B benchmark comparison with Welch's t-test"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). BENCHGATE_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Engine settings shared by `compare` and `check`.
#[derive(Debug, Args)]
struct EngineArgs {
    /// Rounds before the first significance test (at least 5)
    #[arg(long)]
    min_rounds: Option<u32>,

    /// Hard cap on rounds
    #[arg(long)]
    max_rounds: Option<u32>,

    /// Significance threshold for the two-tailed p-value
    #[arg(long)]
    alpha: Option<f64>,

    /// Per-invocation timeout (e.g. "60s")
    #[arg(long)]
    timeout: Option<String>,

    /// Seed the visitation shuffle for a reproducible order
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a sequential comparison of candidates against a baseline and emit a receipt (JSON).
    Compare {
        /// Reference executable
        #[arg(long)]
        baseline: String,

        /// Candidate executable. Repeatable.
        #[arg(long = "candidate")]
        candidates: Vec<String>,

        /// Glob pattern adding candidates (the baseline is skipped)
        #[arg(long)]
        candidates_glob: Option<String>,

        /// Metric printed on its own stdout line, in order: NAME[:higher|lower]. Repeatable.
        #[arg(long = "metric", required = true)]
        metrics: Vec<MetricSpec>,

        #[command(flatten)]
        engine: EngineArgs,

        /// Output compare receipt
        #[arg(long, default_value = "benchgate-compare.json")]
        out: PathBuf,

        /// Pretty-print JSON
        #[arg(long, default_value_t = false)]
        pretty: bool,

        /// Treat an inconclusive verdict as a failing exit code
        #[arg(long, default_value_t = false)]
        fail_on_pending: bool,
    },

    /// Run a gate from a config file and write compare.json and comment.md.
    Check {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Gate name from the config file
        #[arg(long)]
        gate: String,

        /// Artifact directory (overrides [defaults].out_dir)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        #[command(flatten)]
        engine: EngineArgs,

        /// Pretty-print JSON
        #[arg(long, default_value_t = false)]
        pretty: bool,

        /// Treat an inconclusive verdict as a failing exit code
        #[arg(long, default_value_t = false)]
        fail_on_pending: bool,
    },

    /// Render a Markdown summary from a compare receipt.
    Md {
        #[arg(long)]
        compare: PathBuf,

        /// Output markdown path (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Emit GitHub Actions annotations from a compare receipt.
    GithubAnnotations {
        #[arg(long)]
        compare: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    match real_main(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: u8, format: LogFormat) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    // Ignore the error from a second init; only tests would hit it.
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

fn real_main(cli: Cli) -> anyhow::Result<u8> {
    match cli.cmd {
        Command::Compare {
            baseline,
            candidates,
            candidates_glob,
            metrics,
            engine,
            out,
            pretty,
            fail_on_pending,
        } => {
            let candidates =
                expand_candidates(&candidates, candidates_glob.as_deref(), &baseline)?;
            let timeout = engine.timeout.as_deref().map(parse_duration).transpose()?;

            let usecase = CompareUseCase::new(StdProcessRunner, StdHostProbe::default(), SystemClock);
            let receipt = usecase.execute(CompareRequest {
                baseline,
                candidates,
                metrics,
                min_rounds: engine.min_rounds.unwrap_or(DEFAULT_MIN_ROUNDS),
                max_rounds: engine.max_rounds.unwrap_or(DEFAULT_MAX_ROUNDS),
                alpha: engine.alpha.unwrap_or(DEFAULT_ALPHA),
                timeout,
                seed: engine.seed,
                gate: None,
                tool: tool_info(),
            })?;

            write_json(&out, &receipt, pretty)?;
            print_summary(&receipt);

            Ok(exit_code(exit_code_for(&receipt.verdict, fail_on_pending)))
        }

        Command::Check {
            config,
            gate,
            out_dir,
            engine,
            pretty,
            fail_on_pending,
        } => {
            let config_file = load_config_file(&config)?;
            let overrides = Overrides {
                min_rounds: engine.min_rounds,
                max_rounds: engine.max_rounds,
                alpha: engine.alpha,
                timeout: engine.timeout.as_deref().map(parse_duration).transpose()?,
                seed: engine.seed,
                out_dir,
            };

            let usecase = CheckUseCase::new(StdProcessRunner, StdHostProbe::default(), SystemClock);
            let outcome = usecase.execute(CheckRequest {
                config: config_file,
                gate,
                overrides,
                fail_on_pending,
                tool: tool_info(),
            })?;

            write_json(&outcome.compare_path, &outcome.receipt, pretty)?;
            atomic_write(&outcome.markdown_path, outcome.markdown.as_bytes())?;
            debug!(
                compare = %outcome.compare_path.display(),
                markdown = %outcome.markdown_path.display(),
                "artifacts written"
            );
            print_summary(&outcome.receipt);

            Ok(exit_code(outcome.exit_code))
        }

        Command::Md { compare, out } => {
            let compare_receipt: CompareReceipt = read_json(&compare)?;
            let md = render_markdown(&compare_receipt);

            match out {
                Some(path) => {
                    fs::write(&path, md).with_context(|| format!("write {}", path.display()))?;
                }
                None => {
                    print!("{md}");
                }
            }

            Ok(0)
        }

        Command::GithubAnnotations { compare } => {
            let compare_receipt: CompareReceipt = read_json(&compare)?;
            for line in github_annotations(&compare_receipt) {
                println!("{line}");
            }
            Ok(0)
        }
    }
}

/// One line per pair on stdout: `<candidate> <metric> <status>`.
fn print_summary(receipt: &CompareReceipt) {
    for (candidate, metrics) in receipt.statuses() {
        for (metric, status) in metrics {
            println!("{candidate} {metric} {status}");
        }
    }
}

fn exit_code(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

fn tool_info() -> ToolInfo {
    ToolInfo {
        name: "benchgate".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let v =
        serde_json::from_slice(&bytes).with_context(|| format!("parse json {}", path.display()))?;
    Ok(v)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T, pretty: bool) -> anyhow::Result<()> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };

    atomic_write(path, &bytes)
}

/// Write through a sibling temp file and rename, so readers never see a partial file.
fn atomic_write(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    use std::io::Write;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;

    let tmp = parent.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
    {
        let mut f =
            fs::File::create(&tmp).with_context(|| format!("create temp {}", tmp.display()))?;
        f.write_all(bytes)
            .with_context(|| format!("write temp {}", tmp.display()))?;
        f.sync_all().ok();
    }

    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn metric_flags_parse_direction() {
        let cli = Cli::try_parse_from([
            "benchgate",
            "compare",
            "--baseline",
            "./a",
            "--candidate",
            "./b",
            "--metric",
            "perft",
            "--metric",
            "latency_us:lower",
        ])
        .unwrap();
        let Command::Compare { metrics, .. } = cli.cmd else {
            panic!("expected compare");
        };
        assert_eq!(
            metrics,
            vec![MetricSpec::higher("perft"), MetricSpec::lower("latency_us")]
        );
    }

    #[test]
    fn bad_direction_is_a_usage_error() {
        let err = Cli::try_parse_from([
            "benchgate",
            "compare",
            "--baseline",
            "./a",
            "--metric",
            "perft:sideways",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn atomic_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.json");
        write_json(&path, &serde_json::json!({"ok": true}), false).unwrap();
        let back: serde_json::Value = read_json(&path).unwrap();
        assert_eq!(back["ok"], true);
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn exit_codes_clamp_to_u8() {
        assert_eq!(exit_code(2), 2);
        assert_eq!(exit_code(-1), 1);
    }
}
