use crate::{
    config::Config,
    exec::{self, RunnableProgram},
    params::{self, JobKind},
    pipeline::{JobRequest, Pipeline},
    toolchain,
    util::{ensure_dir, now_rfc3339},
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "porosim")]
#[command(about = "Porous-media simulation orchestrator (solver staging + execution + extraction)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./porosim.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report solver and toolchain availability.
    Doctor {},
    /// Print the parameter schema for a job kind.
    Params {
        #[arg(long)]
        kind: String,
    },
    /// Run one simulation job against an input image.
    Run {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        kind: String,
        /// Solver parameter override, `name=value`. Repeatable; unrecognized
        /// names pass through into the generated input file.
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref())?;
    let cfg = Config::load(&cfg_path)?;
    let _guard = init_logging(&args, &cfg)?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Params { kind } => print_schema(kind),
        Command::Run {
            input,
            kind,
            params,
            out_dir,
        } => run(&cfg, input, kind, params, out_dir.as_deref()),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = user {
        return Ok(p.to_path_buf());
    }
    let default = PathBuf::from("porosim.toml");
    if default.exists() {
        Ok(default)
    } else {
        Ok(PathBuf::from("porosim.example.toml"))
    }
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let (file_layer, guard) = if cfg.logging.write_to_file {
        let path = if cfg.logging.file_path.is_empty() {
            PathBuf::from(&cfg.paths.out_dir).join("porosim.log")
        } else {
            PathBuf::from(&cfg.logging.file_path)
        };
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(&path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn doctor(cfg: &Config) -> Result<()> {
    let solver_dir = PathBuf::from(&cfg.paths.solver_dir);
    let searched = toolchain::search_locations(&solver_dir, &cfg.toolchain.flow_binary);
    let binary = toolchain::locate_prebuilt(&solver_dir, &cfg.toolchain.flow_binary).ok();

    let nvcc = RunnableProgram::with_args(&cfg.toolchain.nvcc_exe, &["--version"]);
    let cuda = exec::run(Path::new("."), &nvcc, None)?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "flow_binary_available": binary.is_some(),
            "flow_binary_path": binary,
            "searched_locations": searched,
            "cuda_available": cuda.success(),
            "nvcc_version": cuda.success().then(|| cuda.stdout.trim().to_string()),
        }))?
    );
    Ok(())
}

fn print_schema(kind: &str) -> Result<()> {
    let kind = parse_kind(kind)?;
    println!("{}", serde_json::to_string_pretty(&params::schema(kind))?);
    Ok(())
}

fn run(
    cfg: &Config,
    input: &Path,
    kind: &str,
    raw_params: &[String],
    out_override: Option<&Path>,
) -> Result<()> {
    let kind = parse_kind(kind)?;
    let dataset = std::fs::read(input)
        .with_context(|| format!("reading input image: {}", input.display()))?;

    let mut param_map = BTreeMap::new();
    for pair in raw_params {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("bad --param (expected NAME=VALUE): {pair}"))?;
        param_map.insert(name.trim().to_string(), value.trim().to_string());
    }

    let request = JobRequest {
        kind,
        dataset,
        params: param_map,
    };

    let out_root = out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.out_dir));

    if cfg.debug.dump_effective_config {
        ensure_dir(&out_root)?;
        let raw = toml::to_string(cfg).unwrap_or_default();
        std::fs::write(out_root.join("effective-config.toml"), raw)?;
    }

    let started = now_rfc3339();
    let pipeline = Pipeline::new(cfg);
    let outcome = pipeline.run_job(&request);
    let finished = now_rfc3339();

    if cfg.output.write_report_json {
        ensure_dir(&out_root)?;
        let report_path = out_root.join(&cfg.output.report_filename);
        let report = json!({
            "kind": kind,
            "input": input.display().to_string(),
            "started": started,
            "finished": finished,
            "outcome": outcome,
        });
        std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;
        info!("report written: {}", report_path.display());
    }

    if cfg.global.print_summary {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }

    Ok(())
}

fn parse_kind(s: &str) -> Result<JobKind> {
    JobKind::parse(s).ok_or_else(|| anyhow!("unknown job kind: {s} (expected flow or diffusion)"))
}
