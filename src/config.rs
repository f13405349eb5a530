use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub toolchain: Toolchain,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub print_summary: bool,
    /// Keep workspaces after the job finishes instead of removing them.
    /// Debug aid only; normal operation removes every workspace.
    pub keep_workspaces: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            print_summary: true,
            keep_workspaces: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    /// Where solver artifacts live: the pre-built flow binary (root, bin/,
    /// public/ or static/) and the CUDA sources for the diffusion solver.
    pub solver_dir: String,
    /// Root for per-job workspaces. Empty = platform temp dir.
    pub work_dir: String,
    pub out_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            solver_dir: ".".into(),
            work_dir: "".into(),
            out_dir: "out".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    pub max_input_file_bytes: u64,
    /// Outer deadline for one solver run, in seconds. 0 disables it.
    pub job_timeout_seconds: u64,
}
impl Default for Limits {
    fn default() -> Self {
        Self {
            max_input_file_bytes: 10 * 1024 * 1024,
            job_timeout_seconds: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Toolchain {
    /// Basename of the pre-built flow solver (".exe" appended on Windows).
    pub flow_binary: String,
    /// Executable name produced by a successful diffusion build.
    pub diffusion_executable: String,
    /// CUDA compiler front-end tried by the build candidates.
    pub nvcc_exe: String,
    /// Source files staged into the workspace before a diffusion build.
    pub diffusion_sources: Vec<String>,
}
impl Default for Toolchain {
    fn default() -> Self {
        Self {
            flow_binary: "fluid_sim".into(),
            diffusion_executable: "diffusivity_sim".into(),
            nvcc_exe: "nvcc".into(),
            diffusion_sources: vec![
                "main.cu".into(),
                "helper.cuh".into(),
                "stb_image.h".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub write_report_json: bool,
    pub report_filename: String,
    /// How many trailing convergence records the outcome carries.
    pub history_tail: usize,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            write_report_json: true,
            report_filename: "report.json".into(),
            history_tail: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debug {
    pub keep_solver_stderr: bool,
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            keep_solver_stderr: true,
            dump_effective_config: false,
        }
    }
}
