use crate::config::Config;
use crate::exec::{self, RunnableProgram};
use crate::outcome::JobError;
use crate::params::JobKind;
use crate::workspace::Workspace;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One concrete way to produce a runnable program: a command plus its
/// argument list, tried strictly in list order.
#[derive(Debug, Clone)]
pub struct ToolchainCandidate {
    pub program: String,
    pub args: Vec<String>,
}

/// The static build-candidate list for the diffusion solver. Compiler
/// front-end flags degrade from most to least demanding; the first zero
/// exit wins and later candidates are never tried.
pub fn build_candidates(cfg: &Config) -> Vec<ToolchainCandidate> {
    let nvcc = &cfg.toolchain.nvcc_exe;
    let exe = &cfg.toolchain.diffusion_executable;
    let variants: [&[&str]; 3] = [
        &["-std=c++17", "-Xcompiler", "-openmp"],
        &["-Xcompiler", "-openmp"],
        &["-std=c++17"],
    ];
    variants
        .iter()
        .map(|flags| {
            let mut args: Vec<String> = flags.iter().map(|s| s.to_string()).collect();
            args.extend(["-o".to_string(), exe.clone(), "main.cu".to_string()]);
            ToolchainCandidate {
                program: nvcc.clone(),
                args,
            }
        })
        .collect()
}

fn platform_binary_name(base: &str) -> String {
    if cfg!(windows) {
        format!("{base}.exe")
    } else {
        base.to_string()
    }
}

/// Ordered search locations for an already-built solver binary.
pub fn search_locations(solver_dir: &Path, binary: &str) -> Vec<PathBuf> {
    let name = platform_binary_name(binary);
    vec![
        solver_dir.join("bin").join(&name),
        solver_dir.join(&name),
        solver_dir.join("public").join(&name),
        solver_dir.join("static").join(&name),
    ]
}

/// Locate-existing strategy: first match wins. The failure message carries
/// every location searched so remediation is actionable.
pub fn locate_prebuilt(solver_dir: &Path, binary: &str) -> Result<PathBuf, JobError> {
    let locations = search_locations(solver_dir, binary);
    for path in &locations {
        if path.exists() {
            debug!("pre-built solver found: {}", path.display());
            return Ok(path.clone());
        }
    }
    Err(JobError::ToolchainUnavailable {
        searched: locations
            .iter()
            .map(|p| p.display().to_string())
            .collect(),
    })
}

/// Copy a located binary into the workspace and mark it executable where
/// the platform needs an explicit permission bit.
pub fn stage_prebuilt(
    ws: &Workspace,
    source: &Path,
    binary: &str,
) -> Result<RunnableProgram, JobError> {
    let dest = ws.join(&platform_binary_name(binary));
    std::fs::copy(source, &dest).map_err(|e| {
        JobError::Infrastructure(format!(
            "copying solver binary {} -> {}: {e}",
            source.display(),
            dest.display()
        ))
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(0o755)).map_err(|e| {
            JobError::Infrastructure(format!("chmod +x {}: {e}", dest.display()))
        })?;
    }

    Ok(RunnableProgram::new(dest))
}

/// Build-from-source strategy: try candidates in order with the workspace
/// as working directory. A command that cannot be launched at all counts
/// the same as a failed build and iteration continues; exhaustion surfaces
/// the last candidate's stderr.
pub fn build_from_source(
    ws: &Workspace,
    candidates: &[ToolchainCandidate],
    executable: &str,
) -> Result<RunnableProgram, JobError> {
    let mut last_stderr = String::from("no build candidates configured");

    for cand in candidates {
        let invocation = RunnableProgram {
            path: PathBuf::from(&cand.program),
            args: cand.args.clone(),
        };
        let result = exec::run(ws.path(), &invocation, None)
            .map_err(|e| JobError::Infrastructure(format!("running build candidate: {e}")))?;

        if result.success() {
            info!("build succeeded: {} {:?}", cand.program, cand.args);
            return Ok(RunnableProgram::new(ws.join(&platform_binary_name(executable))));
        }

        debug!(
            "build candidate failed (exit {}): {} {:?}",
            result.exit_code, cand.program, cand.args
        );
        last_stderr = if result.stderr.is_empty() {
            result.stdout
        } else {
            result.stderr
        };
    }

    Err(JobError::Compilation {
        stderr: last_stderr,
    })
}

/// Obtain a runnable program for this job kind. Both strategies yield the
/// same abstraction so the executor never cares how it was obtained.
pub fn resolve(cfg: &Config, ws: &Workspace, kind: JobKind) -> Result<RunnableProgram, JobError> {
    match kind {
        JobKind::Flow => {
            let solver_dir = PathBuf::from(&cfg.paths.solver_dir);
            let found = locate_prebuilt(&solver_dir, &cfg.toolchain.flow_binary)?;
            stage_prebuilt(ws, &found, &cfg.toolchain.flow_binary)
        }
        JobKind::Diffusion => build_from_source(
            ws,
            &build_candidates(cfg),
            &cfg.toolchain.diffusion_executable,
        ),
    }
}
