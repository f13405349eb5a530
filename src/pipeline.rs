use crate::{
    config::Config,
    exec,
    extract::{self, ParsedMetrics},
    outcome::{ImageProperties, JobData, JobError, JobOutcome},
    params::{self, EffectiveParams, JobKind},
    stage, toolchain,
    util::sha256_hex,
    workspace::{Workspace, WorkspaceManager},
};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One request to process a dataset through a native solver. Immutable for
/// the lifetime of the job.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub kind: JobKind,
    pub dataset: Vec<u8>,
    pub params: BTreeMap<String, String>,
}

pub struct Pipeline {
    cfg: Config,
    workspaces: WorkspaceManager,
}

impl Pipeline {
    pub fn new(cfg: &Config) -> Self {
        Self {
            cfg: cfg.clone(),
            workspaces: WorkspaceManager::new(&cfg.paths.work_dir),
        }
    }

    /// Run one job end to end: stage, resolve a toolchain, execute, extract.
    /// Every failure maps to a typed outcome, and the workspace is released
    /// on every path once it has been acquired. Raw errors never escape.
    pub fn run_job(&self, request: &JobRequest) -> JobOutcome {
        // Validation needs no filesystem state, so it runs before any
        // workspace exists.
        let params = match self.validate(request) {
            Ok(p) => p,
            Err(e) => return JobOutcome::failed(&e),
        };

        let ws = match self.workspaces.acquire(request.kind.workspace_prefix()) {
            Ok(ws) => ws,
            Err(e) => {
                warn!("workspace acquisition failed: {e}");
                return JobOutcome::failed(&e);
            }
        };

        let outcome = match self.run_in_workspace(&ws, request, &params) {
            Ok(data) => JobOutcome::completed(data),
            Err(e) => {
                info!("job failed ({}): {e}", e.kind());
                JobOutcome::failed(&e)
            }
        };

        if self.cfg.global.keep_workspaces {
            info!("keeping workspace for inspection: {}", ws.path().display());
        } else {
            self.workspaces.release(ws);
        }

        outcome
    }

    fn validate(&self, request: &JobRequest) -> Result<EffectiveParams, JobError> {
        if request.dataset.is_empty() {
            return Err(JobError::Validation(
                "no image data provided".to_string(),
            ));
        }
        if request.dataset.len() as u64 > self.cfg.limits.max_input_file_bytes {
            return Err(JobError::Validation(format!(
                "input exceeds max_input_file_bytes: {} > {}",
                request.dataset.len(),
                self.cfg.limits.max_input_file_bytes
            )));
        }
        params::resolve(request.kind, &request.params)
    }

    fn run_in_workspace(
        &self,
        ws: &Workspace,
        request: &JobRequest,
        params: &EffectiveParams,
    ) -> Result<JobData, JobError> {
        info!(
            "job start kind={} dataset_bytes={} dataset_sha256={}",
            request.kind,
            request.dataset.len(),
            sha256_hex(&request.dataset)
        );

        stage::stage(&self.cfg, ws, params, &request.dataset)?;
        let program = toolchain::resolve(&self.cfg, ws, request.kind)?;

        let timeout = (self.cfg.limits.job_timeout_seconds > 0)
            .then(|| Duration::from_secs(self.cfg.limits.job_timeout_seconds));
        let result = exec::run(ws.path(), &program, timeout)
            .map_err(|e| JobError::Infrastructure(format!("executing solver: {e}")))?;

        info!(
            "solver exited code={} in {:.3}s",
            result.exit_code,
            result.duration.as_secs_f64()
        );
        if self.cfg.debug.keep_solver_stderr && !result.stderr.is_empty() {
            debug!("solver stderr: {}", result.stderr.trim());
        }

        if !result.success() {
            return Err(JobError::Execution {
                exit_code: result.exit_code,
                stdout: result.stdout,
                stderr: result.stderr,
            });
        }

        let metrics = extract::extract(ws, request.kind, &result)?;
        Ok(self.assemble(params, metrics, result.duration))
    }

    fn assemble(
        &self,
        params: &EffectiveParams,
        metrics: ParsedMetrics,
        duration: Duration,
    ) -> JobData {
        let tail = self.cfg.output.history_tail;
        let convergence_history = if metrics.history.is_empty() {
            None
        } else {
            let skip = metrics.history.len().saturating_sub(tail);
            Some(metrics.history[skip..].to_vec())
        };

        JobData {
            permeability: metrics.permeability,
            diffusivity: metrics.diffusivity,
            porosity: metrics.porosity,
            tortuosity: metrics.tortuosity,
            iterations: metrics.iterations,
            convergence_rms: metrics.residual,
            simulation_time: duration.as_secs_f64(),
            image_properties: ImageProperties {
                width: metrics.width,
                height: metrics.height,
                channels: 1,
            },
            simulation_parameters: params.echo_json(),
            convergence_history,
        }
    }
}
