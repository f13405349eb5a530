use crate::extract::ConvergenceRecord;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Per-stage failure kinds. Every one of these is recovered at the
/// orchestrator boundary into a failure [`JobOutcome`]; only workspace
/// teardown problems are logged instead of surfaced.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("{0}")]
    Validation(String),

    #[error("missing solver artifact: {file}")]
    MissingArtifact { file: String },

    #[error("no pre-built solver binary found; searched: {}", searched.join(", "))]
    ToolchainUnavailable { searched: Vec<String> },

    #[error("all build candidates failed")]
    Compilation { stderr: String },

    #[error("solver exited with code {exit_code}")]
    Execution {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("could not parse solver results: {reason}")]
    ResultParse { reason: String, excerpt: String },

    #[error("infrastructure failure: {0}")]
    Infrastructure(String),
}

impl JobError {
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::Validation(_) => "validation_error",
            JobError::MissingArtifact { .. } => "missing_artifact",
            JobError::ToolchainUnavailable { .. } => "toolchain_unavailable",
            JobError::Compilation { .. } => "compilation_failure",
            JobError::Execution { .. } => "execution_failure",
            JobError::ResultParse { .. } => "result_parse_failure",
            JobError::Infrastructure(_) => "infrastructure_error",
        }
    }

    /// Diagnostic payload for the outcome JSON. Keeps enough of the captured
    /// text to tell "install a compiler" apart from "solver produced no
    /// result" apart from "bad input".
    pub fn details(&self) -> serde_json::Value {
        match self {
            JobError::Validation(msg) => json!({ "kind": self.kind(), "message": msg }),
            JobError::MissingArtifact { file } => json!({ "kind": self.kind(), "file": file }),
            JobError::ToolchainUnavailable { searched } => json!({
                "kind": self.kind(),
                "searched_locations": searched,
            }),
            JobError::Compilation { stderr } => json!({
                "kind": self.kind(),
                "stderr": excerpt(stderr, 4000),
            }),
            JobError::Execution {
                exit_code,
                stdout,
                stderr,
            } => json!({
                "kind": self.kind(),
                "exit_code": exit_code,
                "stdout": excerpt(stdout, 4000),
                "stderr": excerpt(stderr, 4000),
            }),
            JobError::ResultParse { reason, excerpt: e } => json!({
                "kind": self.kind(),
                "reason": reason,
                "excerpt": excerpt(e, 500),
            }),
            JobError::Infrastructure(msg) => json!({ "kind": self.kind(), "message": msg }),
        }
    }
}

fn excerpt(s: &str, max: usize) -> &str {
    let mut end = s.len().min(max);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageProperties {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub channels: u32,
}

/// Payload of a successful job.
#[derive(Debug, Clone, Serialize)]
pub struct JobData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permeability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diffusivity: Option<f64>,
    /// None means "not reported by the solver", never zero.
    pub porosity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tortuosity: Option<f64>,
    pub iterations: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convergence_rms: Option<f64>,
    pub simulation_time: f64,
    pub image_properties: ImageProperties,
    pub simulation_parameters: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convergence_history: Option<Vec<ConvergenceRecord>>,
}

/// The final, returned artifact of one job. Outlives the workspace.
#[derive(Debug, Serialize)]
pub struct JobOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Box<JobData>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl JobOutcome {
    pub fn completed(data: JobData) -> Self {
        Self {
            success: true,
            data: Some(Box::new(data)),
            error: None,
            details: None,
        }
    }

    pub fn failed(err: &JobError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            details: Some(err.details()),
        }
    }
}
