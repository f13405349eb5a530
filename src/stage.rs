use crate::config::Config;
use crate::outcome::JobError;
use crate::params::{EffectiveParams, JobKind};
use crate::workspace::Workspace;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Filename of the generated solver input file. Both native programs read
/// this exact name from their working directory.
pub const INPUT_FILENAME: &str = "input.txt";

/// Path of the structured results file each solver writes, relative to the
/// workspace.
pub fn results_filename(kind: JobKind) -> &'static str {
    match kind {
        JobKind::Flow => "test.csv",
        JobKind::Diffusion => "DiffusionResults.csv",
    }
}

#[derive(Debug)]
pub struct StagedPaths {
    pub dataset: PathBuf,
    pub input_file: PathBuf,
}

/// Populate the workspace for one job: the uploaded dataset under its
/// contract-defined name, the rendered input file, and (for builds) every
/// required solver source. Missing sources fail here, before any compiler
/// is invoked.
pub fn stage(
    cfg: &Config,
    ws: &Workspace,
    params: &EffectiveParams,
    dataset: &[u8],
) -> Result<StagedPaths, JobError> {
    let kind = params.kind();

    let dataset_path = ws.join(kind.dataset_filename());
    std::fs::write(&dataset_path, dataset).map_err(|e| {
        JobError::Infrastructure(format!("writing dataset {}: {e}", dataset_path.display()))
    })?;

    let input = match kind {
        JobKind::Flow => render_flow_input(params, &dataset_path),
        JobKind::Diffusion => render_diffusion_input(params),
    };
    let input_path = ws.join(INPUT_FILENAME);
    std::fs::write(&input_path, input).map_err(|e| {
        JobError::Infrastructure(format!("writing input file {}: {e}", input_path.display()))
    })?;

    if kind == JobKind::Diffusion {
        copy_solver_sources(cfg, ws)?;
    }

    debug!("staged {} job in {}", kind, ws.path().display());
    Ok(StagedPaths {
        dataset: dataset_path,
        input_file: input_path,
    })
}

fn copy_solver_sources(cfg: &Config, ws: &Workspace) -> Result<(), JobError> {
    let solver_dir = Path::new(&cfg.paths.solver_dir);
    for file in &cfg.toolchain.diffusion_sources {
        let src = solver_dir.join(file);
        if !src.exists() {
            return Err(JobError::MissingArtifact { file: file.clone() });
        }
        std::fs::copy(&src, ws.join(file)).map_err(|e| {
            JobError::Infrastructure(format!("copying {}: {e}", src.display()))
        })?;
    }
    Ok(())
}

/// The flow solver's input grammar. Key spelling and ordering are a
/// compatibility boundary with the external program and must not drift.
fn render_flow_input(p: &EffectiveParams, dataset: &Path) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Dens: {}", p.value("density"));
    let _ = writeln!(out, "Visc: {}", p.value("viscosity"));
    let _ = writeln!(out, "DomainWidth: {}", p.value("domain_width"));
    let _ = writeln!(out, "DomainHeight: {}", p.value("domain_width"));
    let _ = writeln!(out, "MeshAmp: {}", p.value("mesh_amplification"));
    let _ = writeln!(out, "MaxIterGlobal: {}", p.value("max_iterations"));
    let _ = writeln!(out, "ResidualConv: {}", p.value("convergence_criteria"));
    let _ = writeln!(out, "nCores: {}", p.value("cpu_cores"));
    let _ = writeln!(out, "InputName: {}", dataset.display());
    let _ = writeln!(out, "OutputName: {}", results_filename(JobKind::Flow));
    let _ = writeln!(out, "PL: 1.0");
    let _ = writeln!(out, "PR: 0.0");
    let _ = writeln!(out, "RelaxFactor: 0.7");
    let _ = writeln!(out, "Verbose: 1");
    let _ = writeln!(out, "printMaps: 0");
    append_extras(&mut out, p);
    out
}

/// The diffusion solver's input grammar, including the fixed transient-mode
/// tail it always expects to find.
fn render_diffusion_input(p: &EffectiveParams) -> String {
    let mut out = String::from("Example Input File:\n");
    let _ = writeln!(out, "nD: {}", p.value("nD"));
    let _ = writeln!(out, "inputType: {}", p.value("inputType"));
    let _ = writeln!(out, "numDC: {}", p.value("numDC"));
    let _ = writeln!(out, "D1: {}", p.value("D1"));
    let _ = writeln!(out, "D2: {}", p.value("D2"));
    let _ = writeln!(out, "D3: {}", p.value("D3"));
    let _ = writeln!(out, "D_TH1: {}", p.value("D_TH1"));
    let _ = writeln!(out, "D_TH2: {}", p.value("D_TH2"));
    let _ = writeln!(out, "D_TH3: {}", p.value("D_TH3"));
    let _ = writeln!(out, "MeshAmpX: {}", p.value("meshAmpX"));
    let _ = writeln!(out, "MeshAmpY: {}", p.value("meshAmpY"));
    let _ = writeln!(out, "printOutput: 1");
    let _ = writeln!(out, "OutputName: {}", results_filename(JobKind::Diffusion));
    let _ = writeln!(out, "printCMap: 1");
    let _ = writeln!(out, "CMapName: concentration_map.csv");
    let _ = writeln!(out, "printFMap: 1");
    let _ = writeln!(out, "FMapName: flux_map.csv");
    let _ = writeln!(out, "Convergence: {}", p.value("convergence"));
    let _ = writeln!(out, "MaxIter: {}", p.value("maxIter"));
    let _ = writeln!(out, "CL: {}", p.value("CL"));
    let _ = writeln!(out, "CR: {}", p.value("CR"));
    let _ = writeln!(out, "InputName: {}", JobKind::Diffusion.dataset_filename());
    let _ = writeln!(out, "nThreads: {}", p.value("nThreads"));
    let _ = writeln!(out, "Verbose: {}", p.value("verbose"));
    let _ = writeln!(out, "useGPU: {}", p.value("useGPU"));
    let _ = writeln!(out, "nGPU: {}", p.value("nGPU"));
    let _ = writeln!(out, "TF: 0");
    let _ = writeln!(out, "Time: 100");
    let _ = writeln!(out, "Current: 6e-5");
    let _ = writeln!(out, "Charge: 1");
    let _ = writeln!(out, "SS: 1");
    let _ = writeln!(out, "CD_Time: 1800");
    let _ = writeln!(out, "Relax_Time: 14400");
    let _ = writeln!(out, "StartFlag: 0");
    let _ = writeln!(out, "StartTime: 900");
    let _ = writeln!(out, "InitCmap: CMAP_00090.csv");
    append_extras(&mut out, p);
    out
}

fn append_extras(out: &mut String, p: &EffectiveParams) {
    for (k, v) in p.extras() {
        let _ = writeln!(out, "{k}: {v}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::resolve;
    use std::collections::BTreeMap;

    #[test]
    fn flow_input_uses_defaults_for_omitted_params() {
        let p = resolve(JobKind::Flow, &BTreeMap::new()).unwrap();
        let text = render_flow_input(&p, Path::new("/tmp/ws/input_image.png"));
        assert!(text.contains("Visc: 0.001\n"));
        assert!(text.contains("Dens: 1000\n"));
        assert!(text.contains("ResidualConv: 0.000001\n"));
        assert!(text.contains("OutputName: test.csv\n"));
        assert!(text.contains("InputName: /tmp/ws/input_image.png\n"));
    }

    #[test]
    fn unrecognized_params_pass_through() {
        let mut raw = BTreeMap::new();
        raw.insert("SolverTweak".to_string(), "3".to_string());
        let p = resolve(JobKind::Flow, &raw).unwrap();
        let text = render_flow_input(&p, Path::new("img.png"));
        assert!(text.ends_with("SolverTweak: 3\n"));
    }

    #[test]
    fn diffusion_input_carries_contract_keys() {
        let p = resolve(JobKind::Diffusion, &BTreeMap::new()).unwrap();
        let text = render_diffusion_input(&p);
        assert!(text.starts_with("Example Input File:\n"));
        assert!(text.contains("D2: 3e-12\n"));
        assert!(text.contains("D3: 1e-14\n"));
        assert!(text.contains("Convergence: 1e-7\n"));
        assert!(text.contains("MaxIter: 1000000\n"));
        assert!(text.contains("InputName: input_image.jpg\n"));
        assert!(text.contains("InitCmap: CMAP_00090.csv\n"));
    }
}
