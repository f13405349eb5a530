use crate::exec::ExecutionResult;
use crate::outcome::JobError;
use crate::params::JobKind;
use crate::stage::results_filename;
use crate::workspace::Workspace;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use tracing::debug;

/// One row of the structured results file, in solver iteration order.
#[derive(Debug, Clone, Serialize)]
pub struct ConvergenceRecord {
    pub iteration: u64,
    pub permeability: f64,
    pub residual: f64,
    pub alpha: f64,
    pub mesh: u64,
}

/// Everything the two extraction channels recovered for one job. `primary`
/// is the scalar that decides job success; everything else stays optional
/// and is reported as unavailable rather than defaulted to zero.
#[derive(Debug)]
pub struct ParsedMetrics {
    pub primary: f64,
    pub permeability: Option<f64>,
    pub diffusivity: Option<f64>,
    pub porosity: Option<f64>,
    pub tortuosity: Option<f64>,
    pub iterations: Option<u64>,
    pub residual: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub history: Vec<ConvergenceRecord>,
}

/// Parse a results CSV: header row naming columns, one record per solver
/// iteration. Column typing is fixed by name (`iter`/`mesh` integers, the
/// rest floats); unparsable cells fall back to zero for the history, but
/// the primary column is tracked separately so an all-unparsable primary
/// is detectable. Returns the records plus the last parsable primary value.
pub fn parse_results_csv(content: &str) -> Result<(Vec<ConvergenceRecord>, Option<f64>), JobError> {
    let mut lines = content.trim().lines();
    let header = lines.next().unwrap_or("");
    let headers: Vec<&str> = header.split(',').map(str::trim).collect();

    let mut records = Vec::new();
    let mut primary = None;

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        let mut rec = ConvergenceRecord {
            iteration: 0,
            permeability: 0.0,
            residual: 0.0,
            alpha: 0.0,
            mesh: 0,
        };
        for (i, name) in headers.iter().enumerate() {
            let cell = cells.get(i).copied().unwrap_or("");
            match *name {
                "iter" => rec.iteration = cell.parse().unwrap_or(0),
                "mesh" => rec.mesh = cell.parse().unwrap_or(0),
                "K" => {
                    let parsed = cell.parse::<f64>().ok().filter(|v| v.is_finite());
                    rec.permeability = parsed.unwrap_or(0.0);
                    if let Some(v) = parsed {
                        primary = Some(v);
                    }
                }
                "R" => rec.residual = cell.parse().unwrap_or(0.0),
                "alpha" => rec.alpha = cell.parse().unwrap_or(0.0),
                _ => {}
            }
        }
        records.push(rec);
    }

    if records.is_empty() {
        return Err(JobError::ResultParse {
            reason: "results file has a header but no data rows".to_string(),
            excerpt: content.to_string(),
        });
    }

    Ok((records, primary))
}

/// Scalar fields pattern-scanned out of the captured stdout. The native
/// programs scatter these as labeled lines through human-oriented logs;
/// a missing label leaves the field None because zero is a valid physical
/// value and must not be confused with "not reported".
#[derive(Debug, Default)]
pub struct ScanFields {
    pub porosity: Option<f64>,
    pub diffusivity: Option<f64>,
    pub tortuosity: Option<f64>,
    pub iterations: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

const NUM: &str = r"([0-9]*\.?[0-9]+(?:[eE][+-]?[0-9]+)?)";

struct ScanPatterns {
    porosity: Regex,
    diffusivity: Regex,
    tortuosity: Regex,
    iterations: Regex,
    width: Regex,
    height: Regex,
}

// Compiled once; the patterns are fixed, so a malformed one panics on
// first use instead of reading as a missing field.
static SCAN: LazyLock<ScanPatterns> = LazyLock::new(|| ScanPatterns {
    porosity: Regex::new(&format!(r"(?i)Porosity[\s:=]+{NUM}")).unwrap(),
    diffusivity: Regex::new(&format!(r"(?i)Effective Diffusivity[\s:=]+{NUM}")).unwrap(),
    tortuosity: Regex::new(&format!(r"(?i)Tortuosity[\s:=]+{NUM}")).unwrap(),
    iterations: Regex::new(r"(?i)Iterations[\s:=]+(\d+)").unwrap(),
    width: Regex::new(r"(?i)\bWidth(?:\s*\(pixels\))?[\s:=]+(\d+)").unwrap(),
    height: Regex::new(r"(?i)\bHeight(?:\s*\(pixels\))?[\s:=]+(\d+)").unwrap(),
});

pub fn scan_stdout(text: &str) -> ScanFields {
    ScanFields {
        porosity: cap_f64(&SCAN.porosity, text),
        diffusivity: cap_f64(&SCAN.diffusivity, text),
        tortuosity: cap_f64(&SCAN.tortuosity, text),
        iterations: cap_u64(&SCAN.iterations, text),
        width: cap_u32(&SCAN.width, text),
        height: cap_u32(&SCAN.height, text),
    }
}

fn cap<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    Some(re.captures(text)?.get(1)?.as_str())
}

fn cap_f64(re: &Regex, text: &str) -> Option<f64> {
    cap(re, text)?.parse().ok()
}

fn cap_u64(re: &Regex, text: &str) -> Option<u64> {
    cap(re, text)?.parse().ok()
}

fn cap_u32(re: &Regex, text: &str) -> Option<u32> {
    cap(re, text)?.parse().ok()
}

/// Run both channels against a zero-exit execution. The structured file is
/// authoritative for the convergence history and the final primary metric;
/// the stdout scan supplements fields the file never carries. A zero exit
/// with no usable primary metric from either channel is a silent failure
/// and surfaces as a parse error.
pub fn extract(
    ws: &Workspace,
    kind: JobKind,
    exec: &ExecutionResult,
) -> Result<ParsedMetrics, JobError> {
    let scan = scan_stdout(&exec.stdout);

    match kind {
        JobKind::Flow => {
            let path = ws.join(results_filename(kind));
            let content = std::fs::read_to_string(&path).map_err(|e| JobError::ResultParse {
                reason: format!("results file not found or unreadable: {}: {e}", path.display()),
                excerpt: exec.stdout.clone(),
            })?;
            let (history, primary) = parse_results_csv(&content)?;
            let primary = primary.ok_or_else(|| JobError::ResultParse {
                reason: "permeability column unparsable in every record".to_string(),
                excerpt: content.clone(),
            })?;
            let iterations = history.last().map(|r| r.iteration);
            let residual = history.last().map(|r| r.residual);
            debug!("flow extraction: K={primary} records={}", history.len());
            Ok(ParsedMetrics {
                primary,
                permeability: Some(primary),
                diffusivity: None,
                porosity: scan.porosity,
                tortuosity: None,
                iterations,
                residual,
                width: scan.width,
                height: scan.height,
                history,
            })
        }
        JobKind::Diffusion => {
            let primary = scan.diffusivity.ok_or_else(|| JobError::ResultParse {
                reason: "no effective diffusivity reported in solver output".to_string(),
                excerpt: exec.stdout.clone(),
            })?;
            // The diffusion solver also writes a results CSV; use it for the
            // convergence history when it is present and well-formed.
            let history = std::fs::read_to_string(ws.join(results_filename(kind)))
                .ok()
                .and_then(|content| parse_results_csv(&content).ok())
                .map(|(records, _)| records)
                .unwrap_or_default();
            debug!("diffusion extraction: D={primary}");
            Ok(ParsedMetrics {
                primary,
                permeability: None,
                diffusivity: Some(primary),
                porosity: scan.porosity,
                tortuosity: scan.tortuosity,
                iterations: scan.iterations,
                residual: None,
                width: scan.width,
                height: scan.height,
                history,
            })
        }
    }
}
