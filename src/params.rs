use crate::outcome::JobError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Which native solver contract a job targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Flow,
    Diffusion,
}

impl JobKind {
    pub fn parse(s: &str) -> Option<JobKind> {
        match s.to_ascii_lowercase().as_str() {
            "flow" => Some(JobKind::Flow),
            "diffusion" => Some(JobKind::Diffusion),
            _ => None,
        }
    }

    /// Prefix for workspace directory names.
    pub fn workspace_prefix(&self) -> &'static str {
        match self {
            JobKind::Flow => "fluid-sim",
            JobKind::Diffusion => "diffusivity-sim",
        }
    }

    /// The staged dataset filename each native program expects.
    pub fn dataset_filename(&self) -> &'static str {
        match self {
            JobKind::Flow => "input_image.png",
            JobKind::Diffusion => "input_image.jpg",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Flow => write!(f, "flow"),
            JobKind::Diffusion => write!(f, "diffusion"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Magnitudes below 1e-6 render in exponent form, the same way
            // the solvers' reference input files write them.
            ParamValue::Float(v) if *v != 0.0 && v.abs() < 1e-6 => write!(f, "{v:e}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
        }
    }
}

/// One recognized parameter: declared type, documented default, valid range.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: ParamValue,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

const fn float(name: &'static str, default: f64, min: Option<f64>, max: Option<f64>) -> ParamSpec {
    ParamSpec {
        name,
        default: ParamValue::Float(default),
        min,
        max,
    }
}

const fn int(name: &'static str, default: i64, min: Option<f64>, max: Option<f64>) -> ParamSpec {
    ParamSpec {
        name,
        default: ParamValue::Int(default),
        min,
        max,
    }
}

const FLOW_SCHEMA: &[ParamSpec] = &[
    float("density", 1000.0, Some(f64::MIN_POSITIVE), None),
    float("viscosity", 0.001, Some(f64::MIN_POSITIVE), None),
    float("domain_width", 1.0, Some(f64::MIN_POSITIVE), None),
    int("mesh_amplification", 1, Some(1.0), Some(100.0)),
    int("max_iterations", 10000, Some(1.0), None),
    float("convergence_criteria", 1e-6, Some(0.0), None),
    int("cpu_cores", 4, Some(1.0), Some(1024.0)),
];

const DIFFUSION_SCHEMA: &[ParamSpec] = &[
    int("nD", 2, Some(1.0), Some(3.0)),
    int("inputType", 2, Some(0.0), None),
    int("numDC", 3, Some(1.0), None),
    float("D1", 0.0, Some(0.0), None),
    float("D2", 3e-12, Some(0.0), None),
    float("D3", 1e-14, Some(0.0), None),
    int("D_TH1", 40, Some(0.0), Some(255.0)),
    int("D_TH2", 170, Some(0.0), Some(255.0)),
    int("D_TH3", 255, Some(0.0), Some(255.0)),
    int("meshAmpX", 1, Some(1.0), Some(100.0)),
    int("meshAmpY", 1, Some(1.0), Some(100.0)),
    float("convergence", 1e-7, Some(0.0), None),
    int("maxIter", 1_000_000, Some(1.0), None),
    float("CL", 0.0, None, None),
    float("CR", 1.0, None, None),
    int("nThreads", 8, Some(1.0), Some(1024.0)),
    int("useGPU", 1, Some(0.0), Some(1.0)),
    int("nGPU", 1, Some(0.0), None),
    int("verbose", 1, Some(0.0), Some(1.0)),
];

pub fn schema(kind: JobKind) -> &'static [ParamSpec] {
    match kind {
        JobKind::Flow => FLOW_SCHEMA,
        JobKind::Diffusion => DIFFUSION_SCHEMA,
    }
}

/// The fully resolved parameter set for one job: every recognized parameter
/// present (user-supplied or default), unrecognized ones carried verbatim.
#[derive(Debug, Clone)]
pub struct EffectiveParams {
    kind: JobKind,
    values: BTreeMap<&'static str, ParamValue>,
    extras: BTreeMap<String, String>,
}

impl EffectiveParams {
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Value of a recognized parameter. Falls back to the schema default,
    /// so lookups by schema name cannot fail.
    pub fn value(&self, name: &str) -> ParamValue {
        if let Some(v) = self.values.get(name) {
            return *v;
        }
        schema(self.kind)
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.default)
            .unwrap_or(ParamValue::Int(0))
    }

    /// Unrecognized parameters, passed through opaquely into the input file.
    pub fn extras(&self) -> &BTreeMap<String, String> {
        &self.extras
    }

    /// The `simulation_parameters` echo for the outcome JSON.
    pub fn echo_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for spec in schema(self.kind) {
            map.insert(
                spec.name.to_string(),
                serde_json::to_value(self.value(spec.name)).unwrap_or(serde_json::Value::Null),
            );
        }
        for (k, v) in &self.extras {
            map.insert(k.clone(), serde_json::Value::String(v.clone()));
        }
        serde_json::Value::Object(map)
    }
}

/// Validate raw parameters against the kind's schema and fill defaults.
///
/// Invalid input is an error, never a silent coercion: a recognized
/// parameter that fails to parse or falls outside its valid range rejects
/// the whole job before any workspace exists.
pub fn resolve(
    kind: JobKind,
    raw: &BTreeMap<String, String>,
) -> Result<EffectiveParams, JobError> {
    let specs = schema(kind);
    let mut values = BTreeMap::new();

    for spec in specs {
        let value = match raw.get(spec.name) {
            None => spec.default,
            Some(text) => parse_value(spec, text)?,
        };
        check_range(spec, value)?;
        values.insert(spec.name, value);
    }

    let extras = raw
        .iter()
        .filter(|(k, _)| !specs.iter().any(|s| s.name == k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(EffectiveParams {
        kind,
        values,
        extras,
    })
}

fn parse_value(spec: &ParamSpec, text: &str) -> Result<ParamValue, JobError> {
    let text = text.trim();
    match spec.default {
        ParamValue::Float(_) => text
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(ParamValue::Float)
            .ok_or_else(|| {
                JobError::Validation(format!("parameter {} is not a number: {text:?}", spec.name))
            }),
        ParamValue::Int(_) => text.parse::<i64>().map(ParamValue::Int).map_err(|_| {
            JobError::Validation(format!("parameter {} is not an integer: {text:?}", spec.name))
        }),
    }
}

fn check_range(spec: &ParamSpec, value: ParamValue) -> Result<(), JobError> {
    let v = match value {
        ParamValue::Float(f) => f,
        ParamValue::Int(i) => i as f64,
    };
    if spec.min.is_some_and(|min| v < min) || spec.max.is_some_and(|max| v > max) {
        return Err(JobError::Validation(format!(
            "parameter {} out of range: {value}",
            spec.name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in() {
        let p = resolve(JobKind::Flow, &BTreeMap::new()).unwrap();
        assert_eq!(p.value("viscosity"), ParamValue::Float(0.001));
        assert_eq!(p.value("cpu_cores"), ParamValue::Int(4));
    }

    #[test]
    fn small_floats_render_in_exponent_form() {
        assert_eq!(ParamValue::Float(3e-12).to_string(), "3e-12");
        assert_eq!(ParamValue::Float(1e-7).to_string(), "1e-7");
        assert_eq!(ParamValue::Float(1e-6).to_string(), "0.000001");
        assert_eq!(ParamValue::Float(0.001).to_string(), "0.001");
        assert_eq!(ParamValue::Float(0.0).to_string(), "0");
    }

    #[test]
    fn override_and_extras() {
        let mut raw = BTreeMap::new();
        raw.insert("density".to_string(), "850.5".to_string());
        raw.insert("customFlag".to_string(), "yes".to_string());
        let p = resolve(JobKind::Flow, &raw).unwrap();
        assert_eq!(p.value("density"), ParamValue::Float(850.5));
        assert_eq!(p.extras().get("customFlag").map(String::as_str), Some("yes"));
    }

    #[test]
    fn bad_value_is_rejected_not_defaulted() {
        let mut raw = BTreeMap::new();
        raw.insert("viscosity".to_string(), "thick".to_string());
        assert!(resolve(JobKind::Flow, &raw).is_err());
    }

    #[test]
    fn out_of_range_is_rejected() {
        let mut raw = BTreeMap::new();
        raw.insert("D_TH1".to_string(), "300".to_string());
        assert!(resolve(JobKind::Diffusion, &raw).is_err());
    }
}
