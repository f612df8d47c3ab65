//! Planner output normalizer.
//!
//! Turns the planner's free-form reply into a validated [`Plan`]:
//! - Markdown code fences around the JSON are stripped.
//! - Required keys (`architecture`, `architecture.project_root`, `tasks`)
//!   must be present.
//! - Empty `language`/`framework` get fixed defaults.
//! - Paths carrying the `project_root/` prefix are made relative.
//! - Task ids and `depends_on` entries are coerced to integers.
//! - Missing baseline files get synthesized tasks.
//! - The dependency graph is checked (unique ids, known targets, acyclic).

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use thiserror::Error;

use super::model::{Architecture, DEFAULT_FRAMEWORK, DEFAULT_LANGUAGE, Plan, Task};
use super::schedule::validate_plan;
use super::structure::ensure_minimal_structure;

/// Errors that can occur while turning planner output into a [`Plan`].
///
/// All variants are terminal: planning is never retried.
#[derive(Debug, Error)]
pub enum MalformedPlanError {
    #[error("planner output is not valid JSON: {source}\nraw output:\n{raw}\ncleaned output:\n{cleaned}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
        raw: String,
        cleaned: String,
    },

    #[error("plan is missing required key {0:?}")]
    MissingKey(String),

    #[error("invalid {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("duplicate task id: {0}")]
    DuplicateTaskId(i64),

    #[error("task {0} depends on itself")]
    SelfDependency(i64),

    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: i64, dependency: i64 },

    #[error("dependency cycle detected involving tasks: {0}")]
    CycleDetected(String),

    #[error("plan must contain at least one task")]
    NoTasks,
}

impl MalformedPlanError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Normalize raw planner output into a validated [`Plan`].
pub fn normalize(raw: &str) -> Result<Plan, MalformedPlanError> {
    let cleaned = strip_code_fences(raw);

    let data: Value =
        serde_json::from_str(&cleaned).map_err(|source| MalformedPlanError::InvalidJson {
            source,
            raw: raw.to_owned(),
            cleaned: cleaned.clone(),
        })?;

    let root = data
        .as_object()
        .ok_or_else(|| MalformedPlanError::invalid("plan", "expected a JSON object"))?;

    let raw_arch = root
        .get("architecture")
        .ok_or_else(|| MalformedPlanError::MissingKey("architecture".into()))?
        .as_object()
        .ok_or_else(|| MalformedPlanError::invalid("architecture", "expected an object"))?;

    let architecture = build_architecture(raw_arch)?;

    let raw_tasks = root
        .get("tasks")
        .ok_or_else(|| MalformedPlanError::MissingKey("tasks".into()))?
        .as_array()
        .ok_or_else(|| MalformedPlanError::invalid("tasks", "expected an array"))?;

    let mut tasks = raw_tasks
        .iter()
        .enumerate()
        .map(|(i, t)| build_task(i, t, &architecture.project_root))
        .collect::<Result<Vec<_>, _>>()?;

    ensure_minimal_structure(&mut tasks)?;

    let plan = Plan {
        architecture,
        tasks,
    };
    validate_plan(&plan)?;
    Ok(plan)
}

/// Load a plan previously saved as JSON (already normalized) and re-check
/// its dependency graph.
pub fn load_plan_json(content: &str) -> Result<Plan, MalformedPlanError> {
    let plan: Plan =
        serde_json::from_str(content).map_err(|source| MalformedPlanError::InvalidJson {
            source,
            raw: content.to_owned(),
            cleaned: content.to_owned(),
        })?;
    check_project_root(&plan.architecture.project_root)?;
    validate_plan(&plan)?;
    Ok(plan)
}

/// Remove a leading code fence (with optional language tag) and a trailing
/// code fence, then trim.
pub fn strip_code_fences(text: &str) -> String {
    let mut clean = text.trim();

    if let Some(rest) = clean.strip_prefix("```") {
        clean = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    }
    if let Some(rest) = clean.trim_end().strip_suffix("```") {
        clean = rest;
    }

    clean.trim().to_owned()
}

/// Strip a leading `project_root/` prefix from `path`, if present.
///
/// Idempotent: an already-relative path is returned unchanged.
pub fn normalize_path(project_root: &str, path: &str) -> String {
    path.strip_prefix(project_root)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(path)
        .to_owned()
}

fn build_architecture(raw: &Map<String, Value>) -> Result<Architecture, MalformedPlanError> {
    let project_root = match raw.get("project_root") {
        None | Some(Value::Null) => {
            return Err(MalformedPlanError::MissingKey(
                "architecture.project_root".into(),
            ));
        }
        Some(Value::String(s)) => s.trim().trim_end_matches('/').to_owned(),
        Some(_) => {
            return Err(MalformedPlanError::invalid(
                "architecture.project_root",
                "expected a string",
            ));
        }
    };
    check_project_root(&project_root)?;

    let language = non_empty_string(raw.get("language")).unwrap_or(DEFAULT_LANGUAGE);
    let framework = non_empty_string(raw.get("framework")).unwrap_or(DEFAULT_FRAMEWORK);

    let modules = string_list(raw.get("modules"), "architecture.modules")?
        .into_iter()
        .map(|m| normalize_path(&project_root, &m))
        .collect();

    let extra = raw
        .iter()
        .filter(|(k, _)| {
            !matches!(
                k.as_str(),
                "language" | "framework" | "project_root" | "modules"
            )
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(Architecture {
        language: language.to_owned(),
        framework: framework.to_owned(),
        project_root,
        modules,
        extra,
    })
}

fn check_project_root(project_root: &str) -> Result<(), MalformedPlanError> {
    let field = "architecture.project_root";
    if project_root.is_empty() {
        return Err(MalformedPlanError::invalid(field, "must not be empty"));
    }
    if project_root == "." || project_root == ".." {
        return Err(MalformedPlanError::invalid(
            field,
            format!("{project_root:?} is not a directory name"),
        ));
    }
    if project_root.contains(['/', '\\']) {
        return Err(MalformedPlanError::invalid(
            field,
            format!("{project_root:?} must be a single path segment"),
        ));
    }
    Ok(())
}

fn build_task(index: usize, raw: &Value, project_root: &str) -> Result<Task, MalformedPlanError> {
    let field = |name: &str| format!("tasks[{index}].{name}");

    let obj = raw
        .as_object()
        .ok_or_else(|| MalformedPlanError::invalid(format!("tasks[{index}]"), "expected an object"))?;

    let id = obj
        .get("id")
        .ok_or_else(|| MalformedPlanError::MissingKey(field("id")))
        .and_then(|v| coerce_id(v, &field("id")))?;

    let name = required_string(obj, "name", &field("name"))?;
    let description = required_string(obj, "description", &field("description"))?;

    let files = string_list(obj.get("files"), &field("files"))?
        .into_iter()
        .map(|f| normalize_path(project_root, &f))
        .collect();

    let depends_on = match obj.get("depends_on") {
        None | Some(Value::Null) => BTreeSet::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| coerce_id(v, &field("depends_on")))
            .collect::<Result<BTreeSet<_>, _>>()?,
        Some(_) => {
            return Err(MalformedPlanError::invalid(
                field("depends_on"),
                "expected an array",
            ));
        }
    };

    Ok(Task {
        id,
        name,
        description,
        files,
        depends_on,
    })
}

/// Lower and upper (exclusive) bounds of `i64` as `f64`.
const I64_MIN_F64: f64 = -9_223_372_036_854_775_808.0;
const I64_END_F64: f64 = 9_223_372_036_854_775_808.0;

/// Accept integers, integral floats within `i64` range, and numeric strings.
fn coerce_id(value: &Value, field: &str) -> Result<i64, MalformedPlanError> {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && (I64_MIN_F64..I64_END_F64).contains(f))
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        MalformedPlanError::invalid(field, format!("{value} is not an integer task id"))
    })
}

fn required_string(
    obj: &Map<String, Value>,
    key: &str,
    field: &str,
) -> Result<String, MalformedPlanError> {
    match obj.get(key) {
        None | Some(Value::Null) => Err(MalformedPlanError::MissingKey(field.to_owned())),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
    }
}

fn non_empty_string(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn string_list(value: Option<&Value>, field: &str) -> Result<Vec<String>, MalformedPlanError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_owned).ok_or_else(|| {
                    MalformedPlanError::invalid(field, format!("{item} is not a path string"))
                })
            })
            .collect(),
        Some(_) => Err(MalformedPlanError::invalid(field, "expected an array of strings")),
    }
}
