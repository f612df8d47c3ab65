//! Plan management: data model, planner-output normalization, baseline
//! structure enforcement, dependency scheduling.

pub mod model;
pub mod parser;
pub mod schedule;
pub mod structure;

pub use model::{Architecture, EvaluationResult, Plan, Task, expected_files};
pub use parser::{MalformedPlanError, load_plan_json, normalize, normalize_path, strip_code_fences};
pub use schedule::{generation_order, validate_plan};
pub use structure::{REQUIRED_FILES, ensure_minimal_structure};
