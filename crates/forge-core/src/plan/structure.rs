//! Minimal-structure enforcement: every plan must cover a fixed set of
//! baseline project files.

use std::collections::{BTreeSet, HashSet};

use super::model::Task;
use super::parser::MalformedPlanError;

/// Baseline files every generated project must contain, in the order
/// synthesized tasks are appended.
pub const REQUIRED_FILES: [&str; 4] = ["main.py", "utils.py", "README.md", "requirements.txt"];

/// Append one task per required file that no existing task covers.
///
/// Synthesized ids continue from the current maximum id (or 0 for an empty
/// list), one per missing file in [`REQUIRED_FILES`] order. Existing tasks
/// are never modified. Returns the ids of the appended tasks, or an error
/// when the next id would not fit in an `i64`.
pub fn ensure_minimal_structure(tasks: &mut Vec<Task>) -> Result<Vec<i64>, MalformedPlanError> {
    let covered: HashSet<&str> = tasks
        .iter()
        .flat_map(|t| t.files.iter().map(String::as_str))
        .collect();

    let missing: Vec<&str> = REQUIRED_FILES
        .iter()
        .copied()
        .filter(|f| !covered.contains(f))
        .collect();

    if missing.is_empty() {
        return Ok(Vec::new());
    }

    let mut next_id = tasks.iter().map(|t| t.id).max().unwrap_or(0);
    let mut added = Vec::with_capacity(missing.len());

    for file in missing {
        next_id = next_id
            .checked_add(1)
            .ok_or_else(|| MalformedPlanError::InvalidField {
                field: "tasks[].id".into(),
                reason: format!("no id left after {next_id} for the {file} task"),
            })?;
        tracing::info!(task_id = next_id, file, "synthesizing task for missing baseline file");
        tasks.push(Task {
            id: next_id,
            name: format!("Auto-create {file}"),
            description: format!("System-generated file to ensure minimal structure: {file}"),
            files: vec![file.to_owned()],
            depends_on: BTreeSet::new(),
        });
        added.push(next_id);
    }

    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: i64, files: &[&str]) -> Task {
        Task {
            id,
            name: format!("t{id}"),
            description: "d".to_owned(),
            files: files.iter().map(|f| (*f).to_owned()).collect(),
            depends_on: BTreeSet::new(),
        }
    }

    #[test]
    fn complete_plan_is_untouched() {
        let mut tasks = vec![task(1, &REQUIRED_FILES)];
        let before = tasks.clone();
        assert!(ensure_minimal_structure(&mut tasks).unwrap().is_empty());
        assert_eq!(tasks, before);
    }

    #[test]
    fn missing_manifest_gets_its_own_task() {
        let mut tasks = vec![task(3, &["main.py", "utils.py", "README.md"])];
        let added = ensure_minimal_structure(&mut tasks).unwrap();

        assert_eq!(added, vec![4]);
        let synthesized = &tasks[1];
        assert_eq!(synthesized.files, vec!["requirements.txt"]);
        assert!(synthesized.depends_on.is_empty());
        assert!(synthesized.name.contains("requirements.txt"));
        assert!(synthesized.description.contains("requirements.txt"));
    }

    #[test]
    fn ids_continue_from_maximum_in_required_order() {
        let mut tasks = vec![task(5, &["app.py"]), task(2, &["utils.py"])];
        let added = ensure_minimal_structure(&mut tasks).unwrap();

        assert_eq!(added, vec![6, 7, 8]);
        let files: Vec<&str> = tasks[2..].iter().map(|t| t.files[0].as_str()).collect();
        assert_eq!(files, vec!["main.py", "README.md", "requirements.txt"]);
    }

    #[test]
    fn existing_tasks_keep_their_position_and_content() {
        let original = task(1, &["app.py"]);
        let mut tasks = vec![original.clone()];
        ensure_minimal_structure(&mut tasks).unwrap();
        assert_eq!(tasks[0], original);
        assert_eq!(tasks.len(), 1 + REQUIRED_FILES.len());
    }

    #[test]
    fn exhausted_id_space_is_an_error() {
        let mut tasks = vec![task(i64::MAX, &["main.py", "utils.py", "README.md"])];
        let err = ensure_minimal_structure(&mut tasks).unwrap_err();
        assert!(
            matches!(err, MalformedPlanError::InvalidField { ref field, .. } if field == "tasks[].id"),
            "got: {err}"
        );
    }

    #[test]
    fn last_free_id_is_still_usable() {
        let mut tasks = vec![task(i64::MAX - 1, &["main.py", "utils.py", "README.md"])];
        assert_eq!(ensure_minimal_structure(&mut tasks).unwrap(), vec![i64::MAX]);
    }
}
