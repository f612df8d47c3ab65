//! Tests for the evaluation aggregator.

use std::sync::Arc;

use forge_core::config::EvalConfig;
use forge_core::evaluate::Evaluator;
use forge_core::exec::TIMEOUT_EXIT_CODE;
use forge_core::plan::EvaluationResult;
use forge_core::workspace::WorkspaceError;
use forge_test_utils::{ScriptedRunner, task, workspace};

#[tokio::test]
async fn missing_file_yields_one_failed_project_wide_result() {
    let (_tmp, store) = workspace();
    store.write("proj/a.py", "print('a')").unwrap();
    let runner = Arc::new(ScriptedRunner::passing());
    let evaluator = Evaluator::new(store.clone(), runner, EvalConfig::default());

    let results = evaluator
        .evaluate(&[task(1, &["a.py", "b.py"], &[])], "proj")
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.task_id, EvaluationResult::PROJECT_WIDE);
    assert!(!result.passed);
    assert_eq!(result.issues.len(), 1);

    let expected_b = store.root().join("proj").join("b.py");
    assert_eq!(
        result.issues[0],
        format!("Missing files: [{:?}]", expected_b.display().to_string())
    );
    assert!(!result.issues[0].contains("a.py"));
}

#[tokio::test]
async fn complete_project_with_passing_check_passes() {
    let (_tmp, store) = workspace();
    store.write("proj/a.py", "").unwrap();
    store.write("proj/pkg/b.py", "").unwrap();
    let runner = Arc::new(ScriptedRunner::passing());
    let evaluator = Evaluator::new(store.clone(), runner.clone(), EvalConfig::default());

    let results = evaluator
        .evaluate(
            &[task(1, &["a.py"], &[]), task(2, &["pkg/b.py", "a.py"], &[1])],
            "proj",
        )
        .await
        .unwrap();

    assert_eq!(results, vec![EvaluationResult::project_wide(vec![])]);

    let runs = runner.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].0, vec!["python", "-m", "compileall", "proj"]);
    assert_eq!(runs[0].1, store.root());
}

#[tokio::test]
async fn failing_check_adds_issue_with_exit_code_and_stderr() {
    let (_tmp, store) = workspace();
    store.write("proj/a.py", "def broken(:").unwrap();
    let runner = Arc::new(ScriptedRunner::with_output(1, "", "SyntaxError: invalid syntax\n"));
    let evaluator = Evaluator::new(store, runner, EvalConfig::default());

    let results = evaluator
        .evaluate(&[task(1, &["a.py"], &[])], "proj")
        .await
        .unwrap();

    let result = &results[0];
    assert!(!result.passed);
    assert_eq!(result.issues.len(), 1);
    assert!(result.issues[0].contains("exit code 1"), "{}", result.issues[0]);
    assert!(result.issues[0].contains("SyntaxError"), "{}", result.issues[0]);
}

#[tokio::test]
async fn timeout_and_missing_files_are_both_reported() {
    let (_tmp, store) = workspace();
    let runner = Arc::new(ScriptedRunner::with_output(
        TIMEOUT_EXIT_CODE,
        "",
        "Command timed out after 60s.",
    ));
    let evaluator = Evaluator::new(store, runner, EvalConfig::default());

    let results = evaluator
        .evaluate(&[task(1, &["main.py"], &[])], "proj")
        .await
        .unwrap();

    let issues = &results[0].issues;
    assert_eq!(issues.len(), 2);
    assert!(issues[0].starts_with("Missing files: "));
    assert!(issues[1].contains("124"));
    assert!(issues[1].contains("timed out"));
}

#[tokio::test]
async fn unstartable_check_is_an_issue_not_an_error() {
    let (_tmp, store) = workspace();
    store.write("proj/a.py", "").unwrap();
    let runner = Arc::new(ScriptedRunner::unstartable("No such file or directory"));
    let evaluator = Evaluator::new(store, runner, EvalConfig::default());

    let results = evaluator
        .evaluate(&[task(1, &["a.py"], &[])], "proj")
        .await
        .unwrap();

    assert!(!results[0].passed);
    assert!(results[0].issues[0].contains("could not be run"));
}

#[tokio::test]
async fn custom_check_command_substitutes_project_root() {
    let (_tmp, store) = workspace();
    store.write("app/a.py", "").unwrap();
    let runner = Arc::new(ScriptedRunner::passing());
    let config = EvalConfig {
        check_command: vec!["ruff".into(), "check".into(), "{project_root}/".into()],
        timeout_secs: 5,
    };
    let evaluator = Evaluator::new(store, runner.clone(), config);

    evaluator
        .evaluate(&[task(1, &["a.py"], &[])], "app")
        .await
        .unwrap();
    assert_eq!(runner.runs()[0].0, vec!["ruff", "check", "app/"]);
}

#[tokio::test]
async fn task_file_escaping_the_workspace_is_an_error() {
    let (_tmp, store) = workspace();
    let runner = Arc::new(ScriptedRunner::passing());
    let evaluator = Evaluator::new(store, runner, EvalConfig::default());

    let err = evaluator
        .evaluate(&[task(1, &["../../../etc/passwd"], &[])], "proj")
        .await
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::PathTraversal { .. }));
}
