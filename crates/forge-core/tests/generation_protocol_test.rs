//! Tests for the generation protocol: retry budget, repair fallback and
//! payload decoding, driven through a scripted model.

use std::sync::Arc;

use forge_core::generate::{
    CODER_SYSTEM_PROMPT, GenerationEngine, GenerationFailedError, MAX_VALIDATION_ATTEMPTS,
    REPAIR_SYSTEM_PROMPT,
};
use forge_core::llm::Role;
use forge_test_utils::{ScriptedModel, payload, task, workspace};

// ===========================================================================
// Retry and repair
// ===========================================================================

#[tokio::test]
async fn two_bad_replies_then_valid_uses_three_calls_and_no_repair() {
    let model = Arc::new(ScriptedModel::new([
        "Sorry, here is some prose.".to_owned(),
        "{\"path\": \"main.py\", \"content_b64\": ".to_owned(),
        payload("main.py", "print('hi')\n"),
    ]));
    let (_tmp, store) = workspace();
    let engine = GenerationEngine::new(model.clone(), store.clone());

    let out = engine
        .generate_one(&task(1, &["main.py"], &[]), "main.py", "proj")
        .await
        .expect("third reply is valid");

    assert_eq!(model.call_count(), 3);
    assert_eq!(model.calls_with_prompt(REPAIR_SYSTEM_PROMPT), 0);
    assert_eq!(out.model_calls, 3);
    assert!(!out.repaired);
    assert_eq!(store.read("proj/main.py").unwrap(), "print('hi')\n");
}

#[tokio::test]
async fn never_valid_makes_exactly_one_repair_call_then_fails() {
    let model = Arc::new(ScriptedModel::always("```json\n{oops: not json}\n```"));
    let (_tmp, store) = workspace();
    let engine = GenerationEngine::new(model.clone(), store.clone());

    let err = engine
        .generate_one(&task(1, &["main.py"], &[]), "main.py", "proj")
        .await
        .expect_err("model never produces JSON");

    assert_eq!(
        model.calls_with_prompt(CODER_SYSTEM_PROMPT),
        MAX_VALIDATION_ATTEMPTS as usize
    );
    assert_eq!(model.calls_with_prompt(REPAIR_SYSTEM_PROMPT), 1);
    assert_eq!(model.call_count(), 4);
    match err {
        GenerationFailedError::InvalidJson {
            attempts, repaired, ..
        } => {
            assert_eq!(attempts, 3);
            assert!(repaired);
        }
        other => panic!("expected InvalidJson, got: {other}"),
    }
    assert!(!store.exists("proj/main.py").unwrap());
}

#[tokio::test]
async fn repair_receives_the_broken_candidate() {
    let model = Arc::new(ScriptedModel::new([
        "no braces at all".to_owned(),
        "prefix {\"path\": \"a.py\",} suffix".to_owned(),
        "still nothing".to_owned(),
        payload("a.py", "fixed"),
    ]));
    let (_tmp, store) = workspace();
    let engine = GenerationEngine::new(model.clone(), store.clone());

    let out = engine
        .generate_one(&task(1, &["a.py"], &[]), "a.py", "proj")
        .await
        .unwrap();
    assert!(out.repaired);

    let calls = model.calls();
    let repair = calls.last().unwrap();
    assert_eq!(repair.system_prompt, REPAIR_SYSTEM_PROMPT);
    assert_eq!(repair.messages.len(), 1);
    assert_eq!(repair.messages[0].role, Role::User);
    assert_eq!(repair.messages[0].content, "{\"path\": \"a.py\",}");
    assert_eq!(store.read("proj/a.py").unwrap(), "fixed");
}

#[tokio::test]
async fn repair_without_any_candidate_sends_last_raw_reply() {
    let model = Arc::new(ScriptedModel::always("  plain words only  "));
    let (_tmp, store) = workspace();
    let engine = GenerationEngine::new(model.clone(), store);

    let _ = engine
        .generate_one(&task(1, &["a.py"], &[]), "a.py", "proj")
        .await
        .unwrap_err();

    let calls = model.calls();
    let repair = calls.last().unwrap();
    assert_eq!(repair.system_prompt, REPAIR_SYSTEM_PROMPT);
    assert_eq!(repair.messages[0].content, "plain words only");
}

#[tokio::test]
async fn every_request_is_fresh_and_carries_task_context() {
    let model = Arc::new(ScriptedModel::new([
        "nope".to_owned(),
        payload("src/app.py", "x = 1"),
    ]));
    let (_tmp, store) = workspace();
    let engine = GenerationEngine::new(model.clone(), store);

    engine
        .generate_one(&task(4, &["src/app.py"], &[1]), "src/app.py", "proj")
        .await
        .unwrap();

    let calls = model.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].messages, calls[1].messages);

    let request: serde_json::Value = serde_json::from_str(&calls[0].messages[0].content).unwrap();
    assert_eq!(request["task_id"], 4);
    assert_eq!(request["task_name"], "Task 4");
    assert_eq!(request["file_path"], "src/app.py");
    assert_eq!(request["project_root"], "proj");
}

// ===========================================================================
// Decoding
// ===========================================================================

#[tokio::test]
async fn unpadded_base64_is_repaired() {
    let model = Arc::new(ScriptedModel::new([
        r#"{"path": "hello.txt", "content_b64": "aGVsbG8"}"#,
    ]));
    let (_tmp, store) = workspace();
    let engine = GenerationEngine::new(model, store.clone());

    engine
        .generate_one(&task(1, &["hello.txt"], &[]), "hello.txt", "proj")
        .await
        .unwrap();
    assert_eq!(store.read("proj/hello.txt").unwrap(), "hello");
}

#[tokio::test]
async fn wrapped_base64_in_fenced_reply_is_decoded() {
    let reply = "```json\n{\"path\": \"README.md\", \"content_b64\": \"IyBEZW1v\\nCg==\"}\n```";
    let model = Arc::new(ScriptedModel::new([reply]));
    let (_tmp, store) = workspace();
    let engine = GenerationEngine::new(model, store.clone());

    engine
        .generate_one(&task(1, &["README.md"], &[]), "README.md", "proj")
        .await
        .unwrap();
    assert_eq!(store.read("proj/README.md").unwrap(), "# Demo\n");
}

#[tokio::test]
async fn regeneration_overwrites_previous_content() {
    let model = Arc::new(ScriptedModel::new([
        payload("a.py", "first version, rather long"),
        payload("a.py", "second"),
    ]));
    let (_tmp, store) = workspace();
    let engine = GenerationEngine::new(model, store.clone());
    let t = task(1, &["a.py"], &[]);

    engine.generate_one(&t, "a.py", "proj").await.unwrap();
    engine.generate_one(&t, "a.py", "proj").await.unwrap();
    assert_eq!(store.read("proj/a.py").unwrap(), "second");
}

#[tokio::test]
async fn binary_targets_get_placeholders_without_model_calls() {
    let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));
    let (_tmp, store) = workspace();
    let engine = GenerationEngine::new(model.clone(), store.clone());

    for file in ["static/favicon.ico", "img/logo.PNG", "docs/manual.pdf"] {
        let out = engine
            .generate_one(&task(1, &[file], &[]), file, "proj")
            .await
            .unwrap();
        assert!(out.placeholder, "{file} should be a placeholder");
        assert_eq!(store.read(format!("proj/{file}")).unwrap(), "");
    }
    assert_eq!(model.call_count(), 0);
}
