use std::sync::Arc;

use serde_json::json;

use aqueduct_core::{AqueductError, TaskArgs, TaskOp};
use aqueduct_tasks::{ClassifyOp, ScriptedChatClient, SummarizeOp, TranslateOp};

#[tokio::test]
async fn summarize_shapes_result() {
    let client = ScriptedChatClient::new(vec!["A short summary."]);
    let op = SummarizeOp::new(Arc::new(client.clone()));

    let result = op
        .run(TaskArgs::new().kwarg("text", "A very long report about the quarterly results."))
        .await
        .unwrap();

    assert_eq!(result["summary"], json!("A short summary."));
    assert_eq!(result["summary_length"], json!(16));
    assert_eq!(result["model_used"], json!("scripted"));
    assert_eq!(result["cached"], json!(false));
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn summarize_rejects_missing_text() {
    let op = SummarizeOp::new(Arc::new(ScriptedChatClient::new(Vec::<String>::new())));
    let error = op.run(TaskArgs::new()).await.unwrap_err();
    assert!(matches!(error, AqueductError::MissingParameter(p) if p == "text"));
}

#[tokio::test]
async fn summarize_rejects_blank_text() {
    let client = ScriptedChatClient::new(vec!["unused"]);
    let op = SummarizeOp::new(Arc::new(client.clone()));
    let error = op
        .run(TaskArgs::new().kwarg("text", "   "))
        .await
        .unwrap_err();
    assert!(matches!(error, AqueductError::MissingParameter(_)));
    // Validation happens before any remote call.
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn translate_flips_detected_language() {
    let client = ScriptedChatClient::new(vec!["Good morning"]);
    let op = TranslateOp::new(Arc::new(client));

    let result = op
        .run(TaskArgs::new().kwarg("text", "¡Buenos días!"))
        .await
        .unwrap();

    assert_eq!(result["source_language"], json!("es"));
    assert_eq!(result["target_language"], json!("en"));
    assert_eq!(result["translation"], json!("Good morning"));
}

#[tokio::test]
async fn translate_honors_explicit_target() {
    let client = ScriptedChatClient::new(vec!["Buenos días"]);
    let op = TranslateOp::new(Arc::new(client));

    let result = op
        .run(
            TaskArgs::new()
                .kwarg("text", "Good morning")
                .kwarg("lang", "es"),
        )
        .await
        .unwrap();

    assert_eq!(result["target_language"], json!("es"));
}

#[tokio::test]
async fn classify_parses_model_reply() {
    let client = ScriptedChatClient::new(vec![
        "category: complaint\nurgency: high\ntheme: finance",
    ]);
    let op = ClassifyOp::new(Arc::new(client));

    let result = op
        .run(TaskArgs::new().kwarg("text", "the invoice is wrong again"))
        .await
        .unwrap();

    let classification = &result["classification"];
    assert_eq!(classification["category"], json!("complaint"));
    assert_eq!(classification["urgency"], json!("high"));
    assert_eq!(classification["theme"], json!("finance"));
    assert_eq!(result["cached"], json!(false));
}

#[tokio::test]
async fn remote_failures_propagate_unchanged() {
    let client = ScriptedChatClient::from_results(vec![Err(AqueductError::RateLimit(
        "too many requests".into(),
    ))]);
    let op = ClassifyOp::new(Arc::new(client));

    let error = op
        .run(TaskArgs::new().kwarg("text", "hello"))
        .await
        .unwrap_err();
    assert!(matches!(error, AqueductError::RateLimit(_)));
}
