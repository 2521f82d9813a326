use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use aqueduct_core::{AqueductError, ChatClient, TaskArgs, TaskOp};

/// Summarize a piece of user text.
pub struct SummarizeOp {
    client: Arc<dyn ChatClient>,
}

impl SummarizeOp {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TaskOp for SummarizeOp {
    fn name(&self) -> &str {
        "summarize"
    }

    async fn run(&self, args: TaskArgs) -> Result<Value, AqueductError> {
        let text = args.keyword_str("text").unwrap_or("").trim();
        if text.is_empty() {
            return Err(AqueductError::MissingParameter("text".into()));
        }

        tracing::debug!(op = "summarize", text_length = text.len(), "calling model");
        let prompt = format!(
            "Summarize the following text in a short paragraph, \
             keeping the key points and the original tone:\n\n{text}"
        );
        let summary = self.client.complete(&prompt).await?;
        let summary = summary.trim().to_string();

        Ok(json!({
            "summary": summary,
            "original_length": text.chars().count(),
            "summary_length": summary.chars().count(),
            "model_used": self.client.model(),
            "cached": false,
        }))
    }
}
