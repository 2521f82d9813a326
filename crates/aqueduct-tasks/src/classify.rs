use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use aqueduct_core::{AqueductError, ChatClient, TaskArgs, TaskOp};

/// Classify user text by category, urgency, and theme.
pub struct ClassifyOp {
    client: Arc<dyn ChatClient>,
}

impl ClassifyOp {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TaskOp for ClassifyOp {
    fn name(&self) -> &str {
        "classify"
    }

    async fn run(&self, args: TaskArgs) -> Result<Value, AqueductError> {
        let text = args.keyword_str("text").unwrap_or("").trim();
        if text.is_empty() {
            return Err(AqueductError::MissingParameter("text".into()));
        }

        tracing::debug!(op = "classify", text_length = text.len(), "calling model");
        let prompt = format!(
            "Classify the following text by:\n\
             - category: question/request/report/complaint/urgent/other\n\
             - urgency: high/medium/low\n\
             - theme: human resources/finance/IT/marketing/sales/legal/other\n\n\
             Reply using exactly this format:\n\
             category: [category]\n\
             urgency: [urgency]\n\
             theme: [theme]\n\n\
             Text:\n{text}"
        );
        let reply = self.client.complete(&prompt).await?;
        let classification = parse_classification(&reply);

        Ok(json!({
            "classification": classification,
            "text_length": text.chars().count(),
            "model_used": self.client.model(),
            "cached": false,
        }))
    }
}

/// Parse the model's line-oriented classification reply.
///
/// Tolerant by design: absent labels are simply omitted, urgency is
/// normalized to high/medium/low, and the confidence is a fixed heuristic
/// value since the model does not report one.
fn parse_classification(reply: &str) -> Value {
    let lowered = reply.to_lowercase();
    let mut result = Map::new();

    if let Some(category) = labeled_value(&lowered, "category:") {
        result.insert("category".into(), Value::String(category));
    }
    if let Some(urgency) = labeled_value(&lowered, "urgency:") {
        let normalized = if urgency.contains("high") {
            "high"
        } else if urgency.contains("medium") {
            "medium"
        } else {
            "low"
        };
        result.insert("urgency".into(), Value::String(normalized.into()));
    }
    if let Some(theme) = labeled_value(&lowered, "theme:") {
        result.insert("theme".into(), Value::String(theme));
    }

    result.insert("confidence".into(), json!(0.9));
    Value::Object(result)
}

fn labeled_value(lowered: &str, label: &str) -> Option<String> {
    let rest = lowered.split(label).nth(1)?;
    let value = rest.split('\n').next().unwrap_or("").trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
