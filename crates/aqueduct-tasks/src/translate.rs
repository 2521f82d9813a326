use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use aqueduct_core::{AqueductError, ChatClient, TaskArgs, TaskOp};

/// Translate user text between Spanish and English.
///
/// The source language is detected heuristically; the target defaults to the
/// opposite language and can be forced with the `lang` keyword argument.
pub struct TranslateOp {
    client: Arc<dyn ChatClient>,
}

impl TranslateOp {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TaskOp for TranslateOp {
    fn name(&self) -> &str {
        "translate"
    }

    async fn run(&self, args: TaskArgs) -> Result<Value, AqueductError> {
        let text = args.keyword_str("text").unwrap_or("").trim();
        if text.is_empty() {
            return Err(AqueductError::MissingParameter("text".into()));
        }

        let source_lang = detect_language(text);
        let mut target_lang = if source_lang == "es" { "en" } else { "es" };
        if let Some(lang) = args.keyword_str("lang") {
            if !lang.is_empty() {
                target_lang = if lang == "es" { "es" } else { "en" };
            }
        }

        tracing::debug!(op = "translate", source_lang, target_lang, "calling model");
        let instruction = if target_lang == "es" {
            "Traduce el siguiente texto del inglés al español, \
             manteniendo el tono y formato original."
        } else {
            "Translate the following text from Spanish to English, \
             maintaining the original tone and format."
        };
        let prompt = format!("{instruction}\n\n{text}");
        let translation = self.client.complete(&prompt).await?;

        Ok(json!({
            "translation": translation.trim(),
            "source_language": source_lang,
            "target_language": target_lang,
            "model_used": self.client.model(),
            "cached": false,
        }))
    }
}

/// Crude source-language detection: Spanish-specific characters win, a couple
/// of English-leaning letters fall back to English, default is English.
fn detect_language(text: &str) -> &'static str {
    let lowered = text.to_lowercase();
    let spanish = lowered
        .chars()
        .filter(|c| "áéíóúüñ¿¡".contains(*c))
        .count();
    if spanish > 0 {
        return "es";
    }
    let english = lowered.chars().filter(|c| "wk".contains(*c)).count();
    if english > 1 {
        return "en";
    }
    "en"
}
