use crate::classifier::intent::{
    Classification, Intent, PARAM_DOCUMENT_BODY, PARAM_DOCUMENT_TITLE, PARAM_LIMIT,
    PARAM_MIME_TYPE, PARAM_QUERY,
};
use crate::error::Result;
use crate::llm::{CompletionOptions, CompletionProvider};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Near-deterministic sampling, sized for one small JSON object
const CLASSIFIER_OPTIONS: CompletionOptions = CompletionOptions {
    temperature: Some(0.1),
    max_tokens: Some(200),
};

const SYSTEM_CONTEXT: &str =
    "You are a precise intent classifier. Reply with a single JSON object and nothing else.";

/// Maps free text to one intent of a closed set using a completion model
#[derive(Clone)]
pub struct IntentClassifier {
    completion: Arc<dyn CompletionProvider>,
}

impl IntentClassifier {
    pub fn new(completion: Arc<dyn CompletionProvider>) -> Self {
        Self { completion }
    }

    /// Classify `text`
    ///
    /// Completion failures are returned as errors. A reply that cannot be
    /// parsed, or that names an intent outside the closed set, yields
    /// `Intent::Unknown`.
    pub async fn classify(&self, text: &str) -> Result<Classification> {
        let prompt = build_prompt(text);
        let reply = self
            .completion
            .complete_with(&prompt, Some(SYSTEM_CONTEXT), CLASSIFIER_OPTIONS)
            .await?;
        debug!("Classifier reply: {}", reply);

        let classification = parse_reply(&reply);
        if classification.intent == Intent::Unknown {
            debug!("Request classified as UNKNOWN");
        }
        Ok(classification)
    }
}

fn build_prompt(text: &str) -> String {
    format!(
        r#"Classify the user's request into exactly one of these intents:

- SEARCH_DOCS: questions about the user's own documents or files. Parameters: "{query}" (what to search for).
- GENERAL_QA: general knowledge questions unrelated to the user's documents.
- CREATE_DOCUMENT: requests to create or write a new document. Parameters: "{title}" (required), "{body}" (optional).
- LIST_FILES: requests to list or browse the user's files. Parameters: "{limit}" (optional, a number), "{mime}" (optional, e.g. "application/pdf").
- UNKNOWN: anything that fits none of the above.

Respond with JSON in this exact shape:
{{"intent": "SEARCH_DOCS", "parameters": {{"{query}": "..."}}, "confidence": 0.9, "reasoning": "..."}}

User request: {text}"#,
        query = PARAM_QUERY,
        title = PARAM_DOCUMENT_TITLE,
        body = PARAM_DOCUMENT_BODY,
        limit = PARAM_LIMIT,
        mime = PARAM_MIME_TYPE,
        text = text,
    )
}

/// Remove a surrounding markdown code fence, with or without a language tag
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // The tag may sit on its own line or run straight into the JSON
    let inner = inner.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    inner.trim().trim_end_matches("```").trim()
}

fn parse_reply(reply: &str) -> Classification {
    let body = strip_code_fence(reply);
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            warn!("Classifier reply is not JSON: {}", e);
            return Classification::unknown(format!("unparseable reply: {}", e));
        }
    };

    let Some(label) = value.get("intent").and_then(Value::as_str) else {
        warn!("Classifier reply has no intent field");
        return Classification::unknown("reply has no intent");
    };
    let Some(intent) = Intent::parse(label) else {
        warn!("Classifier returned unrecognised intent {:?}", label);
        return Classification::unknown(format!("unrecognised intent {}", label));
    };

    let mut classification = Classification::new(intent);
    if let Some(params) = value.get("parameters").and_then(Value::as_object) {
        for (key, raw) in params {
            let value = match raw {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                _ => continue,
            };
            if !value.is_empty() {
                classification.parameters.insert(key.clone(), value);
            }
        }
    }
    classification.confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .map(|c| c as f32);
    classification.reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .map(str::to_string);

    classification
}
