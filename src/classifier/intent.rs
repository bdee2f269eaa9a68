use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Parameter carrying the search query for `SEARCH_DOCS`
pub const PARAM_QUERY: &str = "query";
/// Title of the document to create
pub const PARAM_DOCUMENT_TITLE: &str = "documentTitle";
/// Body of the document to create
pub const PARAM_DOCUMENT_BODY: &str = "documentBody";
/// Maximum number of files for `LIST_FILES`
pub const PARAM_LIMIT: &str = "limit";
/// Optional MIME type filter for `LIST_FILES`
pub const PARAM_MIME_TYPE: &str = "mimeType";

/// Closed set of purposes a request can be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    SearchDocs,
    GeneralQa,
    CreateDocument,
    ListFiles,
    Unknown,
}

impl Intent {
    pub const ALL: [Intent; 5] = [
        Intent::SearchDocs,
        Intent::GeneralQa,
        Intent::CreateDocument,
        Intent::ListFiles,
        Intent::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::SearchDocs => "SEARCH_DOCS",
            Intent::GeneralQa => "GENERAL_QA",
            Intent::CreateDocument => "CREATE_DOCUMENT",
            Intent::ListFiles => "LIST_FILES",
            Intent::Unknown => "UNKNOWN",
        }
    }

    /// Parse a label emitted by the model
    ///
    /// Case, dashes and spaces are normalised; the older
    /// `document_search` / `general_knowledge` labels are accepted as aliases.
    /// Anything else is `None`.
    pub fn parse(label: &str) -> Option<Intent> {
        let normalized = label.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "SEARCH_DOCS" | "DOCUMENT_SEARCH" => Some(Intent::SearchDocs),
            "GENERAL_QA" | "GENERAL_KNOWLEDGE" => Some(Intent::GeneralQa),
            "CREATE_DOCUMENT" => Some(Intent::CreateDocument),
            "LIST_FILES" => Some(Intent::ListFiles),
            "UNKNOWN" => Some(Intent::Unknown),
            _ => None,
        }
    }

    /// Intents that touch the document store rather than answering text
    pub fn is_action(&self) -> bool {
        matches!(self, Intent::CreateDocument | Intent::ListFiles)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated classifier output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    pub parameters: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Classification {
    pub fn new(intent: Intent) -> Self {
        Self {
            intent,
            parameters: BTreeMap::new(),
            confidence: None,
            reasoning: None,
        }
    }

    /// Unparseable or unrecognised model output
    pub fn unknown(reasoning: impl Into<String>) -> Self {
        Self {
            reasoning: Some(reasoning.into()),
            ..Self::new(Intent::Unknown)
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    /// Non-blank parameter value
    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}
