pub mod classify;
pub mod intent;

pub use classify::IntentClassifier;
pub use intent::{
    Classification, Intent, PARAM_DOCUMENT_BODY, PARAM_DOCUMENT_TITLE, PARAM_LIMIT,
    PARAM_MIME_TYPE, PARAM_QUERY,
};
