use ttp_core::ExprError;

/// Errors raised while decoding a candidate rule.
#[derive(Debug, thiserror::Error)]
pub enum FitError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{path}: {detail}")]
    Shape { path: String, detail: String },

    #[error("{path}: invalid value '{text}': {source}")]
    Value {
        path: String,
        text: String,
        #[source]
        source: ExprError,
    },

    #[error("{path}: '{text}' must be a constant")]
    NotConstant { path: String, text: String },
}

pub type Result<T> = std::result::Result<T, FitError>;

impl FitError {
    pub(crate) fn shape(path: &str, detail: impl Into<String>) -> Self {
        FitError::Shape {
            path: path.to_string(),
            detail: detail.into(),
        }
    }
}
