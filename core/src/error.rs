use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported save version {found} (this build reads up to {supported})")]
    UnsupportedSaveVersion { found: u32, supported: u32 },

    #[error("Invalid save: {reason}")]
    InvalidSave { reason: String },

    #[error("Invalid {kind} blueprint: {field} = {value}")]
    InvalidBlueprint {
        kind:  String,
        field: &'static str,
        value: f64,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;
