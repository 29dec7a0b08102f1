use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotepadError {
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Step {step} not found in task {task}")]
    StepNotFound { task: String, step: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<confique::Error> for NotepadError {
    fn from(err: confique::Error) -> Self {
        NotepadError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NotepadError>;
