//! Error taxonomy shared by the page and privileged contexts.
//! "No translation found" is never an error: lookups return `Ok(None)`.

use thiserror::Error;

/// Failures from a single translation provider or from request validation.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("API error: {0}")]
    Api(String),
    #[error("{provider} returned status {status}")]
    Status { provider: &'static str, status: u16 },
    #[error("malformed response from {provider}: {detail}")]
    MalformedResponse {
        provider: &'static str,
        detail: String,
    },
    #[error("translation timeout")]
    Timeout,
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<reqwest::Error> for TranslateError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TranslateError::Timeout
        } else {
            TranslateError::Api(e.to_string())
        }
    }
}

/// Failures of the page ↔ privileged messaging layer.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel closed before a reply arrived")]
    Closed,
    #[error("no reply within {0} ms")]
    Timeout(u64),
    #[error("privileged context unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected reply kind: {0}")]
    UnexpectedReply(&'static str),
}

/// Failures of the note-append collaborator.
#[derive(Debug, Error)]
pub enum AppendError {
    #[error("No selected text to save.")]
    NoSelection,
    #[error("{0}")]
    ConfigurationMissing(String),
    #[error("Obsidian API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("All endpoint attempts failed")]
    AllEndpointsFailed,
    #[error("Cannot connect to note service: {0}")]
    Transport(String),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Failures of the durable key-value store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Text-to-speech failures. Logged, never shown to the user.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech synthesis unsupported")]
    Unsupported,
    #[error("speech synthesis failed: {0}")]
    Failed(String),
}

/// Failures while assembling or running the headless binary.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("providers: {0}")]
    Providers(#[from] TranslateError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
