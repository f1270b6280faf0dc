use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop a render. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No URL or file path given")]
    MissingSource,

    #[error("Invalid source `{0}`")]
    InvalidSource(String),

    #[error("Failed to read template {}", path.display())]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Failed to navigate to {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Failed to emulate media type: {0}")]
    Emulation(String),

    #[error("Failed to render PDF: {0}")]
    Render(String),

    #[error("Failed to close browser: {0}")]
    Close(String),

    #[error("Failed to write {}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
