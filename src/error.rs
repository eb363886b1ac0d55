use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiagramError {
    /// The host mounted the diagram without a container or drawable surface.
    #[error("cannot mount diagram: missing {target}")]
    MissingTarget { target: &'static str },

    #[error("query failed: {query}")]
    Query {
        query: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

pub type Result<T, E = DiagramError> = std::result::Result<T, E>;
