use std::{io, path::PathBuf};

use mpbase::param::ParametersBuilderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read scenario {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed JSON")]
    Json(#[from] serde_json::Error),
    #[error("Invalid scenario: {0}")]
    Scenario(String),
    #[error(transparent)]
    Config(#[from] mpbase::Error),
    #[error("Invalid parameters")]
    Parameters(#[from] ParametersBuilderError),
    #[error(transparent)]
    Registry(#[from] mpsched::registry::Error),
}
