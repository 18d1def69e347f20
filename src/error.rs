use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Programmer/user error, propagated. Everything transient below is
    /// logged and degraded to an empty result instead.
    #[error("unsupported prefecture: {0}")]
    UnsupportedPrefecture(String),

    #[error("browser session: {0}")]
    Session(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("page not ready after {timeout:?}: {url}")]
    LoadTimeout { url: String, timeout: Duration },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("progress style: {0}")]
    Progress(#[from] indicatif::style::TemplateError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
