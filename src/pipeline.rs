//! Managed pipeline names
//!
//! Pipelines created by this tooling are named `<app> [<region>]`. Anything
//! else was made by hand and must be left alone. One-time pipelines carry
//! `onetime` in the bracketed word and are always reported so they can be
//! cleaned up.

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("\"{0}\" is not managed")]
    NotManaged(String),
}

/// Check that `name` is a pipeline this tooling manages for `app_name`.
///
/// Returns the region from the bracketed suffix.
pub fn check_managed_pipeline(name: &str, app_name: &str) -> Result<String, PipelineError> {
    let not_managed = || PipelineError::NotManaged(name.to_string());

    let words: Vec<&str> = name.split_whitespace().collect();
    let (last, prefix) = words.split_last().ok_or_else(not_managed)?;

    let region = last.trim_matches(|c| c == '[' || c == ']');
    if region.contains("onetime") {
        debug!(pipeline = %name, "One-time pipeline");
        return Ok(region.to_string());
    }

    if !(last.starts_with('[') && last.ends_with(']')) {
        debug!(pipeline = %name, "Missing bracketed region");
        return Err(not_managed());
    }

    match prefix {
        [app] if *app == app_name => Ok(region.to_string()),
        _ => {
            debug!(pipeline = %name, app = %app_name, "Name does not match application");
            Err(not_managed())
        }
    }
}
