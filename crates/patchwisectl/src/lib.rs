//! Patchwisectl library - exposes modules for testing

pub mod cli;
pub mod commands;
pub mod logging;
pub mod output;

use patchwise_common::UpdateError;

/// Status code name for a failed command, or "Failed" when none applies
pub fn failure_label(err: &anyhow::Error) -> &'static str {
    err.downcast_ref::<UpdateError>()
        .map(UpdateError::status_label)
        .unwrap_or("Failed")
}
