//! Post-install script execution
//!
//! A package may ship a script under a reserved name. The installer runs it
//! right after extraction through a `ScriptRunner`, so tests can observe the
//! call without executing extracted code.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Script errors
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("failed to start {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} exited with {}", .path.display(), exit_label(.code))]
    Failed { path: PathBuf, code: Option<i32> },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// Runs an extracted post-install script
pub trait ScriptRunner {
    fn run(&self, script: &Path, working_dir: &Path) -> Result<(), ScriptError>;
}

impl<T: ScriptRunner + ?Sized> ScriptRunner for Arc<T> {
    fn run(&self, script: &Path, working_dir: &Path) -> Result<(), ScriptError> {
        (**self).run(script, working_dir)
    }
}

/// Runs the script with the platform shell (`sh` on Unix, `cmd /C` on Windows)
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandScriptRunner;

impl ScriptRunner for CommandScriptRunner {
    fn run(&self, script: &Path, working_dir: &Path) -> Result<(), ScriptError> {
        info!("Running post-install script {}", script.display());

        let mut command = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(script);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg(script);
            c
        };

        let status = command
            .current_dir(working_dir)
            .status()
            .map_err(|source| ScriptError::Spawn {
                path: script.to_path_buf(),
                source,
            })?;

        if !status.success() {
            return Err(ScriptError::Failed {
                path: script.to_path_buf(),
                code: status.code(),
            });
        }
        Ok(())
    }
}

/// One recorded script run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInvocation {
    pub script: PathBuf,
    pub working_dir: PathBuf,
    /// Script contents at the time of the call
    pub contents: Option<Vec<u8>>,
}

/// Records invocations instead of executing anything
#[derive(Debug, Default)]
pub struct RecordingScriptRunner {
    invocations: Mutex<Vec<ScriptInvocation>>,
    fail: bool,
}

impl RecordingScriptRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A runner whose every call reports a non-zero exit
    pub fn failing() -> Self {
        Self {
            invocations: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn invocations(&self) -> Vec<ScriptInvocation> {
        self.invocations
            .lock()
            .map(|runs| runs.clone())
            .unwrap_or_default()
    }
}

impl ScriptRunner for RecordingScriptRunner {
    fn run(&self, script: &Path, working_dir: &Path) -> Result<(), ScriptError> {
        if let Ok(mut runs) = self.invocations.lock() {
            runs.push(ScriptInvocation {
                script: script.to_path_buf(),
                working_dir: working_dir.to_path_buf(),
                contents: std::fs::read(script).ok(),
            });
        }

        if self.fail {
            return Err(ScriptError::Failed {
                path: script.to_path_buf(),
                code: Some(1),
            });
        }
        Ok(())
    }
}
