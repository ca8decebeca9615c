//! External MPC engine invocation

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use oblivq_core::{EngineConfig, EngineInputRecord};

use crate::error::{ClientError, Result};

/// Runs the engine's party binary for this client
#[derive(Debug, Clone)]
pub struct EngineInvoker {
    config: EngineConfig,
}

impl EngineInvoker {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// File the engine reads this party's inputs from
    pub fn input_file(&self) -> PathBuf {
        self.config.input_file()
    }

    /// Replace the engine's input file with `record`
    pub fn write_input(&self, record: &EngineInputRecord) -> Result<PathBuf> {
        let path = self.input_file();
        record.write_to(&path)?;
        Ok(path)
    }

    /// Run `script` to completion.
    ///
    /// The child runs inside the installation directory; this process's own
    /// working directory is never changed. Output is captured and logged.
    /// A non-zero exit is an `Engine` error.
    pub async fn run(&self, script: &str) -> Result<()> {
        let binary = absolute(&self.config.binary_path())?;
        let input = absolute(&self.config.input_path)?;

        tracing::info!(script, binary = %binary.display(), "Running engine");

        let output = Command::new(&binary)
            .arg(script)
            .arg("-p")
            .arg(self.config.party.to_string())
            .arg("-IF")
            .arg(&input)
            .current_dir(&self.config.install_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!(script, stdout = %stdout, stderr = %stderr, "Engine output");

        if !output.status.success() {
            return Err(ClientError::Engine {
                script: script.to_string(),
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        tracing::info!(script, "Engine finished");
        Ok(())
    }
}

/// Resolve against the current directory, since the child runs elsewhere
fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
