use std::path::Path;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::FileTransfer;
use crate::paths::RemoteFile;
use crate::subject::Subject;

/// Moves files with `scp`.
///
/// Runs in legacy protocol mode (`-O`) so the remote shell expands
/// environment-variable directories such as `$CCLSOURCE`.
#[derive(Debug, Clone)]
pub struct ScpTransfer {
    program: String,
    args: Vec<String>,
}

impl Default for ScpTransfer {
    fn default() -> Self {
        ScpTransfer {
            program: "scp".to_string(),
            args: vec!["-O".to_string(), "-q".to_string()],
        }
    }
}

impl ScpTransfer {
    pub fn with_program(program: impl Into<String>, args: Vec<String>) -> Self {
        ScpTransfer {
            program: program.into(),
            args,
        }
    }

    async fn run(&self, from: &str, to: &str) -> Result<()> {
        debug!(program = %self.program, from, to, "copying file");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(from)
            .arg(to)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.program))?;
        if !output.status.success() {
            bail!(
                "{} {} -> {} failed ({}): {}",
                self.program,
                from,
                to,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

#[async_trait]
impl FileTransfer for ScpTransfer {
    async fn upload(&self, subject: &Subject, local: &Path, remote: &RemoteFile) -> Result<()> {
        let to = format!("{}:{}", subject.destination(), remote.shell_path());
        self.run(&local.display().to_string(), &to).await
    }

    async fn download(&self, subject: &Subject, remote: &str, local: &Path) -> Result<()> {
        let from = format!("{}:{}", subject.destination(), remote);
        self.run(&from, &local.display().to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::RemoteDirectory;

    #[tokio::test]
    async fn test_failed_copy_reports_status() {
        let transfer = ScpTransfer::with_program("false", vec![]);
        let subject = Subject::new("node1", "d_build");
        let remote = RemoteFile::new(RemoteDirectory::Install, "data.csv");
        let err = transfer
            .upload(&subject, Path::new("data.csv"), &remote)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("d_build@node1:$cer_install/data.csv"));
    }

    #[tokio::test]
    async fn test_successful_copy() {
        let transfer = ScpTransfer::with_program("true", vec![]);
        let subject = Subject::new("node1", "d_build");
        transfer
            .download(&subject, "$cer_temp/x.lis", Path::new("x.lis"))
            .await
            .unwrap();
    }
}
