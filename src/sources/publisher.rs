use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::sources::Publisher;

/// Publishes by running an external program with the message as its last argument.
/// Exit status 0 is success; anything else is a failed publish.
pub struct CommandPublisher {
    program: String,
    args: Vec<String>,
}

impl CommandPublisher {
    /// `command` is the program followed by any fixed leading arguments.
    pub fn new(command: Vec<String>) -> Result<Self> {
        let mut parts = command.into_iter();
        let program = parts
            .next()
            .ok_or_else(|| AppError::Config("PUBLISH_COMMAND is empty".to_string()))?;
        Ok(Self { program, args: parts.collect() })
    }
}

#[async_trait]
impl Publisher for CommandPublisher {
    async fn publish(&self, text: &str) -> Result<()> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .kill_on_drop(true)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(program = %self.program, "publisher stdout: {}", stdout.trim());
        }

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(AppError::collaborator(
                "publisher",
                format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            ))
        }
    }
}

/// Fallback when no publish command is configured: the message only goes to the log.
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, text: &str) -> Result<()> {
        info!(event = "PUBLISH_SKIPPED", "No publisher configured, message: {text}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandPublisher::new(Vec::new()).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_status_decides_success() {
        let ok = CommandPublisher::new(vec!["true".to_string()]).unwrap();
        assert!(ok.publish("hello").await.is_ok());

        let failing = CommandPublisher::new(vec!["false".to_string()]).unwrap();
        assert!(failing.publish("hello").await.is_err());
    }
}
