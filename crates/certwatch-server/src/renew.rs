use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct RenewOutcome {
    pub success: bool,
    pub detail: String,
}

/// Triggers certificate reissue for one domain.
#[async_trait]
pub trait Renewer: Send + Sync {
    async fn renew(&self, domain: &str, acme_email: &str) -> Result<RenewOutcome>;
}

/// Runs a configured shell command, passing the target through environment
/// variables (CERTWATCH_DOMAIN, CERTWATCH_ACME_EMAIL). Issuance itself is
/// the command's job; this only reports whether it exited cleanly.
pub struct CommandRenewer {
    command: String,
}

impl CommandRenewer {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
        }
    }
}

fn tail(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= max {
        trimmed.to_string()
    } else {
        let mut start = trimmed.len() - max;
        while start < trimmed.len() && !trimmed.is_char_boundary(start) {
            start += 1;
        }
        format!("...{}", &trimmed[start..])
    }
}

#[async_trait]
impl Renewer for CommandRenewer {
    async fn renew(&self, domain: &str, acme_email: &str) -> Result<RenewOutcome> {
        if self.command.is_empty() {
            return Err(anyhow!("renew command is not configured"));
        }

        tracing::info!(domain, "running renewal command");
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env("CERTWATCH_DOMAIN", domain)
            .env("CERTWATCH_ACME_EMAIL", acme_email)
            .output()
            .await
            .map_err(|e| anyhow!("failed to spawn renewal command: {e}"))?;

        let success = output.status.success();
        let detail = if success {
            tail(&String::from_utf8_lossy(&output.stdout), 500)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let msg = if stderr.trim().is_empty() {
                String::from_utf8_lossy(&output.stdout).to_string()
            } else {
                stderr.to_string()
            };
            format!("exit {}: {}", output.status, tail(&msg, 500))
        };

        if success {
            tracing::info!(domain, "renewal command succeeded");
        } else {
            tracing::warn!(domain, detail = %detail, "renewal command failed");
        }
        Ok(RenewOutcome { success, detail })
    }
}
