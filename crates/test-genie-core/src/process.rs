//! Process control for spawned agents
//!
//! The registry only sees the [`ProcessHandle`] trait; the tokio-backed
//! implementation lives here next to the helpers that build agent commands.

use std::fmt;

use anyhow::Result;
use tokio::process::Command;

/// Opaque handle the registry uses to terminate a running agent
pub trait ProcessHandle: Send + Sync + fmt::Debug {
    fn pid(&self) -> Option<u32>;

    /// Terminate the process and any children it spawned
    fn kill(&self) -> Result<()>;
}

/// Handle to an OS process started as its own process-group leader
#[derive(Debug, Clone)]
pub struct ProcessGroupHandle {
    pid: Option<u32>,
}

impl ProcessGroupHandle {
    pub fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }
}

impl ProcessHandle for ProcessGroupHandle {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn kill(&self) -> Result<()> {
        match self.pid {
            Some(pid) => kill_process_tree(pid),
            None => Ok(()),
        }
    }
}

/// Send SIGTERM to the whole process group, falling back to the single pid
pub fn kill_process_tree(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        let status = std::process::Command::new("kill")
            .arg("-TERM")
            .arg("--")
            .arg(format!("-{}", pid))
            .output();

        let group_killed = matches!(&status, Ok(out) if out.status.success());
        if !group_killed {
            let fallback = std::process::Command::new("kill")
                .arg("-TERM")
                .arg(pid.to_string())
                .output()?;
            if !fallback.status.success() {
                anyhow::bail!("kill {} failed: {}", pid, String::from_utf8_lossy(&fallback.stderr).trim());
            }
        }
    }
    #[cfg(windows)]
    {
        std::process::Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T", "/F"])
            .output()?;
    }

    tracing::info!(pid = pid, "Process tree terminated");
    Ok(())
}

/// Put the command in a fresh process group so kill reaches its children
pub fn isolate_process_group(cmd: &mut Command) {
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }
    #[cfg(not(unix))]
    {
        let _ = cmd;
    }
    cmd.kill_on_drop(true);
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn kills_whole_process_group() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("sleep 30");
        isolate_process_group(&mut cmd);
        let mut child = cmd.spawn().expect("spawn sleep");

        let handle = ProcessGroupHandle::new(child.id());
        handle.kill().expect("kill group");

        let status = tokio::time::timeout(std::time::Duration::from_secs(5), child.wait())
            .await
            .expect("child exits after kill")
            .expect("wait");
        assert!(!status.success());
    }

    #[test]
    fn handle_without_pid_is_noop() {
        assert!(ProcessGroupHandle::new(None).kill().is_ok());
    }
}
