// ── Shell command mapping ──
//
// Privileged tiers that speak shell (broker, root) share one mapping from
// actions to commands. Actions with no shell equivalent map to `None`.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::device::{DeviceError, ShellOutput};
use crate::model::{Action, ActionType, DndChoice};

const KEYCODE_SLEEP: u32 = 223;

/// Shell command that performs `action`, if there is one.
pub fn command_for(action: &Action) -> Option<String> {
    match action {
        Action::Toggle(t) => {
            let verb = if t.enabled() { "enable" } else { "disable" };
            match t.action_type() {
                ActionType::Wifi => Some(format!("svc wifi {verb}")),
                ActionType::Bluetooth => Some(format!("svc bluetooth {verb}")),
                ActionType::MobileData => Some(format!("svc data {verb}")),
                ActionType::Nfc => Some(format!("svc nfc {verb}")),
                ActionType::Location => Some(format!(
                    "settings put secure location_mode {}",
                    if t.enabled() { 3 } else { 0 }
                )),
                ActionType::DoNotDisturb => {
                    let choice = if t.enabled() { DndChoice::Priority } else { DndChoice::Off };
                    Some(format!("cmd notification set_dnd {}", choice.shell_arg()))
                }
                _ => None,
            }
        }
        Action::MultiChoice(m) => match m.action_type() {
            ActionType::DoNotDisturb => Some(format!(
                "cmd notification set_dnd {}",
                DndChoice::from_choice(m.choice()).shell_arg()
            )),
            ActionType::Location => Some(format!("settings put secure location_mode {}", m.choice())),
            _ => None,
        },
        Action::Normal(n) if n.action_type() == ActionType::LockScreen => {
            Some(format!("input keyevent {KEYCODE_SLEEP}"))
        }
        Action::Normal(_) | Action::Value(_) | Action::Volume(_) | Action::Timed(_) => None,
    }
}

/// Runs commands in a superuser shell.
#[async_trait]
pub trait ShellRunner: Send + Sync {
    async fn has_root(&self) -> bool;
    async fn run_as_root(&self, command: &str) -> Result<ShellOutput, DeviceError>;
}

/// `su -c` through a real process.
pub struct SuShell {
    su_path: PathBuf,
    timeout: Duration,
}

impl SuShell {
    pub fn new(su_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            su_path: su_path.into(),
            timeout,
        }
    }
}

impl Default for SuShell {
    fn default() -> Self {
        Self::new("su", Duration::from_secs(5))
    }
}

#[async_trait]
impl ShellRunner for SuShell {
    async fn has_root(&self) -> bool {
        match self.run_as_root("id -u").await {
            Ok(out) => out.is_success() && out.stdout.trim() == "0",
            Err(e) => {
                debug!(error = %e, "root shell unavailable");
                false
            }
        }
    }

    async fn run_as_root(&self, command: &str) -> Result<ShellOutput, DeviceError> {
        let child = Command::new(&self.su_path)
            .arg("-c")
            .arg(command)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| DeviceError::Failed(format!("`{command}` timed out")))?
            .map_err(|e| DeviceError::Unsupported(format!("cannot spawn su: {e}")))?;

        Ok(ShellOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
