//! SSH reachability probe using the system OpenSSH client

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::result::CommandSpec;
use crate::traits::CommandRunner;

/// Checks whether a host accepts key-based login
#[async_trait]
pub trait SshProbe: Send + Sync {
    /// Returns true only if a login with `key` as `user` succeeded.
    /// Every failure, including a missing `ssh` binary, is `false`.
    async fn probe(&self, host: &str, user: &str, key: &Path) -> bool;
}

/// Probe that shells out to `ssh` and runs `exit 0` on the remote side
///
/// Batch mode keeps the probe from ever prompting; multiplexing is disabled
/// so a stale control socket cannot answer on the host's behalf.
pub struct OpenSshProbe {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl std::fmt::Debug for OpenSshProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenSshProbe")
            .field("program", &self.program)
            .field("runner", &self.runner.runner_type())
            .finish()
    }
}

impl OpenSshProbe {
    /// Create a probe that runs `ssh` through `runner`
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: "ssh".to_string(),
        }
    }

    /// Use a different ssh binary
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Build the probe invocation for `user@host`
    #[must_use]
    pub fn command(&self, host: &str, user: &str, key: &Path) -> CommandSpec {
        CommandSpec::new(&self.program)
            .arg("-i")
            .arg(key.display().to_string())
            .args(["-o", "BatchMode yes"])
            .args(["-o", "StrictHostKeyChecking no"])
            .args(["-o", "IdentitiesOnly yes"])
            .args(["-o", "PreferredAuthentications publickey"])
            .args(["-o", "ControlMaster no"])
            .arg(format!("{user}@{host}"))
            .args(["exit", "0"])
    }
}

#[async_trait]
impl SshProbe for OpenSshProbe {
    #[instrument(skip(self, key), level = "debug")]
    async fn probe(&self, host: &str, user: &str, key: &Path) -> bool {
        let spec = self.command(host, user, key);

        match self.runner.run(&spec).await {
            Ok(result) if result.success() => {
                debug!(host, "ssh probe succeeded");
                true
            }
            Ok(result) => {
                debug!(host, status = result.status, "ssh probe rejected");
                false
            }
            Err(e) => {
                debug!(host, error = %e, "ssh probe could not run");
                false
            }
        }
    }
}

/// SSH key path and user, present only when both are configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshIdentity {
    /// Login user
    pub user: String,
    /// Private key file
    pub key: PathBuf,
}

impl SshIdentity {
    /// Pair a user with a key; `None` unless both are given
    #[must_use]
    pub fn from_parts(user: Option<String>, key: Option<PathBuf>) -> Option<Self> {
        match (user, key) {
            (Some(user), Some(key)) if !user.is_empty() => Some(Self { user, key }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    use super::*;
    use crate::error::ExecError;
    use crate::local::LocalRunner;
    use crate::result::CommandResult;

    /// Counts events at WARN or ERROR
    struct LoudEvents(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for LoudEvents {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() <= Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    struct ScriptedRunner {
        status: Result<i32, ExecError>,
        seen: Mutex<Vec<CommandSpec>>,
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, spec: &CommandSpec) -> Result<CommandResult, ExecError> {
            self.seen.lock().unwrap().push(spec.clone());
            self.status.clone().map(|status| CommandResult {
                status,
                stdout: String::new(),
                stderr: String::new(),
                duration: Duration::ZERO,
            })
        }

        fn locate(&self, _program: &str) -> bool {
            true
        }

        fn runner_type(&self) -> &'static str {
            "scripted"
        }
    }

    fn runner(status: Result<i32, ExecError>) -> Arc<ScriptedRunner> {
        Arc::new(ScriptedRunner {
            status,
            seen: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn test_probe_command_line() {
        let probe = OpenSshProbe::new(runner(Ok(0)));
        let spec = probe.command("10.0.0.5", "deploy", Path::new("/keys/id_ed25519"));

        assert_eq!(
            spec.display_line(),
            "ssh -i /keys/id_ed25519 -o BatchMode yes -o StrictHostKeyChecking no \
             -o IdentitiesOnly yes -o PreferredAuthentications publickey \
             -o ControlMaster no deploy@10.0.0.5 exit 0"
        );
    }

    #[tokio::test]
    async fn test_probe_success() {
        let scripted = runner(Ok(0));
        let probe = OpenSshProbe::new(scripted.clone());

        assert!(probe.probe("h", "u", Path::new("/k")).await);
        assert_eq!(scripted.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_probe_nonzero_exit() {
        let probe = OpenSshProbe::new(runner(Ok(255)));
        assert!(!probe.probe("h", "u", Path::new("/k")).await);
    }

    #[tokio::test]
    async fn test_probe_spawn_error() {
        let probe = OpenSshProbe::new(runner(Err(ExecError::ProgramNotFound("ssh".into()))));
        assert!(!probe.probe("h", "u", Path::new("/k")).await);
    }

    #[tokio::test]
    async fn test_rejected_login_logs_nothing_above_debug() {
        let loud = Arc::new(AtomicUsize::new(0));
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::registry().with(LoudEvents(loud.clone())),
        );

        // `false` exits 1 whatever the arguments, like an ssh login refusal
        let probe = OpenSshProbe::new(Arc::new(LocalRunner::new())).with_program("false");

        assert!(!probe.probe("10.0.0.5", "deploy", Path::new("/k")).await);
        assert_eq!(loud.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_identity_requires_both_parts() {
        assert!(SshIdentity::from_parts(Some("u".into()), None).is_none());
        assert!(SshIdentity::from_parts(None, Some("/k".into())).is_none());
        assert!(SshIdentity::from_parts(Some(String::new()), Some("/k".into())).is_none());
        assert_eq!(
            SshIdentity::from_parts(Some("u".into()), Some("/k".into())),
            Some(SshIdentity {
                user: "u".into(),
                key: "/k".into()
            })
        );
    }
}
