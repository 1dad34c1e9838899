//! Post-create SSH credential install.
//!
//! After the VM first reports ready, the driver logs in once with the
//! provider-issued password, generates a local key pair for the machine and
//! installs its public half as the remote `authorized_keys`.

use std::ffi::OsString;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::{Error, Result};

const PROBE: &str = "exit 0";
const INSTALL_KEY: &str = "mkdir -p ~/.ssh && cat > ~/.ssh/authorized_keys";
const RESTRICT_KEY: &str = "chmod 600 ~/.ssh/authorized_keys";

/// Where and as whom to install the credential.
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapTarget {
    pub hostname: String,
    pub port: u16,
    pub username: String,
    /// Provider-issued login password. `None` means key auth only.
    pub password: Option<String>,
    /// Local private key; the public key sits next to it with a `.pub` suffix.
    pub key_path: PathBuf,
}

impl fmt::Debug for BootstrapTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapTarget")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key_path", &self.key_path)
            .finish()
    }
}

/// One-shot credential installer run at the end of `create`.
#[async_trait]
pub trait Bootstrap: Send + Sync + 'static {
    async fn install_credential(&self, target: &BootstrapTarget) -> Result<()>;
}

/// [`Bootstrap`] that shells out to `ssh`, `ssh-keygen` and `sshpass`.
#[derive(Debug, Clone)]
pub struct SshKeyBootstrap {
    ssh: OsString,
    ssh_keygen: OsString,
    sshpass: OsString,
}

impl Default for SshKeyBootstrap {
    fn default() -> Self {
        Self {
            ssh: "ssh".into(),
            ssh_keygen: "ssh-keygen".into(),
            sshpass: "sshpass".into(),
        }
    }
}

impl SshKeyBootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use other binaries, e.g. absolute paths or test doubles.
    pub fn with_programs(
        ssh: impl Into<OsString>,
        ssh_keygen: impl Into<OsString>,
        sshpass: impl Into<OsString>,
    ) -> Self {
        Self {
            ssh: ssh.into(),
            ssh_keygen: ssh_keygen.into(),
            sshpass: sshpass.into(),
        }
    }

    /// Build the command that runs `remote` on the target.
    ///
    /// With a password the call goes through `sshpass -e`, which reads the
    /// password from `SSHPASS`. Without one, ssh runs in batch mode with the
    /// machine key.
    fn remote(&self, target: &BootstrapTarget, remote: &str) -> Command {
        let mut cmd = match &target.password {
            Some(password) => {
                let mut cmd = Command::new(&self.sshpass);
                cmd.arg("-e").arg(&self.ssh).env("SSHPASS", password);
                cmd
            }
            None => {
                let mut cmd = Command::new(&self.ssh);
                cmd.args(["-o", "BatchMode=yes", "-i"]).arg(&target.key_path);
                cmd
            }
        };
        cmd.args(ssh_args(target)).arg(remote);
        cmd
    }

    async fn ensure_key(&self, key_path: &Path) -> Result<()> {
        if tokio::fs::try_exists(key_path).await.unwrap_or(false) {
            debug!(key = %key_path.display(), "reusing existing ssh key");
            return Ok(());
        }

        if let Some(dir) = key_path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                Error::Bootstrap(format!("creating {}: {e}", dir.display()))
            })?;
        }

        debug!(key = %key_path.display(), "generating ssh key");
        let mut cmd = Command::new(&self.ssh_keygen);
        cmd.args(["-t", "rsa", "-b", "2048", "-N", "", "-q", "-f"])
            .arg(key_path);
        run_checked(cmd, "ssh-keygen", None).await?;
        Ok(())
    }
}

#[async_trait]
impl Bootstrap for SshKeyBootstrap {
    async fn install_credential(&self, target: &BootstrapTarget) -> Result<()> {
        info!(
            hostname = %target.hostname,
            user = %target.username,
            "installing ssh key on new vm"
        );

        run_checked(self.remote(target, PROBE), PROBE, None).await?;

        self.ensure_key(&target.key_path).await?;
        let public_path = public_key_path(&target.key_path);
        let public_key = tokio::fs::read(&public_path).await.map_err(|e| {
            Error::Bootstrap(format!("reading {}: {e}", public_path.display()))
        })?;

        run_checked(
            self.remote(target, INSTALL_KEY),
            INSTALL_KEY,
            Some(&public_key),
        )
        .await?;
        run_checked(self.remote(target, RESTRICT_KEY), RESTRICT_KEY, None).await?;

        info!(hostname = %target.hostname, "ssh key installed");
        Ok(())
    }
}

/// Connection options shared by every remote call.
fn ssh_args(target: &BootstrapTarget) -> Vec<String> {
    vec![
        "-o".into(),
        "StrictHostKeyChecking=no".into(),
        "-o".into(),
        "UserKnownHostsFile=/dev/null".into(),
        "-o".into(),
        "LogLevel=quiet".into(),
        "-o".into(),
        "ConnectTimeout=10".into(),
        "-p".into(),
        target.port.to_string(),
        format!("{}@{}", target.username, target.hostname),
    ]
}

fn public_key_path(key_path: &Path) -> PathBuf {
    let mut path = key_path.as_os_str().to_owned();
    path.push(".pub");
    PathBuf::from(path)
}

/// Run `cmd`, feeding `input` on stdin, and fail on non-zero exit.
async fn run_checked(mut cmd: Command, label: &str, input: Option<&[u8]>) -> Result<String> {
    cmd.stdin(if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| Error::Bootstrap(format!("command {label:?} could not start: {e}")))?;

    if let (Some(bytes), Some(mut stdin)) = (input, child.stdin.take()) {
        match stdin.write_all(bytes).await {
            Ok(()) => {}
            // The exit status decides the outcome when the peer hangs up early.
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
            Err(e) => {
                return Err(Error::Bootstrap(format!(
                    "command {label:?} stdin write failed: {e}"
                )));
            }
        }
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| Error::Bootstrap(format!("command {label:?} failed to finish: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Bootstrap(format!(
            "command {label:?} failed ({}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
