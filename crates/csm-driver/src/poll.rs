use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::config::PollProfile;
use crate::machine::Machine;
use crate::types::{EnvironmentId, VM_REBOOTING, VM_RUNNING, VmRecord};
use crate::{Error, Result};

/// What the last poll iteration saw.
enum Observation {
    Status { status: String, vm_status: String },
    Failed(Error),
}

impl Machine {
    /// Poll until the environment is usable or `profile.timeout` elapses.
    ///
    /// Fetch errors count as "not ready yet". When the budget runs out the
    /// last fetch error is returned if the final poll failed, otherwise
    /// [`Error::NotReady`] with the last observed status.
    pub async fn wait_until_ready(&mut self, profile: PollProfile) -> Result<VmRecord> {
        let env_id = self.environment_id()?;
        let started = Instant::now();
        let mut last = None;
        let mut polls = 0u32;

        while started.elapsed() < profile.timeout {
            self.pause(profile.interval, &env_id).await?;
            polls += 1;

            match self.client.get_environment_extended(&env_id).await {
                Ok(snapshot) => {
                    if let Some(vm) = snapshot.ready_vm() {
                        let vm = vm.clone();
                        self.remember_vm(&vm);
                        info!(
                            environment_id = %env_id,
                            vm_id = %vm.id,
                            hostname = %vm.hostname,
                            polls,
                            "environment ready"
                        );
                        return Ok(vm);
                    }
                    debug!(
                        environment_id = %env_id,
                        status = ?snapshot.status,
                        vm_status = snapshot.vm_status(),
                        "still waiting for environment"
                    );
                    last = Some(Observation::Status {
                        status: format!("{:?}", snapshot.status),
                        vm_status: snapshot.vm_status().to_string(),
                    });
                }
                Err(e) => {
                    warn!(environment_id = %env_id, error = %e, "status fetch failed, retrying");
                    last = Some(Observation::Failed(e));
                }
            }
        }

        match last {
            Some(Observation::Failed(e)) => Err(e),
            Some(Observation::Status { status, vm_status }) => Err(Error::NotReady {
                environment_id: env_id,
                waited: profile.timeout,
                status,
                vm_status,
            }),
            None => Err(Error::NotReady {
                environment_id: env_id,
                waited: profile.timeout,
                status: "<never polled>".into(),
                vm_status: "<never polled>".into(),
            }),
        }
    }

    /// Poll after a reboot until the VM reports `Running` again.
    ///
    /// `Rebooting` keeps the loop going; any other status text fails at once.
    /// Fetch errors are not retried here.
    pub(crate) async fn wait_for_reboot(&mut self, profile: PollProfile) -> Result<VmRecord> {
        let env_id = self.environment_id()?;
        let started = Instant::now();
        let mut last_status = String::from("<never polled>");
        let mut last_vm_status = String::from("<never polled>");

        while started.elapsed() < profile.timeout {
            self.pause(profile.interval, &env_id).await?;

            let snapshot = self.client.get_environment_extended(&env_id).await?;
            let vm = snapshot
                .vms
                .first()
                .cloned()
                .ok_or_else(|| Error::NoVms(env_id.clone()))?;
            debug!(vm_id = %vm.id, status = %vm.status_text, "vm status");

            if vm.status_text == VM_RUNNING {
                return Ok(vm);
            }
            if vm.status_text != VM_REBOOTING {
                return Err(Error::UnexpectedVmStatus {
                    vm_id: vm.id,
                    status: vm.status_text,
                });
            }
            last_status = format!("{:?}", snapshot.status);
            last_vm_status = vm.status_text;
        }

        Err(Error::NotReady {
            environment_id: env_id,
            waited: profile.timeout,
            status: last_status,
            vm_status: last_vm_status,
        })
    }

    /// Sleep for `interval` unless the machine's cancellation token fires first.
    async fn pause(&self, interval: Duration, env_id: &EnvironmentId) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                info!(environment_id = %env_id, "wait cancelled");
                Err(Error::Cancelled { environment_id: env_id.clone() })
            }
            _ = sleep(interval) => Ok(()),
        }
    }
}
