use std::time::Duration;

use cloudshare_api::EnvironmentStatus;
use tracing::info;

use crate::machine::Machine;
use crate::state::{MachineState, translate};
use crate::types::VmId;
use crate::{Error, Result};

impl Machine {
    /// Resume a suspended environment. Does not wait.
    pub async fn start(&mut self) -> Result<()> {
        let env_id = self.environment_id()?;
        info!(machine = %self.name(), environment_id = %env_id, "resuming environment");
        self.client.resume(&env_id).await
    }

    /// Suspend the environment. Does not wait.
    pub async fn stop(&mut self) -> Result<()> {
        let env_id = self.environment_id()?;
        info!(machine = %self.name(), environment_id = %env_id, "suspending environment");
        self.client.suspend(&env_id).await
    }

    /// Delete the environment. Does not wait for the deletion to finish.
    pub async fn remove(&mut self) -> Result<()> {
        let env_id = self.environment_id()?;
        info!(machine = %self.name(), environment_id = %env_id, "deleting environment");
        self.client.delete(&env_id).await
    }

    /// Reboot the VM and wait until it reports `Running` again.
    pub async fn restart(&mut self) -> Result<()> {
        let vm_id = self.vm_id().await?;
        info!(machine = %self.name(), vm_id = %vm_id, "rebooting vm");
        self.client.reboot_vm(&vm_id).await?;

        let profile = self.config.timeouts.restart;
        self.wait_for_reboot(profile).await?;
        info!(machine = %self.name(), vm_id = %vm_id, "vm back up");
        Ok(())
    }

    /// Not offered by the provider.
    pub async fn kill(&mut self) -> Result<()> {
        Err(Error::KillUnsupported)
    }

    /// Current state from one status query.
    pub async fn get_state(&self) -> Result<MachineState> {
        let env_id = self.environment_id()?;
        let snapshot = self.client.get_environment_extended(&env_id).await?;
        Ok(translate(snapshot.status))
    }

    /// Docker endpoint as `(host, port)`.
    pub async fn connection_endpoint(&mut self) -> Result<(String, u16)> {
        let host = self.ensure_endpoint_known().await?;
        Ok((host, self.config.docker_port))
    }

    /// Docker endpoint as `tcp://host:port`.
    pub async fn url(&mut self) -> Result<String> {
        let (host, port) = self.connection_endpoint().await?;
        Ok(format!("tcp://{host}:{port}"))
    }

    /// SSH endpoint as `(host, port)`.
    pub async fn ssh_endpoint(&mut self) -> Result<(String, u16)> {
        let host = self.ensure_endpoint_known().await?;
        Ok((host, self.config.ssh_port))
    }

    /// Cached hostname, or one status query to learn it.
    ///
    /// The query must show a `Ready` environment with at least one VM. The
    /// VM's own status text is not checked. Anything else is reported as not
    /// ready without waiting.
    async fn ensure_endpoint_known(&mut self) -> Result<String> {
        if let Some(host) = &self.record.hostname {
            return Ok(host.clone());
        }

        let env_id = self.environment_id()?;
        let snapshot = self.client.get_environment_extended(&env_id).await?;
        let first = snapshot
            .vms
            .first()
            .filter(|_| snapshot.status == EnvironmentStatus::Ready);
        match first {
            Some(vm) => {
                let vm = vm.clone();
                self.remember_vm(&vm);
                Ok(vm.hostname)
            }
            None => Err(Error::NotReady {
                environment_id: env_id,
                waited: Duration::ZERO,
                status: format!("{:?}", snapshot.status),
                vm_status: snapshot.vm_status().to_string(),
            }),
        }
    }

    async fn vm_id(&mut self) -> Result<VmId> {
        if let Some(id) = &self.record.vm_id {
            return Ok(id.clone());
        }
        let env_id = self.environment_id()?;
        let snapshot = self.client.get_environment_extended(&env_id).await?;
        let id = snapshot
            .vms
            .first()
            .map(|vm| vm.id.clone())
            .ok_or(Error::NoVms(env_id))?;
        self.record.vm_id = Some(id.clone());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mockall::predicate::eq;

    use crate::testing::{
        FakeCloudShare, RecordingBootstrap, Scripted, machine_with, snapshot, test_config, vm,
    };
    use crate::types::{EnvironmentId, VM_REBOOTING, VM_RUNNING};
    use crate::{MachineRecord, MockEnvironmentClient};

    use super::*;

    fn created() -> MachineRecord {
        MachineRecord {
            environment_id: Some(EnvironmentId("EN1".into())),
            ..MachineRecord::new("m1")
        }
    }

    fn mocked(client: MockEnvironmentClient, record: MachineRecord) -> Machine {
        Machine::new(
            record,
            test_config(),
            Arc::new(client),
            Arc::new(RecordingBootstrap::default()),
        )
    }

    #[tokio::test]
    async fn start_and_stop_delegate_once() {
        let mut client = MockEnvironmentClient::new();
        client
            .expect_resume()
            .with(eq(EnvironmentId("EN1".into())))
            .times(1)
            .returning(|_| Ok(()));
        client
            .expect_suspend()
            .with(eq(EnvironmentId("EN1".into())))
            .times(1)
            .returning(|_| Ok(()));
        client.expect_get_environment_extended().never();

        let mut machine = mocked(client, created());
        machine.start().await.unwrap();
        machine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn start_resumes_and_stop_suspends() {
        let fake = FakeCloudShare::new();
        let mut machine = machine_with(&fake, created());

        machine.stop().await.unwrap();
        machine.start().await.unwrap();

        assert_eq!(fake.suspended(), vec![EnvironmentId("EN1".into())]);
        assert_eq!(fake.resumed(), vec![EnvironmentId("EN1".into())]);
        assert_eq!(fake.extended_calls(), 0);
    }

    #[tokio::test]
    async fn remove_deletes_without_waiting() {
        let mut client = MockEnvironmentClient::new();
        client
            .expect_delete()
            .with(eq(EnvironmentId("EN1".into())))
            .times(1)
            .returning(|_| Ok(()));
        client.expect_get_environment_extended().never();

        let mut machine = mocked(client, created());
        machine.remove().await.unwrap();
    }

    #[tokio::test]
    async fn kill_makes_no_remote_call() {
        // Any call on a mock without expectations panics.
        let mut machine = mocked(MockEnvironmentClient::new(), created());
        let err = machine.kill().await.unwrap_err();
        assert!(matches!(err, Error::KillUnsupported));
    }

    #[tokio::test]
    async fn operations_before_create_are_rejected() {
        let mut machine = mocked(MockEnvironmentClient::new(), MachineRecord::new("m1"));
        assert!(matches!(machine.stop().await, Err(Error::NotCreated(_))));
        assert!(matches!(machine.get_state().await, Err(Error::NotCreated(_))));
    }

    #[tokio::test]
    async fn state_comes_from_one_status_query() {
        let fake = FakeCloudShare::new().script([Scripted::Snapshot(snapshot(
            EnvironmentStatus::Suspended,
            vec![],
        ))]);
        let machine = machine_with(&fake, created());

        assert_eq!(machine.get_state().await.unwrap(), MachineState::Paused);
        assert_eq!(fake.extended_calls(), 1);
    }

    #[tokio::test]
    async fn endpoint_is_learned_once_then_cached() {
        let fake = FakeCloudShare::new().script([Scripted::Snapshot(snapshot(
            EnvironmentStatus::Ready,
            vec![vm(VM_RUNNING, 2, 4096, 20)],
        ))]);
        let mut machine = machine_with(&fake, created());

        assert_eq!(machine.url().await.unwrap(), "tcp://uvm1.cloudshare.test:2376");
        assert_eq!(
            machine.ssh_endpoint().await.unwrap(),
            ("uvm1.cloudshare.test".to_string(), 22)
        );
        assert_eq!(fake.extended_calls(), 1);
    }

    #[tokio::test]
    async fn endpoint_of_unready_environment_is_not_ready() {
        for status in [EnvironmentStatus::Preparing, EnvironmentStatus::Publishing] {
            let fake = FakeCloudShare::new().script([Scripted::Snapshot(snapshot(
                status,
                vec![vm(VM_RUNNING, 2, 4096, 20)],
            ))]);
            let mut machine = machine_with(&fake, created());

            let err = machine.connection_endpoint().await.unwrap_err();
            assert!(
                matches!(err, Error::NotReady { waited, .. } if waited == Duration::ZERO),
                "{status:?}: {err:?}"
            );
            assert!(machine.record().hostname.is_none());
        }
    }

    #[tokio::test]
    async fn endpoint_ignores_vm_status_text_once_environment_is_ready() {
        let fake = FakeCloudShare::new().script([Scripted::Snapshot(snapshot(
            EnvironmentStatus::Ready,
            vec![vm("Stopped", 2, 4096, 20)],
        ))]);
        let mut machine = machine_with(&fake, created());

        let (host, port) = machine.connection_endpoint().await.unwrap();

        assert_eq!(host, "uvm1.cloudshare.test");
        assert_eq!(port, 2376);
        assert_eq!(machine.record().vm_id, Some(VmId("MC1".into())));
    }

    #[tokio::test]
    async fn endpoint_of_ready_environment_without_vms_is_not_ready() {
        let fake = FakeCloudShare::new().script([Scripted::Snapshot(snapshot(
            EnvironmentStatus::Ready,
            vec![],
        ))]);
        let mut machine = machine_with(&fake, created());

        let err = machine.ssh_endpoint().await.unwrap_err();
        assert!(matches!(err, Error::NotReady { ref vm_status, .. } if vm_status == "<no vm>"));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_waits_through_rebooting() {
        let fake = FakeCloudShare::new().script([
            Scripted::Snapshot(snapshot(
                EnvironmentStatus::Ready,
                vec![vm(VM_REBOOTING, 2, 4096, 20)],
            )),
            Scripted::Snapshot(snapshot(
                EnvironmentStatus::Ready,
                vec![vm(VM_RUNNING, 2, 4096, 20)],
            )),
        ]);
        let record = MachineRecord {
            vm_id: Some(VmId("MC1".into())),
            hostname: Some("uvm1.cloudshare.test".into()),
            ..created()
        };
        let mut machine = machine_with(&fake, record);

        machine.restart().await.unwrap();

        assert_eq!(fake.reboots(), vec![VmId("MC1".into())]);
        assert_eq!(fake.extended_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_fails_on_unexpected_vm_status() {
        let fake = FakeCloudShare::new().script([Scripted::Snapshot(snapshot(
            EnvironmentStatus::Ready,
            vec![vm("Error", 2, 4096, 20)],
        ))]);
        let record = MachineRecord {
            vm_id: Some(VmId("MC1".into())),
            ..created()
        };
        let mut machine = machine_with(&fake, record);

        let err = machine.restart().await.unwrap_err();

        assert!(
            matches!(err, Error::UnexpectedVmStatus { ref status, .. } if status == "Error"),
            "{err:?}"
        );
        assert_eq!(fake.extended_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_gives_up_after_the_restart_timeout() {
        let fake = FakeCloudShare::new().script([Scripted::Snapshot(snapshot(
            EnvironmentStatus::Ready,
            vec![vm(VM_REBOOTING, 2, 4096, 20)],
        ))]);
        let record = MachineRecord {
            vm_id: Some(VmId("MC1".into())),
            ..created()
        };
        let mut machine = machine_with(&fake, record);
        let profile = test_config().timeouts.restart;

        let err = machine.restart().await.unwrap_err();

        match err {
            Error::NotReady {
                waited,
                status,
                vm_status,
                ..
            } => {
                assert_eq!(waited, profile.timeout);
                assert_eq!(status, "Ready");
                assert_eq!(vm_status, VM_REBOOTING);
            }
            other => panic!("expected NotReady, got {other:?}"),
        }
        let expected = (profile.timeout.as_secs() / profile.interval.as_secs()) as u32;
        assert!(fake.extended_calls().abs_diff(expected) <= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_does_not_retry_fetch_errors() {
        let fake = FakeCloudShare::new().script([Scripted::Fail]);
        let record = MachineRecord {
            vm_id: Some(VmId("MC1".into())),
            ..created()
        };
        let mut machine = machine_with(&fake, record);

        let err = machine.restart().await.unwrap_err();

        assert!(matches!(err, Error::Api(_)), "{err:?}");
        assert_eq!(fake.extended_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_stops_waiting_when_cancelled() {
        let fake = FakeCloudShare::new().script([Scripted::Snapshot(snapshot(
            EnvironmentStatus::Ready,
            vec![vm(VM_REBOOTING, 2, 4096, 20)],
        ))]);
        let record = MachineRecord {
            vm_id: Some(VmId("MC1".into())),
            ..created()
        };
        let token = tokio_util::sync::CancellationToken::new();
        let mut machine = machine_with(&fake, record).with_cancellation(token.clone());
        token.cancel();

        let err = machine.restart().await.unwrap_err();

        assert!(matches!(err, Error::Cancelled { .. }), "{err:?}");
        assert_eq!(fake.reboots(), vec![VmId("MC1".into())]);
        assert_eq!(fake.extended_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_without_cached_vm_looks_it_up() {
        let fake = FakeCloudShare::new().script([Scripted::Snapshot(snapshot(
            EnvironmentStatus::Ready,
            vec![vm(VM_RUNNING, 2, 4096, 20)],
        ))]);
        let record = MachineRecord {
            hostname: Some("uvm1.cloudshare.test".into()),
            ..created()
        };
        let mut machine = machine_with(&fake, record);

        machine.restart().await.unwrap();

        assert_eq!(fake.reboots(), vec![VmId("MC1".into())]);
        assert_eq!(machine.record().vm_id, Some(VmId("MC1".into())));
        assert_eq!(fake.extended_calls(), 2);
    }
}
