//! One complete experiment run
//!
//! Order of events: clock probe, manager start-up, tunnels and first-stage
//! programs for every flow, scheduled second-stage programs, halt, clock
//! probe, log merge, stats file.

use std::time::Duration;

use pt_core::config::{ExperimentConfig, RemoteHost};
use pt_core::traits::{CommandRunner, ManagerLink, ToolCommand};
use pt_core::{ExperimentError, ExperimentResult, Flow, Link, LogNames, ManagerKind, Role, Side};

use crate::clock::ClockOffsetProbe;
use crate::flows::FlowOrchestrator;
use crate::manager::{ManagerPair, ManagerProcess};
use crate::merge::LogMerger;
use crate::scheduler::{ScheduleParams, TimingScheduler};
use crate::topology::TunnelTopology;

/// How long halted managers get to exit before their groups are killed
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A configured experiment
pub struct Experiment<R> {
    config: ExperimentConfig,
    remote: Option<RemoteHost>,
    names: LogNames,
    runner: R,
}

impl<R: CommandRunner> Experiment<R> {
    /// Validate `config` and prepare a run that uses `runner` for tools
    pub fn new(config: ExperimentConfig, runner: R) -> Result<Self, ExperimentError> {
        config.validate()?;
        let remote = config.remote_host()?;
        let names = LogNames::new(config.cc.clone(), config.run_id);
        Ok(Self {
            config,
            remote,
            names,
            runner,
        })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn remote(&self) -> Option<&RemoteHost> {
        self.remote.as_ref()
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn names(&self) -> &LogNames {
        &self.names
    }

    /// Ask the scheme which role must be started first
    pub async fn who_runs_first(&self) -> Result<Role, ExperimentError> {
        let cmd = ToolCommand::new(self.config.python.as_str())
            .path_arg(&self.config.src_path())
            .arg("run_first");
        let output = self.runner.output(&cmd).await?;
        let role: Role = output.parse()?;
        tracing::info!("{} runs first", role);
        Ok(role)
    }

    /// `mm-link` command line the local tunnel client manager runs inside
    pub fn link_shaper_command(&self) -> Vec<String> {
        let link = &self.config.link;
        let data_dir = self.config.data_dir();
        let test_dir = self.config.test_dir();
        let words = |cmds: &Option<String>| -> Vec<String> {
            cmds.as_deref()
                .map(|c| c.split_whitespace().map(String::from).collect())
                .unwrap_or_default()
        };

        let mut argv = words(&link.prepend_mm_cmds);
        argv.push("mm-link".to_string());
        argv.push(test_dir.join(&link.datalink_trace).display().to_string());
        argv.push(test_dir.join(&link.acklink_trace).display().to_string());
        argv.push(format!(
            "--uplink-log={}",
            self.names
                .link_shaper_log(&data_dir, Link::Datalink)
                .display()
        ));
        argv.push(format!(
            "--downlink-log={}",
            self.names.link_shaper_log(&data_dir, Link::Acklink).display()
        ));
        argv.extend(words(&link.extra_mm_link_args));
        argv.extend(words(&link.append_mm_cmds));
        argv
    }

    /// Command lines of the tunnel server and tunnel client managers
    pub fn manager_commands(&self) -> ManagerPair<Vec<String>> {
        let python = self.config.python.clone();
        let local_tm = vec![
            python.clone(),
            self.config.tunnel_manager_path().display().to_string(),
        ];

        match &self.remote {
            None => {
                let mut client = self.link_shaper_command();
                client.extend(local_tm.iter().cloned());
                ManagerPair::new(local_tm, client)
            }
            Some(remote) => {
                let mut remote_tm = remote.ssh_cmd();
                remote_tm.push(python);
                remote_tm.push(remote.tunnel_manager().display().to_string());
                match self.config.server_side {
                    Side::Local => ManagerPair::new(local_tm, remote_tm),
                    Side::Remote => ManagerPair::new(remote_tm, local_tm),
                }
            }
        }
    }

    /// Spawn both managers and wait until each is ready
    pub async fn start_managers(&self) -> Result<ManagerPair<ManagerProcess>, ExperimentError> {
        let commands = self.manager_commands();
        let ready = self.config.timeouts.manager_ready;
        let server = ManagerProcess::start(ManagerKind::TunnelServer, &commands.server, ready).await?;
        let client = ManagerProcess::start(ManagerKind::TunnelClient, &commands.client, ready).await?;
        Ok(ManagerPair::new(server, client))
    }

    pub fn topology(&self, run_first: Role) -> TunnelTopology {
        TunnelTopology::from_config(&self.config, run_first, self.remote.as_ref())
    }

    /// Flows of this run, each with fresh log names
    pub fn plan_flows(&self) -> Vec<Flow> {
        Flow::plan_all(self.config.flows, &self.names, &self.config.tmp_dir())
    }

    /// Bring up every flow, run the schedule and halt the managers
    pub async fn drive<M: ManagerLink>(
        &self,
        managers: &mut ManagerPair<M>,
        run_first: Role,
        flows: &[Flow],
        result: &mut ExperimentResult,
    ) -> Result<(), ExperimentError> {
        let orchestrator = FlowOrchestrator::from_config(&self.config, self.topology(run_first));
        let launches = orchestrator.run_flows(managers, flows).await?;

        TimingScheduler::new(ScheduleParams::from_config(&self.config))
            .run(managers, &launches, result)
            .await
    }

    /// Record clock offsets when a remote host and NTP server are set
    pub async fn probe_clocks(&self, result: &mut ExperimentResult) {
        let Some(ntp_addr) = &self.config.ntp_addr else {
            return;
        };
        if self.remote.is_none() {
            return;
        }
        ClockOffsetProbe::new(
            &self.runner,
            ntp_addr.as_str(),
            self.remote.clone(),
            self.config.clock.max_attempts,
        )
        .probe(result)
        .await;
    }

    /// Merge the per-flow logs into one log per link
    pub async fn merge_logs(
        &self,
        run_first: Role,
        flows: &[Flow],
        result: &mut ExperimentResult,
    ) -> Result<(), ExperimentError> {
        let merger = LogMerger::new(
            &self.runner,
            self.names.clone(),
            self.config.tmp_dir(),
            self.config.data_dir(),
        );
        let merger = match &self.remote {
            Some(remote) => merger.with_remote(remote.clone(), self.topology(run_first).resolver),
            None => merger,
        };
        merger.merge(flows, result).await
    }

    /// Write the start/end/offset summary
    pub async fn write_stats(&self, result: &ExperimentResult) -> Result<(), ExperimentError> {
        let path = self.names.stats_log(&self.config.data_dir());
        tokio::fs::write(&path, result.summary()).await?;
        tracing::info!("Wrote {}", path.display());
        Ok(())
    }

    async fn prepare_dirs(&self) -> Result<(), ExperimentError> {
        let tmp_dir = self.config.tmp_dir();
        tokio::fs::create_dir_all(&tmp_dir).await?;
        tokio::fs::create_dir_all(self.config.data_dir()).await?;

        // Remote endpoints write their logs under the same path
        if let Some(remote) = &self.remote {
            let mut argv = remote.ssh_cmd();
            argv.extend(["mkdir".to_string(), "-p".to_string()]);
            argv.push(tmp_dir.display().to_string());
            if let Some(cmd) = ToolCommand::from_argv(&argv) {
                self.runner.run(&cmd).await?;
            }
        }
        Ok(())
    }

    /// Run the whole experiment
    pub async fn run(&self) -> Result<ExperimentResult, ExperimentError> {
        self.prepare_dirs().await?;
        let run_first = self.who_runs_first().await?;
        let flows = self.plan_flows();
        let mut result = ExperimentResult::default();

        self.probe_clocks(&mut result).await;

        let mut managers = self.start_managers().await?;
        self.drive(&mut managers, run_first, &flows, &mut result)
            .await?;
        managers.server.shutdown(SHUTDOWN_GRACE).await;
        managers.client.shutdown(SHUTDOWN_GRACE).await;

        self.probe_clocks(&mut result).await;

        self.merge_logs(run_first, &flows, &mut result).await?;
        self.write_stats(&result).await?;
        Ok(result)
    }
}
