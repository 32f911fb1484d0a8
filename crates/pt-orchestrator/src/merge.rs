//! Two-stage packet log merging
//!
//! Stage 1 folds each flow's ingress/egress pair into one log per link.
//! Stage 2 folds all flows of a link into the final log of that link.

use std::path::{Path, PathBuf};

use pt_core::config::RemoteHost;
use pt_core::traits::{CommandRunner, ToolCommand};
use pt_core::types::MergedFlowLogs;
use pt_core::{ExperimentError, ExperimentResult, Flow, Link, LogNames, RoleResolver};

/// Log merge utility
pub const MERGE_TOOL: &str = "merge-tunnel-logs";

/// Stage 1: one flow, one link
pub fn single_merge_command(ingress: &Path, egress: &Path, output: &Path) -> ToolCommand {
    ToolCommand::new(MERGE_TOOL)
        .arg("single")
        .arg("-i")
        .path_arg(ingress)
        .arg("-e")
        .path_arg(egress)
        .arg("-o")
        .path_arg(output)
}

/// Stage 2: all flows of one link
pub fn multiple_merge_command(
    output: &Path,
    link_log: Option<&Path>,
    inputs: &[&Path],
) -> ToolCommand {
    let mut cmd = ToolCommand::new(MERGE_TOOL)
        .arg("multiple")
        .arg("-o")
        .path_arg(output);
    if let Some(link_log) = link_log {
        cmd = cmd.arg("--link-log").path_arg(link_log);
    }
    inputs.iter().fold(cmd, |cmd, input| cmd.path_arg(input))
}

/// Merges the logs of a finished run
pub struct LogMerger<'a, R: ?Sized> {
    runner: &'a R,
    names: LogNames,
    tmp_dir: PathBuf,
    data_dir: PathBuf,
    remote: Option<(RemoteHost, RoleResolver)>,
}

impl<'a, R: CommandRunner + ?Sized> LogMerger<'a, R> {
    pub fn new(
        runner: &'a R,
        names: LogNames,
        tmp_dir: impl Into<PathBuf>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            names,
            tmp_dir: tmp_dir.into(),
            data_dir: data_dir.into(),
            remote: None,
        }
    }

    /// Fetch the remote endpoint's logs before merging
    pub fn with_remote(mut self, host: RemoteHost, resolver: RoleResolver) -> Self {
        self.remote = Some((host, resolver));
        self
    }

    /// Run both stages and record the per-flow merged logs
    pub async fn merge(
        &self,
        flows: &[Flow],
        result: &mut ExperimentResult,
    ) -> Result<(), ExperimentError> {
        if let Some((host, resolver)) = &self.remote {
            for flow in flows {
                let logs = resolver.remote_logs(&flow.logs);
                self.fetch(host, &logs.ingress).await?;
                self.fetch(host, &logs.egress).await?;
            }
        }

        let mut merged = Vec::with_capacity(flows.len());
        for flow in flows {
            merged.push(self.merge_flow(flow).await?);
        }

        futures::future::try_join(
            self.merge_link(Link::Datalink, &merged),
            self.merge_link(Link::Acklink, &merged),
        )
        .await?;

        result.merged = merged;
        Ok(())
    }

    async fn fetch(&self, host: &RemoteHost, path: &Path) -> Result<(), ExperimentError> {
        let cmd = ToolCommand::new("scp")
            .arg("-C")
            .arg(host.scp_source(path))
            .path_arg(path);
        self.runner
            .run(&cmd)
            .await
            .map_err(|e| ExperimentError::RemoteCopy {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    /// Stage 1 for both links of one flow
    pub async fn merge_flow(&self, flow: &Flow) -> Result<MergedFlowLogs, ExperimentError> {
        let merged = |link| {
            self.names
                .flow_log(&self.tmp_dir, link, flow.tunnel, &flow.uid, "merged")
        };
        let out = MergedFlowLogs {
            datalink: merged(Link::Datalink),
            acklink: merged(Link::Acklink),
        };

        for link in Link::ALL {
            let cmd = single_merge_command(
                flow.logs.ingress(link),
                flow.logs.egress(link),
                out.get(link),
            );
            self.runner.run(&cmd).await?;
        }
        Ok(out)
    }

    /// Stage 2 for one link
    pub async fn merge_link(
        &self,
        link: Link,
        merged: &[MergedFlowLogs],
    ) -> Result<PathBuf, ExperimentError> {
        let output = self.names.final_log(&self.data_dir, link);
        let link_log = match self.remote {
            None => Some(self.names.link_shaper_log(&self.data_dir, link)),
            Some(_) => None,
        };
        let inputs: Vec<&Path> = merged.iter().map(|m| m.get(link).as_path()).collect();

        let cmd = multiple_merge_command(&output, link_log.as_deref(), &inputs);
        self.runner.run(&cmd).await?;
        tracing::info!("Merged {} log: {}", link, output.display());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pt_core::{Role, Side};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRunner {
        commands: Mutex<Vec<ToolCommand>>,
    }

    impl RecordingRunner {
        fn commands(&self) -> Vec<ToolCommand> {
            self.commands.lock().unwrap().clone()
        }

        fn with_tool<'a>(&self, tool: &'a str, sub: &'a str) -> Vec<ToolCommand> {
            self.commands()
                .into_iter()
                .filter(|c| c.program == tool && c.args.first().map(String::as_str) == Some(sub))
                .collect()
        }
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(&self, command: &ToolCommand) -> Result<(), ExperimentError> {
            self.commands.lock().unwrap().push(command.clone());
            Ok(())
        }

        async fn output(&self, command: &ToolCommand) -> Result<String, ExperimentError> {
            self.run(command).await.map(|_| String::new())
        }
    }

    fn flows() -> Vec<Flow> {
        Flow::plan_all(3, &LogNames::new("cubic", 2), Path::new("/tmp/pt"))
    }

    fn merger(runner: &RecordingRunner) -> LogMerger<'_, RecordingRunner> {
        LogMerger::new(runner, LogNames::new("cubic", 2), "/tmp/pt", "/data")
    }

    #[test]
    fn test_single_merge_command() {
        let cmd = single_merge_command(Path::new("a.in"), Path::new("a.eg"), Path::new("a.out"));
        assert_eq!(
            cmd.to_string(),
            "merge-tunnel-logs single -i a.in -e a.eg -o a.out"
        );
    }

    #[test]
    fn test_multiple_merge_command() {
        let cmd = multiple_merge_command(
            Path::new("final.log"),
            Some(Path::new("mm.log")),
            &[Path::new("1.merged"), Path::new("2.merged")],
        );
        assert_eq!(
            cmd.to_string(),
            "merge-tunnel-logs multiple -o final.log --link-log mm.log 1.merged 2.merged"
        );
    }

    #[tokio::test]
    async fn test_stage_one_uses_only_own_logs() {
        let runner = RecordingRunner::default();
        let flows = flows();
        let mut result = ExperimentResult::default();
        merger(&runner).merge(&flows, &mut result).await.unwrap();

        let singles = runner.with_tool(MERGE_TOOL, "single");
        assert_eq!(singles.len(), flows.len() * 2);

        for cmd in &singles {
            let line = cmd.to_string();
            let owners: Vec<_> = flows
                .iter()
                .filter(|f| line.contains(&f.uid.to_string()))
                .collect();
            assert_eq!(owners.len(), 1, "stage 1 mixes flows: {}", line);
        }
        assert_eq!(result.merged.len(), 3);
    }

    #[tokio::test]
    async fn test_stage_two_links_are_independent() {
        let runner = RecordingRunner::default();
        let mut result = ExperimentResult::default();
        merger(&runner).merge(&flows(), &mut result).await.unwrap();

        let multiples = runner.with_tool(MERGE_TOOL, "multiple");
        assert_eq!(multiples.len(), 2);

        for cmd in &multiples {
            let output = &cmd.args[2];
            let (own, other) = if output.contains("datalink") {
                ("datalink", "acklink")
            } else {
                ("acklink", "datalink")
            };
            let inputs: Vec<_> = cmd.args.iter().filter(|a| a.ends_with(".merged")).collect();
            assert_eq!(inputs.len(), 3);
            assert!(inputs.iter().all(|i| i.contains(own) && !i.contains(other)));
            assert!(cmd.args.contains(&format!("/data/cubic_mm_{}_run2.log", own)));
        }
    }

    #[tokio::test]
    async fn test_datalink_ignores_acklink_order() {
        let merged: Vec<MergedFlowLogs> = (1..=3)
            .map(|n| MergedFlowLogs {
                datalink: PathBuf::from(format!("/tmp/pt/datalink_flow{}.log.merged", n)),
                acklink: PathBuf::from(format!("/tmp/pt/acklink_flow{}.log.merged", n)),
            })
            .collect();

        // Same datalink inputs, acklink entries rotated between flows
        let mut permuted = merged.clone();
        let acklinks: Vec<PathBuf> = merged.iter().map(|m| m.acklink.clone()).collect();
        for (i, m) in permuted.iter_mut().enumerate() {
            m.acklink = acklinks[(i + 1) % acklinks.len()].clone();
        }

        let runner = RecordingRunner::default();
        let merger = merger(&runner);
        let first = merger.merge_link(Link::Datalink, &merged).await.unwrap();
        let second = merger.merge_link(Link::Datalink, &permuted).await.unwrap();

        assert_eq!(first, second);
        let commands = runner.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0], commands[1]);
        assert!(commands[0].args.iter().all(|a| !a.contains("acklink_flow")));
    }

    #[tokio::test]
    async fn test_stage_two_is_deterministic() {
        let flows = flows();
        let first = RecordingRunner::default();
        let second = RecordingRunner::default();
        merger(&first)
            .merge(&flows, &mut ExperimentResult::default())
            .await
            .unwrap();
        merger(&second)
            .merge(&flows, &mut ExperimentResult::default())
            .await
            .unwrap();

        let mut a = first.with_tool(MERGE_TOOL, "multiple");
        let mut b = second.with_tool(MERGE_TOOL, "multiple");
        a.sort_by_key(|c| c.to_string());
        b.sort_by_key(|c| c.to_string());
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_remote_run_fetches_logs_first() {
        let runner = RecordingRunner::default();
        let flows = flows();
        let host = RemoteHost::parse("ubuntu@lab:/srv/pantheon").unwrap();
        let resolver = RoleResolver::new(Role::Receiver, Side::Remote, Side::Local, "/p", None);

        merger(&runner)
            .with_remote(host, resolver.clone())
            .merge(&flows, &mut ExperimentResult::default())
            .await
            .unwrap();

        let commands = runner.commands();
        let scps: Vec<_> = commands.iter().take_while(|c| c.program == "scp").collect();
        assert_eq!(scps.len(), flows.len() * 2);

        let remote = resolver.remote_logs(&flows[0].logs);
        assert_eq!(
            scps[0].to_string(),
            format!(
                "scp -C ubuntu@lab:{0} {0}",
                remote.ingress.display()
            )
        );

        let multiples = runner.with_tool(MERGE_TOOL, "multiple");
        assert!(multiples
            .iter()
            .all(|c| !c.args.iter().any(|a| a == "--link-log")));
    }

    #[tokio::test]
    async fn test_failed_copy_is_remote_copy_error() {
        struct FailingRunner;

        #[async_trait]
        impl CommandRunner for FailingRunner {
            async fn run(&self, command: &ToolCommand) -> Result<(), ExperimentError> {
                Err(ExperimentError::ToolFailed {
                    tool: command.program.clone(),
                    reason: "exit status: 1".to_string(),
                })
            }

            async fn output(&self, _command: &ToolCommand) -> Result<String, ExperimentError> {
                Ok(String::new())
            }
        }

        let runner = FailingRunner;
        let host = RemoteHost::parse("lab:/srv/pantheon").unwrap();
        let resolver = RoleResolver::new(Role::Sender, Side::Remote, Side::Local, "/p", None);
        let err = LogMerger::new(&runner, LogNames::new("cubic", 1), "/tmp", "/data")
            .with_remote(host, resolver)
            .merge(&flows(), &mut ExperimentResult::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExperimentError::RemoteCopy { .. }));
    }
}
