//! Scripted tunnel managers for orchestration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use pt_core::traits::{CommandRunner, ManagerLink, ToolCommand};
use pt_core::{ChannelError, ExperimentError};
use pt_orchestrator::ManagerPair;
use pt_protocol::{ManagerCommand, TunnelId};

/// Every command sent to either manager, in send order
#[derive(Clone, Default)]
pub struct CommandLog(Arc<Mutex<Vec<Sent>>>);

#[derive(Debug, Clone)]
pub struct Sent {
    pub at: Instant,
    pub manager: &'static str,
    pub command: ManagerCommand,
}

impl CommandLog {
    pub fn entries(&self) -> Vec<Sent> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, manager: &'static str, command: ManagerCommand) {
        self.0.lock().unwrap().push(Sent {
            at: Instant::now(),
            manager,
            command,
        });
    }

    /// Tunnel invocations matching `pred`, in send order
    pub fn invocations(&self, pred: impl Fn(&str) -> bool) -> Vec<(Instant, &'static str, TunnelId, String)> {
        self.entries()
            .into_iter()
            .filter_map(|s| match s.command {
                ManagerCommand::Tunnel { id, invocation } if pred(&invocation) => {
                    Some((s.at, s.manager, id, invocation))
                }
                _ => None,
            })
            .collect()
    }
}

/// How a fake manager reacts to launches
#[derive(Debug, Clone, Default)]
pub struct Behaviour {
    /// Client launch on which `got connection` is reported (never if `None`)
    pub connect_on_attempt: Option<u32>,
    /// Tunnel servers never print their client invocation
    pub server_silent: bool,
    /// Time each line takes to show up after its `readline` request
    pub reply_delay: Option<Duration>,
}

/// In-memory stand-in for a tunnel manager
///
/// Output is produced per tunnel and handed out one line per `readline`
/// request. A read with no line available waits out its timeout.
pub struct FakeManager {
    label: &'static str,
    behaviour: Behaviour,
    log: CommandLog,
    output: HashMap<TunnelId, VecDeque<String>>,
    requests: VecDeque<TunnelId>,
    client_launches: HashMap<TunnelId, u32>,
}

impl FakeManager {
    pub fn new(label: &'static str, behaviour: Behaviour, log: CommandLog) -> Self {
        Self {
            label,
            behaviour,
            log,
            output: HashMap::new(),
            requests: VecDeque::new(),
            client_launches: HashMap::new(),
        }
    }

    pub fn client_launches(&self, tunnel: TunnelId) -> u32 {
        self.client_launches.get(&tunnel).copied().unwrap_or(0)
    }

    fn emit(&mut self, tunnel: TunnelId, line: impl Into<String>) {
        self.output.entry(tunnel).or_default().push_back(line.into());
    }

    fn launch(&mut self, tunnel: TunnelId, invocation: &str) {
        let n = tunnel.as_u32();
        if invocation.starts_with("mm-tunnelserver") {
            if !self.behaviour.server_silent {
                self.emit(
                    tunnel,
                    format!("mm-tunnelclient localhost 4500{n} 100.64.{n}.2 100.64.{n}.1"),
                );
            }
        } else if invocation.starts_with("mm-tunnelclient") {
            let attempts = self.client_launches.entry(tunnel).or_insert(0);
            *attempts += 1;
            let attempt = *attempts;
            self.emit(tunnel, "starting tunnel client");
            if self.behaviour.connect_on_attempt == Some(attempt) {
                self.emit(tunnel, "got connection");
            }
        } else if invocation.split_whitespace().count() == 3 {
            // First-stage program: some noise, then its port
            self.emit(tunnel, "loading scheme");
            self.emit(tunnel, format!("Listening on port: 5000{n}"));
        }
    }
}

#[async_trait]
impl ManagerLink for FakeManager {
    fn label(&self) -> &str {
        self.label
    }

    async fn send(&mut self, command: ManagerCommand) -> Result<(), ChannelError> {
        self.log.push(self.label, command.clone());
        match command {
            ManagerCommand::Tunnel { id, invocation } => self.launch(id, &invocation),
            ManagerCommand::ReadLine(id) => self.requests.push_back(id),
            ManagerCommand::Prompt(_) | ManagerCommand::Halt => {}
        }
        Ok(())
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<String, ChannelError> {
        let line = self
            .requests
            .pop_front()
            .and_then(|id| self.output.get_mut(&id))
            .and_then(|lines| lines.pop_front());
        match line {
            Some(line) => match self.behaviour.reply_delay {
                Some(delay) if delay >= timeout => {
                    tokio::time::sleep(timeout).await;
                    Err(ChannelError::Timeout(timeout))
                }
                Some(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(line)
                }
                None => Ok(line),
            },
            None => {
                tokio::time::sleep(timeout).await;
                Err(ChannelError::Timeout(timeout))
            }
        }
    }
}

pub fn fake_pair(client: Behaviour, log: &CommandLog) -> ManagerPair<FakeManager> {
    ManagerPair::new(
        FakeManager::new("tsm", Behaviour::default(), log.clone()),
        FakeManager::new("tcm", client, log.clone()),
    )
}

/// Accepts every tool invocation and records it
#[derive(Default)]
pub struct RecordingRunner {
    pub commands: Mutex<Vec<ToolCommand>>,
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &ToolCommand) -> Result<(), ExperimentError> {
        self.commands.lock().unwrap().push(command.clone());
        Ok(())
    }

    async fn output(&self, command: &ToolCommand) -> Result<String, ExperimentError> {
        self.commands.lock().unwrap().push(command.clone());
        Ok("receiver\n".to_string())
    }
}
