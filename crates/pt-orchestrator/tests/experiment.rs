//! Full experiment runs against scripted managers

mod common;

use std::path::PathBuf;
use std::time::Duration;

use common::{fake_pair, Behaviour, CommandLog, RecordingRunner};
use pt_core::config::ExperimentConfig;
use pt_core::{ExperimentError, ExperimentResult, Role, Side};
use pt_orchestrator::Experiment;
use pt_protocol::{ManagerCommand, TunnelId};

fn remote_config() -> ExperimentConfig {
    ExperimentConfig {
        cc: "cubic".to_string(),
        flows: 2,
        interval: Duration::from_secs(2),
        runtime: Duration::from_secs(10),
        remote: Some("ubuntu@lab:/r".to_string()),
        server_side: Side::Local,
        sender_side: Side::Remote,
        local_addr: Some("10.0.0.5".to_string()),
        pantheon_dir: PathBuf::from("/p"),
        ..Default::default()
    }
}

fn connecting() -> Behaviour {
    Behaviour {
        connect_on_attempt: Some(1),
        ..Default::default()
    }
}

fn is_first_stage(inv: &str) -> bool {
    inv.starts_with("python") && inv.split_whitespace().count() == 3
}

fn is_second_stage(inv: &str) -> bool {
    inv.starts_with("python") && inv.split_whitespace().count() == 5
}

#[tokio::test(start_paused = true)]
async fn test_two_flows_receiver_first() {
    let exp = Experiment::new(remote_config(), RecordingRunner::default()).unwrap();
    let flows = exp.plan_flows();
    let log = CommandLog::default();
    let mut managers = fake_pair(connecting(), &log);
    let mut result = ExperimentResult::default();

    exp.drive(&mut managers, Role::Receiver, &flows, &mut result)
        .await
        .unwrap();

    // Tunnel clients point at the local server address
    let clients = log.invocations(|inv| inv.starts_with("mm-tunnelclient"));
    assert_eq!(clients.len(), 2);
    assert!(clients[0].3.starts_with("mm-tunnelclient 10.0.0.5 45001 "));

    // Receivers start first, on the local tunnel server manager
    let firsts = log.invocations(is_first_stage);
    assert_eq!(firsts.len(), 2);
    for (_, manager, _, inv) in &firsts {
        assert_eq!(*manager, "tsm");
        assert_eq!(inv, "python /p/src/cubic.py receiver");
    }

    // Senders run remotely and connect to the receiver's private address
    let seconds = log.invocations(is_second_stage);
    assert_eq!(seconds.len(), 2);
    for (n, (_, manager, id, inv)) in seconds.iter().enumerate() {
        let n = n + 1;
        assert_eq!(*manager, "tcm");
        assert_eq!(*id, TunnelId::new(n as u32));
        assert_eq!(
            inv,
            &format!("python /r/src/cubic.py sender 100.64.{n}.1 5000{n}")
        );
    }

    // Every handshake and port read happens before any second stage
    let entries = log.entries();
    let first_second = seconds[0].0;
    let last_setup = entries
        .iter()
        .filter(|s| s.at < first_second)
        .map(|s| s.at)
        .max()
        .unwrap();
    assert!(entries
        .iter()
        .filter(|s| s.at >= first_second)
        .all(|s| !matches!(&s.command, ManagerCommand::ReadLine(_))));
    assert!(first_second - last_setup >= Duration::from_secs(2));
    assert_eq!(seconds[1].0 - seconds[0].0, Duration::from_secs(2));

    // Both managers halted once the runtime is over
    let halts: Vec<_> = entries
        .iter()
        .filter(|s| s.command == ManagerCommand::Halt)
        .collect();
    assert_eq!(halts.len(), 2);
    assert!(halts
        .iter()
        .all(|h| h.at - first_second == Duration::from_secs(10)));

    assert!(result.test_start_time.is_some());
    assert!(result.test_end_time.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_overlong_schedule_is_fatal() {
    let config = ExperimentConfig {
        flows: 3,
        runtime: Duration::from_secs(4),
        ..remote_config()
    };
    let exp = Experiment::new(config, RecordingRunner::default()).unwrap();
    let flows = exp.plan_flows();
    let log = CommandLog::default();
    let mut managers = fake_pair(connecting(), &log);
    let mut result = ExperimentResult::default();

    let err = exp
        .drive(&mut managers, Role::Receiver, &flows, &mut result)
        .await
        .unwrap_err();

    assert!(matches!(err, ExperimentError::SchedulingInfeasible { .. }));
    assert!(log
        .entries()
        .iter()
        .all(|s| s.command != ManagerCommand::Halt));
}

#[tokio::test(start_paused = true)]
async fn test_handshake_failure_stops_the_run() {
    let exp = Experiment::new(remote_config(), RecordingRunner::default()).unwrap();
    let flows = exp.plan_flows();
    let log = CommandLog::default();
    let mut managers = fake_pair(Behaviour::default(), &log);
    let mut result = ExperimentResult::default();

    let err = exp
        .drive(&mut managers, Role::Receiver, &flows, &mut result)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ExperimentError::HandshakeExhausted { attempts: 3, .. }
    ));
    // The second flow never got a tunnel
    assert!(log
        .invocations(|inv| inv.starts_with("mm-tunnelserver"))
        .iter()
        .all(|(_, _, id, _)| *id == TunnelId::new(1)));
}

#[tokio::test]
async fn test_merge_fetches_remote_logs() {
    let exp = Experiment::new(remote_config(), RecordingRunner::default()).unwrap();
    let flows = exp.plan_flows();
    let mut result = ExperimentResult::default();

    exp.merge_logs(Role::Receiver, &flows, &mut result)
        .await
        .unwrap();

    assert_eq!(result.merged.len(), 2);

    let commands = exp.runner().commands.lock().unwrap().clone();
    let scps: Vec<_> = commands.iter().filter(|c| c.program == "scp").collect();
    assert_eq!(scps.len(), 4);
    assert!(scps.iter().all(|c| c.args[1].starts_with("ubuntu@lab:/p/tmp/")));
    let merges = commands
        .iter()
        .filter(|c| c.program == "merge-tunnel-logs")
        .count();
    assert_eq!(merges, 2 * 2 + 2);
}

#[tokio::test]
async fn test_stats_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = ExperimentConfig {
        data_dir: Some(dir.path().to_path_buf()),
        run_id: 4,
        ..remote_config()
    };
    let exp = Experiment::new(config, RecordingRunner::default()).unwrap();
    let mut result = ExperimentResult {
        test_start_time: Some("Tue, 14 Mar 2017 15:09:26:535897".to_string()),
        test_end_time: Some("Tue, 14 Mar 2017 15:09:56:535901".to_string()),
        ..Default::default()
    };
    result.record_offset(3.5);

    exp.write_stats(&result).await.unwrap();

    let text = std::fs::read_to_string(dir.path().join("cubic_stats_run4.log")).unwrap();
    assert_eq!(
        text,
        "Start at: Tue, 14 Mar 2017 15:09:26:535897\n\
         End at: Tue, 14 Mar 2017 15:09:56:535901\n\
         Worst absolute clock offset: 3.5 ms\n"
    );
}
