//! End-to-end supervision of real processes

#![cfg(unix)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tvlauncher::core::SequentialIdGenerator;
use tvlauncher::{
    AppConfig, ExitInfo, InstanceId, KillError, LaunchError, LaunchInstanceInfo, Supervisor,
};

async fn wait_for_exit(supervisor: &Supervisor, id: &InstanceId) -> ExitInfo {
    for _ in 0..400 {
        if let Some(exit) = supervisor.get_state(id).and_then(|i| i.exit_result) {
            return exit;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("instance {} did not exit in time", id);
}

fn record_updates(supervisor: &Supervisor) -> Arc<Mutex<Vec<LaunchInstanceInfo>>> {
    let updates = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&updates);
    let _subscription = supervisor.on_instance_update(move |info| sink.lock().unwrap().push(info));
    updates
}

#[tokio::test]
async fn echo_exits_successfully() {
    let supervisor = Supervisor::default();
    let config = AppConfig::new("echo", "Echo", "/bin/echo hello");

    let info = supervisor.launch(&config).await.unwrap();
    assert_eq!(info.config_id, config.id);
    assert!(info.pid > 0);
    assert!(info.exit_result.is_none());

    assert_eq!(
        wait_for_exit(&supervisor, &info.launch_instance_id).await,
        ExitInfo::Success
    );

    // Finalized state is stable
    let first = supervisor.get_state(&info.launch_instance_id).unwrap();
    let second = supervisor.get_state(&info.launch_instance_id).unwrap();
    assert_eq!(first, second);
    assert!(first.exited_at.is_some());
}

#[tokio::test]
async fn nonzero_exit_code_is_reported() {
    let supervisor = Supervisor::default();
    let config = AppConfig::new("fail", "Fail", r#"sh -c "exit 3""#);

    let info = supervisor.launch(&config).await.unwrap();
    assert_eq!(
        wait_for_exit(&supervisor, &info.launch_instance_id).await,
        ExitInfo::ExitCode { code: 3 }
    );
}

#[tokio::test]
async fn self_signalled_process_reports_signal() {
    let supervisor = Supervisor::default();
    let config = AppConfig::new("term", "Term", r#"sh -c "kill -TERM $$""#);

    let info = supervisor.launch(&config).await.unwrap();
    assert_eq!(
        wait_for_exit(&supervisor, &info.launch_instance_id).await,
        ExitInfo::Signal {
            signal: "SIGTERM".to_string()
        }
    );
}

#[tokio::test]
async fn kill_reports_sigkill() {
    let supervisor = Supervisor::default();
    let config = AppConfig::new("sleep", "Sleep", "sleep 5");

    let info = supervisor.launch(&config).await.unwrap();
    let id = info.launch_instance_id;

    supervisor.kill(&id).unwrap();
    assert_eq!(
        wait_for_exit(&supervisor, &id).await,
        ExitInfo::Signal {
            signal: "SIGKILL".to_string()
        }
    );

    assert!(matches!(
        supervisor.kill(&id),
        Err(KillError::AlreadyExited { launch_instance_id }) if launch_instance_id == id
    ));
}

#[tokio::test]
async fn second_launch_while_running_is_rejected() {
    let supervisor = Supervisor::default();
    let config = AppConfig::new("sleep", "Sleep", "sleep 5");

    let first = supervisor.launch(&config).await.unwrap();
    match supervisor.launch(&config).await {
        Err(LaunchError::AlreadyRunning { config_id }) => assert_eq!(config_id, config.id),
        other => panic!("expected AlreadyRunning, got {:?}", other),
    }
    assert_eq!(supervisor.instances_for_config(&config.id).len(), 1);

    supervisor.kill(&first.launch_instance_id).unwrap();
    wait_for_exit(&supervisor, &first.launch_instance_id).await;

    // Once exited, the config can be launched again and history is kept
    let second = supervisor.launch(&config).await.unwrap();
    assert_ne!(second.launch_instance_id, first.launch_instance_id);
    let history = supervisor.instances_for_config(&config.id);
    assert_eq!(history.len(), 2);
    assert!(history[0].exit_result.is_some());

    supervisor.kill(&second.launch_instance_id).unwrap();
    wait_for_exit(&supervisor, &second.launch_instance_id).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_launches_of_one_config_admit_one() {
    let supervisor = Supervisor::default();
    let config = AppConfig::new("sleep", "Sleep", "sleep 5");

    let (a, b) = tokio::join!(
        {
            let supervisor = supervisor.clone();
            let config = config.clone();
            tokio::spawn(async move { supervisor.launch(&config).await })
        },
        {
            let supervisor = supervisor.clone();
            let config = config.clone();
            tokio::spawn(async move { supervisor.launch(&config).await })
        }
    );
    let results = [a.unwrap(), b.unwrap()];

    let launched: Vec<&LaunchInstanceInfo> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(LaunchError::AlreadyRunning { .. })))
        .count();
    assert_eq!(launched.len(), 1);
    assert_eq!(rejected, 1);
    assert_eq!(supervisor.instances().len(), 1);

    let id = launched[0].launch_instance_id;
    supervisor.kill(&id).unwrap();
    wait_for_exit(&supervisor, &id).await;
}

#[tokio::test]
async fn empty_command_is_invalid() {
    let supervisor = Supervisor::default();
    let updates = record_updates(&supervisor);

    let result = supervisor.launch(&AppConfig::new("empty", "Empty", "")).await;
    match result {
        Err(LaunchError::InvalidCommand { command }) => assert_eq!(command, ""),
        other => panic!("expected InvalidCommand, got {:?}", other),
    }
    assert!(supervisor.instances().is_empty());
    assert!(updates.lock().unwrap().is_empty());
}

#[tokio::test]
async fn kill_unknown_instance_is_not_found() {
    let supervisor = Supervisor::default();
    assert!(matches!(
        supervisor.kill(&InstanceId::new()),
        Err(KillError::NotFound { .. })
    ));
}

#[tokio::test]
async fn listeners_see_running_then_exited_once() {
    let supervisor = Supervisor::default().with_id_generator(SequentialIdGenerator::new());
    let updates = record_updates(&supervisor);

    let info = supervisor
        .launch(&AppConfig::new("true", "True", "true"))
        .await
        .unwrap();
    wait_for_exit(&supervisor, &info.launch_instance_id).await;

    // Give any stray duplicate notification a chance to arrive
    tokio::time::sleep(Duration::from_millis(100)).await;

    let updates = updates.lock().unwrap();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].launch_instance_id, info.launch_instance_id);
    assert!(updates[0].exit_result.is_none());
    assert_eq!(updates[1].launch_instance_id, info.launch_instance_id);
    assert_eq!(updates[1].exit_result, Some(ExitInfo::Success));
    assert_eq!(updates[0].pid, updates[1].pid);
}

#[tokio::test]
async fn unsubscribed_listener_gets_nothing() {
    let supervisor = Supervisor::default();
    let updates = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&updates);
    let subscription = supervisor.on_instance_update(move |info| sink.lock().unwrap().push(info));
    assert!(subscription.unsubscribe());

    let info = supervisor
        .launch(&AppConfig::new("echo", "Echo", "echo quiet"))
        .await
        .unwrap();
    wait_for_exit(&supervisor, &info.launch_instance_id).await;

    assert!(updates.lock().unwrap().is_empty());
}

#[tokio::test]
async fn supervisors_are_independent() {
    let first = Supervisor::default();
    let second = Supervisor::default();
    let config = AppConfig::new("echo", "Echo", "/bin/echo hi");

    let a = first.launch(&config).await.unwrap();
    let b = second.launch(&config).await.unwrap();

    assert!(second.get_state(&a.launch_instance_id).is_none());
    assert!(first.get_state(&b.launch_instance_id).is_none());
    wait_for_exit(&first, &a.launch_instance_id).await;
    wait_for_exit(&second, &b.launch_instance_id).await;
}
