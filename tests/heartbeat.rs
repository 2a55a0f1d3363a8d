//! Liveness reporting to the coordinator

mod common;

use common::*;
use dfs_datanode::common::NodeIdentity;
use dfs_datanode::datanode::heartbeat::LivenessReporter;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;

fn identity() -> NodeIdentity {
    NodeIdentity {
        id: 3,
        ip: "10.0.0.5".into(),
        client_port: 9001,
        peer_port: 9002,
        master_port: 9003,
    }
}

#[tokio::test]
async fn test_heartbeats_repeat_until_shutdown() {
    let master = MockMaster::default();
    let master_addr = spawn_master(master.clone()).await;

    let (shutdown, shutdown_rx) = watch::channel(false);
    let reporter = LivenessReporter::new(
        identity(),
        master_addr.to_string(),
        Duration::from_millis(20),
        Duration::from_secs(1),
    );
    let handle = reporter.start(shutdown_rx);

    assert!(eventually(|| master.keep_alive_count() >= 3).await);

    let beat = master.keep_alives.lock().unwrap()[0].clone();
    assert_eq!(beat.data_node_ip, "10.0.0.5");
    assert_eq!(beat.port_numbers, vec![":9003", ":9001", ":9002"]);
    assert!(beat.is_alive);

    shutdown.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("reporter did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_heartbeat_survives_missing_coordinator() {
    let unreachable = dead_addr().await;

    let (shutdown, shutdown_rx) = watch::channel(false);
    let reporter = LivenessReporter::new(
        identity(),
        unreachable.to_string(),
        Duration::from_millis(20),
        Duration::from_millis(200),
    );
    let handle = reporter.start(shutdown_rx);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!handle.is_finished());

    shutdown.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("reporter did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_node_sends_heartbeats() {
    let master = MockMaster::default();
    let master_addr = spawn_master(master.clone()).await;
    let root = TempDir::new().unwrap();

    let node = TestNode::start_with(8, root.path(), master_addr, |config| {
        config.heartbeat_interval_ms = 20;
    })
    .await;

    assert!(eventually(|| master.keep_alive_count() >= 2).await);
    let beat = master.keep_alives.lock().unwrap()[0].clone();
    assert_eq!(beat.data_node_ip, "127.0.0.1");
    assert_eq!(
        beat.port_numbers[1],
        format!(":{}", node.client_addr.port())
    );

    node.stop().await.unwrap();
}
