// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use mill_core::Config;
use serial_test::serial;

use super::*;
use crate::test_helpers::sh_descriptor;

fn test_config(dir: &Path) -> Config {
    let mut config = Config::rooted_at(dir);
    config.listen_addr = "127.0.0.1:0".parse().unwrap();
    config
}

fn test_deps() -> DaemonDeps {
    DaemonDeps {
        registry: Arc::new(CompilerRegistry::from_descriptors(vec![sh_descriptor()])),
        limits: ExecLimits::default(),
    }
}

#[tokio::test]
#[serial]
async fn starts_listens_and_shuts_down_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = start(test_config(dir.path()), test_deps()).await.unwrap();

    assert_ne!(daemon.local_addr().port(), 0);
    assert!(daemon.admin_socket_path().exists());
    assert!(dir.path().join("milld.pid").exists());

    // The admin rendezvous point must be owner-only.
    let mode = std::fs::metadata(daemon.admin_socket_path())
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);

    // A client can actually connect.
    let stream = tokio::net::TcpStream::connect(daemon.local_addr()).await.unwrap();
    drop(stream);

    let socket = daemon.admin_socket_path().to_path_buf();
    daemon.trigger_shutdown();
    daemon.wait().await;

    assert!(!socket.exists());
    assert!(!dir.path().join("milld.pid").exists());
}

#[tokio::test]
#[serial]
async fn second_instance_fails_on_the_lock() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = start(test_config(dir.path()), test_deps()).await.unwrap();

    let mut second_config = test_config(dir.path());
    // Avoid colliding on the admin socket before the lock check matters.
    second_config.admin_socket_path = dir.path().join("admin2.sock");
    let err = start(second_config, test_deps()).await.unwrap_err();
    assert!(matches!(err, InitError::LockFailed(_)));

    daemon.trigger_shutdown();
    daemon.wait().await;
}

#[tokio::test]
#[serial]
async fn refuses_to_start_without_toolchains() {
    let dir = tempfile::tempdir().unwrap();
    let deps = DaemonDeps {
        registry: Arc::new(CompilerRegistry::from_descriptors(Vec::new())),
        limits: ExecLimits::default(),
    };
    let err = start(test_config(dir.path()), deps).await.unwrap_err();
    assert!(matches!(err, InitError::NoToolchains));
}

#[tokio::test]
#[serial]
async fn boot_sweeps_orphaned_sandboxes() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let orphan = config.processing_root.join("job_9_1700000000");
    std::fs::create_dir_all(&orphan).unwrap();
    std::fs::write(orphan.join("a.out"), b"bin").unwrap();
    // An uploaded source file must survive the sweep.
    let upload = config.processing_root.join("job_9_main.c");
    std::fs::write(&upload, b"int main(){}").unwrap();

    let daemon = start(config, test_deps()).await.unwrap();
    assert!(!orphan.exists());
    assert!(upload.exists());

    daemon.trigger_shutdown();
    daemon.wait().await;
}

#[tokio::test]
#[serial]
async fn teardown_sweeps_leftover_sandboxes() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = start(test_config(dir.path()), test_deps()).await.unwrap();

    let orphan = dir.path().join("processing").join("job_3_42");
    std::fs::create_dir_all(&orphan).unwrap();

    daemon.trigger_shutdown();
    daemon.wait().await;
    assert!(!orphan.exists());
}

#[tokio::test]
#[serial]
async fn stale_admin_socket_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::write(&config.admin_socket_path, b"stale").unwrap();

    let daemon = start(config, test_deps()).await.unwrap();
    assert!(daemon.admin_socket_path().exists());
    daemon.trigger_shutdown();
    daemon.wait().await;
}
