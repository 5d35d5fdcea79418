// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared acceptance suite run against every backend.

use dh_core::{ContainerId, RunId, RunStatus};
use dh_engine::RunEnvironment;
use std::time::Duration;

pub fn command(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// The universal backend properties, in one pass over a fresh environment.
///
/// `interval` is the polling interval handed to `wait`; batch backends
/// want a coarser one than the local backend.
pub async fn run_environment_suite(env: &dyn RunEnvironment, interval: Duration) {
    // Happy path: a single echo finishes with its message in the log.
    let id1 = RunId::new("id1");
    env.start(&id1, vec![command(&["echo", "test message"])])
        .await
        .unwrap();
    assert!(env.wait(&[id1.clone()], interval, None).await.unwrap());
    assert_eq!(env.get_stdout(&id1).await.unwrap(), b"test message\n");
    assert_eq!(env.get_status(&id1).await.unwrap(), RunStatus::Finished);
    env.clean(&id1).await.unwrap();

    // Failure path: a nonexistent script argument fails the run.
    let id2 = RunId::new("id2");
    env.start(&id2, vec![command(&["sh", "$/54"])]).await.unwrap();
    assert!(env.wait(&[id2.clone()], interval, None).await.unwrap());
    assert_eq!(env.get_status(&id2).await.unwrap(), RunStatus::Failed);
    // Terminal statuses are monotone.
    assert_eq!(env.get_status(&id2).await.unwrap(), RunStatus::Failed);
    env.clean(&id2).await.unwrap();

    // Ordered multi-command: outputs accumulate in submission order.
    let id3 = RunId::new("id3");
    env.start(&id3, vec![command(&["echo", "A"]), command(&["echo", "B"])])
        .await
        .unwrap();
    assert!(env.wait(&[id3.clone()], interval, None).await.unwrap());
    assert_eq!(env.get_status(&id3).await.unwrap(), RunStatus::Finished);
    assert_eq!(env.get_stdout(&id3).await.unwrap(), b"A\nB\n");
    env.clean(&id3).await.unwrap();

    // Duplicate rejection: the second start fails, the first run is intact.
    let id5 = RunId::new("id5");
    env.start(&id5, vec![command(&["echo", "first"])]).await.unwrap();
    assert!(env
        .start(&id5, vec![command(&["echo", "second"])])
        .await
        .is_err());
    assert!(env.wait(&[id5.clone()], interval, None).await.unwrap());
    assert_eq!(env.get_stdout(&id5).await.unwrap(), b"first\n");
    env.clean(&id5).await.unwrap();

    // Wait deadline: a long run is still alive when the budget runs out.
    let id6 = RunId::new("id6");
    env.start(&id6, vec![command(&["sleep", "30"])]).await.unwrap();
    let done = env
        .wait(
            &[id6.clone()],
            Duration::from_millis(10),
            Some(Duration::from_millis(50)),
        )
        .await
        .unwrap();
    assert!(!done);
    assert!(env.get_status(&id6).await.unwrap().is_alive());
    env.clean(&id6).await.unwrap();

    // Asset round trip: upload, probe, and read back through a run.
    let scratch = tempfile::tempdir().unwrap();
    let source = scratch.path().join("my_asset.txt");
    std::fs::write(&source, "This is my asset.\n").unwrap();

    let cid = ContainerId::new("cid1");
    env.clean_assets(&cid).await.unwrap();
    assert!(!env
        .has_asset(&cid, "path/to/my_remote_asset.txt")
        .await
        .unwrap());
    env.add_asset(&cid, "path/to/my_remote_asset.txt", &source)
        .await
        .unwrap();
    assert!(env
        .has_asset(&cid, "path/to/my_remote_asset.txt")
        .await
        .unwrap());

    let asset = env
        .get_asset(&cid, "path/to/my_remote_asset.txt")
        .await
        .unwrap();
    let id4 = RunId::new("id4");
    env.start(&id4, vec![command(&["cat", &asset])]).await.unwrap();
    assert!(env.wait(&[id4.clone()], interval, None).await.unwrap());
    assert_eq!(env.get_stdout(&id4).await.unwrap(), b"This is my asset.\n");
    env.clean(&id4).await.unwrap();
    env.clean_assets(&cid).await.unwrap();
}
