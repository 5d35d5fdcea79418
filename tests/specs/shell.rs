// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::prelude::{command, run_environment_suite};
use dh_core::{RunId, RunStatus};
use dh_engine::{RunEnvironment, ShellEnvironment};
use dh_transport::LoopbackTransport;
use std::time::Duration;

fn runtime(dir: &tempfile::TempDir) -> String {
    dir.path().to_str().map(str::to_string).unwrap()
}

#[tokio::test]
async fn shell_environment_satisfies_backend_properties() {
    let dir = tempfile::tempdir().unwrap();
    let env = ShellEnvironment::connect(LoopbackTransport::new(), runtime(&dir))
        .await
        .unwrap();

    run_environment_suite(&env, Duration::from_millis(10)).await;
}

#[tokio::test]
async fn shell_environment_recovers_state_across_reconnects() {
    let dir = tempfile::tempdir().unwrap();
    let id = RunId::new("recover1");

    {
        let env = ShellEnvironment::connect(LoopbackTransport::new(), runtime(&dir))
            .await
            .unwrap();
        env.start(&id, vec![command(&["sleep", "2"])]).await.unwrap();
    }

    // A reconstructed supervisor rejoins the running process by pid.
    let revived = ShellEnvironment::connect(LoopbackTransport::new(), runtime(&dir))
        .await
        .unwrap();
    assert_eq!(revived.get_status(&id).await.unwrap(), RunStatus::Started);

    revived.stop(&id).await.unwrap();
    assert_eq!(revived.get_status(&id).await.unwrap(), RunStatus::Stopped);
    revived.clean(&id).await.unwrap();
}
