// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::lsf_sim::LsfSimTransport;
use crate::prelude::{command, run_environment_suite};
use dh_core::{RunId, RunStatus};
use dh_engine::{BatchEnvironment, RunEnvironment};
use std::time::Duration;

fn runtime(dir: &tempfile::TempDir) -> String {
    dir.path().to_str().map(str::to_string).unwrap()
}

#[tokio::test]
async fn batch_environment_satisfies_backend_properties() {
    let dir = tempfile::tempdir().unwrap();
    let env = BatchEnvironment::connect(LsfSimTransport::new(), runtime(&dir), "spec")
        .await
        .unwrap();

    run_environment_suite(&env, Duration::from_millis(20)).await;
}

#[tokio::test]
async fn batch_environment_recovers_state_across_reconnects() {
    let dir = tempfile::tempdir().unwrap();
    let sim = LsfSimTransport::new();
    let id = RunId::new("recover1");

    {
        let env = BatchEnvironment::connect(sim.clone(), runtime(&dir), "spec")
            .await
            .unwrap();
        env.start(&id, vec![command(&["sleep", "2"])]).await.unwrap();
    }

    // The reconstructed supervisor finds the job id in the state mirror and
    // resumes polling the queue for it.
    let revived = BatchEnvironment::connect(sim, runtime(&dir), "spec")
        .await
        .unwrap();
    let status = revived.get_status(&id).await.unwrap();
    assert!(status.is_alive(), "status: {status}");

    revived.stop(&id).await.unwrap();
    assert_eq!(revived.get_status(&id).await.unwrap(), RunStatus::Stopped);
    revived.clean(&id).await.unwrap();
}
