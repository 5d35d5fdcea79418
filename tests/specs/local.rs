// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::prelude::run_environment_suite;
use dh_engine::LocalEnvironment;
use std::time::Duration;

#[tokio::test]
async fn local_environment_satisfies_backend_properties() {
    let dir = tempfile::tempdir().unwrap();
    let env = LocalEnvironment::new(dir.path()).unwrap();

    run_environment_suite(&env, Duration::from_millis(1)).await;
}
