// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loopback LSF simulator.
//!
//! A transport that executes everything locally but emulates the queue
//! commands: `bsub` detaches the run script under a wrapper that writes the
//! per-job report file, `bjobs` reports RUN/DONE from the wrapper process,
//! and `bkill` kills it. Everything else delegates to the plain loopback
//! transport, so the batch state machine and its two-signal completion
//! test run end to end without a cluster.

use async_trait::async_trait;
use dh_transport::{CallOptions, CallOutput, LoopbackTransport, Transport, TransportError};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::process::{Child, Command};

enum SimJob {
    Running(Child),
    Done,
}

struct SimState {
    next_job_id: i64,
    jobs: HashMap<i64, SimJob>,
}

#[derive(Clone)]
pub struct LsfSimTransport {
    inner: LoopbackTransport,
    state: Arc<Mutex<SimState>>,
}

impl LsfSimTransport {
    pub fn new() -> Self {
        Self {
            inner: LoopbackTransport::new(),
            state: Arc::new(Mutex::new(SimState {
                next_job_id: 1000,
                jobs: HashMap::new(),
            })),
        }
    }

    fn submit(&self, cwd: Option<&str>) -> Result<CallOutput, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.next_job_id += 1;
        let job_id = state.next_job_id;

        // Run the script like LSF would, then write the job report with the
        // queue-level success marker only on a zero exit.
        let wrapper = format!(
            "sh run.sh; rc=$?; \
             if [ $rc -eq 0 ]; then echo 'Successfully completed.' > lsf.o{job_id}; \
             else echo \"Exited with exit code $rc.\" > lsf.o{job_id}; fi"
        );

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&wrapper)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        let child = command.spawn().map_err(|source| TransportError::Launch {
            command: wrapper.clone(),
            source,
        })?;
        state.jobs.insert(job_id, SimJob::Running(child));

        Ok(CallOutput::ok(
            format!("Job <{job_id}> is submitted to default queue <normal>.\n").into_bytes(),
        ))
    }

    fn query(&self, args: &[&str]) -> CallOutput {
        let job_id: i64 = match args.get(1).and_then(|id| id.parse().ok()) {
            Some(id) => id,
            None => return CallOutput::exit(255),
        };

        let mut state = self.state.lock().unwrap();
        let finished = match state.jobs.get_mut(&job_id) {
            Some(SimJob::Running(child)) => !matches!(child.try_wait(), Ok(None)),
            Some(SimJob::Done) => true,
            None => {
                return CallOutput {
                    code: 255,
                    stdout: format!("Job <{job_id}> is not found\n").into_bytes(),
                    stderr: Vec::new(),
                }
            }
        };

        if finished {
            state.jobs.insert(job_id, SimJob::Done);
            CallOutput::ok(format!("{job_id}  user  DONE  normal\n").into_bytes())
        } else {
            CallOutput::ok(format!("{job_id}  user  RUN  normal\n").into_bytes())
        }
    }

    fn kill(&self, args: &[&str]) -> CallOutput {
        let job_id: i64 = match args.get(1).and_then(|id| id.parse().ok()) {
            Some(id) => id,
            None => return CallOutput::exit(255),
        };

        let mut state = self.state.lock().unwrap();
        if let Some(SimJob::Running(child)) = state.jobs.get_mut(&job_id) {
            let _ = child.start_kill();
        }
        CallOutput::ok(format!("Job <{job_id}> is being terminated\n").into_bytes())
    }
}

#[async_trait]
impl Transport for LsfSimTransport {
    async fn call(
        &self,
        args: &[&str],
        opts: CallOptions<'_>,
    ) -> Result<CallOutput, TransportError> {
        let output = match args.first().copied() {
            Some("bsub") => self.submit(opts.cwd)?,
            Some("bjobs") => self.query(args),
            Some("bkill") => self.kill(args),
            _ => return self.inner.call(args, opts).await,
        };

        if !opts.tolerate_failure && !output.success() {
            return Err(TransportError::CommandFailed {
                command: args.join(" "),
                code: output.code,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(output)
    }

    async fn upload(&self, local: &std::path::Path, remote: &str) -> Result<(), TransportError> {
        self.inner.upload(local, remote).await
    }
}
