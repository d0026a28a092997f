//! Stage supervision.
//!
//! [`Supervisor`] runs one [`StageWorker`] to completion: setup, then
//! the run loop raced against INT/TERM, then teardown on every exit
//! path. The worker's lifecycle is tracked as READY → RUNNING →
//! DRAINING → CLOSED.
//!
//! [`EtlSupervisor`] is the composite: it spawns one child process per
//! stage binary, forwards INT to the group, and joins them all.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{watch, Notify};
use tracing::{error, info, warn};

use crate::error::EtlError;
use crate::stage::StageWorker;

// ── Single-stage supervisor ──────────────────────────────────────────

/// Lifecycle of a supervised stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Ready,
    Running,
    Draining,
    Closed,
}

pub struct Supervisor {
    state_tx: watch::Sender<StageState>,
}

impl Supervisor {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(StageState::Ready);
        Self { state_tx }
    }

    /// Observe lifecycle transitions (used by tests and health probes).
    pub fn state(&self) -> watch::Receiver<StageState> {
        self.state_tx.subscribe()
    }

    fn transition(&self, state: StageState) {
        let _ = self.state_tx.send(state);
    }

    /// Run `worker` until a shutdown signal or a fatal error.
    ///
    /// `shutdown` is a programmatic stand-in for INT/TERM (tests, the
    /// composite supervisor). Teardown always runs; a run-loop error is
    /// re-raised after it.
    pub async fn run(
        &self,
        worker: Arc<dyn StageWorker>,
        shutdown: Option<Arc<Notify>>,
    ) -> Result<(), EtlError> {
        let name = worker.name().to_string();
        info!(worker = %name, "setting up stage");
        worker.setup().await?;
        self.transition(StageState::Running);
        info!(worker = %name, "stage running");

        let outcome = tokio::select! {
            outcome = worker.run_loop() => Some(outcome),
            _ = wait_for_shutdown(shutdown) => None,
        };

        self.transition(StageState::Draining);
        match outcome {
            None => {
                info!(worker = %name, "shutdown signal received, draining");
                let teardown = worker.teardown().await;
                self.transition(StageState::Closed);
                teardown?;
                info!(worker = %name, "stage closed");
                Ok(())
            }
            Some(Ok(())) => {
                let teardown = worker.teardown().await;
                self.transition(StageState::Closed);
                teardown?;
                info!(worker = %name, "stage finished");
                Ok(())
            }
            Some(Err(err)) => {
                error!(worker = %name, error = %err, "run loop failed, tearing down");
                if let Err(teardown_err) = worker.teardown().await {
                    warn!(worker = %name, error = %teardown_err, "teardown after failure also failed");
                }
                self.transition(StageState::Closed);
                Err(err)
            }
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for INT/TERM or a programmatic notification.
async fn wait_for_shutdown(external: Option<Arc<Notify>>) {
    match external {
        Some(notify) => {
            tokio::select! {
                _ = os_signal() => {}
                _ = notify.notified() => {}
            }
        }
        None => os_signal().await,
    }
}

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C elsewhere.
async fn os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl_c");
    }
}

// ── Composite supervisor ─────────────────────────────────────────────

/// One stage worker process to launch.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub name: String,
    pub binary: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

impl WorkerSpec {
    pub fn new(name: impl Into<String>, binary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binary: binary.into(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// The default four-stage pipeline.
pub fn pipeline_specs() -> Vec<WorkerSpec> {
    vec![
        WorkerSpec::new("listing-extract", "listing-extract-worker"),
        WorkerSpec::new("listing-transform", "listing-transform-worker"),
        WorkerSpec::new("detail-extract", "detail-extract-worker"),
        WorkerSpec::new("detail-transform", "detail-transform-worker"),
    ]
}

struct ManagedChild {
    name: String,
    child: Child,
}

/// Spawns the stage binaries as a process group and supervises them.
pub struct EtlSupervisor {
    children: Vec<ManagedChild>,
}

impl EtlSupervisor {
    /// Spawn every worker. Binaries without a path separator resolve
    /// next to the current executable.
    pub fn spawn(specs: &[WorkerSpec]) -> Result<Self, EtlError> {
        let prefix_width = specs.iter().map(|s| s.name.len()).max().unwrap_or(0);
        let mut children = Vec::with_capacity(specs.len());
        for spec in specs {
            let child = spawn_process(spec, prefix_width)?;
            let pid = child.id();
            info!(worker = %spec.name, pid, "worker process started");
            children.push(ManagedChild {
                name: spec.name.clone(),
                child,
            });
        }
        Ok(Self { children })
    }

    /// Send INT to every child. A child that already exited is logged
    /// and skipped.
    pub fn interrupt(&mut self) {
        for managed in &mut self.children {
            match managed.child.id() {
                Some(pid) => {
                    #[cfg(unix)]
                    {
                        let _ = std::process::Command::new("kill")
                            .args(["-INT", &pid.to_string()])
                            .output();
                        info!(worker = %managed.name, pid, "sent SIGINT");
                    }
                    #[cfg(not(unix))]
                    {
                        let _ = managed.child.start_kill();
                        info!(worker = %managed.name, pid, "sent kill signal");
                    }
                }
                None => {
                    info!(worker = %managed.name, "already exited, nothing to interrupt");
                }
            }
        }
    }

    /// Await every child's exit.
    pub async fn join(&mut self) {
        for managed in &mut self.children {
            match managed.child.wait().await {
                Ok(status) => {
                    info!(worker = %managed.name, code = status.code(), "worker process finished")
                }
                Err(err) => warn!(worker = %managed.name, error = %err, "failed to reap worker"),
            }
        }
    }

    /// Run the group: block until INT/TERM (or every child exits on its
    /// own), forward the interrupt, then join the stragglers.
    pub async fn run(mut self) -> Result<(), EtlError> {
        let interrupted = {
            let children = &mut self.children;
            tokio::select! {
                _ = os_signal() => true,
                _ = wait_for_all(children) => false,
            }
        };
        if interrupted {
            info!("shutdown signal received, interrupting workers");
            self.interrupt();
        } else {
            info!("all workers exited on their own");
        }
        self.join().await;
        Ok(())
    }
}

/// Resolve and spawn one worker process with prefix-piped output.
fn spawn_process(spec: &WorkerSpec, prefix_width: usize) -> Result<Child, EtlError> {
    let program = if spec.binary.contains(std::path::MAIN_SEPARATOR) {
        std::path::PathBuf::from(&spec.binary)
    } else {
        std::env::current_exe()?
            .parent()
            .map(|dir| dir.join(&spec.binary))
            .unwrap_or_else(|| std::path::PathBuf::from(&spec.binary))
    };

    let mut command = Command::new(program);
    command
        .args(&spec.args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in &spec.env {
        command.env(key, value);
    }
    let mut child = command.spawn()?;

    let prefix = format!("{:>width$} │ ", spec.name, width = prefix_width);
    if let Some(stdout) = child.stdout.take() {
        let prefix = prefix.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                println!("{prefix}{line}");
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                eprintln!("{prefix}{line}");
            }
        });
    }
    Ok(child)
}

/// Resolve once every child has exited.
async fn wait_for_all(children: &mut [ManagedChild]) {
    loop {
        let all_exited = children
            .iter_mut()
            .all(|managed| matches!(managed.child.try_wait(), Ok(Some(_))));
        if all_exited {
            return;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}
