//! Worker thread that runs store calls on a tokio runtime so the UI loop
//! never waits on the network. The UI queues commands and polls events.

use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use tracing_error::SpanTrace;

use crate::client::{CompanyStore, StoreError};
use crate::company::Company;
use crate::domain::DirError;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    LoadAll,
    Create(Company),
    Update { id: u64, company: Company },
    Delete { id: u64 },
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BackendCommand::LoadAll => "load_all",
            BackendCommand::Create(_) => "create",
            BackendCommand::Update { .. } => "update",
            BackendCommand::Delete { .. } => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOp {
    Create,
    Update,
    Delete,
}

impl MutationOp {
    fn verb(self) -> &'static str {
        match self {
            MutationOp::Create => "add",
            MutationOp::Update => "update",
            MutationOp::Delete => "delete",
        }
    }

    fn gerund(self) -> &'static str {
        match self {
            MutationOp::Create => "adding",
            MutationOp::Update => "updating",
            MutationOp::Delete => "deleting",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    Loaded(Vec<Company>),
    LoadFailed(String),
    Created(Company),
    Updated(Company),
    Deleted(u64),
    MutationFailed { op: MutationOp, message: String },
}

/// Alert text shown to the user for a failed mutation.
pub fn mutation_failure(op: MutationOp, err: &StoreError) -> String {
    match err {
        StoreError::Status { .. } => format!("Failed to {} company: {err}", op.verb()),
        _ => format!("Error {} company: {err}", op.gerund()),
    }
}

/// Message for the terminal error screen after a failed bulk load.
pub fn load_failure(err: &StoreError) -> String {
    match err {
        StoreError::Status { .. } => format!("Failed to fetch companies data: {err}"),
        _ => err.to_string(),
    }
}

/// Run one command against the store and turn the outcome into an event.
#[instrument(skip_all, fields(command = cmd.name()))]
pub async fn execute(store: &dyn CompanyStore, cmd: BackendCommand) -> BackendEvent {
    let (op, result) = match cmd {
        BackendCommand::LoadAll => {
            return match store.list().await {
                Ok(rows) => {
                    info!("Loaded {} companies", rows.len());
                    BackendEvent::Loaded(rows)
                }
                Err(err) => {
                    warn!(error = %err, span_trace = %SpanTrace::capture(), "Loading companies failed");
                    BackendEvent::LoadFailed(load_failure(&err))
                }
            };
        }
        BackendCommand::Create(company) => (
            MutationOp::Create,
            store.create(&company).await.map(BackendEvent::Created),
        ),
        BackendCommand::Update { id, company } => (
            MutationOp::Update,
            store.update(id, &company).await.map(BackendEvent::Updated),
        ),
        BackendCommand::Delete { id } => (
            MutationOp::Delete,
            store.delete(id).await.map(|_| BackendEvent::Deleted(id)),
        ),
    };

    match result {
        Ok(event) => {
            info!("{:?} succeeded", op);
            event
        }
        Err(err) => {
            warn!(error = %err, span_trace = %SpanTrace::capture(), "{:?} failed", op);
            BackendEvent::MutationFailed {
                op,
                message: mutation_failure(op, &err),
            }
        }
    }
}

pub struct Backend {
    pub commands: Sender<BackendCommand>,
    pub events: Receiver<BackendEvent>,
    handle: Option<JoinHandle<()>>,
}

impl Backend {
    /// Start the worker thread. Each command runs as its own task so calls
    /// overlap and never block the caller.
    pub fn launch(store: Arc<dyn CompanyStore>) -> Result<Self, DirError> {
        let (cmd_tx, cmd_rx) = unbounded::<BackendCommand>();
        let (event_tx, event_rx) = unbounded::<BackendEvent>();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("compdir-io")
            .enable_all()
            .build()?;

        let handle = thread::Builder::new()
            .name("compdir-backend".into())
            .spawn(move || {
                while let Ok(cmd) = cmd_rx.recv() {
                    debug!(command = cmd.name(), "Dispatching backend command");
                    let store = Arc::clone(&store);
                    let tx = event_tx.clone();
                    runtime.spawn(async move {
                        let event = execute(store.as_ref(), cmd).await;
                        if tx.send(event).is_err() {
                            debug!("UI is gone, dropping backend event");
                        }
                    });
                }
                debug!("Command queue closed, stopping backend");
                runtime.shutdown_timeout(Duration::from_secs(1));
            })?;

        Ok(Self {
            commands: cmd_tx,
            events: event_rx,
            handle: Some(handle),
        })
    }

    /// Close the command queue and wait for the worker to stop.
    /// All other clones of the command sender must be dropped first.
    pub fn shutdown(self) {
        let Backend {
            commands, handle, ..
        } = self;
        drop(commands);
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            warn!("Backend thread panicked");
        }
    }
}
