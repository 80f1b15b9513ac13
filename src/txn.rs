//! Serialized write transactions.
//!
//! All mutations run on one dedicated worker thread, one labelled
//! [`Transaction`] at a time. A transaction stages whole documents
//! copy-on-write; the workspace only sees them if the operation returns
//! `Ok`. Readers keep working against the committed workspace while a
//! write runs, since the worker holds an upgradable read lock until it
//! commits.

use crate::edit::{Edit, EditResult};
use crate::workspace::{Document, SourceTrees, Staged, Workspace, WorkspaceError};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, info_span, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Write transaction was cancelled before it started")]
    Cancelled,

    #[error("Write worker is no longer running")]
    WorkerGone,

    #[error("Write operation panicked: {0}")]
    Panicked(String),
}

/// Copy-on-write view of the workspace for one write operation.
pub struct Transaction<'a> {
    workspace: &'a Workspace,
    label: String,
    staged: Staged,
}

impl<'a> Transaction<'a> {
    pub fn new(workspace: &'a Workspace, label: impl Into<String>) -> Self {
        Self {
            workspace,
            label: label.into(),
            staged: Staged::new(),
        }
    }

    /// Normalize `file`, reporting why it was rejected.
    pub fn key_for(&self, file: &str) -> Result<String, WorkspaceError> {
        self.workspace.key_for(file)
    }

    pub fn is_dirty(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Stage new text for an existing or new file. The key, and so the
    /// file's identity, is unchanged; only the generation moves.
    pub fn replace_text(&mut self, key: &str, text: impl Into<String>) -> Arc<Document> {
        let doc = Arc::new(Document::new(key, text, self.workspace.next_generation()));
        self.staged.insert(key.to_string(), Some(Arc::clone(&doc)));
        doc
    }

    /// Apply one verified span edit to the staged text of `key`.
    pub fn apply_edit(&mut self, key: &str, edit: &Edit) -> Result<Arc<Document>, WorkspaceError> {
        let doc = self
            .document(key)
            .ok_or_else(|| WorkspaceError::NotFound(key.to_string()))?;

        let mut text = doc.text().to_string();
        match edit.apply(&mut text)? {
            EditResult::AlreadyApplied => {
                debug!(
                    txn = %self.label,
                    file = %key,
                    at = edit.byte_start,
                    "edit already applied"
                );
                Ok(doc)
            }
            EditResult::Applied { bytes_changed } => {
                debug!(
                    txn = %self.label,
                    file = %key,
                    at = edit.byte_start,
                    bytes_changed,
                    "edit staged"
                );
                Ok(self.replace_text(key, text))
            }
        }
    }

    /// [`apply_edit`](Self::apply_edit), undone again when it turns a file
    /// that parsed cleanly into one with syntax errors. Files that were
    /// already broken may still be edited.
    pub fn apply_edit_keeping_syntax(
        &mut self,
        key: &str,
        edit: &Edit,
    ) -> Result<Arc<Document>, WorkspaceError> {
        let before = self
            .document(key)
            .ok_or_else(|| WorkspaceError::NotFound(key.to_string()))?;
        let after = self.apply_edit(key, edit)?;
        if after.outline().has_errors() && !before.outline().has_errors() {
            debug!(txn = %self.label, file = %key, "edit introduced syntax errors; undone");
            self.restore(before);
            return Err(WorkspaceError::SyntaxRegression(key.to_string()));
        }
        Ok(after)
    }

    pub fn create(&mut self, key: &str, text: impl Into<String>) -> Result<Arc<Document>, WorkspaceError> {
        if self.document(key).is_some() {
            return Err(WorkspaceError::AlreadyExists(key.to_string()));
        }
        Ok(self.replace_text(key, text))
    }

    pub fn delete(&mut self, key: &str) -> Result<(), WorkspaceError> {
        if self.document(key).is_none() {
            return Err(WorkspaceError::NotFound(key.to_string()));
        }
        self.staged.insert(key.to_string(), None);
        Ok(())
    }

    /// Put `doc` back as the staged state of its file, undoing later edits.
    pub(crate) fn restore(&mut self, doc: Arc<Document>) {
        self.staged.insert(doc.key().to_string(), Some(doc));
    }

    pub(crate) fn into_staged(self) -> Staged {
        self.staged
    }
}

impl SourceTrees for Transaction<'_> {
    fn resolve_key(&self, file: &str) -> Option<String> {
        self.workspace.resolve_key(file)
    }

    fn document(&self, key: &str) -> Option<Arc<Document>> {
        match self.staged.get(key) {
            Some(entry) => entry.clone(),
            None => self.workspace.document(key),
        }
    }
}

type Job = Box<dyn FnOnce(&RwLock<Workspace>) + Send>;

/// Single-writer submission queue.
pub struct WriteQueue {
    sender: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl WriteQueue {
    /// Spawn the mutation worker for `workspace`.
    pub fn new(workspace: Arc<RwLock<Workspace>>) -> std::io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let worker = thread::Builder::new()
            .name("kt-patcher-writer".to_string())
            .spawn(move || {
                for job in receiver {
                    job(&workspace);
                }
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Queue `op` as a labelled write transaction.
    ///
    /// `Ok` commits everything the op staged; `Err` discards it. A panic
    /// inside the op is caught and reported as [`TransactionError::Panicked`].
    pub fn submit<T, E, F>(&self, label: impl Into<String>, op: F) -> WriteTicket<T, E>
    where
        T: Send + 'static,
        E: From<TransactionError> + From<WorkspaceError> + Send + 'static,
        F: FnOnce(&mut Transaction<'_>) -> Result<T, E> + Send + 'static,
    {
        let label = label.into();
        let (reply, receiver) = crossbeam_channel::bounded(1);
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let job: Job = Box::new(move |workspace| {
            if flag.load(Ordering::Acquire) {
                debug!(label = %label, "skipping cancelled transaction");
                let _ = reply.send(Err(TransactionError::Cancelled.into()));
                return;
            }

            let span = info_span!("write", label = %label);
            let _enter = span.enter();

            let guard = workspace.upgradable_read();
            let outcome = {
                let mut txn = Transaction::new(&guard, label.as_str());
                match panic::catch_unwind(AssertUnwindSafe(|| op(&mut txn))) {
                    Ok(Ok(value)) => Ok((value, txn.into_staged())),
                    Ok(Err(e)) => Err(e),
                    Err(payload) => Err(TransactionError::Panicked(panic_message(payload)).into()),
                }
            };

            let result = match outcome {
                Ok((value, staged)) => {
                    let mut workspace = RwLockUpgradableReadGuard::upgrade(guard);
                    workspace
                        .commit(&label, staged)
                        .map(|()| value)
                        .map_err(|e: WorkspaceError| e.into())
                }
                Err(e) => {
                    debug!("rolled back");
                    Err(e)
                }
            };
            let _ = reply.send(result);
        });

        if let Some(sender) = &self.sender {
            if sender.send(job).is_err() {
                warn!("write worker has shut down");
            }
        }

        WriteTicket {
            receiver,
            cancelled,
        }
    }
}

impl Drop for WriteQueue {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Handle to a submitted write.
#[must_use = "a write ticket should be waited on or cancelled"]
pub struct WriteTicket<T, E> {
    receiver: Receiver<Result<T, E>>,
    cancelled: Arc<AtomicBool>,
}

impl<T, E: From<TransactionError>> WriteTicket<T, E> {
    /// Keep the transaction from running if it has not started yet.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Block until the transaction has committed or rolled back.
    pub fn wait(self) -> Result<T, E> {
        self.receiver
            .recv()
            .unwrap_or_else(|_| Err(TransactionError::WorkerGone.into()))
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
