//! Debounced background saving of edited notes.
//!
//! Each edit replaces the note's pending copy and restarts its quiet
//! period. Once a note has been quiet for the debounce window its latest
//! copy goes through [`SyncClient::update_note`], so every save is
//! encrypted and self-verified like any other write.

use crate::client::SyncClient;
use crate::error::{SyncError, SyncResult};
use crate::session::EncryptionSession;
use notecrypt_types::{NoteId, PlainNote};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

/// Outcome of one background save.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveEvent {
    /// The note as stored, decrypted.
    Saved(PlainNote),
    Failed { id: NoteId, error: String },
}

enum Command {
    Edit(PlainNote),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

struct Pending {
    note: PlainNote,
    due: Instant,
}

struct Worker {
    client: Arc<SyncClient>,
    session: EncryptionSession,
    debounce: Duration,
    pending: HashMap<NoteId, Pending>,
    events: mpsc::UnboundedSender<SaveEvent>,
}

impl Worker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let next_due = self.pending.values().map(|p| p.due).min();
            // Disabled branches still evaluate their future.
            let deadline = next_due.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Edit(note)) => self.queue(note),
                    Some(Command::Flush(done)) => {
                        let ids: Vec<NoteId> = self.pending.keys().copied().collect();
                        self.save(ids).await;
                        let _ = done.send(());
                    }
                    Some(Command::Shutdown) | None => break,
                },
                _ = sleep_until(deadline), if next_due.is_some() => {
                    let now = Instant::now();
                    let ids: Vec<NoteId> = self
                        .pending
                        .iter()
                        .filter(|(_, p)| p.due <= now)
                        .map(|(id, _)| *id)
                        .collect();
                    self.save(ids).await;
                }
            }
        }

        if !self.pending.is_empty() {
            debug!(discarded = self.pending.len(), "autosaver stopped with unsaved edits");
        }
    }

    fn queue(&mut self, note: PlainNote) {
        let Some(id) = note.id else { return };
        let due = Instant::now() + self.debounce;
        self.pending.insert(id, Pending { note, due });
    }

    async fn save(&mut self, ids: Vec<NoteId>) {
        for id in ids {
            let Some(Pending { note, .. }) = self.pending.remove(&id) else {
                continue;
            };
            match self.client.update_note(&self.session, &note).await {
                Ok(saved) => {
                    let _ = self.events.send(SaveEvent::Saved(saved));
                }
                Err(SyncError::OperationPending(_)) => {
                    debug!(note_id = %id, "save already in flight, retrying later");
                    self.pending.entry(id).or_insert(Pending {
                        note,
                        due: Instant::now() + self.debounce,
                    });
                }
                Err(e) => {
                    warn!(note_id = %id, error = %e, "autosave failed");
                    let _ = self.events.send(SaveEvent::Failed {
                        id,
                        error: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Handle to the background save task.
///
/// Dropping the handle stops the task; unsent edits are discarded.
pub struct AutoSaver {
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl AutoSaver {
    /// Starts the background task. Save outcomes arrive on the returned
    /// receiver.
    pub fn spawn(
        client: Arc<SyncClient>,
        session: EncryptionSession,
        debounce: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SaveEvent>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();
        let worker = Worker {
            client,
            session,
            debounce,
            pending: HashMap::new(),
            events,
        };
        let task = tokio::spawn(worker.run(rx));
        (
            Self {
                commands,
                task: Some(task),
            },
            events_rx,
        )
    }

    /// Records an edit. The note must already have been created.
    pub fn edit(&self, note: PlainNote) -> SyncResult<()> {
        if note.id.is_none() {
            return Err(SyncError::MissingNoteId);
        }
        self.commands
            .send(Command::Edit(note))
            .map_err(|_| SyncError::ChannelClosed)
    }

    /// Saves everything pending now and waits for those saves to finish.
    pub async fn flush(&self) -> SyncResult<()> {
        let (done, wait) = oneshot::channel();
        self.commands
            .send(Command::Flush(done))
            .map_err(|_| SyncError::ChannelClosed)?;
        wait.await.map_err(|_| SyncError::ChannelClosed)
    }

    /// Stops the task, discarding unsent edits. A save already in flight
    /// completes first.
    pub async fn shutdown(mut self) -> SyncResult<()> {
        let _ = self.commands.send(Command::Shutdown);
        match self.task.take() {
            Some(task) => task.await.map_err(|e| SyncError::Task(e.to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}
