//! Background session worker.
//!
//! # Responsibility
//! - Run one `NoteSession` and its repository on a dedicated thread so store
//!   I/O never blocks the presentation thread.
//! - Queue intents and process them strictly one at a time.
//!
//! # Invariants
//! - The session is only touched by the worker thread.
//! - An intent is not started until the previous one, including its store
//!   call, has resolved; later intents on the same note wait in the queue.

use crate::repo::note_repo::{NoteRepository, RepoResult};
use crate::session::intent::{Intent, IntentOutcome};
use crate::session::state::{NoteSession, SessionError, SessionResult, SessionSnapshot};
use log::{error, info};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

const WORKER_THREAD_NAME: &str = "quicknote-session";

type Reply = SessionResult<IntentOutcome>;

struct IntentEnvelope {
    intent: Intent,
    respond_to: Sender<Reply>,
}

/// Handle to a session running on its own thread.
pub struct SessionWorker {
    intents: Option<Sender<IntentEnvelope>>,
    thread: Option<JoinHandle<()>>,
}

impl SessionWorker {
    /// Spawns the worker, opening the repository on the worker thread.
    ///
    /// Returns once the initial load finished, together with a receiver that
    /// yields the initial snapshot and one snapshot per completed transition.
    /// The receiver is unbounded; drain it (keeping the last snapshot) or drop
    /// it, otherwise every transition adds a full copy of the note list.
    pub fn spawn<R, F>(open_repo: F) -> SessionResult<(Self, Receiver<SessionSnapshot>)>
    where
        R: NoteRepository + 'static,
        F: FnOnce() -> RepoResult<R> + Send + 'static,
    {
        let (intent_tx, intent_rx) = mpsc::channel::<IntentEnvelope>();
        let (ready_tx, ready_rx) = mpsc::channel::<SessionResult<Receiver<SessionSnapshot>>>();

        let thread = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let mut session = match open_repo()
                    .map_err(SessionError::from)
                    .and_then(NoteSession::load)
                {
                    Ok(session) => session,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                if ready_tx.send(Ok(session.subscribe())).is_err() {
                    return;
                }
                info!("event=session_worker module=session status=start");

                while let Ok(envelope) = intent_rx.recv() {
                    let reply = session.dispatch(envelope.intent);
                    let _ = envelope.respond_to.send(reply);
                }
                info!("event=session_worker module=session status=stop");
            })
            .map_err(|err| {
                error!("event=session_worker module=session status=error error={err}");
                SessionError::WorkerStopped
            })?;

        let snapshots = match ready_rx.recv() {
            Ok(Ok(snapshots)) => snapshots,
            Ok(Err(err)) => {
                let _ = thread.join();
                return Err(err);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(SessionError::WorkerStopped);
            }
        };

        Ok((
            Self {
                intents: Some(intent_tx),
                thread: Some(thread),
            },
            snapshots,
        ))
    }

    /// Queues an intent without waiting; the receiver yields its result.
    pub fn submit(&self, intent: Intent) -> SessionResult<Receiver<Reply>> {
        let sender = self.intents.as_ref().ok_or(SessionError::WorkerStopped)?;
        let (respond_to, reply) = mpsc::channel();
        sender
            .send(IntentEnvelope { intent, respond_to })
            .map_err(|_| SessionError::WorkerStopped)?;
        Ok(reply)
    }

    /// Queues an intent and blocks until it resolves.
    pub fn execute(&self, intent: Intent) -> Reply {
        self.submit(intent)?
            .recv()
            .map_err(|_| SessionError::WorkerStopped)?
    }

    /// Stops accepting intents, drains the queue and joins the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.intents.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("event=session_worker module=session status=error error_code=worker_panicked");
            }
        }
    }
}

impl Drop for SessionWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
