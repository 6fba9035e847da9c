//! Worker threads that run search sessions, and the service that owns them.
//!
//! A [`SearchWorker`] runs on its own named thread and talks to its owner
//! only through a pair of `mpsc` channels: [`Command`]s in, [`SearchEvent`]s
//! out. The [`SearchService`] keeps at most one worker alive; starting a new
//! search discards the previous worker together with its event channel, so
//! nothing it still emits can be mistaken for output of the new search.

use log::*;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::SearchConfig;
use crate::error::{RecoveryError, Result};
use crate::protocol::{Command, Match, SearchEvent};
use crate::search::SearchSession;

pub struct SearchWorker {
    id: u64,
    command_tx: Option<Sender<Command>>,
    event_rx: Receiver<SearchEvent>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SearchWorker {
    pub fn spawn(id: u64) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        let thread_handle = thread::Builder::new()
            .name(format!("search-worker-{}", id))
            .spawn(move || Self::worker_thread_main(id, command_rx, event_tx))?;

        debug!("SearchWorker {}: spawned", id);

        Ok(SearchWorker {
            id,
            command_tx: Some(command_tx),
            event_rx,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn send(&self, command: Command) -> Result<()> {
        self.command_tx
            .as_ref()
            .ok_or(RecoveryError::WorkerDisconnected(self.id))?
            .send(command)
            .map_err(|_| RecoveryError::WorkerDisconnected(self.id))
    }

    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> std::result::Result<SearchEvent, RecvTimeoutError> {
        self.event_rx.recv_timeout(timeout)
    }

    /// Waits for commands until the channel closes. Sessions run one at a
    /// time on this thread.
    fn worker_thread_main(id: u64, command_rx: Receiver<Command>, event_tx: Sender<SearchEvent>) {
        debug!("SearchWorker {}: waiting for commands", id);

        while let Ok(command) = command_rx.recv() {
            match command {
                Command::Start { config } => Self::run_session(id, config, &command_rx, &event_tx),
                Command::Stop => {
                    debug!("SearchWorker {}: stop while idle", id);
                    let _ = event_tx.send(SearchEvent::Stopped {
                        tested: 0,
                        skipped_regions: 0,
                    });
                }
            }
        }

        debug!("SearchWorker {}: command channel closed, shutting down", id);
    }

    fn run_session(
        id: u64,
        config: SearchConfig,
        command_rx: &Receiver<Command>,
        event_tx: &Sender<SearchEvent>,
    ) {
        let mut session = match SearchSession::new(config) {
            Ok(session) => session,
            Err(e) => {
                error!("SearchWorker {}: cannot start session: {}", id, e);
                let _ = event_tx.send(SearchEvent::Error {
                    message: e.to_string(),
                });
                return;
            }
        };

        let emit = |event: SearchEvent| {
            // A closed event channel means the owner is gone; the stop check
            // below notices it through the command channel.
            let _ = event_tx.send(event);
        };
        let should_stop = || match command_rx.try_recv() {
            Ok(Command::Stop) => true,
            Ok(Command::Start { .. }) => {
                warn!("SearchWorker {}: already searching, start ignored", id);
                false
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => true,
        };

        if let Err(e) = session.run(emit, should_stop) {
            debug!("SearchWorker {}: session ended with error: {}", id, e);
        }
    }
}

impl Drop for SearchWorker {
    fn drop(&mut self) {
        // Closing the command channel stops a running session before its
        // next evaluation and ends the thread.
        self.command_tx.take();
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                error!("SearchWorker {}: thread panicked", self.id);
            }
        }
    }
}

/// Owner side of the protocol: starts, stops and listens to searches.
#[derive(Default)]
pub struct SearchService {
    worker: Option<SearchWorker>,
    next_id: u64,
    matches: Vec<Match>,
    finished: bool,
}

impl SearchService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `config` and start it on a fresh worker, discarding any
    /// previous one. Returns the new session id.
    pub fn start(&mut self, config: SearchConfig) -> Result<u64> {
        config.validate()?;

        if let Some(previous) = self.worker.take() {
            if !self.finished {
                warn!("Discarding search {} still in progress", previous.id());
            }
        }

        self.next_id += 1;
        let worker = SearchWorker::spawn(self.next_id)?;
        worker.send(Command::Start { config })?;

        self.matches.clear();
        self.finished = false;
        self.worker = Some(worker);
        Ok(self.next_id)
    }

    /// Ask the current search to stop. It answers with `search-stopped`,
    /// or `complete` if it finished first.
    pub fn stop(&self) -> Result<()> {
        match &self.worker {
            Some(worker) if !self.finished => worker.send(Command::Stop),
            _ => Ok(()),
        }
    }

    /// Wait up to `timeout` for the next event of the current search.
    /// `Ok(None)` on timeout, or when there is no search or it already
    /// ended. A worker thread that died without a terminal event is an
    /// error.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<SearchEvent>> {
        let Some(worker) = self.worker.as_ref().filter(|_| !self.finished) else {
            return Ok(None);
        };
        let id = worker.id();

        match worker.recv_timeout(timeout) {
            Ok(event) => {
                self.record(&event);
                Ok(Some(event))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                self.finished = true;
                Err(RecoveryError::WorkerDisconnected(id))
            }
        }
    }

    fn record(&mut self, event: &SearchEvent) {
        if let SearchEvent::Match(found) = event {
            self.matches.push(found.clone());
        }
        if event.is_terminal() {
            self.finished = true;
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some() && !self.finished
    }

    /// Matches of the current search, in the order they were found.
    pub fn matches(&self) -> &[Match] {
        &self.matches
    }
}
