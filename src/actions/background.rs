use crossbeam_channel::{bounded, Sender, TrySendError};
use std::thread::{self, JoinHandle};

use super::{ActionDispatcher, DispatchError};
use crate::gesture::table::ActionId;

/// Runs a slow dispatcher on its own thread so the audio loop only enqueues.
///
/// Failures of the inner dispatcher are logged on the worker. Dropping the
/// handle lets queued actions finish before joining.
pub struct BackgroundDispatcher {
    tx: Option<Sender<ActionId>>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundDispatcher {
    pub fn spawn<D>(mut inner: D, depth: usize) -> Result<Self, DispatchError>
    where
        D: ActionDispatcher + Send + 'static,
    {
        let (tx, rx) = bounded::<ActionId>(depth.max(1));
        let worker = thread::Builder::new()
            .name("whistle-dispatch".into())
            .spawn(move || {
                for action in rx {
                    match inner.dispatch(action) {
                        Ok(()) => log::info!("dispatched {}", action),
                        Err(err) => log::warn!("action {} failed: {}", action, err),
                    }
                }
            })?;
        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }
}

impl ActionDispatcher for BackgroundDispatcher {
    fn dispatch(&mut self, action: ActionId) -> Result<(), DispatchError> {
        let tx = self.tx.as_ref().ok_or(DispatchError::WorkerGone)?;
        tx.try_send(action).map_err(|err| match err {
            TrySendError::Full(_) => DispatchError::QueueFull,
            TrySendError::Disconnected(_) => DispatchError::WorkerGone,
        })
    }
}

impl Drop for BackgroundDispatcher {
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("dispatch worker panicked");
            }
        }
    }
}
