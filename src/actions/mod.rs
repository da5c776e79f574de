pub mod background;
pub mod console;
pub mod http;
pub mod mpd;
pub mod router;

use thiserror::Error;

use crate::gesture::table::ActionId;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no sink configured for {0}")]
    Unconfigured(&'static str),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{method} {url} returned {status}")]
    HttpStatus {
        method: &'static str,
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("mpd rejected command: {0}")]
    MpdAck(String),
    #[error("mpd protocol error: {0}")]
    MpdProtocol(String),
    #[error("dispatch queue is full")]
    QueueFull,
    #[error("dispatch worker has stopped")]
    WorkerGone,
}

/// Performs the side effect bound to a recognized gesture.
pub trait ActionDispatcher {
    fn dispatch(&mut self, action: ActionId) -> Result<(), DispatchError>;
}

impl<D: ActionDispatcher + ?Sized> ActionDispatcher for Box<D> {
    fn dispatch(&mut self, action: ActionId) -> Result<(), DispatchError> {
        (**self).dispatch(action)
    }
}

#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingDispatcher {
    pub dispatched: Vec<ActionId>,
    pub fail: bool,
}

#[cfg(test)]
impl ActionDispatcher for RecordingDispatcher {
    fn dispatch(&mut self, action: ActionId) -> Result<(), DispatchError> {
        self.dispatched.push(action);
        if self.fail {
            Err(DispatchError::Unconfigured("test"))
        } else {
            Ok(())
        }
    }
}
