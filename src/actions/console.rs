use std::io::Write;

use super::{ActionDispatcher, DispatchError};
use crate::gesture::table::ActionId;

/// Prints actions instead of performing them (`--dry-run`).
pub struct ConsoleDispatcher<W: Write> {
    out: W,
}

impl<W: Write> ConsoleDispatcher<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> ActionDispatcher for ConsoleDispatcher<W> {
    fn dispatch(&mut self, action: ActionId) -> Result<(), DispatchError> {
        writeln!(self.out, "{}", action)?;
        Ok(())
    }
}
