//! Live weight ingestion.
//!
//! An external controller writes a plain-text weight specification next to
//! the daemon; the watcher polls for it, parses it into a complete
//! [`WeightSnapshot`], deletes the file, and hands the snapshot to the
//! scheduler through a single-slot [`Mailbox`].

mod spec;
mod watcher;

pub use spec::{parse_spec, WeightSnapshot};
pub use watcher::{Mailbox, WeightWatcher};
