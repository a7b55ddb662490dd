//! Updated-files sink port (driving side of the observer)
//!
//! The observer reports freshly synced files here before it fires its
//! change callback. The facade implements it and keeps the list until the
//! host drains it.

/// Receives `"<fs-name>|<change-kind>"` entries for freshly synced files
///
/// Called from the observer's task, once per notification that produced at
/// least one entry. Implementations must not block.
pub trait IUpdatedFilesSink: Send + Sync {
    fn record_updated_files(&self, names: Vec<String>);
}
