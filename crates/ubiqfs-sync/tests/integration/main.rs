//! Integration tests for ubiqfs-sync
//!
//! Drives the observer and the facade against an in-memory cloud index and
//! real temporary directories.

mod common;

mod test_observer;
