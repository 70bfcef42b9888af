//! TCP listener and connection task management.

pub mod listener;
