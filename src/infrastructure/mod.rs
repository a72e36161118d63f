//! Adapters implementing the collaborator ports.
//!
//! The in-memory pair backs tests and the demo binary; the remote pair
//! talks to real services over HTTP and is compiled in with the
//! `remote` feature.

pub mod in_memory;

#[cfg(feature = "remote")]
pub mod remote;
