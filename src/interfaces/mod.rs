//! Inbound and outbound interfaces of the demo binary.

pub mod csv;
