//! Domain types of the split-tender engine and the boundary traits of
//! the two external collaborators it drives.

pub mod allocation;
pub mod ports;
pub mod record;
pub mod request;
pub mod summary;
