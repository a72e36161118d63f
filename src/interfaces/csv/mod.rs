//! CSV interface: operation rows in, outcome rows out.

pub mod op_reader;
pub mod outcome_writer;
