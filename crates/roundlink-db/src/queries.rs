//! Database query functions organized by table.

pub mod jobs;
pub mod oracle_state;
