//! Integration test crate for roundlink.
//!
//! This crate has no library code. Its tests drive the submission service
//! and the monitor end to end, over the in-memory ledger fakes of
//! `roundlink_oracle::testing` and an in-memory SQLite database.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p roundlink-integration-tests
//! ```
