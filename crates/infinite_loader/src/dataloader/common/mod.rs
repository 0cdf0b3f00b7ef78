//! src/dataloader/common/mod.rs
//!
//! Common utilities shared by the loader stages.

pub mod thread;
