//! Systematic concurrency exploration core.
//!
//! At every scheduling decision point of a program under test, a strategy
//! here chooses which enabled asynchronous operation runs next and which
//! boolean/integer non-determinism values are returned, so that many
//! deterministic re-executions of the same program cover different
//! interleavings with known probability bounds.
//!
//! The crate is the scheduling brain only: it never executes user code.
//! A controlled runtime intercepts the program's tasks and locks, keeps the
//! operation table current, and asks [`strategy::Strategy`] what to resume
//! at each point. [`runtime_contract`] spells out what that runtime must
//! guarantee for the strategies to be sound.

#![forbid(unsafe_code)]

pub mod config;
pub mod explorer;
pub mod operation;
pub mod operation_group;
pub mod pct_cp_strategy;
pub mod pct_strategy;
pub mod random_strategy;
pub mod runtime_contract;
pub mod strategy;
