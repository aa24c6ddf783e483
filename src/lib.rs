//! floortask - Factory-Floor Task Tracking Library
//!
//! This library provides the core functionality for the ft CLI tool:
//! part-movement requests from workplaces to the warehouse, worked through
//! a shared live list.
//!
//! # Core Concepts
//!
//! - **Tasks**: Requests to bring a part to a workplace, with a lifecycle
//!   (open, in progress, blocked, completed, missing, incorrectly entered)
//! - **Breaks**: Daily windows during which new requests are refused
//! - **Archive**: Closed tasks move out of the live list after a retention window
//! - **Analytics**: Reaction, lead and execution times per period and worker
//! - **Roles**: Named permission sets checked before privileged actions
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `.floor.toml`
//! - `error`: Error types and result aliases
//! - `store`: Document store (in-memory and file-backed) with change subscriptions
//! - `task`: Task record, lifecycle transitions, ordering and display
//! - `engine`: Task operations gated by the break scheduler and claim rules
//! - `breaks`: Break windows and the break scheduler
//! - `archive`: Batched archiving of old closed tasks
//! - `analytics`: Period statistics
//! - `catalog`: Parts, workplaces, missing reasons and part requests
//! - `bom`: Bills of materials and BOM requests
//! - `permissions`: Roles and permission grants
//! - `actor`: Actor and role identity
//! - `clock`: Wall-clock abstraction
//! - `events`: JSONL event stream
//! - `lock`: File locking and atomic operations for concurrency safety

pub mod actor;
pub mod analytics;
pub mod archive;
pub mod bom;
pub mod breaks;
pub mod catalog;
pub mod cli;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod lock;
pub mod output;
pub mod permissions;
pub mod store;
pub mod task;

pub use error::{Error, Result};
