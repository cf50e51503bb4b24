//! mv_reagg: coordinator-side re-aggregation for materialized views of
//! partitioned tables.
//!
//! A distributed planner that reads a materialized view maintained per
//! partition gets one partial row per group and partition. This crate is
//! the planner stage that detects when those partials must be recombined,
//! builds the recombining hash aggregate and the matching scan projection,
//! moves predicates on partial aggregates behind the recombination, and
//! splices the result into the plan tree.
//!
//! # Modules
//!
//! - [`catalog`]: read-only table/view metadata snapshot.
//! - [`expr`]: resolved expression trees.
//! - [`plan`]: plan tree nodes.
//! - [`stmt`]: resolved SELECT statement and its join tree.
//! - [`fix`]: the decision procedure and plan rewrite ([`MvFixContext`]).
//! - [`config`], [`error`]: settings and error types.
//!
//! # Logging
//!
//! Decisions are reported through [`tracing`] at `debug` level, conjunct
//! classification at `trace`. The crate never installs a subscriber.

pub mod catalog;
pub mod config;
pub mod error;
pub mod expr;
pub mod fix;
pub mod plan;
pub mod stmt;

pub use error::{MvFixError, MvFixResult};
pub use fix::MvFixContext;
