//! Analyses shared by the rules.
//!
//! - [`tracker`] - per-method symbolic stack tracker (known constants, operand ranges)
//! - [`callgraph`] - assembly-wide caller/callee graph with bounded reachability queries
//!
//! Both work on decoded instructions from [`crate::assembly`] and never modify them.

pub mod callgraph;
pub mod tracker;

pub use callgraph::{CallGraph, CallGraphNode, CallGraphStats, NodeId};
pub use tracker::{stack_delta, KnownValue, StackDelta, StackFact, StackTracker};
