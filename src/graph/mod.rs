//! Graph construction and dependency analysis.
//!
//! [`build_graph`] turns a [`FlowSchema`](crate::dsl::FlowSchema) into an immutable
//! [`FlowDefinition`]. The scheduler works on [`FlowGraph`] views of it, one per
//! scheduling scope (the top level, or the body of one iteration block), each carrying
//! forward and reverse adjacency maps. [`classify_parents`] decides which incoming
//! edges of a node are required and which are alternatives behind a decision node.

pub mod builder;
pub mod dependency;
pub mod types;

pub use builder::*;
pub use dependency::*;
pub use types::*;
