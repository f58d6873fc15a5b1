//! Node units and their invocation.
//!
//! - [`NodeExecutor`] / [`NodeExecutorRegistry`]: the uniform node-unit contract.
//! - [`ConfigResolver`] / [`TemplateResolver`]: config resolution before each call.
//! - [`NodeInvoker`]: resolve, call, and interpret the result envelope.

pub mod builtin;
pub mod executor;
pub mod invoker;
pub mod resolver;

pub use executor::{NodeExecutor, NodeExecutorRegistry};
pub use invoker::{ignored_targets, Invocation, NodeInvoker};
pub use resolver::{ConfigResolver, TemplateResolver};
