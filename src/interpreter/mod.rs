//! Interpreter module - runtime values, environments and the evaluator

pub mod value;
pub mod environment;
pub mod operations;
pub mod evaluator;

pub use environment::{EnvironmentKind, EnvironmentStack};
pub use evaluator::{ExecutionStats, Flow, Interpreter, InterpreterConfig};
pub use value::{Closure, HostFn, Namespace, NativeFunction, Value};
