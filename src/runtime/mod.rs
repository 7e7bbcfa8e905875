/// Workflow execution runtime
///
/// `scheduler` linearizes a graph, `interpreter` walks the order dispatching
/// through `handlers`, `context` carries the per-run variable scope, and
/// `log`/`template` provide the observation stream and reference resolution
/// the steps share.

pub mod context;
pub mod handlers;
pub mod interpreter;
pub mod log;
pub mod scheduler;
pub mod template;

pub use context::ExecutionContext;
pub use handlers::{ToolHandler, ToolHandlerRegistry};
pub use interpreter::{ExecutionInterpreter, ExecutionReport, RunState};
pub use log::{ChannelSink, ExecutionLogEntry, LogPhase, LogSink, TracingSink};
pub use scheduler::SchedulePolicy;
