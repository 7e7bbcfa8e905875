/// Apiloom: chat-driven API workflow engine
///
/// Core of a builder that turns natural-language prompts into executable
/// API workflows: a validated graph model, an all-or-nothing mutation
/// engine, a deterministic topological scheduler, and a step interpreter
/// dispatching through a typed tool handler registry.

// Core configuration and setup
pub mod config;

// Error taxonomy shared across layers
pub mod error;

// Graph model and mutation engine
pub mod graph;

// Model-backed proposal source for graph deltas
pub mod llm;

// Side-effect providers: document store, mailer, token signer
pub mod providers;

// Scheduling and execution runtime
pub mod runtime;

// Workflow persistence and registry
pub mod workflow;

// HTTP API layer
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use error::{EngineError, EngineResult, Violation};
pub use graph::{Edge, GraphDelta, Node, NodeType, Workflow};
pub use runtime::{ExecutionInterpreter, ExecutionReport, RunState, ToolHandlerRegistry};
pub use server::start_server;
