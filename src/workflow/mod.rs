/// Workflow persistence and registry

pub mod registry;
pub mod storage;

pub use registry::WorkflowRegistry;
pub use storage::WorkflowStorage;
