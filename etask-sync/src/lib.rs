//! etask-sync: the backend collaborator and the optimistic update protocol
//! that keeps a local task view in step with it.

pub mod backend;
pub mod error;
pub mod http;
pub mod memory;
pub mod mutation;
pub mod session;

pub use backend::{NewTask, TaskBackend, TaskPatch, TaskQuery};
pub use error::{BackendError, SyncError};
pub use http::HttpBackend;
pub use memory::{MemoryBackend, Operation};
pub use mutation::{MutationState, TaskMutation};
pub use session::{MutationReport, Mutator, Notice, Outcome, TaskSession, TaskView};
