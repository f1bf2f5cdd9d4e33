pub mod context;
pub mod input;
pub mod runtime_error;
pub mod scope;

pub use context::{BasicContext, ExecutionContext};
pub use input::{BufferProvider, Dialect, InputProvider};
pub use runtime_error::RuntimeError;
pub use scope::{Frontend, IntermediateFrontend, ParserFrontend, Scope, ScopeInstance, SourceMarker};
