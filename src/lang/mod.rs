pub mod node;
pub mod value;

pub use node::{AstNode, NodeKind};
pub use value::{CodeBlock, Literal, Value};
