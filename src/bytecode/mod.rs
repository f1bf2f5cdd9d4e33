pub mod binary;
pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod instruction;
pub mod intermediate;

pub use compile::AstCompiler;
pub use compile_error::CompileError;
pub use instruction::{Instruction, InstructionType};
