use thiserror::Error;

/// Errors raised while executing or reflecting over running code, as opposed
/// to [`CompileError`](crate::bytecode::CompileError) which covers
/// translation problems.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("symbol not found: {name}")]
    SymbolNotFound { name: String },

    #[error("ambiguous call to {name}: {count} overloads match")]
    AmbiguousSymbol { name: String, count: usize },

    #[error("null value passed where an object is required")]
    NullDereference,

    #[error("index {index} is out of bounds for size {size}")]
    OutOfBounds { index: usize, size: usize },

    #[error("cannot convert {from} to {to}")]
    BadCast { from: String, to: String },

    #[error("{function} is missing the required parameter {parameter}")]
    MissingParameter { function: String, parameter: String },

    #[error("too many parameters to {function}, at most {allowed} allowed")]
    TooManyParameters { function: String, allowed: usize },

    #[error("cannot modify constant {name}")]
    ConstantViolation { name: String },
}

impl RuntimeError {
    pub fn symbol_not_found(name: impl Into<String>) -> Self {
        RuntimeError::SymbolNotFound { name: name.into() }
    }

    pub fn bad_cast(from: impl Into<String>, to: impl Into<String>) -> Self {
        RuntimeError::BadCast {
            from: from.into(),
            to: to.into(),
        }
    }
}
