use thiserror::Error;

/// Errors raised while binding a native function to a declared signature.
/// These fire at registration time, before any script runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindError {
    #[error("{function}: declared {declared} parameter(s) but the native function takes {native}")]
    ParameterCountMismatch {
        function: String,
        declared: usize,
        native: usize,
    },

    #[error("{function}: parameter {index} is declared by reference but the native function takes it by value")]
    ReferenceMismatch { function: String, index: usize },

    #[error("{function}: parameter {index} is declared constant but the native function can modify it")]
    ConstMismatch { function: String, index: usize },

    #[error("{function}: parameter {index} has a different native type than declared")]
    TypeMismatch { function: String, index: usize },

    #[error("{function}: a repeating parameter must collect into a vector")]
    RepeatingNotVector { function: String },

    #[error("{function}: a repeating parameter cannot be taken by mutable reference")]
    RepeatingByReference { function: String },

    #[error("{function}: declared return type does not match the native return")]
    ReturnMismatch { function: String },

    #[error("{function}: a constant overload cannot take its object by mutable reference")]
    ConstReceiver { function: String },
}
