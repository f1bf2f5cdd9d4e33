use crate::lang::node::{AstNode, NodeKind};

#[derive(Debug, Clone)]
pub enum CompileError {
    /// A node type that the compiler doesn't know how to handle
    UnhandledNode {
        node_type: String,
        hint: Option<String>,
    },
    /// A keyword appeared where its surrounding construct does not allow it
    FlowError {
        keyword: String,
        reason: String,
        hint: Option<String>,
    },
    /// A keyword or call is missing a required argument
    MissingParameter { context: String, what: String },
    /// A keyword received more arguments than it accepts
    TooManyParameters { context: String, allowed: usize },
    /// An expression needed more temp slots than exist
    TempOverflow { line: i32 },
    /// A source line could not be parsed into a statement
    ParseError {
        line: i64,
        column: i32,
        reason: String,
    },
    /// Internal compiler error (shouldn't happen in normal use)
    Internal(String),
}

impl CompileError {
    /// Create an error for an unhandled node type
    pub fn unhandled(node: &AstNode) -> Self {
        CompileError::UnhandledNode {
            node_type: node_kind_name(node.kind).to_string(),
            hint: None,
        }
    }

    /// Create an error for an unhandled node with a hint
    pub fn unhandled_with_hint(node: &AstNode, hint: impl Into<String>) -> Self {
        CompileError::UnhandledNode {
            node_type: node_kind_name(node.kind).to_string(),
            hint: Some(hint.into()),
        }
    }

    /// Create an error for a keyword used outside its construct
    pub fn flow(keyword: impl Into<String>, reason: impl Into<String>) -> Self {
        CompileError::FlowError {
            keyword: keyword.into(),
            reason: reason.into(),
            hint: None,
        }
    }

    /// Same as [`CompileError::flow`] with a hint for the user
    pub fn flow_with_hint(
        keyword: impl Into<String>,
        reason: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        CompileError::FlowError {
            keyword: keyword.into(),
            reason: reason.into(),
            hint: Some(hint.into()),
        }
    }

    pub fn missing_parameter(context: impl Into<String>, what: impl Into<String>) -> Self {
        CompileError::MissingParameter {
            context: context.into(),
            what: what.into(),
        }
    }

    pub fn too_many_parameters(context: impl Into<String>, allowed: usize) -> Self {
        CompileError::TooManyParameters {
            context: context.into(),
            allowed,
        }
    }

    pub fn parse(line: i64, column: i32, reason: impl Into<String>) -> Self {
        CompileError::ParseError {
            line,
            column,
            reason: reason.into(),
        }
    }

    /// Create an internal compiler error
    pub fn internal(msg: impl Into<String>) -> Self {
        CompileError::Internal(msg.into())
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::UnhandledNode { node_type, hint } => {
                write!(f, "compile error: cannot compile '{}' node", node_type)?;
                if let Some(h) = hint {
                    write!(f, "\n  hint: {}", h)?;
                }
                Ok(())
            }
            CompileError::FlowError {
                keyword,
                reason,
                hint,
            } => {
                write!(f, "compile error: '{}': {}", keyword, reason)?;
                if let Some(h) = hint {
                    write!(f, "\n  hint: {}", h)?;
                }
                Ok(())
            }
            CompileError::MissingParameter { context, what } => {
                write!(f, "compile error: {} requires {}", context, what)
            }
            CompileError::TooManyParameters { context, allowed } => {
                write!(
                    f,
                    "compile error: {} accepts at most {} parameter{}",
                    context,
                    allowed,
                    if *allowed == 1 { "" } else { "s" }
                )
            }
            CompileError::TempOverflow { line } => {
                write!(
                    f,
                    "compile error: expression on line {} is too complex",
                    line
                )
            }
            CompileError::ParseError {
                line,
                column,
                reason,
            } => {
                write!(f, "parse error at {}:{}: {}", line, column, reason)
            }
            CompileError::Internal(msg) => {
                write!(f, "compile error: internal error: {}", msg)
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// Extract a human-readable name for a node kind
fn node_kind_name(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Literal => "literal",
        NodeKind::FunctionCall => "function call",
        NodeKind::MethodCall => "method call",
        NodeKind::Member => "member access",
        NodeKind::Identifier => "identifier",
        NodeKind::Variable => "variable",
        NodeKind::Constant => "constant",
        NodeKind::Operator => "operator",
        NodeKind::Index => "index",
        NodeKind::Construct => "construction",
        NodeKind::Keyword => "keyword",
        NodeKind::Assignment => "assignment",
        NodeKind::Empty => "empty",
    }
}
