use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::bytecode::instruction::Instruction;

/// A compiled block of instructions, shared by value.
///
/// Function and method bodies compile into their own buffer; the
/// `DeclOverload` instruction carries that buffer as a code literal.
pub type CodeBlock = Rc<Vec<Instruction>>;

/// A typed literal value inside an instruction.
///
/// The variants mirror the literal prefixes of the disassembly format:
/// `b` bool, `s` string, `i` int, `f` float, `d` double, `c` char,
/// `n` byte, `u` unsigned. `Code` carries a nested instruction buffer
/// and has no textual form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Boolean literal.
    Bool(bool),

    /// 32-bit signed integer.
    Int(i32),

    /// 32-bit unsigned integer.
    Unsigned(u32),

    /// Single byte.
    Byte(u8),

    /// Single character.
    Char(char),

    /// 32-bit floating point.
    Float(f32),

    /// 64-bit floating point.
    Double(f64),

    /// UTF-8 string.
    Str(String),

    /// A nested instruction buffer (function/method body).
    Code(CodeBlock),
}

impl Literal {
    /// The disassembly prefix character for this literal, if it has one.
    pub fn prefix(&self) -> Option<char> {
        match self {
            Literal::Bool(_) => Some('b'),
            Literal::Str(_) => Some('s'),
            Literal::Int(_) => Some('i'),
            Literal::Float(_) => Some('f'),
            Literal::Double(_) => Some('d'),
            Literal::Char(_) => Some('c'),
            Literal::Byte(_) => Some('n'),
            Literal::Unsigned(_) => Some('u'),
            Literal::Code(_) => None,
        }
    }

    /// True if the literal holds a boolean true, a non-zero number, or a
    /// non-empty string. Used by tests and tooling, not by the compiler.
    pub fn is_truthy(&self) -> bool {
        match self {
            Literal::Bool(b) => *b,
            Literal::Int(n) => *n != 0,
            Literal::Unsigned(n) => *n != 0,
            Literal::Byte(n) => *n != 0,
            Literal::Char(c) => *c != '\0',
            Literal::Float(f) => *f != 0.0,
            Literal::Double(d) => *d != 0.0,
            Literal::Str(s) => !s.is_empty(),
            Literal::Code(c) => !c.is_empty(),
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{}", if *b { "1" } else { "0" }),
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Unsigned(n) => write!(f, "{}", n),
            Literal::Byte(n) => write!(f, "{}", n),
            Literal::Char(c) => write!(f, "{}", *c as u32),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::Double(x) => write!(f, "{}", x),
            Literal::Str(s) => write!(f, "{}", s),
            Literal::Code(c) => write!(f, "<{} instructions>", c.len()),
        }
    }
}

/// An operand reference inside an [`Instruction`].
///
/// A value either refers to a temporary slot filled by an earlier
/// instruction, holds a literal inline, or names a variable, constant or
/// unresolved identifier. `None` exists for error checking only; a
/// finished instruction never carries it in a meaningful position.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// Not a value. Unset fields of an instruction stay `None`.
    #[default]
    None,

    /// Result of an earlier instruction, addressed by temp slot index.
    /// Slot 0 means "discarded"; usable slots start at 1.
    Temp(u8),

    /// A literal value used as is.
    Literal(Literal),

    /// A variable, resolved at execution time. Names compare
    /// case-insensitively.
    Variable(String),

    /// A constant, possibly namespace qualified.
    Constant(String),

    /// Either a constant or a variable; the executor resolves it on the
    /// fly. Compilers that can tell the difference should.
    Identifier(String),
}

impl Value {
    pub fn temp(index: u8) -> Self {
        Value::Temp(index)
    }

    pub fn literal(lit: Literal) -> Self {
        Value::Literal(lit)
    }

    /// Shorthand for a string literal value, the most common literal in
    /// compiled output (operator names, member names, keywords).
    pub fn string_literal(text: impl Into<String>) -> Self {
        Value::Literal(Literal::Str(text.into()))
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Value::Variable(name.into())
    }

    pub fn constant(name: impl Into<String>) -> Self {
        Value::Constant(name.into())
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Value::Identifier(name.into())
    }

    /// True unless this is the `None` placeholder.
    pub fn is_set(&self) -> bool {
        !matches!(self, Value::None)
    }
}
