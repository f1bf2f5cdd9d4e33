use serde::{Deserialize, Serialize};

use crate::lang::value::Value;

// =============================================================================
// Instruction - the flat intermediate representation
// =============================================================================

/// Describes the type of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructionType {
    /// A regular function call. `name` identifies the function, the
    /// result goes to temp slot `store` (0 discards it).
    FunctionCall,

    /// A member function call. The first parameter is the object; the
    /// function is either a data member or a member function.
    MemberFunctionCall,

    /// A method call: the result, if any, is conveyed to the output
    /// instead of being stored.
    MethodCall,

    /// Member variant of a method call.
    MemberMethodCall,

    /// Assign `rhs` to the variable named by `name`. When `reference`
    /// is set, the variable is bound to the value instead of copying it.
    Assignment,

    /// Assign `rhs` to the member named by `rhs`-style `name` on the
    /// object in `parameters[0]`.
    MemberAssignment,

    /// Read the member named by `rhs` from the object in
    /// `parameters[0]` into temp slot `store`.
    MemberToTemp,

    /// Read the member named by `rhs` from the object in
    /// `parameters[0]` into the variable named by `name`.
    MemberToVar,

    /// Copy `rhs` into temp slot `store`.
    SaveToTemp,

    /// Unset temp slot `store` so any reference it holds can be
    /// released.
    RemoveTemp,

    /// Unconditionally jump by `jump_offset`.
    Jump,

    /// Jump by `jump_offset` if `rhs` is true.
    JumpTrue,

    /// Jump by `jump_offset` if `rhs` is false.
    JumpFalse,

    /// Declare a function overload. Defines the function first if it
    /// does not exist. See [`Instruction`] for the parameter layout.
    DeclOverload,
}

impl InstructionType {
    /// True for the four call-instruction kinds.
    pub fn is_call(self) -> bool {
        matches!(
            self,
            InstructionType::FunctionCall
                | InstructionType::MemberFunctionCall
                | InstructionType::MethodCall
                | InstructionType::MemberMethodCall
        )
    }

    /// True for the three jump kinds; `jump_offset` is meaningful only
    /// for these.
    pub fn is_jump(self) -> bool {
        matches!(
            self,
            InstructionType::Jump | InstructionType::JumpTrue | InstructionType::JumpFalse
        )
    }
}

/// A single instruction.
///
/// For call instructions `name` identifies the callee, `parameters`
/// holds the arguments and `store` decides whether the result is kept.
/// For assignments `name` is the target and `rhs` the assigned value.
/// For jumps only `jump_offset` (and `rhs` for the conditional kinds)
/// is used. `jump_offset` is always relative to the instruction's own
/// index: `Jump(1)` skips the next instruction and `Jump(-1)` re-runs
/// the previous one, so instruction buffers can be copied without
/// relocation.
///
/// Exactly one of `store` / `jump_offset` is meaningful for any given
/// `kind`; the other stays at its zero default.
///
/// A `DeclOverload` instruction's parameters are, in order: a bool
/// literal (is-method), the return type as an identifier (or an empty
/// string literal for "returns nothing"), the body as a code literal,
/// then for each declared parameter a variable value naming it followed
/// by its compiled default and option values, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// Type of the instruction.
    pub kind: InstructionType,

    /// Name of the function, variable or declared overload.
    pub name: Value,

    /// Assigned value, jump condition, or member name for the
    /// member-access kinds.
    pub rhs: Value,

    /// Parameters of the function, in call order.
    pub parameters: Vec<Value>,

    /// Reference semantics for assignments and stores; disassembles as
    /// `:` in place of `=`.
    pub reference: bool,

    /// Destination temp slot; 0 means the result is discarded.
    pub store: u8,

    /// Signed relative jump distance, valid for the jump kinds only.
    pub jump_offset: i32,
}

impl Instruction {
    pub fn new(kind: InstructionType) -> Self {
        Instruction {
            kind,
            name: Value::None,
            rhs: Value::None,
            parameters: Vec::new(),
            reference: false,
            store: 0,
            jump_offset: 0,
        }
    }

    pub fn jump(offset: i32) -> Self {
        let mut inst = Instruction::new(InstructionType::Jump);
        inst.jump_offset = offset;
        inst
    }

    pub fn jump_false(condition: Value) -> Self {
        let mut inst = Instruction::new(InstructionType::JumpFalse);
        inst.rhs = condition;
        inst
    }

    pub fn jump_true(condition: Value) -> Self {
        let mut inst = Instruction::new(InstructionType::JumpTrue);
        inst.rhs = condition;
        inst
    }

    pub fn remove_temp(slot: u8) -> Self {
        let mut inst = Instruction::new(InstructionType::RemoveTemp);
        inst.store = slot;
        inst
    }

    pub fn save_to_temp(slot: u8, rhs: Value) -> Self {
        let mut inst = Instruction::new(InstructionType::SaveToTemp);
        inst.store = slot;
        inst.rhs = rhs;
        inst
    }

    pub fn assignment(name: impl Into<String>, rhs: Value) -> Self {
        let mut inst = Instruction::new(InstructionType::Assignment);
        inst.name = Value::variable(name);
        inst.rhs = rhs;
        inst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jump_kinds_report_as_jumps() {
        assert!(InstructionType::Jump.is_jump());
        assert!(InstructionType::JumpTrue.is_jump());
        assert!(InstructionType::JumpFalse.is_jump());
        assert!(!InstructionType::Assignment.is_jump());
    }

    #[test]
    fn call_kinds_report_as_calls() {
        assert!(InstructionType::FunctionCall.is_call());
        assert!(InstructionType::MemberMethodCall.is_call());
        assert!(!InstructionType::SaveToTemp.is_call());
    }

    #[test]
    fn constructors_fill_the_right_field() {
        let j = Instruction::jump(-3);
        assert_eq!(j.jump_offset, -3);
        assert_eq!(j.store, 0);

        let r = Instruction::remove_temp(4);
        assert_eq!(r.store, 4);
        assert_eq!(r.jump_offset, 0);
    }
}
