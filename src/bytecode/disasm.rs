use crate::bytecode::instruction::{Instruction, InstructionType};
use crate::lang::value::{Literal, Value};

// =============================================================================
// Disassembler - canonical one-line text form per instruction
// =============================================================================

/// Quote a payload, escaping the characters the reader understands.
fn quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render a value with its sigil: `.` temp, `$` variable, `?` identifier,
/// `!` constant, or a type prefix for literals. Nested instruction buffers
/// render as `k"<len>"` and cannot be read back from text.
pub fn disassemble_value(value: &Value) -> String {
    match value {
        Value::None => String::new(),
        Value::Temp(slot) => format!(".{}", quoted(&slot.to_string())),
        Value::Variable(name) => format!("${}", quoted(name)),
        Value::Identifier(name) => format!("?{}", quoted(name)),
        Value::Constant(name) => format!("!{}", quoted(name)),
        Value::Literal(lit) => match lit {
            Literal::Code(code) => format!("k{}", quoted(&code.len().to_string())),
            other => {
                let mut out = String::new();
                if let Some(prefix) = other.prefix() {
                    out.push(prefix);
                }
                out.push_str(&quoted(&other.to_string()));
                out
            }
        },
    }
}

/// Produce the canonical one-line form of an instruction.
pub fn disassemble(instruction: &Instruction) -> String {
    // `:` marks reference semantics wherever `=` would appear
    let eq = if instruction.reference { ":" } else { "=" };

    match instruction.kind {
        InstructionType::Assignment => format!(
            "{}{}{}",
            disassemble_value(&instruction.name),
            eq,
            disassemble_value(&instruction.rhs)
        ),

        InstructionType::MemberAssignment => format!(
            "|{} {}{}{}",
            disassemble_value(&instruction.parameters[0]),
            disassemble_value(&instruction.name),
            eq,
            disassemble_value(&instruction.rhs)
        ),

        InstructionType::MemberToTemp => format!(
            ".{} {} |{} {}",
            quoted(&instruction.store.to_string()),
            eq,
            disassemble_value(&instruction.parameters[0]),
            disassemble_value(&instruction.rhs)
        ),

        InstructionType::MemberToVar => format!(
            "{} {} |{} {}",
            disassemble_value(&instruction.name),
            eq,
            disassemble_value(&instruction.parameters[0]),
            disassemble_value(&instruction.rhs)
        ),

        InstructionType::FunctionCall
        | InstructionType::MemberFunctionCall
        | InstructionType::MethodCall
        | InstructionType::MemberMethodCall => {
            let marker = match instruction.kind {
                InstructionType::FunctionCall => "fn",
                InstructionType::MemberFunctionCall => "fm",
                InstructionType::MethodCall => "mn",
                _ => "mm",
            };

            let mut out = if instruction.store != 0 {
                format!(
                    ".{}{}{}{}",
                    quoted(&instruction.store.to_string()),
                    eq,
                    marker,
                    disassemble_value(&instruction.name)
                )
            } else {
                format!("{}{}", marker, disassemble_value(&instruction.name))
            };

            for param in &instruction.parameters {
                out.push(' ');
                out.push_str(&disassemble_value(param));
            }

            out
        }

        InstructionType::SaveToTemp => format!(
            ".{}{}{}",
            quoted(&instruction.store.to_string()),
            eq,
            disassemble_value(&instruction.rhs)
        ),

        InstructionType::RemoveTemp => format!("x{}", quoted(&instruction.store.to_string())),

        InstructionType::Jump => format!("ja{}", quoted(&instruction.jump_offset.to_string())),

        InstructionType::JumpTrue => format!(
            "jt{}{}",
            quoted(&instruction.jump_offset.to_string()),
            disassemble_value(&instruction.rhs)
        ),

        InstructionType::JumpFalse => format!(
            "jf{}{}",
            quoted(&instruction.jump_offset.to_string()),
            disassemble_value(&instruction.rhs)
        ),

        InstructionType::DeclOverload => {
            let mut out = format!("do{}", disassemble_value(&instruction.name));
            for param in &instruction.parameters {
                out.push(' ');
                out.push_str(&disassemble_value(param));
            }
            out
        }
    }
}

/// Disassemble a whole buffer, one instruction per line.
pub fn disassemble_buffer(instructions: &[Instruction]) -> String {
    let mut out = String::new();
    for instruction in instructions {
        out.push_str(&disassemble(instruction));
        out.push('\n');
    }
    out
}
