//! Reader for the intermediate language, the textual form produced by
//! [`disasm`](crate::bytecode::disasm). One instruction per line; `#` at
//! the start of a line is a comment and blank lines are ignored. Every
//! instruction form reads back except nested instruction buffers, which
//! only survive the binary codec.

use crate::bytecode::compile_error::CompileError;
use crate::bytecode::instruction::{Instruction, InstructionType};
use crate::lang::value::{Literal, Value};

/// Parse one line of intermediate text. Returns `None` for blank and
/// comment lines.
pub fn parse_line(line: &str, line_no: i64) -> Result<Option<Instruction>, CompileError> {
    let mut cursor = Cursor::new(line, line_no);
    cursor.eat_white();

    let Some(c) = cursor.peek() else {
        return Ok(None);
    };

    let instruction = match c {
        '#' => return Ok(None),
        '.' => {
            cursor.advance();
            cursor.stored()?
        }
        'f' | 'm' => cursor.call()?,
        '$' => {
            cursor.advance();
            cursor.var_target()?
        }
        '|' => {
            cursor.advance();
            cursor.member_assignment()?
        }
        'x' => {
            cursor.advance();
            Instruction::remove_temp(cursor.temporary()?)
        }
        'j' => {
            cursor.advance();
            cursor.jump()?
        }
        'd' => {
            cursor.advance();
            cursor.expect('o')?;
            cursor.decl_overload()?
        }
        other => {
            return Err(cursor.error(format!("unexpected character: {}", other)));
        }
    };

    cursor.eat_white();
    if let Some(extra) = cursor.peek() {
        return Err(cursor.error(format!("expected end of line, found: {}", extra)));
    }

    Ok(Some(instruction))
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
    line: i64,
}

impl Cursor {
    fn new(source: &str, line: i64) -> Self {
        Cursor {
            chars: source.chars().collect(),
            pos: 0,
            line,
        }
    }

    fn error(&self, reason: impl Into<String>) -> CompileError {
        CompileError::parse(self.line, self.pos as i32, reason)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn expect(&mut self, wanted: char) -> Result<(), CompileError> {
        match self.advance() {
            Some(c) if c == wanted => Ok(()),
            Some(c) => Err(self.error(format!("expected {}, found: {}", wanted, c))),
            None => Err(self.error(format!("expected {}, end of line encountered", wanted))),
        }
    }

    fn eat_white(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.pos += 1;
        }
    }

    /// `=` for a plain store, `:` for reference semantics.
    fn assign_marker(&mut self) -> Result<bool, CompileError> {
        match self.advance() {
            Some('=') => Ok(false),
            Some(':') => Ok(true),
            Some(c) => Err(self.error(format!("expected = or :, found: {}", c))),
            None => Err(self.error("expected = or :, end of line encountered")),
        }
    }

    /// A double-quoted payload with `\"`, `\\` and `\n` escapes.
    fn quoted(&mut self) -> Result<String, CompileError> {
        self.expect('"')?;

        let mut out = String::new();
        loop {
            match self.advance() {
                Some('"') => return Ok(out),
                Some('\\') => match self.advance() {
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some('n') => out.push('\n'),
                    Some(c) => {
                        return Err(self.error(format!("invalid escape sequence: \\{}", c)));
                    }
                    None => return Err(self.error("unterminated escape sequence")),
                },
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated quoted payload")),
            }
        }
    }

    fn number<T: std::str::FromStr>(&mut self, what: &str) -> Result<T, CompileError> {
        let start = self.pos;
        let text = self.quoted()?;
        text.parse().map_err(|_| {
            CompileError::parse(self.line, start as i32, format!("invalid {}: {}", what, text))
        })
    }

    fn temporary(&mut self) -> Result<u8, CompileError> {
        let start = self.pos;
        let slot: u8 = self.number("temporary index")?;
        if slot == 0 {
            return Err(CompileError::parse(
                self.line,
                start as i32,
                "temporary indices start at 1",
            ));
        }
        Ok(slot)
    }

    fn value(&mut self) -> Result<Value, CompileError> {
        self.eat_white();

        match self.advance() {
            Some('.') => Ok(Value::temp(self.temporary()?)),
            Some('$') => Ok(Value::variable(self.quoted()?)),
            Some('!') => Ok(Value::constant(self.quoted()?)),
            Some('?') => Ok(Value::identifier(self.quoted()?)),
            Some('b') => {
                let start = self.pos;
                match self.quoted()?.as_str() {
                    "0" => Ok(Value::literal(Literal::Bool(false))),
                    "1" => Ok(Value::literal(Literal::Bool(true))),
                    other => Err(CompileError::parse(
                        self.line,
                        start as i32,
                        format!("bool literal must be 0 or 1, found: {}", other),
                    )),
                }
            }
            Some('s') => Ok(Value::literal(Literal::Str(self.quoted()?))),
            Some('i') => Ok(Value::literal(Literal::Int(self.number("int literal")?))),
            Some('u') => Ok(Value::literal(Literal::Unsigned(
                self.number("unsigned literal")?,
            ))),
            Some('n') => Ok(Value::literal(Literal::Byte(self.number("byte literal")?))),
            Some('f') => Ok(Value::literal(Literal::Float(self.number("float literal")?))),
            Some('d') => Ok(Value::literal(Literal::Double(
                self.number("double literal")?,
            ))),
            Some('c') => {
                let start = self.pos;
                let code: u32 = self.number("char literal")?;
                let c = char::from_u32(code).ok_or_else(|| {
                    CompileError::parse(
                        self.line,
                        start as i32,
                        format!("invalid char code: {}", code),
                    )
                })?;
                Ok(Value::literal(Literal::Char(c)))
            }
            Some('k') => Err(self.error("nested instruction buffers cannot be read from text")),
            Some(c) => Err(self.error(format!("unknown value sigil: {}", c))),
            None => Err(self.error("expected a value, end of line encountered")),
        }
    }

    /// After a leading `."n"`: a stored call, a member read, or a plain
    /// save-to-temp.
    fn stored(&mut self) -> Result<Instruction, CompileError> {
        let slot = self.temporary()?;
        self.eat_white();
        let reference = self.assign_marker()?;
        self.eat_white();

        match self.peek() {
            Some('|') => {
                self.advance();
                let object = self.value()?;
                let member = self.value()?;

                let mut inst = Instruction::new(InstructionType::MemberToTemp);
                inst.store = slot;
                inst.reference = reference;
                inst.rhs = member;
                inst.parameters.push(object);
                Ok(inst)
            }
            // `f` alone could start a float literal; only a full call
            // marker selects the call form
            Some('f') | Some('m')
                if matches!(self.peek_at(1), Some('n') | Some('m')) =>
            {
                let mut inst = self.call()?;
                inst.store = slot;
                inst.reference = reference;
                Ok(inst)
            }
            _ => {
                let mut inst = Instruction::save_to_temp(slot, self.value()?);
                inst.reference = reference;
                Ok(inst)
            }
        }
    }

    /// `fn`/`fm`/`mn`/`mm`, then the callee value and its parameters.
    fn call(&mut self) -> Result<Instruction, CompileError> {
        let kind = match (self.advance(), self.advance()) {
            (Some('f'), Some('n')) => InstructionType::FunctionCall,
            (Some('f'), Some('m')) => InstructionType::MemberFunctionCall,
            (Some('m'), Some('n')) => InstructionType::MethodCall,
            (Some('m'), Some('m')) => InstructionType::MemberMethodCall,
            _ => return Err(self.error("expected a call marker: fn, fm, mn or mm")),
        };

        let mut inst = Instruction::new(kind);
        inst.name = self.value()?;

        loop {
            self.eat_white();
            if self.peek().is_none() {
                break;
            }
            inst.parameters.push(self.value()?);
        }

        Ok(inst)
    }

    /// After a leading `$`: a plain assignment or a member read into a
    /// variable.
    fn var_target(&mut self) -> Result<Instruction, CompileError> {
        let name = self.quoted()?;
        self.eat_white();
        let reference = self.assign_marker()?;
        self.eat_white();

        if self.peek() == Some('|') {
            self.advance();
            let object = self.value()?;
            let member = self.value()?;

            let mut inst = Instruction::new(InstructionType::MemberToVar);
            inst.name = Value::variable(name);
            inst.reference = reference;
            inst.rhs = member;
            inst.parameters.push(object);
            return Ok(inst);
        }

        let mut inst = Instruction::new(InstructionType::Assignment);
        inst.name = Value::variable(name);
        inst.reference = reference;
        inst.rhs = self.value()?;
        Ok(inst)
    }

    /// After a leading `|`: `|<object> <member>=<value>`.
    fn member_assignment(&mut self) -> Result<Instruction, CompileError> {
        let object = self.value()?;
        let member = self.value()?;
        let reference = self.assign_marker()?;

        let mut inst = Instruction::new(InstructionType::MemberAssignment);
        inst.name = member;
        inst.reference = reference;
        inst.rhs = self.value()?;
        inst.parameters.push(object);
        Ok(inst)
    }

    /// After a leading `j`: `ja"n"`, `jt"n"<value>` or `jf"n"<value>`.
    fn jump(&mut self) -> Result<Instruction, CompileError> {
        let kind = match self.advance() {
            Some('a') => InstructionType::Jump,
            Some('t') => InstructionType::JumpTrue,
            Some('f') => InstructionType::JumpFalse,
            _ => return Err(self.error("expected a jump marker: ja, jt or jf")),
        };

        let mut inst = Instruction::new(kind);
        inst.jump_offset = self.number("jump offset")?;
        if kind != InstructionType::Jump {
            inst.rhs = self.value()?;
        }
        Ok(inst)
    }

    /// After a leading `do`: the overload name and its parameter values.
    fn decl_overload(&mut self) -> Result<Instruction, CompileError> {
        let mut inst = Instruction::new(InstructionType::DeclOverload);
        inst.name = self.value()?;

        loop {
            self.eat_white();
            if self.peek().is_none() {
                break;
            }
            inst.parameters.push(self.value()?);
        }

        Ok(inst)
    }
}

/// Parse a whole intermediate text, one instruction per non-blank line.
pub fn parse_buffer(text: &str) -> Result<Vec<Instruction>, CompileError> {
    let mut out = Vec::new();
    for (n, line) in text.lines().enumerate() {
        if let Some(inst) = parse_line(line, n as i64 + 1)? {
            out.push(inst);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::bytecode::disasm::disassemble;

    fn parsed(line: &str) -> Instruction {
        parse_line(line, 1)
            .expect("parses")
            .expect("produces an instruction")
    }

    fn round_trips(inst: &Instruction) {
        let text = disassemble(inst);
        let back = parsed(&text);
        assert_eq!(&back, inst, "through {:?}", text);

        // the text form is stable under a second pass
        assert_eq!(disassemble(&back), text);
    }

    #[test]
    fn comments_and_blanks_produce_nothing() {
        assert_eq!(parse_line("", 1).expect("parses"), None);
        assert_eq!(parse_line("   \t ", 1).expect("parses"), None);
        assert_eq!(parse_line("# $\"x\"=i\"1\"", 1).expect("parses"), None);
    }

    #[test]
    fn assignment_lines() {
        let inst = parsed("$\"start\" = i\"4\"");
        assert_eq!(inst.kind, InstructionType::Assignment);
        assert_eq!(inst.name, Value::variable("start"));
        assert_eq!(inst.rhs, Value::literal(Literal::Int(4)));
        assert!(!inst.reference);

        let by_ref = parsed("$\"alias\":$\"target\"");
        assert!(by_ref.reference);
        assert_eq!(by_ref.rhs, Value::variable("target"));
    }

    #[test]
    fn stored_call_lines() {
        let inst = parsed(".\"1\"   = fms\"+\" i\"3\" $\"i\"");
        assert_eq!(inst.kind, InstructionType::MemberFunctionCall);
        assert_eq!(inst.store, 1);
        assert_eq!(inst.name, Value::string_literal("+"));
        assert_eq!(
            inst.parameters,
            vec![Value::literal(Literal::Int(3)), Value::variable("i")]
        );
    }

    #[test]
    fn parameters_need_no_spaces() {
        let inst = parsed("fns\"echo\" s\"Result\".\"1\"");
        assert_eq!(inst.kind, InstructionType::FunctionCall);
        assert_eq!(
            inst.parameters,
            vec![Value::string_literal("Result"), Value::temp(1)]
        );
    }

    #[test]
    fn every_representable_kind_round_trips() {
        let mut samples = Vec::new();

        let mut call = Instruction::new(InstructionType::FunctionCall);
        call.name = Value::identifier("echo");
        call.parameters.push(Value::string_literal("hi"));
        samples.push(call);

        let mut stored = Instruction::new(InstructionType::MemberFunctionCall);
        stored.name = Value::string_literal("+");
        stored.parameters.push(Value::temp(1));
        stored.parameters.push(Value::literal(Literal::Double(0.5)));
        stored.store = 2;
        samples.push(stored);

        let mut method = Instruction::new(InstructionType::MethodCall);
        method.name = Value::identifier("Show");
        samples.push(method);

        let mut member_method = Instruction::new(InstructionType::MemberMethodCall);
        member_method.name = Value::string_literal("Draw");
        member_method.parameters.push(Value::variable("win"));
        samples.push(member_method);

        samples.push(Instruction::assignment("x", Value::constant("Math:Pi")));

        let mut member_assign = Instruction::new(InstructionType::MemberAssignment);
        member_assign.name = Value::string_literal("Width");
        member_assign.rhs = Value::literal(Literal::Unsigned(800));
        member_assign.parameters.push(Value::variable("win"));
        samples.push(member_assign);

        let mut to_temp = Instruction::new(InstructionType::MemberToTemp);
        to_temp.store = 3;
        to_temp.rhs = Value::string_literal("Count");
        to_temp.parameters.push(Value::temp(2));
        samples.push(to_temp);

        let mut to_var = Instruction::new(InstructionType::MemberToVar);
        to_var.name = Value::variable("w");
        to_var.rhs = Value::string_literal("Width");
        to_var.parameters.push(Value::variable("win"));
        samples.push(to_var);

        samples.push(Instruction::save_to_temp(
            1,
            Value::literal(Literal::Char('A')),
        ));
        samples.push(Instruction::remove_temp(9));
        samples.push(Instruction::jump(-12));

        let mut jt = Instruction::jump_true(Value::literal(Literal::Bool(true)));
        jt.jump_offset = 4;
        samples.push(jt);

        let mut jf = Instruction::jump_false(Value::temp(1));
        jf.jump_offset = 2;
        samples.push(jf);

        for inst in &samples {
            round_trips(inst);
        }
    }

    #[test]
    fn escaped_strings_round_trip() {
        let inst = Instruction::assignment("s", Value::string_literal("say \"hi\"\\\n"));
        round_trips(&inst);
    }

    #[test]
    fn code_literals_are_rejected() {
        let err = parse_line("do?\"F\" b\"0\" s\"\" k\"3\"", 1).expect_err("code literal");
        assert!(err.to_string().contains("cannot be read"));
    }

    #[test]
    fn decl_overload_without_a_body_parses() {
        let inst = parsed("do?\"Grow\" b\"1\" ?\"Int\" $\"amount\" i\"1\"");
        assert_eq!(inst.kind, InstructionType::DeclOverload);
        assert_eq!(inst.name, Value::identifier("Grow"));
        assert_eq!(inst.parameters.len(), 4);
    }

    #[test]
    fn malformed_lines_report_position() {
        let err = parse_line("$\"x\" + i\"1\"", 7).expect_err("bad marker");
        match err {
            CompileError::ParseError { line, .. } => assert_eq!(line, 7),
            other => panic!("expected a parse error, got {:?}", other),
        }

        assert!(parse_line(".\"0\"=i\"1\"", 1).is_err(), "slot 0 is reserved");
        assert!(parse_line("$\"x\"=i\"1\" trailing", 1).is_err());
        assert!(parse_line("q\"x\"", 1).is_err());
    }

    #[test]
    fn buffer_parse_skips_comments_and_keeps_order() {
        let text = "# compute $var = 3 + $i\n\
                    .\"1\"   = fms\"+\" i\"3\" $\"i\"\n\
                    $\"var\" = .\"1\"\n\
                    x\"1\"\n";

        let list = parse_buffer(text).expect("parses");
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].kind, InstructionType::MemberFunctionCall);
        assert_eq!(list[1].kind, InstructionType::Assignment);
        assert_eq!(list[2].kind, InstructionType::RemoveTemp);
    }
}
