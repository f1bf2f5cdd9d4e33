use std::mem;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::bytecode::compile_error::CompileError;
use crate::bytecode::instruction::{Instruction, InstructionType};
use crate::lang::node::{AstNode, NodeKind};
use crate::lang::value::{Literal, Value};

// =============================================================================
// AstCompiler - one statement tree in, flat instructions out
// =============================================================================

/// One open control structure, tracked until its matching `end`.
///
/// Jump indices stored here are absolute positions into the output buffer;
/// they are converted to relative offsets when the structure closes and the
/// target becomes known.
enum KeywordScope {
    If {
        /// Pending branch exits. The last entry is the branch currently
        /// being compiled (its `JumpFalse`, or the skip `Jump` once an
        /// `elseif`/`else` replaced it); earlier entries are skip `Jump`s
        /// of finished branches.
        indices: Vec<usize>,
        else_passed: bool,
    },
    While {
        /// First instruction of the condition; `continue` and the closing
        /// backward jump land here.
        start: usize,
        /// Index of the condition's `JumpFalse`.
        condition_jump: usize,
        breaks: Vec<usize>,
        continues: Vec<usize>,
    },
    For {
        /// First instruction of the per-iteration header.
        start: usize,
        /// Index of the header's `JumpFalse`.
        condition_jump: usize,
        breaks: Vec<usize>,
        continues: Vec<usize>,
        /// Reserved slot holding the implicit element index.
        index_slot: u8,
        /// Reserved slot holding the evaluated collection.
        collection_slot: u8,
    },
    Function {
        is_method: bool,
        name: String,
        /// Declared return type; `None` means the function returns nothing.
        return_type: Option<String>,
        /// Pre-built parameter template values for the `DeclOverload`
        /// instruction: each parameter's name followed by its literal
        /// default and option values.
        templates: Vec<Value>,
        /// Statements between the declaration and its `end` compile into
        /// this buffer instead of the surrounding one.
        body: Vec<Instruction>,
    },
}

impl KeywordScope {
    fn keyword_name(&self) -> &'static str {
        match self {
            KeywordScope::If { .. } => "if",
            KeywordScope::While { .. } => "while",
            KeywordScope::For { .. } => "for",
            KeywordScope::Function { is_method: false, .. } => "function",
            KeywordScope::Function { is_method: true, .. } => "method",
        }
    }
}

/// Compiles statement trees into flat instruction sequences.
///
/// The compiler is stateful across statements: control structures opened by
/// one statement stay on an internal stack until a later statement closes
/// them, which is what allows line-by-line compilation. [`Self::is_ready`]
/// reports whether all opened structures have been closed.
pub struct AstCompiler {
    scopes: Vec<KeywordScope>,
    /// Lowest temp slot not owned by an enclosing control structure.
    /// Advanced while a `for` loop holds its two reserved slots.
    indstart: u8,
}

impl AstCompiler {
    pub fn new() -> Self {
        AstCompiler {
            scopes: Vec::new(),
            // slot 0 means "discard", usable slots start at 1
            indstart: 1,
        }
    }

    /// True when every opened control structure has been closed.
    pub fn is_ready(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Number of control structures still waiting for their `end`.
    pub fn open_scopes(&self) -> usize {
        self.scopes.len()
    }

    /// Compile one top-level statement, appending instructions to `list`.
    /// Returns the number of instructions produced.
    ///
    /// While a `function`/`method` declaration is open, statements compile
    /// into the declaration's own buffer; `list` only receives the
    /// `DeclOverload` once the declaration closes.
    pub fn compile(
        &mut self,
        tree: &AstNode,
        list: &mut Vec<Instruction>,
    ) -> Result<usize, CompileError> {
        let limit = if self.closes_innermost_function(tree) {
            self.scopes.len() - 1
        } else {
            self.scopes.len()
        };

        // a failed statement must not leave partial instructions behind,
        // the caller reports the error and keeps feeding statements
        match self.innermost_function_below(limit) {
            Some(pos) => {
                let mut body = self.take_function_body(pos)?;
                let before = body.len();
                let result = self.compile_statement(tree, &mut body);
                if result.is_err() {
                    body.truncate(before);
                }
                self.put_function_body(pos, body)?;
                result
            }
            None => {
                let before = list.len();
                let result = self.compile_statement(tree, list);
                if result.is_err() {
                    list.truncate(before);
                }
                result
            }
        }
    }

    fn compile_statement(
        &mut self,
        tree: &AstNode,
        list: &mut Vec<Instruction>,
    ) -> Result<usize, CompileError> {
        let start = list.len();

        // temporaries for this statement start above any reserved slots
        let mut tempind = self.indstart;

        match tree.kind {
            NodeKind::Assignment => {
                self.compile_assignment(tree, list, &mut tempind)?;
            }

            // result of a bare call statement is discarded
            NodeKind::FunctionCall | NodeKind::MethodCall => {
                compile_value(tree, list, &mut tempind, false, None)?;
            }

            NodeKind::Keyword => {
                if !self.compile_keyword(tree, list, &mut tempind)? {
                    // not a control keyword, call it as a plain function
                    let mut inst = Instruction::new(InstructionType::FunctionCall);
                    inst.name = Value::string_literal(&tree.text);
                    for leaf in &tree.leaves {
                        inst.parameters
                            .push(compile_value(leaf, list, &mut tempind, true, None)?);
                    }
                    list.push(inst);
                }
            }

            NodeKind::Empty => {}

            _ => return Err(CompileError::unhandled(tree)),
        }

        // release this statement's temporaries, highest first
        for slot in (self.indstart..tempind).rev() {
            list.push(Instruction::remove_temp(slot));
        }

        Ok(list.len() - start)
    }

    fn compile_assignment(
        &mut self,
        tree: &AstNode,
        list: &mut Vec<Instruction>,
        tempind: &mut u8,
    ) -> Result<(), CompileError> {
        self.compile_assignment_as(tree, list, tempind, false)
    }

    fn compile_assignment_as(
        &mut self,
        tree: &AstNode,
        list: &mut Vec<Instruction>,
        tempind: &mut u8,
        reference: bool,
    ) -> Result<(), CompileError> {
        if tree.leaves.len() != 2 {
            return Err(CompileError::internal("assignment requires two leaves"));
        }

        let target = &tree.leaves[0];
        let value = &tree.leaves[1];

        match target.kind {
            NodeKind::Identifier | NodeKind::Variable => {
                // member read into a variable has its own instruction,
                // saving a temp
                if value.kind == NodeKind::Member && !reference {
                    let mut inst = Instruction::new(InstructionType::MemberToVar);
                    inst.name = Value::variable(&target.text);
                    inst.rhs = Value::string_literal(&value.leaves[1].text);
                    inst.parameters.push(compile_value(
                        &value.leaves[0],
                        list,
                        tempind,
                        true,
                        None,
                    )?);
                    list.push(inst);
                    return Ok(());
                }

                let rhs = compile_value(value, list, tempind, true, None)?;

                let mut inst = Instruction::assignment(&target.text, rhs);
                inst.reference = reference;
                list.push(inst);
            }

            NodeKind::Member => {
                if target.leaves.len() != 2 {
                    return Err(CompileError::internal("member node requires two leaves"));
                }

                let rhs = compile_value(value, list, tempind, true, None)?;

                let mut writebacks = Vec::new();
                let mut inst = Instruction::new(InstructionType::MemberAssignment);
                inst.name = Value::string_literal(&target.leaves[1].text);
                inst.rhs = rhs;
                inst.reference = reference;
                inst.parameters.push(compile_value(
                    &target.leaves[0],
                    list,
                    tempind,
                    true,
                    Some(&mut writebacks),
                )?);
                list.push(inst);

                // execution retrieves the object, assigns the member, then
                // writes the object back outermost last
                for inst in writebacks.into_iter().rev() {
                    list.push(inst);
                }
            }

            NodeKind::Index => {
                if target.leaves.is_empty() {
                    return Err(CompileError::internal("index node requires an object"));
                }

                let mut writebacks = Vec::new();
                let mut inst = Instruction::new(InstructionType::MemberFunctionCall);
                inst.name = Value::string_literal("[]=");
                inst.parameters.push(compile_value(
                    &target.leaves[0],
                    list,
                    tempind,
                    true,
                    Some(&mut writebacks),
                )?);
                for index in &target.leaves[1..] {
                    inst.parameters
                        .push(compile_value(index, list, tempind, true, None)?);
                }
                inst.parameters
                    .push(compile_value(value, list, tempind, true, None)?);
                list.push(inst);

                for inst in writebacks.into_iter().rev() {
                    list.push(inst);
                }
            }

            _ => {
                return Err(CompileError::unhandled_with_hint(
                    target,
                    "only variables, members and indexed elements can be assigned to",
                ));
            }
        }

        Ok(())
    }

    /// Handle a control keyword; returns `Ok(false)` if the keyword is not
    /// a control structure and should be called as a function instead.
    fn compile_keyword(
        &mut self,
        tree: &AstNode,
        list: &mut Vec<Instruction>,
        tempind: &mut u8,
    ) -> Result<bool, CompileError> {
        let keyword = tree.text.to_ascii_lowercase();

        match keyword.as_str() {
            "if" => {
                let condition = single_condition(tree, "if")?;
                let rhs = compile_value(condition, list, tempind, true, None)?;

                trace!(index = list.len(), "open if");
                self.scopes.push(KeywordScope::If {
                    indices: vec![list.len()],
                    else_passed: false,
                });
                list.push(Instruction::jump_false(rhs));
            }

            "elseif" => {
                let condition = single_condition(tree, "elseif")?;

                // compile the new test into a side buffer first, so a bad
                // condition leaves the recorded branch indices untouched
                let mut test = Vec::new();
                let rhs = compile_value(condition, &mut test, tempind, true, None)?;

                let (indices, else_passed) = match self.scopes.last_mut() {
                    Some(KeywordScope::If {
                        indices,
                        else_passed,
                    }) => (indices, *else_passed),
                    _ => return Err(CompileError::flow("elseif", "no matching if")),
                };
                if else_passed {
                    return Err(CompileError::flow(
                        "elseif",
                        "must come before the else branch",
                    ));
                }

                // skip the remaining branches once this one ran
                list.push(Instruction::jump(0));

                // previous branch's test falls through to right after the
                // skip jump
                let previous = *indices
                    .last()
                    .ok_or_else(|| CompileError::internal("if scope with no branch index"))?;
                let target = list.len();
                *indices.last_mut().ok_or_else(|| {
                    CompileError::internal("if scope with no branch index")
                })? = target - 1;

                patch(list, previous, target);
                list.extend(test);

                if let Some(KeywordScope::If { indices, .. }) = self.scopes.last_mut() {
                    indices.push(list.len());
                }
                list.push(Instruction::jump_false(rhs));
            }

            "else" => {
                if !tree.leaves.is_empty() {
                    return Err(CompileError::too_many_parameters("else", 0));
                }

                let (indices, else_passed) = match self.scopes.last_mut() {
                    Some(KeywordScope::If {
                        indices,
                        else_passed,
                    }) => (indices, else_passed),
                    _ => return Err(CompileError::flow("else", "no matching if")),
                };
                if *else_passed {
                    return Err(CompileError::flow("else", "if already has an else branch"));
                }
                *else_passed = true;

                list.push(Instruction::jump(0));

                let previous = *indices
                    .last()
                    .ok_or_else(|| CompileError::internal("if scope with no branch index"))?;
                let target = list.len();
                patch(list, previous, target);
                *indices.last_mut().ok_or_else(|| {
                    CompileError::internal("if scope with no branch index")
                })? = target - 1;
            }

            "while" => {
                let condition = single_condition(tree, "while")?;

                // condition re-evaluates every iteration, so the loop starts
                // at its first instruction
                let start = list.len();
                let rhs = compile_value(condition, list, tempind, true, None)?;

                trace!(start, "open while");
                self.scopes.push(KeywordScope::While {
                    start,
                    condition_jump: list.len(),
                    breaks: Vec::new(),
                    continues: Vec::new(),
                });
                list.push(Instruction::jump_false(rhs));
            }

            "for" => {
                self.compile_for(tree, list, tempind)?;
            }

            "break" => {
                if !tree.leaves.is_empty() {
                    return Err(CompileError::too_many_parameters("break", 0));
                }
                let index = list.len();
                self.register_loop_exit("break", index)?;
                list.push(Instruction::jump(0));
            }

            "continue" => {
                if !tree.leaves.is_empty() {
                    return Err(CompileError::too_many_parameters("continue", 0));
                }
                let index = list.len();
                self.register_loop_continue("continue", index)?;
                list.push(Instruction::jump(0));
            }

            "const" => {
                let assignment = sugar_assignment(tree, "const")?;
                self.compile_assignment(assignment, list, tempind)?;

                let mut inst = Instruction::new(InstructionType::FunctionCall);
                inst.name = Value::string_literal("const");
                inst.parameters
                    .push(Value::variable(&assignment.leaves[0].text));
                list.push(inst);
            }

            "static" => {
                let assignment = sugar_assignment(tree, "static")?;

                // no plain assignment: the static function only sets the
                // variable the first time through
                let rhs = compile_value(&assignment.leaves[1], list, tempind, true, None)?;

                let mut inst = Instruction::new(InstructionType::FunctionCall);
                inst.name = Value::string_literal("static");
                inst.parameters
                    .push(Value::variable(&assignment.leaves[0].text));
                inst.parameters.push(rhs);
                list.push(inst);
            }

            "ref" => {
                let assignment = sugar_assignment(tree, "ref")?;
                self.compile_assignment_as(assignment, list, tempind, true)?;
            }

            "function" | "method" => {
                self.open_function(tree, keyword == "method")?;
            }

            "return" => {
                self.compile_return(tree, list, tempind)?;
            }

            "end" => {
                self.close_scope(tree, list, tempind)?;
            }

            _ => return Ok(false),
        }

        Ok(true)
    }

    /// `for` reserves two slots below the statement temp base for the
    /// implicit element index and the evaluated collection; they live until
    /// the loop's `end` and survive every statement release in between.
    fn compile_for(
        &mut self,
        tree: &AstNode,
        list: &mut Vec<Instruction>,
        tempind: &mut u8,
    ) -> Result<(), CompileError> {
        if tree.leaves.len() < 2 {
            return Err(CompileError::missing_parameter(
                "for",
                "a variable and a collection",
            ));
        }
        if tree.leaves.len() > 2 {
            return Err(CompileError::too_many_parameters("for", 2));
        }

        let variable = &tree.leaves[0];
        if !matches!(variable.kind, NodeKind::Identifier | NodeKind::Variable) {
            return Err(CompileError::unhandled_with_hint(
                variable,
                "the for loop variable must be a simple name",
            ));
        }

        let index_slot = self.indstart;
        let collection_slot = index_slot
            .checked_add(1)
            .ok_or(CompileError::TempOverflow { line: tree.line })?;
        let base = collection_slot
            .checked_add(1)
            .ok_or(CompileError::TempOverflow { line: tree.line })?;

        // statement temps start above the reserved pair; the base is not
        // committed to the compiler until the whole header compiles, so an
        // error below cannot strand the two slots with no end to free them
        *tempind = base;

        list.push(Instruction::save_to_temp(
            index_slot,
            Value::literal(Literal::Int(0)),
        ));

        let collection = compile_value(&tree.leaves[1], list, tempind, true, None)?;
        list.push(Instruction::save_to_temp(collection_slot, collection));

        // per-iteration header: index < collection.Count decides continuation
        let start = list.len();

        let count = alloc(tempind, tree.line)?;
        let mut read = Instruction::new(InstructionType::MemberToTemp);
        read.rhs = Value::string_literal("Count");
        read.parameters.push(Value::temp(collection_slot));
        read.store = count;
        list.push(read);

        let cmp = alloc(tempind, tree.line)?;
        let mut test = Instruction::new(InstructionType::MemberFunctionCall);
        test.name = Value::string_literal("<");
        test.parameters.push(Value::temp(index_slot));
        test.parameters.push(Value::temp(count));
        test.store = cmp;
        list.push(test);

        let condition_jump = list.len();
        list.push(Instruction::jump_false(Value::temp(cmp)));

        let element = alloc(tempind, tree.line)?;
        let mut fetch = Instruction::new(InstructionType::MemberFunctionCall);
        fetch.name = Value::string_literal("[]");
        fetch.parameters.push(Value::temp(collection_slot));
        fetch.parameters.push(Value::temp(index_slot));
        fetch.store = element;
        list.push(fetch);

        list.push(Instruction::assignment(
            &variable.text,
            Value::temp(element),
        ));

        trace!(start, index_slot, collection_slot, "open for");
        self.indstart = base;
        self.scopes.push(KeywordScope::For {
            start,
            condition_jump,
            breaks: Vec::new(),
            continues: Vec::new(),
            index_slot,
            collection_slot,
        });

        Ok(())
    }

    fn open_function(&mut self, tree: &AstNode, is_method: bool) -> Result<(), CompileError> {
        let what = if is_method { "method" } else { "function" };

        let name = tree
            .leaves
            .first()
            .filter(|n| n.kind == NodeKind::Identifier)
            .ok_or_else(|| CompileError::missing_parameter(what, "a name"))?;

        let return_type = match tree.leaves.get(1) {
            Some(node) if node.kind == NodeKind::Identifier => Some(node.text.clone()),
            Some(node) if node.kind == NodeKind::Empty => None,
            None => None,
            Some(node) => {
                return Err(CompileError::unhandled_with_hint(
                    node,
                    "the return type must be a type name or omitted",
                ));
            }
        };

        // parameter templates: a name value, then literal defaults/options.
        // names are variable-kind and payloads literal-kind, so the flat
        // sequence decodes without counts
        let mut templates = Vec::new();
        for param in tree.leaves.iter().skip(2) {
            if param.kind != NodeKind::Variable {
                return Err(CompileError::unhandled_with_hint(
                    param,
                    "parameter declarations must be simple names",
                ));
            }
            templates.push(Value::variable(&param.text));
            for extra in &param.leaves {
                match (&extra.kind, &extra.literal) {
                    (NodeKind::Literal, Some(lit)) => templates.push(Value::literal(lit.clone())),
                    _ => {
                        return Err(CompileError::unhandled_with_hint(
                            extra,
                            "parameter defaults and options must be literals",
                        ));
                    }
                }
            }
        }

        debug!(name = %name.text, is_method, "open declaration");
        self.scopes.push(KeywordScope::Function {
            is_method,
            name: name.text.clone(),
            return_type,
            templates,
            body: Vec::new(),
        });

        Ok(())
    }

    fn compile_return(
        &mut self,
        tree: &AstNode,
        list: &mut Vec<Instruction>,
        tempind: &mut u8,
    ) -> Result<(), CompileError> {
        if tree.leaves.len() > 1 {
            return Err(CompileError::too_many_parameters("return", 1));
        }

        let returns_value = self
            .scopes
            .iter()
            .rev()
            .find_map(|scope| match scope {
                KeywordScope::Function { return_type, .. } => Some(return_type.is_some()),
                _ => None,
            })
            .ok_or_else(|| CompileError::flow("return", "not inside a function or method"))?;

        if returns_value && tree.leaves.is_empty() {
            return Err(CompileError::flow(
                "return",
                "the enclosing declaration returns a value",
            ));
        }
        if !returns_value && !tree.leaves.is_empty() {
            return Err(CompileError::flow(
                "return",
                "the enclosing declaration returns nothing",
            ));
        }

        let mut inst = Instruction::new(InstructionType::FunctionCall);
        inst.name = Value::string_literal("return");
        if let Some(value) = tree.leaves.first() {
            inst.parameters
                .push(compile_value(value, list, tempind, true, None)?);
        }
        list.push(inst);

        Ok(())
    }

    fn close_scope(
        &mut self,
        tree: &AstNode,
        list: &mut Vec<Instruction>,
        tempind: &mut u8,
    ) -> Result<(), CompileError> {
        let scope = self
            .scopes
            .last()
            .ok_or_else(|| CompileError::flow("end", "no open keyword scope"))?;

        // `end if`, `end while`... must name the scope being closed
        if let Some(named) = tree.leaves.first() {
            if tree.leaves.len() > 1 {
                return Err(CompileError::too_many_parameters("end", 1));
            }
            if !named.text.eq_ignore_ascii_case(scope.keyword_name()) {
                return Err(CompileError::flow_with_hint(
                    "end",
                    format!("does not match the open {}", scope.keyword_name()),
                    format!("given keyword is {}", named.text),
                ));
            }
        }

        let scope = self
            .scopes
            .pop()
            .ok_or_else(|| CompileError::internal("scope stack emptied while closing"))?;

        match scope {
            KeywordScope::If { indices, .. } => {
                // every branch exit lands right after the structure
                let target = list.len();
                for index in indices {
                    trace!(index, target, "patch if exit");
                    patch(list, index, target);
                }
            }

            KeywordScope::While {
                start,
                condition_jump,
                breaks,
                continues,
            } => {
                let len = list.len();
                list.push(Instruction::jump(start as i32 - len as i32));

                let target = list.len();
                trace!(condition_jump, target, "patch while exit");
                patch(list, condition_jump, target);
                for index in breaks {
                    patch(list, index, target);
                }
                for index in continues {
                    patch(list, index, start);
                }
            }

            KeywordScope::For {
                start,
                condition_jump,
                breaks,
                continues,
                index_slot,
                collection_slot,
            } => {
                // increment, jump back, then free the reserved slots; exits
                // land on the frees
                let increment = list.len();

                let scratch = *tempind;
                let mut add = Instruction::new(InstructionType::MemberFunctionCall);
                add.name = Value::string_literal("+");
                add.parameters.push(Value::temp(index_slot));
                add.parameters.push(Value::literal(Literal::Int(1)));
                add.store = scratch;
                list.push(add);

                list.push(Instruction::save_to_temp(index_slot, Value::temp(scratch)));
                list.push(Instruction::remove_temp(scratch));

                let len = list.len();
                list.push(Instruction::jump(start as i32 - len as i32));

                let target = list.len();
                trace!(condition_jump, target, "patch for exit");
                patch(list, condition_jump, target);
                for index in breaks {
                    patch(list, index, target);
                }
                for index in continues {
                    patch(list, index, increment);
                }

                list.push(Instruction::remove_temp(collection_slot));
                list.push(Instruction::remove_temp(index_slot));

                self.indstart = index_slot;
                *tempind = self.indstart;
            }

            KeywordScope::Function {
                is_method,
                name,
                return_type,
                templates,
                body,
            } => {
                debug!(name = %name, instructions = body.len(), "close declaration");

                let mut inst = Instruction::new(InstructionType::DeclOverload);
                inst.name = Value::identifier(&name);
                inst.parameters.push(Value::literal(Literal::Bool(is_method)));
                inst.parameters.push(match return_type {
                    Some(ty) => Value::identifier(ty),
                    None => Value::string_literal(""),
                });
                inst.parameters
                    .push(Value::literal(Literal::Code(Rc::new(body))));
                inst.parameters.extend(templates);
                list.push(inst);
            }
        }

        Ok(())
    }

    fn register_loop_exit(&mut self, keyword: &str, index: usize) -> Result<(), CompileError> {
        for scope in self.scopes.iter_mut().rev() {
            match scope {
                KeywordScope::While { breaks, .. } | KeywordScope::For { breaks, .. } => {
                    breaks.push(index);
                    return Ok(());
                }
                // a loop outside the declaration compiles into a different
                // buffer, it cannot be targeted from inside
                KeywordScope::Function { .. } => break,
                _ => {}
            }
        }
        Err(CompileError::flow_with_hint(
            keyword,
            "not inside a loop",
            "break and continue only work inside while and for",
        ))
    }

    fn register_loop_continue(&mut self, keyword: &str, index: usize) -> Result<(), CompileError> {
        for scope in self.scopes.iter_mut().rev() {
            match scope {
                KeywordScope::While { continues, .. } | KeywordScope::For { continues, .. } => {
                    continues.push(index);
                    return Ok(());
                }
                KeywordScope::Function { .. } => break,
                _ => {}
            }
        }
        Err(CompileError::flow_with_hint(
            keyword,
            "not inside a loop",
            "break and continue only work inside while and for",
        ))
    }

    fn closes_innermost_function(&self, tree: &AstNode) -> bool {
        tree.kind == NodeKind::Keyword
            && tree.text.eq_ignore_ascii_case("end")
            && matches!(self.scopes.last(), Some(KeywordScope::Function { .. }))
    }

    fn innermost_function_below(&self, limit: usize) -> Option<usize> {
        self.scopes[..limit]
            .iter()
            .rposition(|scope| matches!(scope, KeywordScope::Function { .. }))
    }

    fn take_function_body(&mut self, pos: usize) -> Result<Vec<Instruction>, CompileError> {
        match self.scopes.get_mut(pos) {
            Some(KeywordScope::Function { body, .. }) => Ok(mem::take(body)),
            _ => Err(CompileError::internal("expected a declaration scope")),
        }
    }

    fn put_function_body(
        &mut self,
        pos: usize,
        replacement: Vec<Instruction>,
    ) -> Result<(), CompileError> {
        match self.scopes.get_mut(pos) {
            Some(KeywordScope::Function { body, .. }) => {
                *body = replacement;
                Ok(())
            }
            _ => Err(CompileError::internal("expected a declaration scope")),
        }
    }
}

impl Default for AstCompiler {
    fn default() -> Self {
        AstCompiler::new()
    }
}

/// Resolve a recorded forward jump now that its target is known.
fn patch(list: &mut [Instruction], index: usize, target: usize) {
    list[index].jump_offset = target as i32 - index as i32;
}

fn alloc(tempind: &mut u8, line: i32) -> Result<u8, CompileError> {
    let slot = *tempind;
    *tempind = tempind
        .checked_add(1)
        .ok_or(CompileError::TempOverflow { line })?;
    Ok(slot)
}

fn single_condition<'t>(tree: &'t AstNode, keyword: &str) -> Result<&'t AstNode, CompileError> {
    match tree.leaves.len() {
        0 => Err(CompileError::missing_parameter(keyword, "a condition")),
        1 => Ok(&tree.leaves[0]),
        _ => Err(CompileError::too_many_parameters(keyword, 1)),
    }
}

/// `const`/`static`/`ref` wrap an assignment to a simple variable.
fn sugar_assignment<'t>(tree: &'t AstNode, keyword: &str) -> Result<&'t AstNode, CompileError> {
    let assignment = match tree.leaves.as_slice() {
        [node] if node.kind == NodeKind::Assignment => node,
        [_] => {
            return Err(CompileError::unhandled_with_hint(
                tree,
                format!("{} expects an assignment", keyword),
            ));
        }
        [] => return Err(CompileError::missing_parameter(keyword, "an assignment")),
        _ => return Err(CompileError::too_many_parameters(keyword, 1)),
    };

    if assignment.leaves.len() != 2
        || !matches!(
            assignment.leaves[0].kind,
            NodeKind::Identifier | NodeKind::Variable
        )
    {
        return Err(CompileError::unhandled_with_hint(
            &assignment.leaves[0],
            format!("{} can only be applied to simple variables", keyword),
        ));
    }

    Ok(assignment)
}

/// Lower a value-producing node, emitting helper instructions as needed and
/// returning the value to reference it by.
///
/// `generate_output` suppresses result storage for bare call statements.
/// `writeback` collects the instructions needed to store composed objects
/// back after something may have modified them; callers append them after
/// the modifying instruction, in reverse order.
pub fn compile_value(
    tree: &AstNode,
    list: &mut Vec<Instruction>,
    tempind: &mut u8,
    generate_output: bool,
    mut writeback: Option<&mut Vec<Instruction>>,
) -> Result<Value, CompileError> {
    match tree.kind {
        NodeKind::Literal => {
            let lit = tree
                .literal
                .clone()
                .ok_or_else(|| CompileError::internal("literal node without a value"))?;
            Ok(Value::literal(lit))
        }

        NodeKind::Identifier => Ok(Value::identifier(&tree.text)),
        NodeKind::Variable => Ok(Value::variable(&tree.text)),
        NodeKind::Constant => Ok(Value::constant(&tree.text)),

        NodeKind::Operator => {
            if tree.leaves.len() != 2 {
                return Err(CompileError::internal("operators require two operands"));
            }

            let mut inst = Instruction::new(InstructionType::MemberFunctionCall);
            inst.name = Value::string_literal(&tree.text);
            inst.parameters
                .push(compile_value(&tree.leaves[0], list, tempind, true, None)?);
            inst.parameters
                .push(compile_value(&tree.leaves[1], list, tempind, true, None)?);

            let slot = alloc(tempind, tree.line)?;
            inst.store = slot;
            list.push(inst);

            Ok(Value::temp(slot))
        }

        NodeKind::FunctionCall | NodeKind::MethodCall => {
            let callee = tree
                .leaves
                .first()
                .ok_or_else(|| CompileError::internal("call node without a callee"))?;

            let mut inst;
            let mut writebacks = Vec::new();

            match callee.kind {
                NodeKind::Identifier => {
                    inst = Instruction::new(if tree.kind == NodeKind::MethodCall {
                        InstructionType::MethodCall
                    } else {
                        InstructionType::FunctionCall
                    });
                    inst.name = Value::identifier(&callee.text);
                }
                NodeKind::Member => {
                    if callee.leaves.len() != 2 {
                        return Err(CompileError::internal("member node requires two leaves"));
                    }

                    inst = Instruction::new(if tree.kind == NodeKind::MethodCall {
                        InstructionType::MemberMethodCall
                    } else {
                        InstructionType::MemberFunctionCall
                    });
                    inst.name = Value::string_literal(&callee.leaves[1].text);

                    // the object is the first parameter; it may need writing
                    // back since the call can modify it
                    inst.parameters.push(compile_value(
                        &callee.leaves[0],
                        list,
                        tempind,
                        true,
                        Some(&mut writebacks),
                    )?);
                }
                _ => {
                    return Err(CompileError::unhandled_with_hint(
                        callee,
                        "only names and members can be called",
                    ));
                }
            }

            for arg in &tree.leaves[1..] {
                inst.parameters
                    .push(compile_value(arg, list, tempind, true, None)?);
            }

            let slot = if generate_output {
                alloc(tempind, tree.line)?
            } else {
                0
            };
            inst.store = slot;
            list.push(inst);

            for inst in writebacks.into_iter().rev() {
                list.push(inst);
            }

            Ok(Value::temp(slot))
        }

        NodeKind::Construct => {
            // construction is a member function of the type object
            let mut inst = Instruction::new(InstructionType::MemberFunctionCall);
            inst.name = Value::string_literal("{}");
            for leaf in &tree.leaves {
                inst.parameters
                    .push(compile_value(leaf, list, tempind, true, None)?);
            }

            let slot = alloc(tempind, tree.line)?;
            inst.store = slot;
            list.push(inst);

            Ok(Value::temp(slot))
        }

        NodeKind::Index => {
            let mut inst = Instruction::new(InstructionType::MemberFunctionCall);
            inst.name = Value::string_literal("[]");
            for leaf in &tree.leaves {
                inst.parameters
                    .push(compile_value(leaf, list, tempind, true, None)?);
            }

            let slot = alloc(tempind, tree.line)?;
            inst.store = slot;
            list.push(inst);

            Ok(Value::temp(slot))
        }

        NodeKind::Member => {
            if tree.leaves.len() != 2 {
                return Err(CompileError::internal("member node requires two leaves"));
            }

            let object = compile_value(
                &tree.leaves[0],
                list,
                tempind,
                true,
                writeback.as_deref_mut(),
            )?;

            let mut inst = Instruction::new(InstructionType::MemberToTemp);
            inst.rhs = Value::string_literal(&tree.leaves[1].text);
            inst.parameters.push(object.clone());

            let slot = alloc(tempind, tree.line)?;
            inst.store = slot;
            list.push(inst);

            if let Some(writeback) = writeback {
                let mut back = Instruction::new(InstructionType::MemberAssignment);
                back.name = Value::string_literal(&tree.leaves[1].text);
                back.rhs = Value::temp(slot);
                back.parameters.push(object);
                writeback.push(back);
            }

            Ok(Value::temp(slot))
        }

        _ => Err(CompileError::unhandled(tree)),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::lang::node::AstNode;
    use crate::lang::value::Literal;

    fn compile_all(statements: &[AstNode]) -> Vec<Instruction> {
        let mut compiler = AstCompiler::new();
        let mut list = Vec::new();
        for statement in statements {
            compiler.compile(statement, &mut list).expect("compiles");
        }
        assert!(compiler.is_ready(), "unclosed keyword scope");
        list
    }

    fn kw(name: &str, leaves: Vec<AstNode>) -> AstNode {
        AstNode::keyword(name, leaves)
    }

    fn lit_bool(b: bool) -> AstNode {
        AstNode::literal(Literal::Bool(b))
    }

    fn lit_int(n: i32) -> AstNode {
        AstNode::literal(Literal::Int(n))
    }

    fn resolved_target(list: &[Instruction], index: usize) -> usize {
        assert!(list[index].kind.is_jump(), "{:?} is not a jump", list[index]);
        (index as i32 + list[index].jump_offset) as usize
    }

    #[test]
    fn if_true_end_is_one_jump_false_skipping_one() {
        let list = compile_all(&[kw("if", vec![lit_bool(true)]), kw("end", vec![])]);

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].kind, InstructionType::JumpFalse);
        assert_eq!(list[0].jump_offset, 1);
        assert_eq!(list[0].rhs, Value::literal(Literal::Bool(true)));
    }

    #[test]
    fn while_false_end_is_test_and_backward_jump() {
        let list = compile_all(&[kw("while", vec![lit_bool(false)]), kw("end", vec![])]);

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].kind, InstructionType::JumpFalse);
        assert_eq!(list[0].jump_offset, 2);
        assert_eq!(list[1].kind, InstructionType::Jump);
        assert_eq!(list[1].jump_offset, -1);
    }

    #[test]
    fn if_elseif_else_exits_are_monotonic_and_land_after_end() {
        let assign = |name: &str, n| {
            AstNode::assignment(AstNode::variable(name), lit_int(n))
        };

        let list = compile_all(&[
            kw("if", vec![lit_bool(true)]),
            assign("a", 1),
            kw("elseif", vec![lit_bool(false)]),
            assign("a", 2),
            kw("else", vec![]),
            assign("a", 3),
            kw("end", vec![]),
        ]);

        let end = list.len();
        let tests: Vec<usize> = list
            .iter()
            .enumerate()
            .filter(|(_, i)| i.kind == InstructionType::JumpFalse)
            .map(|(n, _)| n)
            .collect();
        let skips: Vec<usize> = list
            .iter()
            .enumerate()
            .filter(|(_, i)| i.kind == InstructionType::Jump)
            .map(|(n, _)| n)
            .collect();

        // one test per condition, one skip per finished branch
        assert_eq!(tests.len(), 2);
        assert_eq!(skips.len(), 2);

        // branch tests fall through in source order
        let mut previous = 0;
        for &index in &tests {
            let target = resolved_target(&list, index);
            assert!(target >= previous, "test targets must be non-decreasing");
            previous = target;

            // each test lands right after the next branch's skip jump
            assert_eq!(list[target - 1].kind, InstructionType::Jump);
        }

        // every taken branch exits past the whole structure
        for &index in &skips {
            assert_eq!(resolved_target(&list, index), end);
        }
    }

    #[test]
    fn break_exits_and_continue_restarts_the_loop() {
        let list = compile_all(&[
            kw("while", vec![lit_bool(true)]),
            kw("break", vec![]),
            kw("continue", vec![]),
            kw("end", vec![]),
        ]);

        // [0] JumpFalse, [1] break Jump, [2] continue Jump, [3] back Jump
        assert_eq!(list.len(), 4);
        assert_eq!(resolved_target(&list, 1), 4, "break lands after end");
        assert_eq!(resolved_target(&list, 2), 0, "continue lands on the test");
        assert_eq!(resolved_target(&list, 3), 0, "loop jumps back to the test");
    }

    #[test]
    fn while_condition_reevaluates_each_iteration() {
        let condition = AstNode::operator("<", AstNode::variable("i"), lit_int(10));
        let list = compile_all(&[kw("while", vec![condition]), kw("end", vec![])]);

        // the backward jump must land on the condition computation, not on
        // the JumpFalse
        assert_eq!(list[0].kind, InstructionType::MemberFunctionCall);
        let back = list.len() - 1;
        assert_eq!(resolved_target(&list, back), 0);
    }

    #[test]
    fn statement_temporaries_are_released_in_reverse() {
        let tree = AstNode::assignment(
            AstNode::variable("x"),
            AstNode::operator(
                "+",
                AstNode::operator("*", lit_int(2), lit_int(3)),
                lit_int(4),
            ),
        );

        let list = compile_all(&[tree]);

        // mul -> t1, add -> t2, assignment, then x"2" x"1"
        assert_eq!(list.len(), 5);
        assert_eq!(list[0].store, 1);
        assert_eq!(list[1].store, 2);
        assert_eq!(list[2].kind, InstructionType::Assignment);
        assert_eq!(list[3], Instruction::remove_temp(2));
        assert_eq!(list[4], Instruction::remove_temp(1));
    }

    #[test]
    fn random_expressions_balance_their_temp_slots() {
        // small deterministic generator, no external dependency needed
        let mut state: u64 = 0x2545f491;
        let mut next = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 33) as u32
        };

        fn build(depth: u32, next: &mut impl FnMut() -> u32) -> AstNode {
            if depth == 0 || next() % 3 == 0 {
                return AstNode::literal(Literal::Int((next() % 100) as i32));
            }
            let ops = ["+", "-", "*", "/"];
            let op = ops[(next() % 4) as usize];
            AstNode::operator(op, build(depth - 1, next), build(depth - 1, next))
        }

        for _ in 0..1000 {
            let tree = AstNode::assignment(AstNode::variable("x"), build(4, &mut next));

            let mut compiler = AstCompiler::new();
            let mut list = Vec::new();
            compiler.compile(&tree, &mut list).expect("compiles");

            let stored: Vec<u8> = list
                .iter()
                .filter(|i| {
                    i.store > 0 && i.kind != InstructionType::RemoveTemp
                })
                .map(|i| i.store)
                .collect();
            let mut removed: Vec<u8> = list
                .iter()
                .filter(|i| i.kind == InstructionType::RemoveTemp)
                .map(|i| i.store)
                .collect();

            let mut expected = stored.clone();
            expected.sort_unstable();
            removed.sort_unstable();
            assert_eq!(removed, expected, "every stored slot is released once");
        }
    }

    #[test]
    fn for_reserves_two_slots_and_frees_them_on_exit() {
        let list = compile_all(&[
            kw("for", vec![AstNode::variable("item"), AstNode::variable("coll")]),
            kw("end", vec![]),
        ]);

        // init: index slot then collection slot
        assert_eq!(list[0], Instruction::save_to_temp(1, Value::literal(Literal::Int(0))));
        assert_eq!(list[1], Instruction::save_to_temp(2, Value::variable("coll")));

        // header reads Count, compares, tests
        assert_eq!(list[2].kind, InstructionType::MemberToTemp);
        assert_eq!(list[2].rhs, Value::string_literal("Count"));
        assert_eq!(list[3].name, Value::string_literal("<"));
        assert_eq!(list[4].kind, InstructionType::JumpFalse);

        // loop exit lands on the frees of the reserved slots
        let exit = resolved_target(&list, 4);
        assert_eq!(list[exit], Instruction::remove_temp(2));
        assert_eq!(list[exit + 1], Instruction::remove_temp(1));
        assert_eq!(exit + 2, list.len());

        // element fetch and loop variable assignment
        assert_eq!(list[5].name, Value::string_literal("[]"));
        assert_eq!(list[6].kind, InstructionType::Assignment);
        assert_eq!(list[6].name, Value::variable("item"));
    }

    #[test]
    fn continue_in_for_lands_on_the_increment() {
        let list = compile_all(&[
            kw("for", vec![AstNode::variable("item"), AstNode::variable("coll")]),
            kw("continue", vec![]),
            kw("end", vec![]),
        ]);

        let continue_jump = 10;
        assert_eq!(list[continue_jump].kind, InstructionType::Jump);

        let target = resolved_target(&list, continue_jump);
        assert_eq!(list[target].name, Value::string_literal("+"));
        assert_eq!(list[target + 1].kind, InstructionType::SaveToTemp);
    }

    #[test]
    fn statement_temps_inside_for_stay_above_the_reserved_slots() {
        let statements = [
            kw("for", vec![AstNode::variable("item"), AstNode::variable("coll")]),
            AstNode::assignment(
                AstNode::variable("x"),
                AstNode::operator("+", AstNode::variable("item"), lit_int(1)),
            ),
            kw("end", vec![]),
        ];

        let mut compiler = AstCompiler::new();
        let mut list = Vec::new();
        compiler.compile(&statements[0], &mut list).expect("compiles");

        let mark = list.len();
        compiler.compile(&statements[1], &mut list).expect("compiles");

        // the addition may not touch slots 1 and 2
        for inst in &list[mark..] {
            if inst.store > 0 {
                assert!(inst.store > 2, "slot {} collides with the loop", inst.store);
            }
        }

        compiler.compile(&statements[2], &mut list).expect("compiles");
        assert!(compiler.is_ready());
    }

    #[test]
    fn failed_for_header_releases_its_reserved_slots() {
        let mut compiler = AstCompiler::new();
        let mut list = Vec::new();

        let bad = kw("for", vec![AstNode::variable("item"), AstNode::empty()]);
        compiler
            .compile(&bad, &mut list)
            .expect_err("the collection does not compile");
        assert!(list.is_empty(), "a failed statement leaves nothing behind");

        // the next statement allocates from slot 1 again, nothing stranded
        let tree = AstNode::assignment(
            AstNode::variable("x"),
            AstNode::operator("+", lit_int(1), lit_int(2)),
        );
        compiler.compile(&tree, &mut list).expect("compiles");
        assert_eq!(list[0].store, 1);
        assert_eq!(list.last(), Some(&Instruction::remove_temp(1)));
        assert!(compiler.is_ready());
    }

    #[test]
    fn function_declaration_emits_decl_overload_with_body() {
        let mut param = AstNode::variable("amount");
        param.leaves.push(lit_int(1));

        let list = compile_all(&[
            kw(
                "function",
                vec![AstNode::identifier("Grow"), AstNode::identifier("Int"), param],
            ),
            AstNode::assignment(
                AstNode::variable("total"),
                AstNode::operator("+", AstNode::variable("total"), AstNode::variable("amount")),
            ),
            kw("return", vec![AstNode::variable("total")]),
            kw("end", vec![]),
        ]);

        // everything folds into one DeclOverload
        assert_eq!(list.len(), 1);
        let decl = &list[0];
        assert_eq!(decl.kind, InstructionType::DeclOverload);
        assert_eq!(decl.name, Value::identifier("Grow"));
        assert_eq!(decl.parameters[0], Value::literal(Literal::Bool(false)));
        assert_eq!(decl.parameters[1], Value::identifier("Int"));

        let body = match &decl.parameters[2] {
            Value::Literal(Literal::Code(code)) => code,
            other => panic!("expected a code literal, got {:?}", other),
        };
        assert!(!body.is_empty());
        assert_eq!(
            body.last().map(|i| i.name.clone()),
            Some(Value::string_literal("return"))
        );
        assert!(body.iter().any(|i| i.kind == InstructionType::RemoveTemp));

        // parameter template: name then default
        assert_eq!(decl.parameters[3], Value::variable("amount"));
        assert_eq!(decl.parameters[4], Value::literal(Literal::Int(1)));
    }

    #[test]
    fn return_arity_is_checked_against_the_declaration() {
        let mut compiler = AstCompiler::new();
        let mut list = Vec::new();

        compiler
            .compile(
                &kw("function", vec![AstNode::identifier("Noop"), AstNode::empty()]),
                &mut list,
            )
            .expect("compiles");

        let err = compiler
            .compile(&kw("return", vec![lit_int(1)]), &mut list)
            .expect_err("value return from a void function");
        assert!(matches!(err, CompileError::FlowError { .. }));
    }

    #[test]
    fn failed_statement_does_not_leak_into_the_function_body() {
        let mut compiler = AstCompiler::new();
        let mut list = Vec::new();

        compiler
            .compile(
                &kw("function", vec![AstNode::identifier("Calc"), AstNode::empty()]),
                &mut list,
            )
            .expect("compiles");

        // the multiply emits before the bad operand is reached
        let bad = AstNode::assignment(
            AstNode::variable("x"),
            AstNode::operator(
                "+",
                AstNode::operator("*", lit_int(2), lit_int(3)),
                AstNode::empty(),
            ),
        );
        compiler.compile(&bad, &mut list).expect_err("bad operand");

        compiler
            .compile(
                &AstNode::assignment(AstNode::variable("x"), lit_int(1)),
                &mut list,
            )
            .expect("compiles");
        compiler.compile(&kw("end", vec![]), &mut list).expect("compiles");

        let body = match &list[0].parameters[2] {
            Value::Literal(Literal::Code(code)) => code,
            other => panic!("expected a code literal, got {:?}", other),
        };
        assert_eq!(body.len(), 1);
        assert_eq!(body[0].kind, InstructionType::Assignment);
    }

    #[test]
    fn break_does_not_escape_a_function_body() {
        let mut compiler = AstCompiler::new();
        let mut list = Vec::new();

        compiler
            .compile(&kw("while", vec![lit_bool(true)]), &mut list)
            .expect("compiles");
        compiler
            .compile(
                &kw("function", vec![AstNode::identifier("F"), AstNode::empty()]),
                &mut list,
            )
            .expect("compiles");

        let err = compiler
            .compile(&kw("break", vec![]), &mut list)
            .expect_err("break inside a declaration cannot target the outer loop");
        assert!(matches!(err, CompileError::FlowError { .. }));
    }

    #[test]
    fn const_compiles_assignment_then_marks_the_variable() {
        let assignment = AstNode::assignment(AstNode::variable("x"), lit_int(5));
        let list = compile_all(&[kw("const", vec![assignment])]);

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].kind, InstructionType::Assignment);
        assert_eq!(list[1].kind, InstructionType::FunctionCall);
        assert_eq!(list[1].name, Value::string_literal("const"));
        assert_eq!(list[1].parameters, vec![Value::variable("x")]);
    }

    #[test]
    fn static_skips_the_plain_assignment() {
        let assignment = AstNode::assignment(AstNode::variable("x"), lit_int(5));
        let list = compile_all(&[kw("static", vec![assignment])]);

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].kind, InstructionType::FunctionCall);
        assert_eq!(list[0].name, Value::string_literal("static"));
        assert_eq!(
            list[0].parameters,
            vec![Value::variable("x"), Value::literal(Literal::Int(5))]
        );
    }

    #[test]
    fn ref_sets_the_reference_flag() {
        let assignment = AstNode::assignment(AstNode::variable("x"), AstNode::variable("y"));
        let list = compile_all(&[kw("ref", vec![assignment])]);

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].kind, InstructionType::Assignment);
        assert!(list[0].reference);
    }

    #[test]
    fn member_read_into_variable_uses_member_to_var() {
        let tree = AstNode::assignment(
            AstNode::variable("x"),
            AstNode::member(AstNode::variable("obj"), AstNode::identifier("Width")),
        );
        let list = compile_all(&[tree]);

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].kind, InstructionType::MemberToVar);
        assert_eq!(list[0].name, Value::variable("x"));
        assert_eq!(list[0].rhs, Value::string_literal("Width"));
        assert_eq!(list[0].parameters, vec![Value::variable("obj")]);
    }

    #[test]
    fn member_call_receiver_gets_written_back() {
        // pos.Offset(1) where pos is read out of a member itself:
        // win.Position.Offset(1) must write win.Position back afterwards
        let callee = AstNode::member(
            AstNode::member(AstNode::variable("win"), AstNode::identifier("Position")),
            AstNode::identifier("Offset"),
        );
        let tree = AstNode::call(callee, vec![lit_int(1)]);

        let mut compiler = AstCompiler::new();
        let mut list = Vec::new();
        compiler.compile(&tree, &mut list).expect("compiles");

        // read member, call, write member back, then releases
        assert_eq!(list[0].kind, InstructionType::MemberToTemp);
        assert_eq!(list[1].kind, InstructionType::MemberFunctionCall);
        assert_eq!(list[1].name, Value::string_literal("Offset"));
        assert_eq!(list[2].kind, InstructionType::MemberAssignment);
        assert_eq!(list[2].name, Value::string_literal("Position"));
    }

    #[test]
    fn unknown_keyword_falls_back_to_a_function_call() {
        let list = compile_all(&[kw("echo", vec![lit_int(42)])]);

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].kind, InstructionType::FunctionCall);
        assert_eq!(list[0].name, Value::string_literal("echo"));
        assert_eq!(list[0].store, 0);
    }

    #[test]
    fn flow_errors_for_malformed_nesting() {
        let mut compiler = AstCompiler::new();
        let mut list = Vec::new();

        let err = compiler
            .compile(&kw("else", vec![]), &mut list)
            .expect_err("else without if");
        assert!(matches!(err, CompileError::FlowError { .. }));

        let err = compiler
            .compile(&kw("end", vec![]), &mut list)
            .expect_err("end without a scope");
        assert!(matches!(err, CompileError::FlowError { .. }));

        compiler
            .compile(&kw("while", vec![lit_bool(true)]), &mut list)
            .expect("compiles");
        let err = compiler
            .compile(&kw("end", vec![AstNode::identifier("if")]), &mut list)
            .expect_err("end naming the wrong keyword");
        assert!(matches!(err, CompileError::FlowError { .. }));
    }

    #[test]
    fn condition_arity_is_checked() {
        let mut compiler = AstCompiler::new();
        let mut list = Vec::new();

        let err = compiler
            .compile(&kw("if", vec![]), &mut list)
            .expect_err("if without a condition");
        assert!(matches!(err, CompileError::MissingParameter { .. }));

        let err = compiler
            .compile(&kw("while", vec![lit_bool(true), lit_bool(false)]), &mut list)
            .expect_err("while with two conditions");
        assert!(matches!(err, CompileError::TooManyParameters { .. }));
    }

    #[test]
    fn method_call_statement_discards_nothing_to_a_temp() {
        let tree = AstNode::method_call(AstNode::identifier("Show"), vec![lit_int(3)]);
        let list = compile_all(&[tree]);

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].kind, InstructionType::MethodCall);
        assert_eq!(list[0].store, 0);
    }
}
