//! Lazily compiled instruction stores and their running instances.
//!
//! A [`Scope`] owns source lines and compiles them to instructions on
//! demand; a [`ScopeInstance`] is one execution of a scope, holding the
//! current line and local variables. Several instances can walk the same
//! scope at different positions.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use crate::bytecode::compile::AstCompiler;
use crate::bytecode::compile_error::CompileError;
use crate::bytecode::instruction::Instruction;
use crate::bytecode::intermediate;
use crate::lang::node::AstNode;
use crate::reflect::data::{Data, Variable};
use crate::runtime::input::{Dialect, InputProvider};

// =============================================================================
// Source markers
// =============================================================================

/// A resumable position: which instance, which line. The default marker is
/// invalid and never matches a live instance.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceMarker {
    source: usize,
    line: usize,
}

impl SourceMarker {
    pub fn is_valid(&self) -> bool {
        self.source != 0
    }

    pub fn line(&self) -> usize {
        self.line
    }
}

// =============================================================================
// Front-ends
// =============================================================================

/// Turns physical source lines into instructions. A front-end may buffer
/// across lines (open blocks); `finalize` runs when input is exhausted.
pub trait Frontend {
    /// Compile one line, appending instructions to `out`. Returns how many
    /// instructions were appended.
    fn compile(
        &mut self,
        line: &str,
        physical: i64,
        out: &mut Vec<Instruction>,
    ) -> Result<usize, CompileError>;

    /// Flush buffered state at end of input.
    fn finalize(&mut self, out: &mut Vec<Instruction>) -> Result<usize, CompileError>;

    /// Whether every multi-line construct is closed.
    fn is_ready(&self) -> bool;
}

/// Front-end for the intermediate dialect. Each line is one instruction at
/// most, so there is nothing to buffer.
#[derive(Default)]
pub struct IntermediateFrontend;

impl Frontend for IntermediateFrontend {
    fn compile(
        &mut self,
        line: &str,
        physical: i64,
        out: &mut Vec<Instruction>,
    ) -> Result<usize, CompileError> {
        match intermediate::parse_line(line, physical)? {
            Some(instruction) => {
                out.push(instruction);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn finalize(&mut self, _out: &mut Vec<Instruction>) -> Result<usize, CompileError> {
        Ok(0)
    }

    fn is_ready(&self) -> bool {
        true
    }
}

/// Parses one line of the programming dialect into a statement tree, or
/// `None` for blank and comment lines.
pub type ParseFn = Box<dyn FnMut(&str, i64) -> Result<Option<AstNode>, CompileError>>;

/// Front-end for the programming dialect. The host supplies the statement
/// parser; compilation to instructions goes through [`AstCompiler`], which
/// buffers function bodies across lines.
pub struct ParserFrontend {
    parse: ParseFn,
    compiler: AstCompiler,
}

impl ParserFrontend {
    pub fn new(parse: ParseFn) -> ParserFrontend {
        ParserFrontend {
            parse,
            compiler: AstCompiler::new(),
        }
    }
}

impl Frontend for ParserFrontend {
    fn compile(
        &mut self,
        line: &str,
        physical: i64,
        out: &mut Vec<Instruction>,
    ) -> Result<usize, CompileError> {
        match (self.parse)(line, physical)? {
            Some(tree) => self.compiler.compile(&tree, out),
            None => Ok(0),
        }
    }

    fn finalize(&mut self, _out: &mut Vec<Instruction>) -> Result<usize, CompileError> {
        if self.compiler.is_ready() {
            Ok(0)
        } else {
            Err(CompileError::flow_with_hint(
                "end",
                format!(
                    "input ended with {} block(s) still open",
                    self.compiler.open_scopes()
                ),
                "close every if, while, for, function and method with end",
            ))
        }
    }

    fn is_ready(&self) -> bool {
        self.compiler.is_ready()
    }
}

/// The front-ends a scope can switch between with `#!` directives.
struct Frontends {
    active: Dialect,
    intermediate: IntermediateFrontend,
    programming: Option<Box<dyn Frontend>>,
}

impl Frontends {
    fn active_mut(&mut self, physical: i64) -> Result<&mut dyn Frontend, CompileError> {
        match self.active {
            Dialect::Intermediate => Ok(&mut self.intermediate),
            Dialect::Programming | Dialect::Console => match self.programming.as_deref_mut() {
                Some(frontend) => Ok(frontend),
                None => Err(CompileError::parse(
                    physical,
                    0,
                    "no statement parser is installed for this source",
                )),
            },
            Dialect::Binary => Err(CompileError::parse(
                physical,
                0,
                "binary sources are not line based",
            )),
        }
    }
}

// =============================================================================
// Scope
// =============================================================================

/// A named, lazily compiled instruction store. Lines are pulled from the
/// input provider and compiled only when an instruction past the ready
/// region is requested.
///
/// Front-ends compile straight into the scope's instruction buffer, so a
/// keyword structure spanning several physical lines back-patches its jump
/// targets in place. `physicals` runs parallel to `instructions` and maps
/// each one back to its physical source line.
pub struct Scope {
    name: String,
    terminal: bool,
    parent: Option<Rc<Scope>>,
    instructions: RefCell<Vec<Instruction>>,
    physicals: RefCell<Vec<i64>>,
    variables: RefCell<HashMap<String, Variable>>,
    provider: RefCell<Option<Box<dyn InputProvider>>>,
    frontends: RefCell<Frontends>,
    physical: Cell<i64>,
    exhausted: Cell<bool>,
    instances: RefCell<Vec<Weak<ScopeInstance>>>,
    next_instance: Cell<u32>,
}

impl Scope {
    /// A scope fed by an input provider. The starting dialect comes from the
    /// provider.
    pub fn new(name: impl Into<String>, provider: Box<dyn InputProvider>) -> Rc<Scope> {
        let active = provider.dialect();

        Rc::new(Scope {
            name: name.into(),
            terminal: false,
            parent: None,
            instructions: RefCell::new(Vec::new()),
            physicals: RefCell::new(Vec::new()),
            variables: RefCell::new(HashMap::new()),
            provider: RefCell::new(Some(provider)),
            frontends: RefCell::new(Frontends {
                active,
                intermediate: IntermediateFrontend,
                programming: None,
            }),
            physical: Cell::new(0),
            exhausted: Cell::new(false),
            instances: RefCell::new(Vec::new()),
            next_instance: Cell::new(1),
        })
    }

    /// A scope holding pre-compiled instructions, such as a decoded binary
    /// buffer or a declared function body.
    pub fn from_instructions(
        name: impl Into<String>,
        instructions: Vec<Instruction>,
    ) -> Rc<Scope> {
        let physicals = vec![0; instructions.len()];

        Rc::new(Scope {
            name: name.into(),
            terminal: false,
            parent: None,
            instructions: RefCell::new(instructions),
            physicals: RefCell::new(physicals),
            variables: RefCell::new(HashMap::new()),
            provider: RefCell::new(None),
            frontends: RefCell::new(Frontends {
                active: Dialect::Intermediate,
                intermediate: IntermediateFrontend,
                programming: None,
            }),
            physical: Cell::new(0),
            exhausted: Cell::new(true),
            instances: RefCell::new(Vec::new()),
            next_instance: Cell::new(1),
        })
    }

    /// A child scope. Terminal scopes cut variable lookup off from parent
    /// instances; function bodies are terminal, loop bodies are not.
    pub fn child(parent: &Rc<Scope>, name: impl Into<String>, terminal: bool) -> Rc<Scope> {
        Rc::new(Scope {
            name: name.into(),
            terminal,
            parent: Some(parent.clone()),
            instructions: RefCell::new(Vec::new()),
            physicals: RefCell::new(Vec::new()),
            variables: RefCell::new(HashMap::new()),
            provider: RefCell::new(None),
            frontends: RefCell::new(Frontends {
                active: Dialect::Intermediate,
                intermediate: IntermediateFrontend,
                programming: None,
            }),
            physical: Cell::new(0),
            exhausted: Cell::new(false),
            instances: RefCell::new(Vec::new()),
            next_instance: Cell::new(1),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn parent(&self) -> Option<&Rc<Scope>> {
        self.parent.as_ref()
    }

    /// Install the front-end used for programming dialect lines.
    pub fn set_parser(&self, frontend: Box<dyn Frontend>) {
        self.frontends.borrow_mut().programming = Some(frontend);
    }

    /// Number of instructions compiled so far.
    pub fn ready_count(&self) -> usize {
        self.instructions.borrow().len()
    }

    /// Physical source line of a compiled instruction.
    pub fn physical_line(&self, line: usize) -> Option<i64> {
        self.physicals.borrow().get(line).copied()
    }

    /// Append an instruction directly, bypassing the front-ends.
    pub fn save_instruction(&self, instruction: Instruction, physical: i64) {
        self.instructions.borrow_mut().push(instruction);
        self.physicals.borrow_mut().push(physical);
    }

    /// Fetch the instruction at `line`, compiling further input as needed.
    /// `Ok(None)` means the source ended before reaching that line.
    ///
    /// An instruction fetched while its keyword structure is still open may
    /// carry an unresolved jump; the structure's closing line patches the
    /// stored instruction, not the returned clone.
    pub fn read_instruction(&self, line: usize) -> Result<Option<Instruction>, CompileError> {
        loop {
            if let Some(ready) = self.instructions.borrow().get(line) {
                return Ok(Some(ready.clone()));
            }

            if self.exhausted.get() {
                return Ok(None);
            }

            let text = self
                .provider
                .borrow_mut()
                .as_mut()
                .and_then(|provider| provider.read_line());

            let Some(text) = text else {
                self.exhausted.set(true);
                self.finalize_input()?;
                continue;
            };

            self.physical.set(self.physical.get() + 1);
            let physical = self.physical.get();

            let trimmed = text.trim();
            if let Some(directive) = trimmed.strip_prefix("#!") {
                self.switch_dialect(directive.trim(), physical)?;
                continue;
            }

            // compile into the persistent buffer; jump targets recorded by
            // the front-end are indices into it and must stay valid until
            // the structure closes on a later line
            let mut frontends = self.frontends.borrow_mut();
            let frontend = frontends.active_mut(physical)?;

            let mut instructions = self.instructions.borrow_mut();
            let before = instructions.len();
            frontend.compile(&text, physical, &mut instructions)?;
            let added = instructions.len() - before;
            drop(instructions);

            self.physicals
                .borrow_mut()
                .extend(std::iter::repeat(physical).take(added));
        }
    }

    /// Compile everything the provider still has. Returns the ready count.
    pub fn compile_all(&self) -> Result<usize, CompileError> {
        loop {
            let next = self.ready_count();
            if self.read_instruction(next)?.is_none() {
                return Ok(self.ready_count());
            }
        }
    }

    /// Drop compiled instructions and rewind the provider so the scope can
    /// recompile from the start. Refused while an instance is alive.
    pub fn unload(&self) -> bool {
        if self.has_instance() {
            return false;
        }

        debug!(scope = %self.name, "unloading");
        self.instructions.borrow_mut().clear();
        self.physicals.borrow_mut().clear();
        self.physical.set(0);

        if let Some(provider) = self.provider.borrow_mut().as_mut() {
            provider.reset();
            self.exhausted.set(false);
        }

        true
    }

    fn finalize_input(&self) -> Result<(), CompileError> {
        let physical = self.physical.get();

        let mut frontends = self.frontends.borrow_mut();
        let Ok(frontend) = frontends.active_mut(physical) else {
            return Ok(());
        };

        let mut instructions = self.instructions.borrow_mut();
        let before = instructions.len();
        frontend.finalize(&mut instructions)?;
        let added = instructions.len() - before;
        drop(instructions);

        self.physicals
            .borrow_mut()
            .extend(std::iter::repeat(physical).take(added));

        Ok(())
    }

    fn switch_dialect(&self, name: &str, physical: i64) -> Result<(), CompileError> {
        let dialect = match name.to_lowercase().as_str() {
            "intermediate" => Dialect::Intermediate,
            "programming" => Dialect::Programming,
            other => {
                return Err(CompileError::parse(
                    physical,
                    0,
                    format!("unknown dialect directive: {}", other),
                ));
            }
        };

        debug!(scope = %self.name, %dialect, "switching dialect");
        self.frontends.borrow_mut().active = dialect;
        if let Some(provider) = self.provider.borrow_mut().as_mut() {
            provider.set_dialect(dialect);
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Scope-level variables
    // -------------------------------------------------------------------------

    pub fn get_variable(&self, name: &str) -> Option<Data> {
        self.variables
            .borrow()
            .get(&name.to_lowercase())
            .map(|variable| variable.data().clone())
    }

    pub fn set_variable(&self, name: &str, data: Data) {
        self.variables
            .borrow_mut()
            .insert(name.to_lowercase(), Variable::new(name, data));
    }

    pub fn unset_variable(&self, name: &str) -> bool {
        self.variables
            .borrow_mut()
            .remove(&name.to_lowercase())
            .is_some()
    }

    // -------------------------------------------------------------------------
    // Instances
    // -------------------------------------------------------------------------

    /// Start a new execution of this scope.
    pub fn instantiate(self: &Rc<Self>) -> Rc<ScopeInstance> {
        self.instantiate_inner(None)
    }

    /// Start a new execution with a parent instance for variable lookup.
    pub fn instantiate_with_parent(
        self: &Rc<Self>,
        parent: &Rc<ScopeInstance>,
    ) -> Rc<ScopeInstance> {
        self.instantiate_inner(Some(Rc::downgrade(parent)))
    }

    fn instantiate_inner(self: &Rc<Self>, parent: Option<Weak<ScopeInstance>>) -> Rc<ScopeInstance> {
        let id = self.next_instance.get();
        self.next_instance.set(id + 1);

        let instance = Rc::new(ScopeInstance {
            scope: self.clone(),
            parent,
            name: format!("{} #{}", self.name, id),
            identity: next_identity(),
            current: Cell::new(0),
            variables: RefCell::new(HashMap::new()),
        });

        self.instances.borrow_mut().push(Rc::downgrade(&instance));
        instance
    }

    /// Whether any instance is still alive.
    pub fn has_instance(&self) -> bool {
        self.instances
            .borrow()
            .iter()
            .any(|weak| weak.strong_count() > 0)
    }

    /// The most recently created live instance.
    pub fn last_instance(&self) -> Option<Rc<ScopeInstance>> {
        let mut instances = self.instances.borrow_mut();
        instances.retain(|weak| weak.strong_count() > 0);
        instances.last().and_then(Weak::upgrade)
    }
}

// =============================================================================
// Scope instances
// =============================================================================

/// One execution of a scope: a cursor over its instructions plus local
/// variables.
pub struct ScopeInstance {
    scope: Rc<Scope>,
    parent: Option<Weak<ScopeInstance>>,
    name: String,
    // never reused, so a marker held past this instance's death cannot
    // alias a later instance
    identity: usize,
    current: Cell<usize>,
    variables: RefCell<HashMap<String, Variable>>,
}

/// Process-unique instance identity; zero stays reserved for the invalid
/// default [`SourceMarker`].
fn next_identity() -> usize {
    static NEXT: AtomicUsize = AtomicUsize::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

impl ScopeInstance {
    pub fn scope(&self) -> &Rc<Scope> {
        &self.scope
    }

    /// Instance name, unique per scope: `"<scope> #<n>"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<Rc<ScopeInstance>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Line the next [`get`](ScopeInstance::get) will fetch.
    pub fn current_line(&self) -> usize {
        self.current.get()
    }

    /// Fetch the next instruction and advance. `Ok(None)` at the end.
    pub fn get(&self) -> Result<Option<Instruction>, CompileError> {
        let instruction = self.scope.read_instruction(self.current.get())?;
        if instruction.is_some() {
            self.current.set(self.current.get() + 1);
        }
        Ok(instruction)
    }

    /// Fetch the next instruction without advancing.
    pub fn peek(&self) -> Result<Option<Instruction>, CompileError> {
        self.scope.read_instruction(self.current.get())
    }

    /// Fetch an arbitrary line without moving the cursor.
    pub fn peek_at(&self, line: usize) -> Result<Option<Instruction>, CompileError> {
        self.scope.read_instruction(line)
    }

    /// Move the cursor.
    pub fn jump_to(&self, line: usize) {
        self.current.set(line);
    }

    /// Apply a relative jump offset to the cursor. The offset is relative to
    /// the instruction that carried it, which the cursor has already moved
    /// past.
    pub fn jump_relative(&self, offset: i32) {
        let base = self.current.get() as i64 - 1;
        let target = (base + offset as i64).max(0) as usize;
        self.current.set(target);
    }

    /// Compile the rest of the source and park the cursor past the last
    /// instruction.
    pub fn move_to_end(&self) -> Result<(), CompileError> {
        let count = self.scope.compile_all()?;
        self.current.set(count);
        Ok(())
    }

    /// Physical line of the instruction the cursor last fetched.
    pub fn physical_line(&self) -> Option<i64> {
        let line = self.current.get().checked_sub(1)?;
        self.scope.physical_line(line)
    }

    /// Marker for the instruction the next `get` will fetch.
    pub fn marker_for_next(&self) -> SourceMarker {
        SourceMarker {
            source: self.identity(),
            line: self.current.get(),
        }
    }

    /// Marker for the instruction fetched last.
    pub fn marker_for_current(&self) -> SourceMarker {
        SourceMarker {
            source: self.identity(),
            line: self.current.get().saturating_sub(1),
        }
    }

    /// Whether a marker points into this instance.
    pub fn owns(&self, marker: SourceMarker) -> bool {
        marker.source == self.identity()
    }

    /// Move the cursor to a marker, if it points into this instance.
    pub fn apply(&self, marker: SourceMarker) -> bool {
        if !self.owns(marker) {
            return false;
        }
        self.current.set(marker.line);
        true
    }

    fn identity(&self) -> usize {
        self.identity
    }

    // -------------------------------------------------------------------------
    // Variables
    // -------------------------------------------------------------------------

    /// Look up a variable: locals first, then the owning scope, then, unless
    /// the scope is terminal, the parent instance chain.
    pub fn get_variable(&self, name: &str) -> Option<Data> {
        if let Some(variable) = self.variables.borrow().get(&name.to_lowercase()) {
            return Some(variable.data().clone());
        }

        if let Some(data) = self.scope.get_variable(name) {
            return Some(data);
        }

        if self.scope.is_terminal() {
            return None;
        }

        self.parent()?.get_variable(name)
    }

    pub fn set_variable(&self, name: &str, data: Data) {
        self.variables
            .borrow_mut()
            .insert(name.to_lowercase(), Variable::new(name, data));
    }

    pub fn unset_variable(&self, name: &str) -> bool {
        self.variables
            .borrow_mut()
            .remove(&name.to_lowercase())
            .is_some()
    }
}
