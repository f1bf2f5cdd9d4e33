use std::collections::HashMap;

use crate::reflect::data::Data;
use crate::runtime::scope::SourceMarker;

// =============================================================================
// Execution context
// =============================================================================

/// Services an executing statement needs from its surroundings. Keyword and
/// function implementations receive one of these instead of reaching for
/// global machinery, so tests can hand them a plain in-memory context.
pub trait ExecutionContext {
    /// Look up a variable visible from the current statement.
    fn get_variable(&self, name: &str) -> Option<Data>;

    fn set_variable(&mut self, name: &str, data: Data);

    /// Remove a variable. Returns whether it existed.
    fn unset_variable(&mut self, name: &str) -> bool;

    /// Enter skip mode: statements are read but not executed until
    /// [`stop_skipping`](ExecutionContext::stop_skipping).
    fn start_skipping(&mut self);

    fn stop_skipping(&mut self);

    fn is_skipping(&self) -> bool;

    /// Request a transfer of control. Takes effect after the current
    /// statement finishes.
    fn jump(&mut self, marker: SourceMarker);

    /// Take the pending jump request, if any.
    fn take_jump(&mut self) -> Option<SourceMarker>;

    /// Print a value to the context's output channel.
    fn echo(&mut self, data: &Data);

    /// Keep a value alive past the statement that produced it. Used for
    /// reference returns whose only owner would otherwise be a temporary.
    fn retain(&mut self, data: Data);
}

/// Self-contained context over an in-memory variable table and output log.
#[derive(Default)]
pub struct BasicContext {
    // keys are lowercased, values keep the original spelling upstream
    variables: HashMap<String, Data>,
    output: Vec<String>,
    skipping: bool,
    pending_jump: Option<SourceMarker>,
    retained: Vec<Data>,
}

impl BasicContext {
    pub fn new() -> BasicContext {
        BasicContext::default()
    }

    /// Everything echoed so far, in order.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn retained(&self) -> &[Data] {
        &self.retained
    }
}

impl ExecutionContext for BasicContext {
    fn get_variable(&self, name: &str) -> Option<Data> {
        self.variables.get(&name.to_lowercase()).cloned()
    }

    fn set_variable(&mut self, name: &str, data: Data) {
        self.variables.insert(name.to_lowercase(), data);
    }

    fn unset_variable(&mut self, name: &str) -> bool {
        self.variables.remove(&name.to_lowercase()).is_some()
    }

    fn start_skipping(&mut self) {
        self.skipping = true;
    }

    fn stop_skipping(&mut self) {
        self.skipping = false;
    }

    fn is_skipping(&self) -> bool {
        self.skipping
    }

    fn jump(&mut self, marker: SourceMarker) {
        self.pending_jump = Some(marker);
    }

    fn take_jump(&mut self) -> Option<SourceMarker> {
        self.pending_jump.take()
    }

    fn echo(&mut self, data: &Data) {
        let text = data
            .to_text()
            .unwrap_or_else(|| format!("<{}>", data.ty().name()));
        self.output.push(text);
    }

    fn retain(&mut self, data: Data) {
        self.retained.push(data);
    }
}
