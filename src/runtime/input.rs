use std::fmt;

// =============================================================================
// Input sources
// =============================================================================

/// Source language of an input stream.
///
/// `Console` and `Programming` lines go through the host-supplied statement
/// parser; `Intermediate` is the textual instruction form; `Binary` buffers
/// are not line based and load through
/// [`binary::decode`](crate::bytecode::binary::decode).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Console,
    Programming,
    Intermediate,
    Binary,
}

impl Dialect {
    /// Name accepted by the `#!` switch directive, if this dialect can be
    /// switched to mid-stream.
    pub fn directive_name(self) -> Option<&'static str> {
        match self {
            Dialect::Programming => Some("programming"),
            Dialect::Intermediate => Some("intermediate"),
            Dialect::Console | Dialect::Binary => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::Console => "console",
            Dialect::Programming => "programming",
            Dialect::Intermediate => "intermediate",
            Dialect::Binary => "binary",
        };
        f.write_str(name)
    }
}

/// A source of physical lines. Reading may block (a console provider waits
/// for the user); `None` means the source is exhausted.
pub trait InputProvider {
    fn read_line(&mut self) -> Option<String>;

    /// Rewind to the beginning, where possible.
    fn reset(&mut self);

    fn dialect(&self) -> Dialect;

    fn set_dialect(&mut self, dialect: Dialect);

    fn name(&self) -> &str;
}

/// An in-memory provider over a fixed set of lines. Used by tests and for
/// compiling already-loaded sources.
pub struct BufferProvider {
    name: String,
    lines: Vec<String>,
    next: usize,
    dialect: Dialect,
}

impl BufferProvider {
    pub fn new(name: impl Into<String>, text: &str, dialect: Dialect) -> Self {
        BufferProvider {
            name: name.into(),
            lines: text.lines().map(str::to_owned).collect(),
            next: 0,
            dialect,
        }
    }
}

impl InputProvider for BufferProvider {
    fn read_line(&mut self) -> Option<String> {
        let line = self.lines.get(self.next)?.clone();
        self.next += 1;
        Some(line)
    }

    fn reset(&mut self) {
        self.next = 0;
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn set_dialect(&mut self, dialect: Dialect) {
        self.dialect = dialect;
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_provider_reads_lines_in_order() {
        let mut provider = BufferProvider::new("test", "a\nb\n", Dialect::Intermediate);

        assert_eq!(provider.read_line().as_deref(), Some("a"));
        assert_eq!(provider.read_line().as_deref(), Some("b"));
        assert_eq!(provider.read_line(), None);

        provider.reset();
        assert_eq!(provider.read_line().as_deref(), Some("a"));
    }

    #[test]
    fn only_line_dialects_have_directive_names() {
        assert_eq!(Dialect::Intermediate.directive_name(), Some("intermediate"));
        assert_eq!(Dialect::Programming.directive_name(), Some("programming"));
        assert_eq!(Dialect::Binary.directive_name(), None);
    }
}
