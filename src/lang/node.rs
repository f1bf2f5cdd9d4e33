use super::value::Literal;

/// Kind of an [`AstNode`].
///
/// A dialect front-end parses each logical source line into one of these
/// nodes; the compiler only ever sees this shape, never the surface
/// syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A literal value; `literal` is set.
    Literal,

    /// A function call. The first leaf is the callee (an `Identifier` or
    /// a `Member` node), the rest are arguments.
    FunctionCall,

    /// Same shape as `FunctionCall`, but invokes the method variant if
    /// one exists; otherwise the call result is echoed instead of stored.
    MethodCall,

    /// Member access, left associative; exactly two leaves.
    Member,

    /// An identifier; `text` is set. Could name a constant, variable,
    /// function or type; resolution happens later.
    Identifier,

    /// A known variable reference; `text` is set.
    Variable,

    /// A known constant reference; `text` is set.
    Constant,

    /// A binary operator; `text` holds its symbol, two leaves.
    Operator,

    /// An indexing operation; first leaf is the indexed object.
    Index,

    /// Object construction; first leaf names the type.
    Construct,

    /// A keyword statement; `text` holds the keyword name, leaves are
    /// its arguments.
    Keyword,

    /// An assignment, always top level; exactly two leaves
    /// (target, value).
    Assignment,

    /// A placeholder, e.g. an omitted return type.
    Empty,
}

/// A node of the abstract syntax tree for one logical statement.
///
/// Built by an external parser, consumed read-only by
/// [`AstCompiler`](crate::bytecode::compile::AstCompiler). Never shared
/// between statements.
#[derive(Debug, Clone, PartialEq)]
pub struct AstNode {
    pub kind: NodeKind,

    /// Textual payload for identifier-like and keyword nodes.
    pub text: String,

    /// Literal payload, set only when `kind` is `Literal`.
    pub literal: Option<Literal>,

    /// Child nodes, in source order.
    pub leaves: Vec<AstNode>,

    /// Starting character of the node in its source line, for error
    /// reporting. Negative when unknown.
    pub start: i32,

    /// Physical source line the node starts on. Negative when unknown.
    pub line: i32,
}

impl AstNode {
    pub fn new(kind: NodeKind) -> Self {
        AstNode {
            kind,
            text: String::new(),
            literal: None,
            leaves: Vec::new(),
            start: -1,
            line: -1,
        }
    }

    pub fn literal(value: Literal) -> Self {
        let mut node = AstNode::new(NodeKind::Literal);
        node.literal = Some(value);
        node
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        let mut node = AstNode::new(NodeKind::Identifier);
        node.text = name.into();
        node
    }

    pub fn variable(name: impl Into<String>) -> Self {
        let mut node = AstNode::new(NodeKind::Variable);
        node.text = name.into();
        node
    }

    pub fn constant(name: impl Into<String>) -> Self {
        let mut node = AstNode::new(NodeKind::Constant);
        node.text = name.into();
        node
    }

    /// A binary operator node; all operators are binary and left
    /// associative.
    pub fn operator(symbol: impl Into<String>, left: AstNode, right: AstNode) -> Self {
        let mut node = AstNode::new(NodeKind::Operator);
        node.text = symbol.into();
        node.leaves = vec![left, right];
        node
    }

    pub fn keyword(name: impl Into<String>, leaves: Vec<AstNode>) -> Self {
        let mut node = AstNode::new(NodeKind::Keyword);
        node.text = name.into();
        node.leaves = leaves;
        node
    }

    pub fn assignment(target: AstNode, value: AstNode) -> Self {
        let mut node = AstNode::new(NodeKind::Assignment);
        node.leaves = vec![target, value];
        node
    }

    /// A member access node: `object.member`.
    pub fn member(object: AstNode, member: AstNode) -> Self {
        let mut node = AstNode::new(NodeKind::Member);
        node.leaves = vec![object, member];
        node
    }

    /// A call node; `callee` is an identifier or member node.
    pub fn call(callee: AstNode, args: Vec<AstNode>) -> Self {
        let mut node = AstNode::new(NodeKind::FunctionCall);
        node.leaves.push(callee);
        node.leaves.extend(args);
        node
    }

    /// A method-style call; same shape as [`AstNode::call`].
    pub fn method_call(callee: AstNode, args: Vec<AstNode>) -> Self {
        let mut node = AstNode::new(NodeKind::MethodCall);
        node.leaves.push(callee);
        node.leaves.extend(args);
        node
    }

    pub fn index(object: AstNode, indices: Vec<AstNode>) -> Self {
        let mut node = AstNode::new(NodeKind::Index);
        node.leaves.push(object);
        node.leaves.extend(indices);
        node
    }

    pub fn construct(leaves: Vec<AstNode>) -> Self {
        let mut node = AstNode::new(NodeKind::Construct);
        node.leaves = leaves;
        node
    }

    pub fn empty() -> Self {
        AstNode::new(NodeKind::Empty)
    }

    pub fn with_leaf(mut self, leaf: AstNode) -> Self {
        self.leaves.push(leaf);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_nodes_are_binary() {
        let node = AstNode::operator(
            "+",
            AstNode::literal(Literal::Int(1)),
            AstNode::literal(Literal::Int(2)),
        );
        assert_eq!(node.kind, NodeKind::Operator);
        assert_eq!(node.text, "+");
        assert_eq!(node.leaves.len(), 2);
    }

    #[test]
    fn call_puts_callee_first() {
        let node = AstNode::call(
            AstNode::identifier("echo"),
            vec![AstNode::literal(Literal::Str("hi".into()))],
        );
        assert_eq!(node.leaves[0].kind, NodeKind::Identifier);
        assert_eq!(node.leaves[0].text, "echo");
        assert_eq!(node.leaves.len(), 2);
    }
}
