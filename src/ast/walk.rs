//! AST Traversal
//!
//! `NodeRef` is a borrowed view over any node category, so consumers can walk
//! a whole tree without matching on every node type themselves.
//!
//! Children are returned in source order. Heredoc bodies are children of their
//! redirect, but they live on later lines and so sit outside its span; use
//! `spanned_children` to leave them out.

use crate::ast::position::Pos;
use crate::ast::types::*;

/// A borrowed reference to any node in the tree
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Script(&'a ScriptNode),
    Comment(&'a CommentNode),
    Statement(&'a StatementNode),
    Command(&'a CommandNode),
    Elif(&'a ElifClause),
    ForHeader(&'a ForLoop),
    CaseItem(&'a CaseItemNode),
    Assignment(&'a AssignmentNode),
    Redirection(&'a RedirectionNode),
    Word(&'a WordNode),
    WordPart(&'a WordPart),
    Literal(&'a LiteralPart),
    Arith(&'a ArithExpr),
    Cond(&'a ConditionalExpressionNode),
}

impl<'a> From<&'a ScriptNode> for NodeRef<'a> {
    fn from(script: &'a ScriptNode) -> Self {
        NodeRef::Script(script)
    }
}

impl<'a> From<&'a StatementNode> for NodeRef<'a> {
    fn from(stmt: &'a StatementNode) -> Self {
        NodeRef::Statement(stmt)
    }
}

impl<'a> From<&'a WordNode> for NodeRef<'a> {
    fn from(word: &'a WordNode) -> Self {
        NodeRef::Word(word)
    }
}

impl Node for NodeRef<'_> {
    fn pos(&self) -> Pos {
        match self {
            Self::Script(n) => n.pos(),
            Self::Comment(n) => n.pos(),
            Self::Statement(n) => n.pos(),
            Self::Command(n) => n.pos(),
            Self::Elif(n) => n.pos(),
            Self::ForHeader(n) => n.pos(),
            Self::CaseItem(n) => n.pos(),
            Self::Assignment(n) => n.pos(),
            Self::Redirection(n) => n.pos(),
            Self::Word(n) => n.pos(),
            Self::WordPart(n) => n.pos(),
            Self::Literal(n) => n.pos(),
            Self::Arith(n) => n.pos(),
            Self::Cond(n) => n.pos(),
        }
    }

    fn end(&self) -> Pos {
        match self {
            Self::Script(n) => n.end(),
            Self::Comment(n) => n.end(),
            Self::Statement(n) => n.end(),
            Self::Command(n) => n.end(),
            Self::Elif(n) => n.end(),
            Self::ForHeader(n) => n.end(),
            Self::CaseItem(n) => n.end(),
            Self::Assignment(n) => n.end(),
            Self::Redirection(n) => n.end(),
            Self::Word(n) => n.end(),
            Self::WordPart(n) => n.end(),
            Self::Literal(n) => n.end(),
            Self::Arith(n) => n.end(),
            Self::Cond(n) => n.end(),
        }
    }
}

impl<'a> NodeRef<'a> {
    /// Short name of the node variant, e.g. `"If"` or `"ParamExp"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Script(_) => "Script",
            Self::Comment(_) => "Comment",
            Self::Statement(_) => "Statement",
            Self::Command(cmd) => match cmd {
                CommandNode::Simple(_) => "SimpleCommand",
                CommandNode::If(_) => "If",
                CommandNode::While(_) => "While",
                CommandNode::Until(_) => "Until",
                CommandNode::For(_) => "For",
                CommandNode::Case(_) => "Case",
                CommandNode::Group(_) => "Group",
                CommandNode::Subshell(_) => "Subshell",
                CommandNode::Binary(_) => "BinaryCommand",
                CommandNode::FunctionDef(_) => "FunctionDef",
                CommandNode::Arithmetic(_) => "ArithmeticCommand",
                CommandNode::Conditional(_) => "ConditionalCommand",
                CommandNode::Declare(_) => "Declare",
                CommandNode::Eval(_) => "Eval",
                CommandNode::Let(_) => "Let",
                CommandNode::Coproc(_) => "Coproc",
            },
            Self::Elif(_) => "Elif",
            Self::ForHeader(ForLoop::WordIter(_)) => "WordIter",
            Self::ForHeader(ForLoop::CStyle(_)) => "CStyleLoop",
            Self::CaseItem(_) => "CaseItem",
            Self::Assignment(_) => "Assignment",
            Self::Redirection(_) => "Redirection",
            Self::Word(_) => "Word",
            Self::WordPart(part) => match part {
                WordPart::Literal(_) => "Literal",
                WordPart::SingleQuoted(_) => "SingleQuoted",
                WordPart::DoubleQuoted(_) => "DoubleQuoted",
                WordPart::ParameterExpansion(_) => "ParamExp",
                WordPart::CommandSubstitution(_) => "CmdSubst",
                WordPart::ArithmeticExpansion(_) => "ArithmExp",
                WordPart::ProcessSubstitution(_) => "ProcSubst",
                WordPart::Array(_) => "Array",
                WordPart::ExtGlob(_) => "ExtGlob",
            },
            Self::Literal(_) => "Literal",
            Self::Arith(expr) => match expr {
                ArithExpr::Binary(_) => "ArithBinary",
                ArithExpr::Unary(_) => "ArithUnary",
                ArithExpr::Group(_) => "ArithGroup",
                ArithExpr::Word(_) => "ArithWord",
            },
            Self::Cond(expr) => match expr {
                ConditionalExpressionNode::Binary(_) => "TestBinary",
                ConditionalExpressionNode::Unary(_) => "TestUnary",
                ConditionalExpressionNode::Group(_) => "TestGroup",
                ConditionalExpressionNode::Word(_) => "TestWord",
            },
        }
    }

    /// Direct children in source order, heredoc bodies included.
    pub fn children(&self) -> Vec<NodeRef<'a>> {
        let mut out = self.spanned_children();
        if let Self::Redirection(r) = self {
            if let Some(body) = &r.heredoc {
                out.push(NodeRef::Word(body));
            }
        }
        out
    }

    /// Direct children that lie inside this node's span.
    pub fn spanned_children(&self) -> Vec<NodeRef<'a>> {
        let mut out = Vec::new();
        match *self {
            Self::Script(script) => {
                stmts(&mut out, &script.statements);
                out.extend(script.comments.iter().map(NodeRef::Comment));
                out.sort_by_key(Node::pos);
            }
            Self::Comment(_) | Self::Literal(_) => {}
            Self::Statement(stmt) => {
                out.extend(stmt.assignments.iter().map(NodeRef::Assignment));
                out.extend(stmt.redirections.iter().map(NodeRef::Redirection));
                out.extend(stmt.command.iter().map(NodeRef::Command));
                out.sort_by_key(Node::pos);
            }
            Self::Command(cmd) => command_children(&mut out, cmd),
            Self::Elif(elif) => {
                stmts(&mut out, &elif.condition);
                stmts(&mut out, &elif.body);
            }
            Self::ForHeader(ForLoop::WordIter(iter)) => {
                out.push(NodeRef::Literal(&iter.name));
                words(&mut out, &iter.items);
            }
            Self::ForHeader(ForLoop::CStyle(c)) => {
                let exprs = [&c.init, &c.condition, &c.post];
                out.extend(exprs.into_iter().flatten().map(NodeRef::Arith));
            }
            Self::CaseItem(item) => {
                words(&mut out, &item.patterns);
                stmts(&mut out, &item.body);
            }
            Self::Assignment(assign) => {
                out.extend(assign.name.iter().map(NodeRef::Literal));
                out.extend(assign.value.iter().map(NodeRef::Word));
            }
            Self::Redirection(r) => {
                out.extend(r.fd.iter().map(NodeRef::Literal));
                out.push(NodeRef::Word(&r.target));
            }
            Self::Word(word) => out.extend(word.parts.iter().map(NodeRef::WordPart)),
            Self::WordPart(part) => part_children(&mut out, part),
            Self::Arith(expr) => match expr {
                ArithExpr::Binary(b) => {
                    out.push(NodeRef::Arith(&b.left));
                    out.push(NodeRef::Arith(&b.right));
                }
                ArithExpr::Unary(u) => out.push(NodeRef::Arith(&u.operand)),
                ArithExpr::Group(g) => out.push(NodeRef::Arith(&g.expression)),
                ArithExpr::Word(w) => out.push(NodeRef::Word(w)),
            },
            Self::Cond(expr) => match expr {
                ConditionalExpressionNode::Binary(b) => {
                    out.push(NodeRef::Cond(&b.left));
                    out.push(NodeRef::Cond(&b.right));
                }
                ConditionalExpressionNode::Unary(u) => out.push(NodeRef::Cond(&u.operand)),
                ConditionalExpressionNode::Group(g) => out.push(NodeRef::Cond(&g.expression)),
                ConditionalExpressionNode::Word(w) => out.push(NodeRef::Word(w)),
            },
        }
        out
    }
}

fn stmts<'a>(out: &mut Vec<NodeRef<'a>>, list: &'a [StatementNode]) {
    out.extend(list.iter().map(NodeRef::Statement));
}

fn words<'a>(out: &mut Vec<NodeRef<'a>>, list: &'a [WordNode]) {
    out.extend(list.iter().map(NodeRef::Word));
}

fn command_children<'a>(out: &mut Vec<NodeRef<'a>>, cmd: &'a CommandNode) {
    match cmd {
        CommandNode::Simple(c) => words(out, &c.args),
        CommandNode::If(c) => {
            stmts(out, &c.condition);
            stmts(out, &c.then_body);
            out.extend(c.elifs.iter().map(NodeRef::Elif));
            stmts(out, &c.else_body);
        }
        CommandNode::While(c) => {
            stmts(out, &c.condition);
            stmts(out, &c.body);
        }
        CommandNode::Until(c) => {
            stmts(out, &c.condition);
            stmts(out, &c.body);
        }
        CommandNode::For(c) => {
            out.push(NodeRef::ForHeader(&c.header));
            stmts(out, &c.body);
        }
        CommandNode::Case(c) => {
            out.push(NodeRef::Word(&c.word));
            out.extend(c.items.iter().map(NodeRef::CaseItem));
        }
        CommandNode::Group(c) => stmts(out, &c.body),
        CommandNode::Subshell(c) => stmts(out, &c.body),
        CommandNode::Binary(c) => {
            out.push(NodeRef::Statement(&c.left));
            out.push(NodeRef::Statement(&c.right));
        }
        CommandNode::FunctionDef(c) => {
            out.push(NodeRef::Literal(&c.name));
            out.push(NodeRef::Statement(&c.body));
        }
        CommandNode::Arithmetic(c) => out.extend(c.expression.iter().map(NodeRef::Arith)),
        CommandNode::Conditional(c) => out.push(NodeRef::Cond(&c.expression)),
        CommandNode::Declare(c) => {
            words(out, &c.opts);
            out.extend(c.assignments.iter().map(NodeRef::Assignment));
            out.sort_by_key(Node::pos);
        }
        CommandNode::Eval(c) => {
            out.extend(c.statement.iter().map(|s| NodeRef::Statement(s)));
        }
        CommandNode::Let(c) => out.extend(c.expressions.iter().map(NodeRef::Arith)),
        CommandNode::Coproc(c) => {
            out.extend(c.name.iter().map(NodeRef::Literal));
            out.push(NodeRef::Statement(&c.statement));
        }
    }
}

fn part_children<'a>(out: &mut Vec<NodeRef<'a>>, part: &'a WordPart) {
    match part {
        WordPart::Literal(_) | WordPart::SingleQuoted(_) => {}
        WordPart::DoubleQuoted(dq) => out.extend(dq.parts.iter().map(NodeRef::WordPart)),
        WordPart::ParameterExpansion(pe) => {
            out.push(NodeRef::Literal(&pe.param));
            out.extend(pe.index.iter().map(NodeRef::Arith));
            if let Some(slice) = &pe.slice {
                out.extend(slice.offset.iter().map(NodeRef::Arith));
                out.extend(slice.length.iter().map(NodeRef::Arith));
            }
            if let Some(replace) = &pe.replace {
                out.extend(replace.orig.iter().map(NodeRef::Word));
                out.extend(replace.with.iter().map(NodeRef::Word));
            }
            if let Some(exp) = &pe.expansion {
                out.extend(exp.word.iter().map(NodeRef::Word));
            }
        }
        WordPart::CommandSubstitution(cs) => stmts(out, &cs.body),
        WordPart::ArithmeticExpansion(ae) => out.extend(ae.expression.iter().map(NodeRef::Arith)),
        WordPart::ProcessSubstitution(ps) => stmts(out, &ps.body),
        WordPart::Array(array) => words(out, &array.elements),
        WordPart::ExtGlob(glob) => out.push(NodeRef::Literal(&glob.pattern)),
    }
}

/// Visit `node` and its descendants depth-first, descending into a node's
/// children only while `f` returns true for it.
pub fn walk<'a, F>(node: NodeRef<'a>, f: &mut F)
where
    F: FnMut(NodeRef<'a>) -> bool,
{
    if !f(node) {
        return;
    }
    for child in node.children() {
        walk(child, f);
    }
}
