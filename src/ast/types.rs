//! Abstract Syntax Tree (AST) Types for POSIX and Bash scripts
//!
//! Every node reports the span it covers through the [`Node`] trait. Spans are
//! half-open: `pos()` is the first byte covered and `end()` is the position
//! right after the last one. Keyword and operator positions are stored; ends of
//! keyword-terminated constructs are derived from them.

use crate::ast::position::{LineIndex, Pos, Position};
use serde::Serialize;
use std::fmt;

/// Span accessors shared by every node.
pub trait Node {
    fn pos(&self) -> Pos;
    fn end(&self) -> Pos;
}

fn stmts_end(stmts: &[StatementNode]) -> Option<Pos> {
    stmts.last().map(Node::end)
}

fn words_end(words: &[WordNode]) -> Option<Pos> {
    words.last().map(Node::end)
}

// =============================================================================
// SCRIPT & STATEMENTS
// =============================================================================

/// Root node: a complete script
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptNode {
    /// Label used in diagnostics only
    pub name: String,
    pub statements: Vec<StatementNode>,
    /// Only populated when comment capture is enabled
    pub comments: Vec<CommentNode>,
    #[serde(skip)]
    pub(crate) lines: LineIndex,
}

impl ScriptNode {
    /// Resolves a position inside this script to line and column.
    pub fn position(&self, pos: Pos) -> Position {
        self.lines.resolve(pos)
    }

    pub fn lines(&self) -> &LineIndex {
        &self.lines
    }
}

impl Node for ScriptNode {
    fn pos(&self) -> Pos {
        let first = self.statements.first().map(Node::pos);
        let comment = self.comments.first().map(Node::pos);
        match (first, comment) {
            (Some(a), Some(b)) => a.min(b),
            (a, b) => a.or(b).unwrap_or(Pos::INVALID),
        }
    }

    fn end(&self) -> Pos {
        let last = stmts_end(&self.statements);
        let comment = self.comments.last().map(Node::end);
        last.max(comment).unwrap_or(Pos::INVALID)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentNode {
    pub hash: Pos,
    /// Text after the `#`, up to the end of the line
    pub text: String,
}

impl Node for CommentNode {
    fn pos(&self) -> Pos {
        self.hash
    }

    fn end(&self) -> Pos {
        self.hash + 1 + self.text.len()
    }
}

/// A command plus its modifiers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementNode {
    pub command: Option<CommandNode>,
    pub position: Pos,
    /// Position of a terminating `;`, if any
    pub semicolon: Pos,
    pub negated: bool,
    /// Terminated by `&`
    pub background: bool,
    pub assignments: Vec<AssignmentNode>,
    pub redirections: Vec<RedirectionNode>,
}

impl Node for StatementNode {
    fn pos(&self) -> Pos {
        self.position
    }

    fn end(&self) -> Pos {
        if self.semicolon.is_valid() {
            return self.semicolon + 1;
        }
        let mut end = self.position;
        if self.negated {
            end = end + 1;
        }
        if let Some(cmd) = &self.command {
            end = end.max(cmd.end());
        }
        if let Some(last) = self.assignments.last() {
            end = end.max(last.end());
        }
        if let Some(last) = self.redirections.last() {
            end = end.max(last.end());
        }
        end
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Union of all command types
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CommandNode {
    Simple(SimpleCommandNode),
    If(IfNode),
    While(WhileNode),
    Until(UntilNode),
    For(ForNode),
    Case(CaseNode),
    Group(GroupNode),
    Subshell(SubshellNode),
    Binary(BinaryCommandNode),
    FunctionDef(FunctionDefNode),
    Arithmetic(ArithmeticCommandNode),
    Conditional(ConditionalCommandNode),
    Declare(DeclareNode),
    Eval(EvalNode),
    Let(LetNode),
    Coproc(CoprocNode),
}

impl Node for CommandNode {
    fn pos(&self) -> Pos {
        match self {
            Self::Simple(c) => c.pos(),
            Self::If(c) => c.pos(),
            Self::While(c) => c.pos(),
            Self::Until(c) => c.pos(),
            Self::For(c) => c.pos(),
            Self::Case(c) => c.pos(),
            Self::Group(c) => c.pos(),
            Self::Subshell(c) => c.pos(),
            Self::Binary(c) => c.pos(),
            Self::FunctionDef(c) => c.pos(),
            Self::Arithmetic(c) => c.pos(),
            Self::Conditional(c) => c.pos(),
            Self::Declare(c) => c.pos(),
            Self::Eval(c) => c.pos(),
            Self::Let(c) => c.pos(),
            Self::Coproc(c) => c.pos(),
        }
    }

    fn end(&self) -> Pos {
        match self {
            Self::Simple(c) => c.end(),
            Self::If(c) => c.end(),
            Self::While(c) => c.end(),
            Self::Until(c) => c.end(),
            Self::For(c) => c.end(),
            Self::Case(c) => c.end(),
            Self::Group(c) => c.end(),
            Self::Subshell(c) => c.end(),
            Self::Binary(c) => c.end(),
            Self::FunctionDef(c) => c.end(),
            Self::Arithmetic(c) => c.end(),
            Self::Conditional(c) => c.end(),
            Self::Declare(c) => c.end(),
            Self::Eval(c) => c.end(),
            Self::Let(c) => c.end(),
            Self::Coproc(c) => c.end(),
        }
    }
}

/// Simple command: name args...
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimpleCommandNode {
    /// Command name followed by its arguments; never empty
    pub args: Vec<WordNode>,
}

impl Node for SimpleCommandNode {
    fn pos(&self) -> Pos {
        self.args.first().map_or(Pos::INVALID, Node::pos)
    }

    fn end(&self) -> Pos {
        words_end(&self.args).unwrap_or(Pos::INVALID)
    }
}

/// Pipelines and lists: `a | b`, `a |& b`, `a && b`, `a || b`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinaryCommandNode {
    pub op_pos: Pos,
    pub operator: BinaryCommandOperator,
    pub left: Box<StatementNode>,
    pub right: Box<StatementNode>,
}

impl Node for BinaryCommandNode {
    fn pos(&self) -> Pos {
        self.left.pos()
    }

    fn end(&self) -> Pos {
        self.right.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryCommandOperator {
    AndAnd,  // &&
    OrOr,    // ||
    Pipe,    // |
    PipeAll, // |&
}

impl fmt::Display for BinaryCommandOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AndAnd => write!(f, "&&"),
            Self::OrOr => write!(f, "||"),
            Self::Pipe => write!(f, "|"),
            Self::PipeAll => write!(f, "|&"),
        }
    }
}

// =============================================================================
// CONTROL FLOW
// =============================================================================

/// if statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IfNode {
    pub if_pos: Pos,
    pub then_pos: Pos,
    pub fi_pos: Pos,
    pub condition: Vec<StatementNode>,
    pub then_body: Vec<StatementNode>,
    pub elifs: Vec<ElifClause>,
    /// Invalid when there is no else branch
    pub else_pos: Pos,
    pub else_body: Vec<StatementNode>,
}

impl Node for IfNode {
    fn pos(&self) -> Pos {
        self.if_pos
    }

    fn end(&self) -> Pos {
        self.fi_pos + 2
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElifClause {
    pub elif_pos: Pos,
    pub then_pos: Pos,
    pub condition: Vec<StatementNode>,
    pub body: Vec<StatementNode>,
}

impl Node for ElifClause {
    fn pos(&self) -> Pos {
        self.elif_pos
    }

    fn end(&self) -> Pos {
        stmts_end(&self.body).unwrap_or(self.then_pos + 4)
    }
}

/// while loop
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhileNode {
    pub while_pos: Pos,
    pub do_pos: Pos,
    pub done_pos: Pos,
    pub condition: Vec<StatementNode>,
    pub body: Vec<StatementNode>,
}

impl Node for WhileNode {
    fn pos(&self) -> Pos {
        self.while_pos
    }

    fn end(&self) -> Pos {
        self.done_pos + 4
    }
}

/// until loop
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UntilNode {
    pub until_pos: Pos,
    pub do_pos: Pos,
    pub done_pos: Pos,
    pub condition: Vec<StatementNode>,
    pub body: Vec<StatementNode>,
}

impl Node for UntilNode {
    fn pos(&self) -> Pos {
        self.until_pos
    }

    fn end(&self) -> Pos {
        self.done_pos + 4
    }
}

/// for loop, either over words or C-style
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForNode {
    pub for_pos: Pos,
    pub do_pos: Pos,
    pub done_pos: Pos,
    pub header: ForLoop,
    pub body: Vec<StatementNode>,
}

impl Node for ForNode {
    fn pos(&self) -> Pos {
        self.for_pos
    }

    fn end(&self) -> Pos {
        self.done_pos + 4
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ForLoop {
    WordIter(WordIterNode),
    CStyle(CStyleLoopNode),
}

impl Node for ForLoop {
    fn pos(&self) -> Pos {
        match self {
            Self::WordIter(w) => w.pos(),
            Self::CStyle(c) => c.pos(),
        }
    }

    fn end(&self) -> Pos {
        match self {
            Self::WordIter(w) => w.end(),
            Self::CStyle(c) => c.end(),
        }
    }
}

/// `name [in words]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordIterNode {
    pub name: LiteralPart,
    pub items: Vec<WordNode>,
}

impl Node for WordIterNode {
    fn pos(&self) -> Pos {
        self.name.pos()
    }

    fn end(&self) -> Pos {
        words_end(&self.items).map_or(self.name.end(), |end| end.max(self.name.end()))
    }
}

/// `((init; cond; post))`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CStyleLoopNode {
    pub lparen: Pos,
    pub rparen: Pos,
    pub init: Option<ArithExpr>,
    pub condition: Option<ArithExpr>,
    pub post: Option<ArithExpr>,
}

impl Node for CStyleLoopNode {
    fn pos(&self) -> Pos {
        self.lparen
    }

    fn end(&self) -> Pos {
        self.rparen + 2
    }
}

/// case statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseNode {
    pub case_pos: Pos,
    pub esac_pos: Pos,
    pub word: WordNode,
    pub items: Vec<CaseItemNode>,
}

impl Node for CaseNode {
    fn pos(&self) -> Pos {
        self.case_pos
    }

    fn end(&self) -> Pos {
        self.esac_pos + 4
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseItemNode {
    pub terminator: CaseTerminator,
    /// Invalid when the item runs straight into `esac`
    pub terminator_pos: Pos,
    /// The `)` closing the pattern list
    pub rparen: Pos,
    pub patterns: Vec<WordNode>,
    pub body: Vec<StatementNode>,
}

impl Node for CaseItemNode {
    fn pos(&self) -> Pos {
        self.patterns.first().map_or(Pos::INVALID, Node::pos)
    }

    fn end(&self) -> Pos {
        if self.terminator_pos.is_valid() {
            return self.terminator_pos + self.terminator.to_string().len();
        }
        let rparen_end = self.rparen + 1;
        stmts_end(&self.body).map_or(rparen_end, |end| end.max(rparen_end))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CaseTerminator {
    DoubleSemi,  // ;;
    SemiAnd,     // ;&
    SemiSemiAnd, // ;;&
}

impl fmt::Display for CaseTerminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DoubleSemi => write!(f, ";;"),
            Self::SemiAnd => write!(f, ";&"),
            Self::SemiSemiAnd => write!(f, ";;&"),
        }
    }
}

/// Command group: { ...; }
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupNode {
    pub lbrace: Pos,
    pub rbrace: Pos,
    pub body: Vec<StatementNode>,
}

impl Node for GroupNode {
    fn pos(&self) -> Pos {
        self.lbrace
    }

    fn end(&self) -> Pos {
        self.rbrace + 1
    }
}

/// Subshell: ( ... )
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubshellNode {
    pub lparen: Pos,
    pub rparen: Pos,
    pub body: Vec<StatementNode>,
}

impl Node for SubshellNode {
    fn pos(&self) -> Pos {
        self.lparen
    }

    fn end(&self) -> Pos {
        self.rparen + 1
    }
}

/// Arithmetic command: (( expr ))
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArithmeticCommandNode {
    pub left: Pos,
    pub right: Pos,
    pub expression: Option<ArithExpr>,
}

impl Node for ArithmeticCommandNode {
    fn pos(&self) -> Pos {
        self.left
    }

    fn end(&self) -> Pos {
        self.right + 2
    }
}

/// Conditional command: [[ expr ]]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionalCommandNode {
    pub left: Pos,
    pub right: Pos,
    pub expression: ConditionalExpressionNode,
}

impl Node for ConditionalCommandNode {
    fn pos(&self) -> Pos {
        self.left
    }

    fn end(&self) -> Pos {
        self.right + 2
    }
}

// =============================================================================
// FUNCTIONS & BASH CLAUSES
// =============================================================================

/// Function definition: `name() body` or `function name body`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefNode {
    pub position: Pos,
    /// Declared with the `function` keyword
    pub bash_style: bool,
    pub name: LiteralPart,
    pub body: Box<StatementNode>,
}

impl Node for FunctionDefNode {
    fn pos(&self) -> Pos {
        self.position
    }

    fn end(&self) -> Pos {
        self.body.end()
    }
}

/// declare, local, export, readonly, typeset, nameref
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeclareNode {
    pub position: Pos,
    pub variant: String,
    pub opts: Vec<WordNode>,
    pub assignments: Vec<AssignmentNode>,
}

impl Node for DeclareNode {
    fn pos(&self) -> Pos {
        self.position
    }

    fn end(&self) -> Pos {
        let opts = words_end(&self.opts);
        let assigns = self.assignments.last().map(Node::end);
        opts.max(assigns)
            .unwrap_or(self.position + self.variant.len())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalNode {
    pub eval_pos: Pos,
    pub statement: Option<Box<StatementNode>>,
}

impl Node for EvalNode {
    fn pos(&self) -> Pos {
        self.eval_pos
    }

    fn end(&self) -> Pos {
        match &self.statement {
            Some(stmt) => stmt.end(),
            None => self.eval_pos + 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LetNode {
    pub let_pos: Pos,
    /// Never empty
    pub expressions: Vec<ArithExpr>,
}

impl Node for LetNode {
    fn pos(&self) -> Pos {
        self.let_pos
    }

    fn end(&self) -> Pos {
        self.expressions
            .last()
            .map_or(self.let_pos + 3, Node::end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoprocNode {
    pub coproc_pos: Pos,
    pub name: Option<LiteralPart>,
    pub statement: Box<StatementNode>,
}

impl Node for CoprocNode {
    fn pos(&self) -> Pos {
        self.coproc_pos
    }

    fn end(&self) -> Pos {
        self.statement.end()
    }
}

// =============================================================================
// ASSIGNMENTS
// =============================================================================

/// Variable assignment: VAR=value or VAR+=value
///
/// Inside declare-style clauses a bare word is kept as an assignment with no
/// name; everywhere else `name` is always present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentNode {
    pub append: bool,
    /// A bare name with no `=`, as in `local foo`
    pub naked: bool,
    pub name: Option<LiteralPart>,
    pub value: Option<WordNode>,
}

impl Node for AssignmentNode {
    fn pos(&self) -> Pos {
        match (&self.name, &self.value) {
            (Some(name), _) => name.pos(),
            (None, Some(value)) => value.pos(),
            (None, None) => Pos::INVALID,
        }
    }

    fn end(&self) -> Pos {
        if let Some(value) = &self.value {
            return value.end();
        }
        match &self.name {
            Some(name) if self.naked => name.end(),
            Some(name) if self.append => name.end() + 2,
            Some(name) => name.end() + 1,
            None => Pos::INVALID,
        }
    }
}

// =============================================================================
// REDIRECTIONS
// =============================================================================

/// I/O redirection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedirectionNode {
    pub op_pos: Pos,
    pub operator: RedirectionOperator,
    /// Explicit file descriptor, as in `2>`
    pub fd: Option<LiteralPart>,
    /// Target word, or the stop word for heredocs
    pub target: WordNode,
    /// Heredoc body; filled in once the end of the line is reached
    pub heredoc: Option<WordNode>,
}

impl Node for RedirectionNode {
    fn pos(&self) -> Pos {
        match &self.fd {
            Some(fd) => fd.pos(),
            None => self.op_pos,
        }
    }

    fn end(&self) -> Pos {
        self.target.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RedirectionOperator {
    Less,      // <
    Great,     // >
    DGreat,    // >>
    GreatAnd,  // >&
    LessAnd,   // <&
    LessGreat, // <>
    Clobber,   // >|
    AndGreat,  // &>
    AndDGreat, // &>>
    TLess,     // <<<
    DLess,     // <<
    DLessDash, // <<-
}

impl RedirectionOperator {
    /// Operators whose body is read from the following lines
    pub fn is_heredoc(self) -> bool {
        matches!(self, Self::DLess | Self::DLessDash)
    }
}

impl fmt::Display for RedirectionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Less => write!(f, "<"),
            Self::Great => write!(f, ">"),
            Self::DGreat => write!(f, ">>"),
            Self::GreatAnd => write!(f, ">&"),
            Self::LessAnd => write!(f, "<&"),
            Self::LessGreat => write!(f, "<>"),
            Self::Clobber => write!(f, ">|"),
            Self::AndGreat => write!(f, "&>"),
            Self::AndDGreat => write!(f, "&>>"),
            Self::TLess => write!(f, "<<<"),
            Self::DLess => write!(f, "<<"),
            Self::DLessDash => write!(f, "<<-"),
        }
    }
}

// =============================================================================
// WORDS (the heart of shell parsing)
// =============================================================================

/// A Word is a sequence of adjacent parts that form a single shell word.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordNode {
    /// Never empty
    pub parts: Vec<WordPart>,
}

impl WordNode {
    /// The literal value when the word is a single plain literal.
    pub fn lit(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [WordPart::Literal(l)] => Some(&l.value),
            _ => None,
        }
    }
}

impl Node for WordNode {
    fn pos(&self) -> Pos {
        self.parts.first().map_or(Pos::INVALID, Node::pos)
    }

    fn end(&self) -> Pos {
        self.parts.last().map_or(Pos::INVALID, Node::end)
    }
}

/// Parts that can make up a word
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum WordPart {
    Literal(LiteralPart),
    SingleQuoted(SingleQuotedPart),
    DoubleQuoted(DoubleQuotedPart),
    ParameterExpansion(Box<ParameterExpansionPart>),
    CommandSubstitution(CommandSubstitutionPart),
    ArithmeticExpansion(Box<ArithmeticExpansionPart>),
    ProcessSubstitution(ProcessSubstitutionPart),
    Array(ArrayPart),
    ExtGlob(ExtGlobPart),
}

impl Node for WordPart {
    fn pos(&self) -> Pos {
        match self {
            Self::Literal(p) => p.pos(),
            Self::SingleQuoted(p) => p.pos(),
            Self::DoubleQuoted(p) => p.pos(),
            Self::ParameterExpansion(p) => p.pos(),
            Self::CommandSubstitution(p) => p.pos(),
            Self::ArithmeticExpansion(p) => p.pos(),
            Self::ProcessSubstitution(p) => p.pos(),
            Self::Array(p) => p.pos(),
            Self::ExtGlob(p) => p.pos(),
        }
    }

    fn end(&self) -> Pos {
        match self {
            Self::Literal(p) => p.end(),
            Self::SingleQuoted(p) => p.end(),
            Self::DoubleQuoted(p) => p.end(),
            Self::ParameterExpansion(p) => p.end(),
            Self::CommandSubstitution(p) => p.end(),
            Self::ArithmeticExpansion(p) => p.end(),
            Self::ProcessSubstitution(p) => p.end(),
            Self::Array(p) => p.end(),
            Self::ExtGlob(p) => p.end(),
        }
    }
}

/// Literal text. Escaped newlines are already removed from `value`, so the
/// end is stored rather than derived from its length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiteralPart {
    pub value_pos: Pos,
    pub value_end: Pos,
    pub value: String,
}

impl Node for LiteralPart {
    fn pos(&self) -> Pos {
        self.value_pos
    }

    fn end(&self) -> Pos {
        self.value_end
    }
}

/// Single-quoted string: 'literal' or $'escaped'
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SingleQuotedPart {
    pub position: Pos,
    pub dollar: bool,
    pub value: String,
}

impl Node for SingleQuotedPart {
    fn pos(&self) -> Pos {
        self.position
    }

    fn end(&self) -> Pos {
        let end = self.position + 2 + self.value.len();
        if self.dollar {
            end + 1
        } else {
            end
        }
    }
}

/// Double-quoted string: "with $expansion" or $"translated"
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoubleQuotedPart {
    pub position: Pos,
    pub dollar: bool,
    pub parts: Vec<WordPart>,
}

impl Node for DoubleQuotedPart {
    fn pos(&self) -> Pos {
        self.position
    }

    fn end(&self) -> Pos {
        match self.parts.last() {
            Some(last) => last.end() + 1,
            None if self.dollar => self.position + 3,
            None => self.position + 2,
        }
    }
}

// =============================================================================
// PARAMETER EXPANSION
// =============================================================================

/// Parameter expansion: $VAR or ${VAR...}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterExpansionPart {
    pub dollar: Pos,
    /// Invalid for the short form
    pub rbrace: Pos,
    /// `$name` rather than `${...}`
    pub short: bool,
    /// `${#name}`
    pub length: bool,
    /// `${!name}`
    pub indirect: bool,
    pub param: LiteralPart,
    pub index: Option<ArithExpr>,
    pub slice: Option<SliceOp>,
    pub replace: Option<ReplaceOp>,
    pub expansion: Option<ExpansionOp>,
}

impl Node for ParameterExpansionPart {
    fn pos(&self) -> Pos {
        self.dollar
    }

    fn end(&self) -> Pos {
        if self.short {
            self.param.end()
        } else {
            self.rbrace + 1
        }
    }
}

/// ${VAR:offset} or ${VAR:offset:length}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliceOp {
    pub offset: Option<ArithExpr>,
    pub length: Option<ArithExpr>,
}

/// ${VAR/pattern/replacement} or ${VAR//pattern/replacement}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplaceOp {
    pub all: bool,
    pub orig: Option<WordNode>,
    pub with: Option<WordNode>,
}

/// Defaults, alternatives, pattern removal and case modification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpansionOp {
    pub operator: ParamExpOperator,
    pub word: Option<WordNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParamExpOperator {
    AlternateUnset,       // +
    AlternateUnsetOrNull, // :+
    DefaultUnset,         // -
    DefaultUnsetOrNull,   // :-
    ErrorUnset,           // ?
    ErrorUnsetOrNull,     // :?
    AssignUnset,          // =
    AssignUnsetOrNull,    // :=
    RemSmallSuffix,       // %
    RemLargeSuffix,       // %%
    RemSmallPrefix,       // #
    RemLargePrefix,       // ##
    UpperFirst,           // ^
    UpperAll,             // ^^
    LowerFirst,           // ,
    LowerAll,             // ,,
}

impl fmt::Display for ParamExpOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AlternateUnset => "+",
            Self::AlternateUnsetOrNull => ":+",
            Self::DefaultUnset => "-",
            Self::DefaultUnsetOrNull => ":-",
            Self::ErrorUnset => "?",
            Self::ErrorUnsetOrNull => ":?",
            Self::AssignUnset => "=",
            Self::AssignUnsetOrNull => ":=",
            Self::RemSmallSuffix => "%",
            Self::RemLargeSuffix => "%%",
            Self::RemSmallPrefix => "#",
            Self::RemLargePrefix => "##",
            Self::UpperFirst => "^",
            Self::UpperAll => "^^",
            Self::LowerFirst => ",",
            Self::LowerAll => ",,",
        };
        f.write_str(s)
    }
}

// =============================================================================
// SUBSTITUTIONS
// =============================================================================

/// Command substitution: $(cmd) or `cmd`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandSubstitutionPart {
    pub left: Pos,
    pub right: Pos,
    pub body: Vec<StatementNode>,
    /// Legacy backtick syntax
    pub backquote: bool,
}

impl Node for CommandSubstitutionPart {
    fn pos(&self) -> Pos {
        self.left
    }

    fn end(&self) -> Pos {
        self.right + 1
    }
}

/// Process substitution: <(cmd) or >(cmd)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessSubstitutionPart {
    pub op_pos: Pos,
    pub rparen: Pos,
    pub direction: ProcessDirection,
    pub body: Vec<StatementNode>,
}

impl Node for ProcessSubstitutionPart {
    fn pos(&self) -> Pos {
        self.op_pos
    }

    fn end(&self) -> Pos {
        self.rparen + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProcessDirection {
    Input,  // <(...)
    Output, // >(...)
}

impl fmt::Display for ProcessDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "<("),
            Self::Output => write!(f, ">("),
        }
    }
}

/// Array literal on the right of an assignment: (a b c)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayPart {
    pub lparen: Pos,
    pub rparen: Pos,
    pub elements: Vec<WordNode>,
}

impl Node for ArrayPart {
    fn pos(&self) -> Pos {
        self.lparen
    }

    fn end(&self) -> Pos {
        self.rparen + 1
    }
}

// =============================================================================
// GLOB PATTERNS
// =============================================================================

/// Extended glob: ?(pat), *(pat), +(pat), @(pat), !(pat)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtGlobPart {
    pub op_pos: Pos,
    pub operator: GlobOperator,
    pub pattern: LiteralPart,
}

impl Node for ExtGlobPart {
    fn pos(&self) -> Pos {
        self.op_pos
    }

    fn end(&self) -> Pos {
        self.pattern.end() + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GlobOperator {
    ZeroOrOne,  // ?(
    ZeroOrMore, // *(
    OneOrMore,  // +(
    One,        // @(
    Except,     // !(
}

impl fmt::Display for GlobOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroOrOne => write!(f, "?("),
            Self::ZeroOrMore => write!(f, "*("),
            Self::OneOrMore => write!(f, "+("),
            Self::One => write!(f, "@("),
            Self::Except => write!(f, "!("),
        }
    }
}

// =============================================================================
// ARITHMETIC
// =============================================================================

/// Arithmetic expansion: $((expr)) or $[expr]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArithmeticExpansionPart {
    pub left: Pos,
    pub right: Pos,
    /// `$[...]` form
    pub bracket: bool,
    pub expression: Option<ArithExpr>,
}

impl Node for ArithmeticExpansionPart {
    fn pos(&self) -> Pos {
        self.left
    }

    fn end(&self) -> Pos {
        if self.bracket {
            self.right + 1
        } else {
            self.right + 2
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ArithExpr {
    Binary(Box<ArithBinaryNode>),
    Unary(Box<ArithUnaryNode>),
    Group(Box<ArithGroupNode>),
    Word(WordNode),
}

impl Node for ArithExpr {
    fn pos(&self) -> Pos {
        match self {
            Self::Binary(b) => b.left.pos(),
            Self::Unary(u) => u.pos(),
            Self::Group(g) => g.lparen,
            Self::Word(w) => w.pos(),
        }
    }

    fn end(&self) -> Pos {
        match self {
            Self::Binary(b) => b.right.end(),
            Self::Unary(u) => u.end(),
            Self::Group(g) => g.rparen + 1,
            Self::Word(w) => w.end(),
        }
    }
}

/// Binary operation; the ternary is `?` whose right side is a `:` node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArithBinaryNode {
    pub op_pos: Pos,
    pub operator: ArithBinaryOperator,
    pub left: ArithExpr,
    pub right: ArithExpr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArithBinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    LShift,
    RShift,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitOr,
    BitXor,
    LogAnd,
    LogOr,
    Comma,
    Quest,
    Colon,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    LShiftAssign,
    RShiftAssign,
    AndAssign,
    OrAssign,
    XorAssign,
}

impl ArithBinaryOperator {
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            Self::Assign
                | Self::AddAssign
                | Self::SubAssign
                | Self::MulAssign
                | Self::DivAssign
                | Self::ModAssign
                | Self::LShiftAssign
                | Self::RShiftAssign
                | Self::AndAssign
                | Self::OrAssign
                | Self::XorAssign
        )
    }
}

impl fmt::Display for ArithBinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::LShift => "<<",
            Self::RShift => ">>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::LogAnd => "&&",
            Self::LogOr => "||",
            Self::Comma => ",",
            Self::Quest => "?",
            Self::Colon => ":",
            Self::Assign => "=",
            Self::AddAssign => "+=",
            Self::SubAssign => "-=",
            Self::MulAssign => "*=",
            Self::DivAssign => "/=",
            Self::ModAssign => "%=",
            Self::LShiftAssign => "<<=",
            Self::RShiftAssign => ">>=",
            Self::AndAssign => "&=",
            Self::OrAssign => "|=",
            Self::XorAssign => "^=",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArithUnaryNode {
    pub op_pos: Pos,
    pub operator: ArithUnaryOperator,
    /// `x++` rather than `++x`
    pub postfix: bool,
    pub operand: ArithExpr,
}

impl Node for ArithUnaryNode {
    fn pos(&self) -> Pos {
        if self.postfix {
            self.operand.pos()
        } else {
            self.op_pos
        }
    }

    fn end(&self) -> Pos {
        if self.postfix {
            self.op_pos + 2
        } else {
            self.operand.end()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArithUnaryOperator {
    Not,    // !
    BitNot, // ~
    Inc,    // ++
    Dec,    // --
    Pos,    // +
    Neg,    // -
}

impl fmt::Display for ArithUnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Not => write!(f, "!"),
            Self::BitNot => write!(f, "~"),
            Self::Inc => write!(f, "++"),
            Self::Dec => write!(f, "--"),
            Self::Pos => write!(f, "+"),
            Self::Neg => write!(f, "-"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArithGroupNode {
    pub lparen: Pos,
    pub rparen: Pos,
    pub expression: ArithExpr,
}

// =============================================================================
// CONDITIONAL EXPRESSIONS (for [[ ]])
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConditionalExpressionNode {
    Binary(Box<CondBinaryNode>),
    Unary(Box<CondUnaryNode>),
    Group(Box<CondGroupNode>),
    Word(WordNode),
}

impl Node for ConditionalExpressionNode {
    fn pos(&self) -> Pos {
        match self {
            Self::Binary(b) => b.left.pos(),
            Self::Unary(u) => u.op_pos,
            Self::Group(g) => g.lparen,
            Self::Word(w) => w.pos(),
        }
    }

    fn end(&self) -> Pos {
        match self {
            Self::Binary(b) => b.right.end(),
            Self::Unary(u) => u.operand.end(),
            Self::Group(g) => g.rparen + 1,
            Self::Word(w) => w.end(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CondBinaryNode {
    pub op_pos: Pos,
    pub operator: CondBinaryOperator,
    pub left: ConditionalExpressionNode,
    pub right: ConditionalExpressionNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CondBinaryOperator {
    Eq,    // =
    EqEq,  // ==
    Ne,    // !=
    Match, // =~
    Lt,    // <
    Gt,    // >
    NumEq, // -eq
    NumNe, // -ne
    NumLt, // -lt
    NumLe, // -le
    NumGt, // -gt
    NumGe, // -ge
    Nt,    // -nt
    Ot,    // -ot
    Ef,    // -ef
    And,   // &&
    Or,    // ||
}

impl CondBinaryOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::EqEq => "==",
            Self::Ne => "!=",
            Self::Match => "=~",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::NumEq => "-eq",
            Self::NumNe => "-ne",
            Self::NumLt => "-lt",
            Self::NumLe => "-le",
            Self::NumGt => "-gt",
            Self::NumGe => "-ge",
            Self::Nt => "-nt",
            Self::Ot => "-ot",
            Self::Ef => "-ef",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

impl fmt::Display for CondBinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CondUnaryNode {
    pub op_pos: Pos,
    pub operator: CondUnaryOperator,
    pub operand: ConditionalExpressionNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CondUnaryOperator {
    Not,            // !
    Exists,         // -e, -a
    RegularFile,    // -f
    Directory,      // -d
    CharDevice,     // -c
    BlockDevice,    // -b
    NamedPipe,      // -p
    Socket,         // -S
    Symlink,        // -L, -h
    SetGid,         // -g
    SetUid,         // -u
    Readable,       // -r
    Writable,       // -w
    Executable,     // -x
    NonEmptyFile,   // -s
    Terminal,       // -t
    EmptyString,    // -z
    NonEmptyString, // -n
    OptionSet,      // -o
    VarSet,         // -v
    NameRef,        // -R
}

impl CondUnaryOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Not => "!",
            Self::Exists => "-e",
            Self::RegularFile => "-f",
            Self::Directory => "-d",
            Self::CharDevice => "-c",
            Self::BlockDevice => "-b",
            Self::NamedPipe => "-p",
            Self::Socket => "-S",
            Self::Symlink => "-L",
            Self::SetGid => "-g",
            Self::SetUid => "-u",
            Self::Readable => "-r",
            Self::Writable => "-w",
            Self::Executable => "-x",
            Self::NonEmptyFile => "-s",
            Self::Terminal => "-t",
            Self::EmptyString => "-z",
            Self::NonEmptyString => "-n",
            Self::OptionSet => "-o",
            Self::VarSet => "-v",
            Self::NameRef => "-R",
        }
    }
}

impl fmt::Display for CondUnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CondGroupNode {
    pub lparen: Pos,
    pub rparen: Pos,
    pub expression: ConditionalExpressionNode,
}

// =============================================================================
// FACTORY FUNCTIONS (AST builders)
// =============================================================================

/// AST factory for building nodes
pub struct AST;

impl AST {
    pub fn statement(position: Pos) -> StatementNode {
        StatementNode {
            command: None,
            position,
            semicolon: Pos::INVALID,
            negated: false,
            background: false,
            assignments: Vec::new(),
            redirections: Vec::new(),
        }
    }

    pub fn literal(value_pos: Pos, value_end: Pos, value: impl Into<String>) -> LiteralPart {
        LiteralPart {
            value_pos,
            value_end,
            value: value.into(),
        }
    }

    pub fn word(parts: Vec<WordPart>) -> WordNode {
        WordNode { parts }
    }

    /// Word made of a single literal part.
    pub fn literal_word(lit: LiteralPart) -> WordNode {
        WordNode {
            parts: vec![WordPart::Literal(lit)],
        }
    }

    /// Statement wrapping a simple command made of one word.
    pub fn call_statement(word: WordNode) -> StatementNode {
        let mut stmt = Self::statement(word.pos());
        stmt.command = Some(CommandNode::Simple(SimpleCommandNode { args: vec![word] }));
        stmt
    }
}
