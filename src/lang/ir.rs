//! The bound operation tree.
//!
//! One [`BoundTree`] per source file: an arena of [`Operation`]s indexed by
//! [`OpId`], the member bodies rooted in it, the set of symbols whose
//! declarations live in it, and the non-null-flow oracle: the set of use
//! sites the front-end proved dominated by an explicit null check.

use crate::lang::SyntaxId;
use crate::lang::symbols::{RefKind, SymbolId};
use crate::lang::types::{Ty, TypeSyntax};
use rustc_hash::FxHashSet;
use serde::Serialize;

/// Index of an operation within its tree's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct OpId(pub u32);

impl OpId {
    pub const NONE: OpId = OpId(u32::MAX);

    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// A member body rooted in a tree: a method (or accessor) and its body.
pub struct MemberBody {
    pub symbol: SymbolId,
    pub body: OpId,
}

/// An argument at a call site, matched to a parameter by position.
pub struct Argument {
    pub value: OpId,
    pub ref_kind: RefKind,
}

impl Argument {
    pub fn by_value(value: OpId) -> Self {
        Argument { value, ref_kind: RefKind::None }
    }
}

/// One entry of an object or collection initializer.
pub enum Initializer {
    /// `Member = value` targeting a field, property, or indexer slot.
    Member {
        member: SymbolId,
        value: OpId,
        syntax: SyntaxId,
    },
    /// A collection initializer entry, modeled as an `Add` call.
    Add {
        method: Option<SymbolId>,
        args: Vec<OpId>,
        syntax: SyntaxId,
    },
}

/// Classification of an explicit conversion, as supplied by the binder.
pub enum ConversionKind {
    Reference,
    Unboxing,
    /// The operand is a throw expression adopting the target type.
    Throw,
    /// A user-defined conversion through the given operator method.
    UserDefined { operator: SymbolId },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceKind {
    /// An explicit or implicit `this` reference.
    This,
    /// The implicit receiver inside an object or collection initializer.
    ImplicitReceiver,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Equals,
    NotEquals,
}

/// A pattern in an `is` expression or a switch arm.
pub enum Pattern {
    Discard,
    /// A constant pattern; the operand is a literal operation.
    Constant(OpId),
    /// A type pattern, optionally binding a designation local.
    Type {
        ty: TypeSyntax,
        binding: Option<SymbolId>,
    },
    /// A property pattern: `{ Member: var binding, … }`.
    Property { clauses: Vec<PropertyClause> },
    /// A bare `var` designation binding the matched value.
    Var { binding: SymbolId },
}

pub struct PropertyClause {
    pub member: SymbolId,
    pub binding: SymbolId,
}

pub struct SwitchArm {
    pub pattern: Pattern,
    pub guard: Option<OpId>,
    pub value: OpId,
}

pub struct AnonymousMember {
    pub member: SymbolId,
    pub value: OpId,
}

/// One bound operation: an expression or statement form.
///
/// The builder has one handler per variant; a kind it does not model arrives
/// as [`Operation::Unknown`] and aborts the tree.
pub enum Operation {
    // ----- expressions -----
    NullLiteral {
        syntax: SyntaxId,
    },
    StringLiteral {
        value: String,
        syntax: SyntaxId,
    },
    TypeOfExpr {
        syntax: SyntaxId,
    },
    /// A literal of value type (numbers, booleans, enum constants).
    ValueLiteral {
        ty: Ty,
        syntax: SyntaxId,
    },
    ParameterRef {
        symbol: SymbolId,
        syntax: SyntaxId,
    },
    LocalRef {
        symbol: SymbolId,
        syntax: SyntaxId,
    },
    /// A field, property, or event reference.
    MemberRef {
        symbol: SymbolId,
        receiver: Option<OpId>,
        /// Generic qualifier of a static reference (`C<T>.Member`).
        qualifier: Option<TypeSyntax>,
        syntax: SyntaxId,
    },
    InstanceRef {
        kind: InstanceKind,
        /// The receiver type; only meaningful for `This`.
        ty: Ty,
        syntax: SyntaxId,
    },
    Assignment {
        target: OpId,
        value: OpId,
        syntax: SyntaxId,
    },
    Invocation {
        method: SymbolId,
        receiver: Option<OpId>,
        qualifier: Option<TypeSyntax>,
        /// Explicit type arguments; `None` infers fresh nodes per parameter.
        type_args: Option<Vec<TypeSyntax>>,
        args: Vec<Argument>,
        syntax: SyntaxId,
    },
    ObjectCreation {
        ty: TypeSyntax,
        ctor: Option<SymbolId>,
        args: Vec<Argument>,
        initializers: Vec<Initializer>,
        syntax: SyntaxId,
    },
    ArrayCreation {
        elem: TypeSyntax,
        inits: Vec<OpId>,
        syntax: SyntaxId,
    },
    /// An indexer or array element access.
    ElementRef {
        receiver: OpId,
        /// The indexer property; `None` for plain array indexing.
        indexer: Option<SymbolId>,
        args: Vec<Argument>,
        syntax: SyntaxId,
    },
    Conversion {
        operand: OpId,
        kind: ConversionKind,
        target: TypeSyntax,
        syntax: SyntaxId,
    },
    Coalesce {
        left: OpId,
        right: OpId,
        syntax: SyntaxId,
    },
    Conditional {
        condition: OpId,
        when_true: OpId,
        when_false: OpId,
        syntax: SyntaxId,
    },
    Binary {
        op: BinaryOperator,
        left: OpId,
        right: OpId,
        syntax: SyntaxId,
    },
    /// `throw e` as statement or expression; a bare rethrow has no operand.
    Throw {
        operand: Option<OpId>,
        syntax: SyntaxId,
    },
    /// The null-forgiving postfix operator `e!`.
    NullForgiving {
        operand: OpId,
        syntax: SyntaxId,
    },
    TupleLiteral {
        elements: Vec<OpId>,
        syntax: SyntaxId,
    },
    /// Deconstruction assignment: `(a, b) = value`.
    Deconstruct {
        targets: Vec<OpId>,
        value: OpId,
        syntax: SyntaxId,
    },
    /// A lambda or local function; `symbol` is its method-shaped symbol.
    Lambda {
        symbol: SymbolId,
        body: OpId,
        syntax: SyntaxId,
    },
    Await {
        operand: OpId,
        syntax: SyntaxId,
    },
    SwitchExpr {
        scrutinee: OpId,
        arms: Vec<SwitchArm>,
        syntax: SyntaxId,
    },
    IsPattern {
        operand: OpId,
        pattern: Pattern,
        syntax: SyntaxId,
    },
    AnonymousObject {
        ty: Ty,
        members: Vec<AnonymousMember>,
        syntax: SyntaxId,
    },

    // ----- statements -----
    Block {
        statements: Vec<OpId>,
    },
    ExprStmt {
        expr: OpId,
    },
    LocalDecl {
        local: SymbolId,
        init: Option<OpId>,
        syntax: SyntaxId,
    },
    Return {
        value: Option<OpId>,
        syntax: SyntaxId,
    },
    YieldReturn {
        value: OpId,
        syntax: SyntaxId,
    },
    If {
        condition: OpId,
        then_branch: OpId,
        else_branch: Option<OpId>,
    },
    Foreach {
        local: SymbolId,
        collection: OpId,
        body: OpId,
        syntax: SyntaxId,
    },

    /// An operation kind the front-end could not classify. Fatal.
    Unknown {
        kind: String,
        syntax: SyntaxId,
    },
}

impl Operation {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Operation::NullLiteral { .. } => "null literal",
            Operation::StringLiteral { .. } => "string literal",
            Operation::TypeOfExpr { .. } => "typeof",
            Operation::ValueLiteral { .. } => "value literal",
            Operation::ParameterRef { .. } => "parameter reference",
            Operation::LocalRef { .. } => "local reference",
            Operation::MemberRef { .. } => "member reference",
            Operation::InstanceRef { .. } => "instance reference",
            Operation::Assignment { .. } => "assignment",
            Operation::Invocation { .. } => "invocation",
            Operation::ObjectCreation { .. } => "object creation",
            Operation::ArrayCreation { .. } => "array creation",
            Operation::ElementRef { .. } => "element reference",
            Operation::Conversion { .. } => "conversion",
            Operation::Coalesce { .. } => "coalesce",
            Operation::Conditional { .. } => "conditional",
            Operation::Binary { .. } => "binary",
            Operation::Throw { .. } => "throw",
            Operation::NullForgiving { .. } => "null-forgiving",
            Operation::TupleLiteral { .. } => "tuple literal",
            Operation::Deconstruct { .. } => "deconstruction",
            Operation::Lambda { .. } => "lambda",
            Operation::Await { .. } => "await",
            Operation::SwitchExpr { .. } => "switch expression",
            Operation::IsPattern { .. } => "is-pattern",
            Operation::AnonymousObject { .. } => "anonymous object",
            Operation::Block { .. } => "block",
            Operation::ExprStmt { .. } => "expression statement",
            Operation::LocalDecl { .. } => "local declaration",
            Operation::Return { .. } => "return",
            Operation::YieldReturn { .. } => "yield return",
            Operation::If { .. } => "if",
            Operation::Foreach { .. } => "foreach",
            Operation::Unknown { .. } => "unknown",
        }
    }
}

/// A bound source file.
pub struct BoundTree {
    /// Stable path used to order commits deterministically.
    pub path: String,
    ops: Vec<Operation>,
    pub members: Vec<MemberBody>,
    /// Symbols whose declarations live in this tree.
    pub declares: Vec<SymbolId>,
    /// Use sites dominated by a proven non-null check.
    pub nonnull_flow: FxHashSet<SyntaxId>,
    next_syntax: u32,
}

impl BoundTree {
    pub fn new(path: impl Into<String>) -> Self {
        BoundTree {
            path: path.into(),
            ops: Vec::new(),
            members: Vec::new(),
            declares: Vec::new(),
            nonnull_flow: FxHashSet::default(),
            next_syntax: 0,
        }
    }

    pub fn alloc(&mut self, op: Operation) -> OpId {
        let id = OpId(self.ops.len() as u32);
        self.ops.push(op);
        id
    }

    pub fn op(&self, id: OpId) -> &Operation {
        &self.ops[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Allocate a fresh syntax occurrence id.
    pub fn fresh_syntax(&mut self) -> SyntaxId {
        let id = SyntaxId(self.next_syntax);
        self.next_syntax += 1;
        id
    }

    /// Record that a use site is dominated by a proven non-null check.
    pub fn mark_nonnull(&mut self, syntax: SyntaxId) {
        self.nonnull_flow.insert(syntax);
    }
}
