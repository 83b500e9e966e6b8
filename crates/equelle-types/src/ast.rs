//! The typed Equelle syntax tree.
//!
//! Nodes are only built by the semantic actions, which compute each node's
//! type once from its already-checked children. Every parent owns its
//! children; nothing is shared.

use crate::ty::{BasicKind, EntitySetId, FunctionSignature, ValueType};
use std::fmt;

// ══════════════════════════════════════════════════════════════════════════════
// Operators
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
        }
    }
}

/// `On` restricts a collection to a subset; `Extend` widens it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationOp {
    On,
    Extend,
}

impl fmt::Display for RelationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => f.write_str("On"),
            Self::Extend => f.write_str("Extend"),
        }
    }
}

/// How an assignment binds its variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignForm {
    /// The assignment introduces the binding: `x = e` for a fresh name, or
    /// the initializer of `x : T = e`.
    Define,
    /// Stores into a binding declared by an earlier statement.
    Store,
}

// ══════════════════════════════════════════════════════════════════════════════
// Nodes
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A program or function body.
    Sequence(Vec<Node>),

    // ── Literals ──
    /// `0.3`; `text` is the literal as written.
    Number { value: f64, text: String },
    /// `"dirichlet_val"`
    Str(String),

    // ── Types ──
    /// `Collection Of Scalar On AllCells()`; `domain_expr` is the `On` or
    /// `Subset Of` operand.
    TypeExpr {
        ty: ValueType,
        domain_expr: Option<Box<Node>>,
    },
    /// `Function(u : Collection Of Scalar On AllCells()) -> Scalar`
    FuncTypeExpr {
        params: Box<Node>,
        ret: Box<Node>,
        signature: FunctionSignature,
    },

    // ── Expressions ──
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
        ty: ValueType,
    },
    Comparison {
        op: CompareOp,
        left: Box<Node>,
        right: Box<Node>,
        ty: ValueType,
    },
    Negate(Box<Node>),
    /// `|x|`
    Norm { expr: Box<Node>, ty: ValueType },
    /// `p ? a : b`
    Trinary {
        predicate: Box<Node>,
        if_true: Box<Node>,
        if_false: Box<Node>,
    },
    /// `left On right`, `left Extend right`
    Relation {
        op: RelationOp,
        left: Box<Node>,
        right: Box<Node>,
        ty: ValueType,
    },
    VarRef { name: String, ty: ValueType },
    /// A function named as a value, e.g. the residual passed to `NewtonSolve`.
    FuncRef { name: String },
    /// A name with no binding yet, e.g. a parameter in a definition header.
    Identifier(String),
    FuncCall {
        name: String,
        args: Box<Node>,
        ty: ValueType,
        /// The entity set minted for this call's result, if any.
        new_domain: Option<EntitySetId>,
    },
    FuncCallArgs(Vec<Node>),
    /// `[a, b, c]`
    ArrayLiteral { elements: Vec<Node>, ty: ValueType },
    /// `expr[1]`
    RandomAccess {
        expr: Box<Node>,
        index: usize,
        ty: ValueType,
    },
    /// `u[i + 1, j]` on a Cartesian grid.
    StencilAccess {
        grid: String,
        indices: Vec<Node>,
    },
    /// `i`, `j` or `k` inside stencil brackets.
    StencilIndex(BasicKind),

    // ── Statements ──
    /// `x : T`, optionally with an initializing assignment.
    VarDecl {
        name: String,
        type_expr: Box<Node>,
        ty: ValueType,
        init: Option<Box<Node>>,
    },
    VarAssign {
        name: String,
        expr: Box<Node>,
        /// The variable's type after the assignment.
        var_ty: ValueType,
        form: AssignForm,
    },
    /// Parameter declarations of a function type.
    FuncArgsDecl(Vec<Node>),
    /// `f : Function(...) -> T`
    FuncDecl { name: String, type_expr: Box<Node> },
    /// `f(a, b) = {`: the header of a definition.
    FuncStart { name: String, params: Vec<Node> },
    /// A complete definition: header and body.
    FuncAssign { start: Box<Node>, body: Box<Node> },
    /// `-> expr`
    Return(Box<Node>),
    /// A call used as a statement, e.g. `Output("u", u)`.
    FuncCallStmt(Box<Node>),
    /// `For dt In timesteps { ... }`
    Loop {
        variable: String,
        set: String,
        scope: String,
        body: Box<Node>,
    },
    /// `u[i, j] = expr`
    StencilAssign {
        access: Box<Node>,
        expr: Box<Node>,
        /// Whether this statement introduced the grid variable.
        declares: bool,
    },
}

impl Node {
    /// The node's resolved type. Statement nodes are [`ValueType::invalid`].
    pub fn ty(&self) -> ValueType {
        match self {
            Node::Number { .. } => ValueType::single(BasicKind::Scalar),
            Node::Str(_) => ValueType::single(BasicKind::String),
            Node::TypeExpr { ty, .. } => ty.clone(),
            Node::FuncTypeExpr { signature, .. } => signature.ret.clone(),
            Node::Binary { ty, .. }
            | Node::Comparison { ty, .. }
            | Node::Norm { ty, .. }
            | Node::Relation { ty, .. }
            | Node::VarRef { ty, .. }
            | Node::FuncCall { ty, .. }
            | Node::ArrayLiteral { ty, .. }
            | Node::RandomAccess { ty, .. } => ty.clone(),
            Node::Negate(expr) => expr.ty(),
            Node::Trinary { if_true, .. } => if_true.ty(),
            Node::StencilAccess { .. } => ValueType::single(BasicKind::Scalar),
            Node::StencilIndex(axis) => ValueType::single(*axis),
            Node::VarDecl { ty, .. } => ty.clone(),
            Node::Sequence(_)
            | Node::FuncRef { .. }
            | Node::Identifier(_)
            | Node::FuncCallArgs(_)
            | Node::VarAssign { .. }
            | Node::FuncArgsDecl(_)
            | Node::FuncDecl { .. }
            | Node::FuncStart { .. }
            | Node::FuncAssign { .. }
            | Node::Return(_)
            | Node::FuncCallStmt(_)
            | Node::Loop { .. }
            | Node::StencilAssign { .. } => ValueType::invalid(),
        }
    }

    /// Direct children in traversal order.
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Sequence(nodes)
            | Node::FuncCallArgs(nodes)
            | Node::FuncArgsDecl(nodes)
            | Node::ArrayLiteral {
                elements: nodes, ..
            }
            | Node::StencilAccess { indices: nodes, .. }
            | Node::FuncStart { params: nodes, .. } => nodes.iter().collect(),
            Node::TypeExpr { domain_expr, .. } => domain_expr.iter().map(|n| &**n).collect(),
            Node::FuncTypeExpr { params, ret, .. } => vec![&**params, &**ret],
            Node::Binary { left, right, .. }
            | Node::Comparison { left, right, .. }
            | Node::Relation { left, right, .. } => vec![&**left, &**right],
            Node::Negate(expr)
            | Node::Norm { expr, .. }
            | Node::RandomAccess { expr, .. }
            | Node::VarAssign { expr, .. }
            | Node::Return(expr)
            | Node::FuncCallStmt(expr) => vec![&**expr],
            Node::Trinary {
                predicate,
                if_true,
                if_false,
            } => vec![&**predicate, &**if_true, &**if_false],
            Node::FuncCall { args, .. } => vec![&**args],
            Node::VarDecl {
                type_expr, init, ..
            } => std::iter::once(&**type_expr)
                .chain(init.as_deref())
                .collect(),
            Node::FuncDecl { type_expr, .. } => vec![&**type_expr],
            Node::FuncAssign { start, body } => vec![&**start, &**body],
            Node::Loop { body, .. } => vec![&**body],
            Node::StencilAssign { access, expr, .. } => vec![&**access, &**expr],
            Node::Number { .. }
            | Node::Str(_)
            | Node::VarRef { .. }
            | Node::FuncRef { .. }
            | Node::Identifier(_)
            | Node::StencilIndex(_) => Vec::new(),
        }
    }

    /// Short node name for diagnostics and logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Sequence(_) => "sequence",
            Node::Number { .. } => "number",
            Node::Str(_) => "string",
            Node::TypeExpr { .. } => "type expression",
            Node::FuncTypeExpr { .. } => "function type",
            Node::Binary { .. } => "binary operation",
            Node::Comparison { .. } => "comparison",
            Node::Negate(_) => "negation",
            Node::Norm { .. } => "norm",
            Node::Trinary { .. } => "trinary if",
            Node::Relation { .. } => "relation",
            Node::VarRef { .. } => "variable",
            Node::FuncRef { .. } => "function reference",
            Node::Identifier(_) => "identifier",
            Node::FuncCall { .. } => "function call",
            Node::FuncCallArgs(_) => "argument list",
            Node::ArrayLiteral { .. } => "array",
            Node::RandomAccess { .. } => "random access",
            Node::StencilAccess { .. } => "stencil access",
            Node::StencilIndex(_) => "stencil index",
            Node::VarDecl { .. } => "declaration",
            Node::VarAssign { .. } => "assignment",
            Node::FuncArgsDecl(_) => "parameter list",
            Node::FuncDecl { .. } => "function declaration",
            Node::FuncStart { .. } => "function header",
            Node::FuncAssign { .. } => "function definition",
            Node::Return(_) => "return",
            Node::FuncCallStmt(_) => "call statement",
            Node::Loop { .. } => "loop",
            Node::StencilAssign { .. } => "stencil statement",
        }
    }
}
