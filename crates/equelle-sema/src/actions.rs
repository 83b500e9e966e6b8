//! Semantic actions: one handler per grammar production.
//!
//! Type checking happens here, while parsing. Each handler validates its
//! already-built children against the current scope, updates the symbol
//! table, and returns the typed node. A rejected construct returns a
//! [`SemanticError`]; the grammar driver records it and carries on.
//!
//! Error codes emitted:
//! - E201: type mismatch, E202: wrong argument count
//! - E203–E211: operand, index, return and type-expression errors
//! - E300–E304: domain and lattice errors
//! - E500–E507: scope errors

use equelle_types::ast::{AssignForm, BinaryOp, CompareOp, Node, RelationOp};
use equelle_types::{
    BasicKind, Composite, Domain, EntitySetId, ErrorCode, FunctionSignature, Param, ValueType,
};
use tracing::{debug, trace};

use crate::error::{SemaResult, SemanticError};
use crate::symbols::{ScopeId, SymbolTable};

fn error<T>(code: ErrorCode, message: impl Into<String>) -> SemaResult<T> {
    Err(SemanticError::new(code, message))
}

/// Qualifier of a collection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionQualifier {
    /// `On D`
    On,
    /// `Subset Of D`
    SubsetOf,
}

/// An opened loop, waiting for its body.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopHeader {
    pub variable: String,
    pub set: String,
    pub scope: String,
}

/// An opened function type, waiting for its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingFunction(ScopeId);

// ══════════════════════════════════════════════════════════════════════════════
// SemanticActions
// ══════════════════════════════════════════════════════════════════════════════

pub struct SemanticActions<'a> {
    symbols: &'a mut SymbolTable,
}

impl<'a> SemanticActions<'a> {
    pub fn new(symbols: &'a mut SymbolTable) -> Self {
        Self { symbols }
    }

    pub fn symbols(&self) -> &SymbolTable {
        self.symbols
    }

    fn describe(&self, ty: &ValueType) -> String {
        self.symbols.type_string(ty)
    }

    fn set_name(&self, id: EntitySetId) -> String {
        self.symbols
            .entity_set_name(id)
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string())
    }

    // ══════════════════════════════════════════════════════════════════════
    // Literals and names
    // ══════════════════════════════════════════════════════════════════════

    pub fn program(&mut self, statements: Vec<Node>) -> Node {
        Node::Sequence(statements)
    }

    pub fn number(&mut self, text: &str) -> SemaResult<Node> {
        let value = text.parse::<f64>().map_err(|_| {
            SemanticError::new(ErrorCode::INVALID_NUMBER, format!("invalid number {text}"))
        })?;
        Ok(Node::Number {
            value,
            text: text.to_string(),
        })
    }

    pub fn string(&mut self, text: &str) -> Node {
        Node::Str(text.to_string())
    }

    /// A name used as a value: a variable, or a function passed by name.
    pub fn identifier(&mut self, name: &str) -> SemaResult<Node> {
        if self.symbols.is_variable_declared(name) {
            let ty = self.symbols.variable_type(name)?.immutable();
            return Ok(Node::VarRef {
                name: name.to_string(),
                ty,
            });
        }
        if self.symbols.is_function_declared(name) {
            return Ok(Node::FuncRef {
                name: name.to_string(),
            });
        }
        error(
            ErrorCode::UNKNOWN_VARIABLE,
            format!("unknown variable {name}"),
        )
    }

    // ══════════════════════════════════════════════════════════════════════
    // Declarations and assignments
    // ══════════════════════════════════════════════════════════════════════

    /// `name : T`
    pub fn declaration(&mut self, name: &str, type_expr: Node) -> SemaResult<Node> {
        let ty = type_expr.ty();
        if ty.is_invalid() {
            return error(
                ErrorCode::INVALID_TYPE_EXPRESSION,
                format!("invalid type for {name}"),
            );
        }
        self.symbols.declare_variable(name, ty.clone())?;
        debug!(name, ty = %self.describe(&ty), "declared");
        Ok(Node::VarDecl {
            name: name.to_string(),
            type_expr: Box::new(type_expr),
            ty,
            init: None,
        })
    }

    /// `name : T = expr`
    pub fn declaration_with_assignment(
        &mut self,
        name: &str,
        type_expr: Node,
        expr: Node,
    ) -> SemaResult<Node> {
        let decl = self.declaration(name, type_expr)?;
        let assign = self.assign(name, expr, AssignForm::Define)?;
        match decl {
            Node::VarDecl {
                name,
                type_expr,
                ty,
                ..
            } => Ok(Node::VarDecl {
                name,
                type_expr,
                ty,
                init: Some(Box::new(assign)),
            }),
            other => Err(SemanticError::internal(format!(
                "declaration produced a {}",
                other.kind_name()
            ))),
        }
    }

    /// `name = expr`
    pub fn assignment(&mut self, name: &str, expr: Node) -> SemaResult<Node> {
        if self.symbols.is_variable_declared(name) {
            self.assign(name, expr, AssignForm::Store)
        } else {
            self.assign(name, expr, AssignForm::Define)
        }
    }

    fn assign(&mut self, name: &str, expr: Node, form: AssignForm) -> SemaResult<Node> {
        let value = expr.ty();
        if value.is_invalid() {
            return error(
                ErrorCode::TYPE_MISMATCH,
                format!("the right-hand side of {name} has no value"),
            );
        }

        let var_ty = if !self.symbols.is_variable_declared(name) {
            let ty = value.immutable();
            self.symbols.declare_variable(name, ty.clone())?;
            ty
        } else {
            let declared = self.symbols.variable_type(name)?;
            if self.symbols.is_variable_assigned(name)? && !declared.mutable {
                return error(
                    ErrorCode::VARIABLE_ALREADY_ASSIGNED,
                    format!("variable {name} is already assigned and not Mutable"),
                );
            }
            let ty = self.concretize(name, &declared, &value)?;
            self.symbols.set_variable_type(name, ty.clone())?;
            ty
        };
        self.symbols.set_variable_assigned(name, true)?;

        // A set created by the right-hand side takes the variable's name.
        if let (true, Domain::Bound(id)) = (var_ty.is_entity_collection(), var_ty.domain) {
            if self.symbols.is_anonymous(id) {
                self.symbols.set_entity_set_name(id, name)?;
            }
        }
        trace!(name, ty = %self.describe(&var_ty), "assigned");

        Ok(Node::VarAssign {
            name: name.to_string(),
            expr: Box::new(expr),
            var_ty,
            form,
        })
    }

    /// The type a declared variable takes on when assigned `value`.
    fn concretize(
        &self,
        name: &str,
        declared: &ValueType,
        value: &ValueType,
    ) -> SemaResult<ValueType> {
        match declared.domain {
            Domain::PendingSubsetOf(bound) => {
                let shape_matches = declared.basic == value.basic
                    && value.is_collection()
                    && declared.array_size == value.array_size;
                if !shape_matches {
                    return error(
                        ErrorCode::TYPE_MISMATCH,
                        format!(
                            "cannot assign {} to {name} of type {}",
                            self.describe(value),
                            self.describe(declared)
                        ),
                    );
                }
                let Some(domain) = value.domain.bound() else {
                    return error(
                        ErrorCode::NOT_A_DOMAIN,
                        format!("the value assigned to {name} has no concrete domain"),
                    );
                };
                if !self.symbols.is_subset(domain, bound) {
                    return error(
                        ErrorCode::NOT_A_SUBSET,
                        format!(
                            "{} is not a subset of {}",
                            self.set_name(domain),
                            self.set_name(bound)
                        ),
                    );
                }
                Ok(value.clone().with_mutable(declared.mutable))
            }
            _ if declared.accepts(value) => Ok(value.clone().with_mutable(declared.mutable)),
            _ => error(
                ErrorCode::TYPE_MISMATCH,
                format!(
                    "cannot assign {} to {name} of type {}",
                    self.describe(value),
                    self.describe(declared)
                ),
            ),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Arithmetic
    // ══════════════════════════════════════════════════════════════════════

    pub fn binary(&mut self, op: BinaryOp, left: Node, right: Node) -> SemaResult<Node> {
        let (lt, rt) = (left.ty(), right.ty());
        if lt.is_array() || rt.is_array() {
            return error(
                ErrorCode::ARRAY_OPERAND,
                format!("cannot apply {} to arrays", op.symbol()),
            );
        }

        // Stencil coordinates may be offset by a scalar: `i + 1`.
        if matches!(op, BinaryOp::Add | BinaryOp::Subtract) {
            let offset = |index: &ValueType, other: &ValueType| {
                index.basic.is_stencil_index() && *other == ValueType::single(BasicKind::Scalar)
            };
            let ty = if offset(&lt, &rt) {
                Some(lt.clone())
            } else if offset(&rt, &lt) {
                Some(rt.clone())
            } else {
                None
            };
            if let Some(ty) = ty {
                return Ok(Node::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                    ty,
                });
            }
        }

        if !lt.is_numeric() || !rt.is_numeric() || lt.is_sequence() || rt.is_sequence() {
            return error(
                ErrorCode::NOT_NUMERIC,
                format!(
                    "cannot apply {} to {} and {}",
                    op.symbol(),
                    self.describe(&lt),
                    self.describe(&rt)
                ),
            );
        }
        self.check_same_domain(&lt, &rt)?;

        let basic = match op {
            BinaryOp::Add | BinaryOp::Subtract => {
                let strip = |t: &ValueType| ValueType {
                    subset_of: None,
                    ..t.immutable()
                };
                if strip(&lt) != strip(&rt) {
                    return error(
                        ErrorCode::TYPE_MISMATCH,
                        format!(
                            "operands of {} differ: {} and {}",
                            op.symbol(),
                            self.describe(&lt),
                            self.describe(&rt)
                        ),
                    );
                }
                lt.basic
            }
            BinaryOp::Multiply => {
                if lt.basic == BasicKind::Vector && rt.basic == BasicKind::Vector {
                    return error(
                        ErrorCode::INVALID_OPERAND,
                        "cannot multiply two vectors, use Dot",
                    );
                }
                if lt.basic == BasicKind::Vector || rt.basic == BasicKind::Vector {
                    BasicKind::Vector
                } else {
                    BasicKind::Scalar
                }
            }
            BinaryOp::Divide => {
                if rt.basic != BasicKind::Scalar {
                    return error(ErrorCode::INVALID_OPERAND, "the divisor must be a scalar");
                }
                lt.basic
            }
        };

        let ty = Self::broadcast(basic, &lt, &rt);
        Ok(Node::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty,
        })
    }

    pub fn comparison(&mut self, op: CompareOp, left: Node, right: Node) -> SemaResult<Node> {
        let (lt, rt) = (left.ty(), right.ty());
        if lt.is_array() || rt.is_array() {
            return error(
                ErrorCode::ARRAY_OPERAND,
                format!("cannot compare arrays with {}", op.symbol()),
            );
        }
        if lt.basic != BasicKind::Scalar
            || rt.basic != BasicKind::Scalar
            || lt.is_sequence()
            || rt.is_sequence()
        {
            return error(
                ErrorCode::NOT_NUMERIC,
                format!(
                    "{} compares scalars, found {} and {}",
                    op.symbol(),
                    self.describe(&lt),
                    self.describe(&rt)
                ),
            );
        }
        self.check_same_domain(&lt, &rt)?;
        let ty = Self::broadcast(BasicKind::Bool, &lt, &rt);
        Ok(Node::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty,
        })
    }

    pub fn norm(&mut self, expr: Node) -> SemaResult<Node> {
        let ty = expr.ty();
        if ty.is_array() {
            return error(ErrorCode::ARRAY_OPERAND, "cannot take the norm of an array");
        }
        if !(ty.is_numeric() || ty.basic.is_entity()) {
            return error(
                ErrorCode::INVALID_OPERAND,
                format!("cannot take the norm of {}", self.describe(&ty)),
            );
        }
        let ty = ValueType {
            basic: BasicKind::Scalar,
            composite: ty.composite,
            array_size: None,
            mutable: false,
            domain: ty.domain,
            subset_of: None,
        };
        Ok(Node::Norm {
            expr: Box::new(expr),
            ty,
        })
    }

    pub fn negate(&mut self, expr: Node) -> SemaResult<Node> {
        let ty = expr.ty();
        if ty.is_array() {
            return error(ErrorCode::ARRAY_OPERAND, "cannot negate an array");
        }
        if !ty.is_numeric() {
            return error(
                ErrorCode::NOT_NUMERIC,
                format!("cannot negate {}", self.describe(&ty)),
            );
        }
        Ok(Node::Negate(Box::new(expr)))
    }

    /// `predicate ? if_true : if_false`
    pub fn trinary(&mut self, predicate: Node, if_true: Node, if_false: Node) -> SemaResult<Node> {
        let (pt, tt, ft) = (predicate.ty(), if_true.ty(), if_false.ty());
        if pt.basic != BasicKind::Bool || pt.is_array() {
            return error(
                ErrorCode::NOT_BOOLEAN,
                format!("the condition must be Bool, found {}", self.describe(&pt)),
            );
        }
        if tt.immutable() != ft.immutable() {
            return error(
                ErrorCode::TYPE_MISMATCH,
                format!(
                    "branches differ: {} and {}",
                    self.describe(&tt),
                    self.describe(&ft)
                ),
            );
        }
        if pt.composite != tt.composite || pt.domain != tt.domain {
            return error(
                ErrorCode::DOMAIN_MISMATCH,
                "the condition and both branches must live on the same domain",
            );
        }
        Ok(Node::Trinary {
            predicate: Box::new(predicate),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
        })
    }

    fn check_same_domain(&self, lt: &ValueType, rt: &ValueType) -> SemaResult<()> {
        if lt.is_collection() && rt.is_collection() && lt.domain != rt.domain {
            return error(
                ErrorCode::DOMAIN_MISMATCH,
                format!(
                    "collections on different domains: {} and {}",
                    self.describe(lt),
                    self.describe(rt)
                ),
            );
        }
        Ok(())
    }

    /// Result type of an element-wise operation.
    fn broadcast(basic: BasicKind, lt: &ValueType, rt: &ValueType) -> ValueType {
        if lt.is_collection() {
            ValueType::collection(basic, lt.domain)
        } else if rt.is_collection() {
            ValueType::collection(basic, rt.domain)
        } else {
            ValueType::single(basic)
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // On / Extend
    // ══════════════════════════════════════════════════════════════════════

    pub fn relation(&mut self, op: RelationOp, left: Node, right: Node) -> SemaResult<Node> {
        let (lt, rt) = (left.ty(), right.ty());
        if lt.is_array() || rt.is_array() {
            return error(ErrorCode::ARRAY_OPERAND, format!("cannot use {op} on arrays"));
        }
        if lt.is_sequence() || rt.is_sequence() {
            return error(
                ErrorCode::INVALID_OPERAND,
                format!("cannot use {op} on sequences"),
            );
        }
        let ty = match op {
            RelationOp::On => self.on_type(&lt, &rt)?,
            RelationOp::Extend => self.extend_type(&lt, &rt)?,
        };
        Ok(Node::Relation {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty,
        })
    }

    /// `left On right`: the values of `left` at the entities listed in
    /// `right`, indexed like `right`.
    fn on_type(&self, lt: &ValueType, rt: &ValueType) -> SemaResult<ValueType> {
        if !rt.is_entity_collection() {
            return error(
                ErrorCode::NOT_ENTITY_COLLECTION,
                format!(
                    "the right side of On must be a collection of entities, found {}",
                    self.describe(rt)
                ),
            );
        }
        if !lt.is_collection() {
            return error(
                ErrorCode::NOT_A_COLLECTION,
                format!(
                    "the left side of On must be a collection, found {}",
                    self.describe(lt)
                ),
            );
        }
        let (Some(left_domain), Some(drawn_from)) = (lt.domain.bound(), rt.element_domain())
        else {
            return error(ErrorCode::NOT_A_DOMAIN, "On needs concrete domains");
        };
        if !self.symbols.is_subset(drawn_from, left_domain) {
            return error(
                ErrorCode::NOT_A_SUBSET,
                format!(
                    "{} is not a subset of {}",
                    self.set_name(drawn_from),
                    self.set_name(left_domain)
                ),
            );
        }
        Ok(lt.immutable().with_domain(rt.domain))
    }

    /// `left Extend right`: `left` widened to the whole of domain `right`.
    fn extend_type(&self, lt: &ValueType, rt: &ValueType) -> SemaResult<ValueType> {
        let right_domain = match rt.domain.bound() {
            Some(id) if rt.is_domain() && rt.element_domain() == Some(id) => id,
            _ => {
                return error(
                    ErrorCode::NOT_A_DOMAIN,
                    format!(
                        "the right side of Extend must be a domain, found {}",
                        self.describe(rt)
                    ),
                )
            }
        };
        if lt.is_collection() {
            let Some(left_domain) = lt.domain.bound() else {
                return error(ErrorCode::NOT_A_DOMAIN, "Extend needs a concrete left domain");
            };
            if !self.symbols.is_subset(left_domain, right_domain) {
                return error(
                    ErrorCode::NOT_A_SUBSET,
                    format!(
                        "{} is not a subset of {}",
                        self.set_name(left_domain),
                        self.set_name(right_domain)
                    ),
                );
            }
        }
        let mut ty = ValueType::collection(lt.basic, Domain::Bound(right_domain));
        ty.subset_of = lt.subset_of;
        Ok(ty)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Type expressions
    // ══════════════════════════════════════════════════════════════════════

    pub fn basic_type(&mut self, kind: BasicKind) -> Node {
        Node::TypeExpr {
            ty: ValueType::single(kind),
            domain_expr: None,
        }
    }

    /// `Collection Of T`, optionally `On D` or `Subset Of D`.
    pub fn collection_type(
        &mut self,
        base: Node,
        qualifier: Option<(CollectionQualifier, Node)>,
    ) -> SemaResult<Node> {
        let base_ty = base.ty();
        if !base_ty.is_basic() || base_ty.basic.is_stencil_index() {
            return error(
                ErrorCode::INVALID_TYPE_EXPRESSION,
                format!(
                    "a collection must hold a basic type, found {}",
                    self.describe(&base_ty)
                ),
            );
        }
        let Some((qualifier, domain_expr)) = qualifier else {
            return Ok(Node::TypeExpr {
                ty: ValueType::collection(base_ty.basic, Domain::NotApplicable),
                domain_expr: None,
            });
        };
        let dt = domain_expr.ty();
        let domain = match dt.domain.bound() {
            Some(id) if dt.is_entity_collection() && !dt.is_array() => id,
            _ => {
                return error(
                    ErrorCode::NOT_A_DOMAIN,
                    format!("expected a domain, found {}", self.describe(&dt)),
                )
            }
        };
        let domain = match qualifier {
            CollectionQualifier::On => Domain::Bound(domain),
            CollectionQualifier::SubsetOf => Domain::PendingSubsetOf(domain),
        };
        Ok(Node::TypeExpr {
            ty: ValueType::collection(base_ty.basic, domain),
            domain_expr: Some(Box::new(domain_expr)),
        })
    }

    /// `Sequence Of T`
    pub fn sequence_type(&mut self, base: Node) -> SemaResult<Node> {
        let ty = base.ty();
        if !ty.is_basic() {
            return error(
                ErrorCode::INVALID_TYPE_EXPRESSION,
                format!(
                    "a sequence must hold a basic type, found {}",
                    self.describe(&ty)
                ),
            );
        }
        Ok(Node::TypeExpr {
            ty: ValueType::sequence(ty.basic),
            domain_expr: None,
        })
    }

    /// `Array Of N T`
    pub fn array_type(&mut self, size: &str, base: Node) -> SemaResult<Node> {
        let size = match size.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                return error(
                    ErrorCode::INVALID_TYPE_EXPRESSION,
                    format!("array size must be a positive integer, found {size}"),
                )
            }
        };
        let ty = base.ty();
        if ty.is_array() || ty.is_invalid() {
            return error(
                ErrorCode::INVALID_TYPE_EXPRESSION,
                format!("invalid array element type {}", self.describe(&ty)),
            );
        }
        Ok(Self::retype(base, ty.with_array_size(size)))
    }

    /// `Mutable T`
    pub fn mutable_type(&mut self, base: Node) -> SemaResult<Node> {
        let ty = base.ty();
        if ty.is_invalid() {
            return error(ErrorCode::INVALID_TYPE_EXPRESSION, "invalid Mutable type");
        }
        Ok(Self::retype(base, ty.with_mutable(true)))
    }

    /// Replace a type expression's type, keeping its domain operand.
    fn retype(base: Node, ty: ValueType) -> Node {
        let domain_expr = match base {
            Node::TypeExpr { domain_expr, .. } => domain_expr,
            _ => None,
        };
        Node::TypeExpr { ty, domain_expr }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Functions
    // ══════════════════════════════════════════════════════════════════════

    /// Start parsing `Function(...)`. Parameter declarations that follow land
    /// in a temporary scope until the function's name is known.
    pub fn begin_function_type(&mut self) -> PendingFunction {
        PendingFunction(self.symbols.open_temporary_function())
    }

    /// Drop a function type that failed to parse, restoring the scope.
    pub fn abandon_function_type(&mut self, pending: PendingFunction) -> SemaResult<()> {
        if self.symbols.current_scope() == pending.0 {
            self.symbols.leave_scope()?;
        }
        Ok(())
    }

    /// `Function(params) -> ret`, with `params` the declarations parsed in
    /// the temporary scope.
    pub fn function_type(&mut self, params: Vec<Node>, ret: Node) -> SemaResult<Node> {
        let ret_ty = ret.ty();
        if ret_ty.is_array() || ret_ty.is_invalid() {
            return error(
                ErrorCode::INVALID_TYPE_EXPRESSION,
                format!("invalid return type {}", self.describe(&ret_ty)),
            );
        }
        let mut signature_params = Vec::with_capacity(params.len());
        for param in &params {
            match param {
                Node::VarDecl { name, ty, .. } => {
                    signature_params.push(Param::new(name.clone(), ty.clone()))
                }
                other => {
                    return Err(SemanticError::internal(format!(
                        "unexpected {} in parameter list",
                        other.kind_name()
                    )))
                }
            }
        }
        Ok(Node::FuncTypeExpr {
            params: Box::new(Node::FuncArgsDecl(params)),
            ret: Box::new(ret),
            signature: FunctionSignature::new(signature_params, ret_ty),
        })
    }

    /// `name : Function(...) -> T`. Names the temporary scope and returns to
    /// the enclosing one.
    pub fn function_declaration(
        &mut self,
        name: &str,
        pending: PendingFunction,
        type_expr: Node,
    ) -> SemaResult<Node> {
        let Node::FuncTypeExpr { signature, .. } = &type_expr else {
            return Err(SemanticError::internal("function declaration without a function type"));
        };
        let signature = signature.clone();
        self.abandon_function_type(pending)?;

        if self.symbols.is_variable_declared(name) {
            return error(
                ErrorCode::VARIABLE_ALREADY_DECLARED,
                format!("{name} is already a variable"),
            );
        }
        let fresh = !self.symbols.is_function_declared(name);
        self.symbols.declare_function(name, signature)?;
        if fresh {
            self.symbols.bind_function_scope(pending.0, name)?;
        }
        Ok(Node::FuncDecl {
            name: name.to_string(),
            type_expr: Box::new(type_expr),
        })
    }

    /// `name(params) = {`: enters the function's scope.
    pub fn function_start(&mut self, name: &str, params: &[String]) -> SemaResult<Node> {
        let Some(scope) = self.symbols.scope_by_name(name) else {
            return error(
                ErrorCode::UNKNOWN_FUNCTION,
                format!("function {name} must be declared before it is defined"),
            );
        };
        let Some(signature) = scope.signature() else {
            return Err(SemanticError::internal(format!("{name} has no signature")));
        };
        if scope.is_defined() {
            return error(
                ErrorCode::FUNCTION_ALREADY_DEFINED,
                format!("function {name} is already defined"),
            );
        }
        if scope.parent() != Some(self.symbols.current_scope()) {
            return error(
                ErrorCode::NESTED_FUNCTION,
                format!("function {name} must be defined where it is declared"),
            );
        }
        let declared: Vec<&str> = signature.params.iter().map(|p| p.name.as_str()).collect();
        if declared != params.iter().map(String::as_str).collect::<Vec<_>>() {
            return error(
                ErrorCode::PARAMETER_MISMATCH,
                format!(
                    "{name} is declared with parameters ({}) but defined with ({})",
                    declared.join(", "),
                    params.join(", ")
                ),
            );
        }
        self.symbols.set_current_function(name)?;
        self.symbols.mark_current_defined();
        debug!(name, "function body");
        Ok(Node::FuncStart {
            name: name.to_string(),
            params: params.iter().cloned().map(Node::Identifier).collect(),
        })
    }

    /// Closes a function body and returns to the enclosing scope.
    pub fn function_definition(&mut self, start: Node, body: Node) -> SemaResult<Node> {
        self.symbols.leave_scope()?;
        Ok(Node::FuncAssign {
            start: Box::new(start),
            body: Box::new(body),
        })
    }

    /// `-> expr`
    pub fn return_statement(&mut self, expr: Node) -> SemaResult<Node> {
        let Some(function) = self.symbols.enclosing_function() else {
            return error(
                ErrorCode::RETURN_OUTSIDE_FUNCTION,
                "return statement outside a function",
            );
        };
        let scope = self.symbols.scope(function);
        let value = expr.ty();
        if let Some(signature) = scope.signature() {
            let ret = &signature.ret;
            let ok = match ret.domain {
                Domain::PendingSubsetOf(bound) => {
                    ret.basic == value.basic
                        && value.is_collection()
                        && value
                            .domain
                            .bound()
                            .is_some_and(|d| self.symbols.is_subset(d, bound))
                }
                _ => ret.accepts(&value),
            };
            if !ok {
                return error(
                    ErrorCode::RETURN_TYPE_MISMATCH,
                    format!(
                        "{} returns {}, found {}",
                        scope.name(),
                        self.describe(ret),
                        self.describe(&value)
                    ),
                );
            }
        }
        Ok(Node::Return(Box::new(expr)))
    }

    pub fn function_call(&mut self, name: &str, args: Vec<Node>) -> SemaResult<Node> {
        let Some(signature) = self.symbols.function(name).cloned() else {
            return error(
                ErrorCode::UNKNOWN_FUNCTION,
                format!("unknown function {name}"),
            );
        };
        if args.len() != signature.arity() {
            return error(
                ErrorCode::WRONG_ARG_COUNT,
                format!(
                    "{name} takes {} arguments, found {}",
                    signature.arity(),
                    args.len()
                ),
            );
        }
        let arg_types: Vec<ValueType> = args.iter().map(Node::ty).collect();
        let mut ty = signature.resolve_return(&arg_types);
        let new_domain = signature.resolve_new_domain(&arg_types).map(|parent| {
            let id = self.symbols.declare_entity_set(Some(parent));
            ty.domain = Domain::Bound(id);
            id
        });
        trace!(name, ty = %self.describe(&ty), "call");
        Ok(Node::FuncCall {
            name: name.to_string(),
            args: Box::new(Node::FuncCallArgs(args)),
            ty,
            new_domain,
        })
    }

    pub fn call_statement(&mut self, call: Node) -> Node {
        Node::FuncCallStmt(Box::new(call))
    }

    // ══════════════════════════════════════════════════════════════════════
    // Loops
    // ══════════════════════════════════════════════════════════════════════

    /// `For variable In set {`: opens the loop body's scope.
    pub fn loop_start(&mut self, variable: &str, set: &str) -> SemaResult<LoopHeader> {
        if !self.symbols.is_variable_declared(set) {
            return error(ErrorCode::UNKNOWN_VARIABLE, format!("unknown variable {set}"));
        }
        let set_ty = self.symbols.variable_type(set)?;
        if !set_ty.is_sequence() {
            return error(
                ErrorCode::NOT_A_SEQUENCE,
                format!("cannot loop over {set} of type {}", self.describe(&set_ty)),
            );
        }
        if set_ty.is_array() {
            return error(ErrorCode::ARRAY_OPERAND, format!("cannot loop over array {set}"));
        }
        let scope = self.symbols.open_loop_scope();
        if let Err(err) = self.symbols.declare_parameter(variable, set_ty.element_type()) {
            self.symbols.leave_scope()?;
            return Err(err);
        }
        debug!(variable, set, scope = %scope, "loop");
        Ok(LoopHeader {
            variable: variable.to_string(),
            set: set.to_string(),
            scope,
        })
    }

    pub fn loop_end(&mut self, header: LoopHeader, body: Node) -> SemaResult<Node> {
        self.symbols.leave_scope()?;
        Ok(Node::Loop {
            variable: header.variable,
            set: header.set,
            scope: header.scope,
            body: Box::new(body),
        })
    }

    // ══════════════════════════════════════════════════════════════════════
    // Arrays
    // ══════════════════════════════════════════════════════════════════════

    /// `[a, b, c]`
    pub fn array_literal(&mut self, elements: Vec<Node>) -> SemaResult<Node> {
        let Some(first) = elements.first().map(Node::ty) else {
            return error(ErrorCode::EMPTY_ARRAY, "an array needs at least one element");
        };
        for element in &elements {
            let ty = element.ty();
            if ty.is_array() {
                return error(ErrorCode::ARRAY_OPERAND, "arrays cannot be nested");
            }
            if ty.immutable() != first.immutable() {
                return error(
                    ErrorCode::TYPE_MISMATCH,
                    format!(
                        "array elements differ: {} and {}",
                        self.describe(&first),
                        self.describe(&ty)
                    ),
                );
            }
        }
        let ty = first.immutable().with_array_size(elements.len());
        Ok(Node::ArrayLiteral { elements, ty })
    }

    /// `expr[index]` on an array or a vector.
    pub fn random_access(&mut self, expr: Node, index: usize) -> SemaResult<Node> {
        let ty = expr.ty();
        let element = if let Some(size) = ty.array_size {
            if index >= size {
                return error(
                    ErrorCode::INDEX_OUT_OF_RANGE,
                    format!("index {index} out of range for an array of {size}"),
                );
            }
            ValueType {
                array_size: None,
                ..ty.immutable()
            }
        } else if ty.basic == BasicKind::Vector && ty.composite != Composite::Sequence {
            if index > 2 {
                return error(
                    ErrorCode::INDEX_OUT_OF_RANGE,
                    format!("vector component {index} out of range"),
                );
            }
            ValueType {
                basic: BasicKind::Scalar,
                ..ty.immutable()
            }
        } else {
            return error(
                ErrorCode::INVALID_OPERAND,
                format!("cannot index {}", self.describe(&ty)),
            );
        };
        Ok(Node::RandomAccess {
            expr: Box::new(expr),
            index,
            ty: element,
        })
    }

    // ══════════════════════════════════════════════════════════════════════
    // Cartesian stencils
    // ══════════════════════════════════════════════════════════════════════

    /// `i`, `j` or `k` inside stencil brackets.
    pub fn stencil_index(&mut self, name: &str) -> SemaResult<Node> {
        let axis = match name {
            "i" => BasicKind::StencilI,
            "j" => BasicKind::StencilJ,
            "k" => BasicKind::StencilK,
            _ => {
                return error(
                    ErrorCode::UNKNOWN_VARIABLE,
                    format!("{name} is not a stencil index"),
                )
            }
        };
        Ok(Node::StencilIndex(axis))
    }

    /// `grid[i, j]` read inside an expression.
    pub fn stencil_access(&mut self, grid: &str, indices: Vec<Node>) -> SemaResult<Node> {
        if !self.symbols.is_variable_declared(grid) {
            return error(ErrorCode::UNKNOWN_VARIABLE, format!("unknown variable {grid}"));
        }
        let ty = self.symbols.variable_type(grid)?;
        if !(ty.is_collection() && ty.basic == BasicKind::Scalar && !ty.is_array()) {
            return error(
                ErrorCode::INVALID_OPERAND,
                format!("{grid} is not a grid of scalars"),
            );
        }
        Self::check_stencil_indices(&indices)?;
        Ok(Node::StencilAccess {
            grid: grid.to_string(),
            indices,
        })
    }

    /// `grid[i, j] = expr`. An undeclared grid is introduced as a mutable
    /// collection of scalars over all cells.
    pub fn stencil_assignment(
        &mut self,
        grid: &str,
        indices: Vec<Node>,
        expr: Node,
    ) -> SemaResult<Node> {
        let value = expr.ty();
        if value != ValueType::single(BasicKind::Scalar) {
            return error(
                ErrorCode::TYPE_MISMATCH,
                format!("a stencil assigns scalars, found {}", self.describe(&value)),
            );
        }
        Self::check_stencil_indices(&indices)?;
        let declares = !self.symbols.is_variable_declared(grid);
        if declares {
            let ty = ValueType::collection(BasicKind::Scalar, Domain::Bound(EntitySetId::ALL_CELLS))
                .with_mutable(true);
            self.symbols.declare_variable(grid, ty)?;
            self.symbols.set_variable_assigned(grid, true)?;
        }
        let access = self.stencil_access(grid, indices)?;
        Ok(Node::StencilAssign {
            access: Box::new(access),
            expr: Box::new(expr),
            declares,
        })
    }

    fn check_stencil_indices(indices: &[Node]) -> SemaResult<()> {
        if !(2..=3).contains(&indices.len()) {
            return error(
                ErrorCode::INVALID_OPERAND,
                format!("a stencil takes 2 or 3 indices, found {}", indices.len()),
            );
        }
        let expected = [BasicKind::StencilI, BasicKind::StencilJ, BasicKind::StencilK];
        for (index, axis) in indices.iter().zip(expected) {
            if index.ty().basic != axis {
                return error(
                    ErrorCode::TYPE_MISMATCH,
                    format!("stencil index must be built from {axis}"),
                );
            }
        }
        Ok(())
    }
}
