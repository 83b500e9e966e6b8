//! C++ emission for the CPU runtime.
//!
//! [`CpuEmitter`] is an [`AstVisitor`]: [`walk`] drives it over the typed
//! program and the hooks append text. Expressions are written inline by
//! `enter`/`between`/`leave`; statements start at the current indentation
//! and end with a newline.
//!
//! Function definitions are emitted twice, first as plain closures and then
//! as automatic-differentiation closures prefixed `AD`. Each copy is its own
//! walk over the body with a fixed [`EmitMode`].

use equelle_sema::symbols::MAIN_SCOPE_NAME;
use equelle_sema::SymbolTable;
use equelle_types::ast::{AssignForm, Node, RelationOp};
use equelle_types::visit::{walk, AstVisitor, Flow};
use equelle_types::{BasicKind, Composite, ValueType};
use tracing::{debug, trace};

use crate::error::{CodegenError, CodegenResult};
use crate::skeleton;

/// The built-in whose function arguments are differentiated.
const NEWTON_SOLVE: &str = "NewtonSolve";

// ══════════════════════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════════════════════

/// Emit a complete C++ program for a checked Equelle program.
///
/// `symbols` must be the table the program was checked against.
pub fn emit_cpu(program: &Node, symbols: &SymbolTable) -> CodegenResult<String> {
    CpuEmitter::new(symbols).emit(program)
}

/// Whether closures are emitted on plain values or on AD values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitMode {
    Plain,
    AutoDiff,
}

// ══════════════════════════════════════════════════════════════════════════════
// Name translation
// ══════════════════════════════════════════════════════════════════════════════

/// Runtime built-ins start with an uppercase letter and live on the runtime
/// object: `AllCells()` becomes `er.allCells()`. Other names are kept.
pub fn runtime_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_uppercase() => {
            format!("er.{}{}", first.to_lowercase(), chars.as_str())
        }
        _ => name.to_string(),
    }
}

/// C++ type name of an Equelle type, e.g. `CollOfScalar` or `SeqOfScalar`.
pub fn cpp_type(ty: &ValueType, mode: EmitMode) -> CodegenResult<String> {
    let basic = match ty.basic {
        BasicKind::Bool => "Bool",
        BasicKind::Scalar => "Scalar",
        BasicKind::Vector => "Vector",
        BasicKind::String => "String",
        BasicKind::Cell => "Cell",
        BasicKind::Face => "Face",
        BasicKind::Edge => "Edge",
        BasicKind::Vertex => "Vertex",
        other => {
            return Err(CodegenError::Internal(format!(
                "no C++ type for {other}"
            )))
        }
    };
    let mut name = match ty.composite {
        Composite::Single => String::new(),
        Composite::Collection => "CollOf".to_string(),
        Composite::Sequence => "SeqOf".to_string(),
    };
    name.push_str(basic);
    if mode == EmitMode::AutoDiff && ty.is_collection() && ty.basic == BasicKind::Scalar {
        name.push_str("AD");
    }
    Ok(match ty.array_size {
        Some(size) => format!("std::array<{name}, {size}>"),
        None => name,
    })
}

fn string_literal(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Indexing a collection of vectors selects one component column.
fn is_column_access(indexed: &Node) -> bool {
    let ty = indexed.ty();
    ty.is_collection() && !ty.is_array()
}

fn uses_stencils(node: &Node) -> bool {
    matches!(node, Node::StencilAssign { .. }) || node.children().into_iter().any(uses_stencils)
}

// ══════════════════════════════════════════════════════════════════════════════
// Emitter
// ══════════════════════════════════════════════════════════════════════════════

pub struct CpuEmitter<'a> {
    symbols: &'a SymbolTable,
    out: String,
    /// Indentation level; four spaces each. The generated function body is
    /// level 1.
    indent: usize,
    /// Drops output while set, e.g. for the type part of a declaration.
    suppressed: bool,
    mode: EmitMode,
    /// Names of the scopes enclosing the current node, innermost last.
    scopes: Vec<String>,
    /// One entry per open call: whether it is a `NewtonSolve`.
    calls: Vec<bool>,
}

impl<'a> CpuEmitter<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Self {
            symbols,
            out: String::new(),
            indent: 1,
            suppressed: false,
            mode: EmitMode::Plain,
            scopes: vec![MAIN_SCOPE_NAME.to_string()],
            calls: Vec::new(),
        }
    }

    /// Emit the skeleton with `program`'s statements inside it.
    pub fn emit(mut self, program: &Node) -> CodegenResult<String> {
        let with_grid = uses_stencils(program);
        self.out.push_str(&skeleton::prologue(with_grid));
        walk(program, &mut self)?;
        self.out.push_str(skeleton::epilogue());
        debug!(bytes = self.out.len(), with_grid, "emitted C++");
        Ok(self.out)
    }

    /// Emit a statement list without the skeleton.
    pub fn emit_statements(mut self, statements: &Node) -> CodegenResult<String> {
        walk(statements, &mut self)?;
        Ok(self.out)
    }

    // ── Output helpers ────────────────────────────────────────────────────────

    fn write(&mut self, text: &str) {
        if !self.suppressed {
            self.out.push_str(text);
        }
    }

    fn indentation(&self) -> String {
        " ".repeat(self.indent * 4)
    }

    fn start_line(&mut self) {
        let indentation = self.indentation();
        self.write(&indentation);
    }

    fn end_line(&mut self) {
        self.write("\n");
    }

    fn cpp_type(&self, ty: &ValueType) -> CodegenResult<String> {
        cpp_type(ty, self.mode)
    }

    fn current_scope(&self) -> &str {
        self.scopes.last().map_or(MAIN_SCOPE_NAME, String::as_str)
    }

    /// `AD` in automatic-differentiation mode, nothing otherwise.
    fn ad_prefix(&self) -> &'static str {
        match self.mode {
            EmitMode::AutoDiff => "AD",
            EmitMode::Plain => "",
        }
    }

    // ── Statements ────────────────────────────────────────────────────────────

    /// `const T x = ` for a single assignment that introduces `x`, plain
    /// `x = ` when a `T x;` line already declared it.
    fn enter_assignment(
        &mut self,
        name: &str,
        var_ty: &ValueType,
        form: AssignForm,
    ) -> CodegenResult<()> {
        self.start_line();
        if form == AssignForm::Store || var_ty.mutable {
            self.write(&format!("{name} = "));
        } else {
            let ty = self.cpp_type(var_ty)?;
            self.write(&format!("const {ty} {name} = "));
        }
        trace!(name, ?form, "assignment");
        Ok(())
    }

    /// Emit both closures of a definition.
    fn emit_function(&mut self, start: &Node, body: &Node) -> CodegenResult<()> {
        let Node::FuncStart { name, .. } = start else {
            return Err(CodegenError::Internal(format!(
                "function definition starts with a {}",
                start.kind_name()
            )));
        };
        let outer = self.mode;
        for mode in [EmitMode::Plain, EmitMode::AutoDiff] {
            self.mode = mode;
            self.emit_closure(name, body)?;
        }
        self.mode = outer;
        Ok(())
    }

    /// `std::function<R(const A&, ...)> f = [&](const A& a, ...) -> R { ... };`
    fn emit_closure(&mut self, name: &str, body: &Node) -> CodegenResult<()> {
        let signature = self
            .symbols
            .function(name)
            .ok_or_else(|| CodegenError::UnresolvedSymbol(format!("function {name}")))?;
        let ret = self.cpp_type(&signature.ret)?;
        let mut arg_types = Vec::with_capacity(signature.params.len());
        let mut params = Vec::with_capacity(signature.params.len());
        for param in &signature.params {
            let ty = self.cpp_type(&param.ty)?;
            arg_types.push(format!("const {ty}&"));
            params.push(format!("const {ty}& {}", param.name));
        }

        self.start_line();
        let header = format!(
            "std::function<{ret}({})> {}{name} = [&]({}) -> {ret} {{",
            arg_types.join(", "),
            self.ad_prefix(),
            params.join(", ")
        );
        self.write(&header);
        self.end_line();

        self.indent += 1;
        self.scopes.push(name.to_string());
        walk(body, self)?;
        self.scopes.pop();
        self.indent -= 1;

        self.start_line();
        self.write("};");
        self.end_line();
        debug!(name, mode = ?self.mode, "emitted function");
        Ok(())
    }

    /// The element type comes from the loop set as seen from the enclosing
    /// scope.
    fn enter_loop(&mut self, variable: &str, set: &str, scope: &str) -> CodegenResult<()> {
        let set_var = self
            .symbols
            .variable_in(self.current_scope(), set)
            .ok_or_else(|| CodegenError::UnresolvedSymbol(format!("loop set {set}")))?;
        let ty = self.cpp_type(&set_var.ty.element_type())?;
        self.start_line();
        self.write(&format!("for (const {ty}& {variable} : {set}) {{"));
        self.end_line();
        self.indent += 1;
        self.scopes.push(scope.to_string());
        Ok(())
    }

    // ── Stencils ──────────────────────────────────────────────────────────────

    /// Opens the per-cell lambda; the assignment itself is written by the
    /// children.
    fn enter_stencil(&mut self, access: &Node, declares: bool) -> CodegenResult<()> {
        let Node::StencilAccess { grid, indices } = access else {
            return Err(CodegenError::Internal(format!(
                "stencil statement assigns to a {}",
                access.kind_name()
            )));
        };
        if indices.len() != 2 {
            return Err(CodegenError::Unsupported(format!(
                "{}-dimensional stencil on {grid}",
                indices.len()
            )));
        }
        if declares {
            self.start_line();
            self.write(&format!(
                "CartesianCollectionOfScalar {grid} = grid.inputCellScalarWithDefault({}, double(0));",
                string_literal(grid)
            ));
            self.end_line();
        }
        self.start_line();
        self.write("grid.allCells().execute([&](int i, int j) {");
        self.end_line();
        self.indent += 1;
        self.start_line();
        Ok(())
    }

    /// `grid.cellAt(i + 1, j, u)`
    fn stencil_access(&self, grid: &str, indices: &[Node]) -> CodegenResult<String> {
        if indices.len() != 2 {
            return Err(CodegenError::Unsupported(format!(
                "{}-dimensional stencil on {grid}",
                indices.len()
            )));
        }
        let rendered = indices
            .iter()
            .map(stencil_offset)
            .collect::<CodegenResult<Vec<_>>>()?;
        Ok(format!("grid.cellAt({}, {grid})", rendered.join(", ")))
    }

    // ── Relations ─────────────────────────────────────────────────────────────

    /// The middle argument of `operatorOn`/`operatorExtend`: the set the
    /// left operand lives on, when it is a collection.
    fn relation_domain(&self, left: &Node) -> CodegenResult<Option<String>> {
        let ty = left.ty();
        if !ty.is_collection() {
            return Ok(None);
        }
        let id = ty.domain.bound().ok_or_else(|| {
            CodegenError::Internal(format!("{} has no domain", left.kind_name()))
        })?;
        if self.symbols.is_anonymous(id) {
            return Err(CodegenError::UnresolvedSymbol(format!("entity set {id}")));
        }
        let name = self
            .symbols
            .entity_set_name(id)
            .ok_or_else(|| CodegenError::UnresolvedSymbol(format!("entity set {id}")))?;
        Ok(Some(runtime_name(name)))
    }
}

/// One stencil index, e.g. `i + 1`. Offsets are written as integers.
fn stencil_offset(node: &Node) -> CodegenResult<String> {
    match node {
        Node::StencilIndex(BasicKind::StencilI) => Ok("i".to_string()),
        Node::StencilIndex(BasicKind::StencilJ) => Ok("j".to_string()),
        Node::StencilIndex(BasicKind::StencilK) => Ok("k".to_string()),
        Node::Number { text, .. } => Ok(text.clone()),
        Node::Negate(inner) => Ok(format!("-{}", stencil_offset(inner)?)),
        Node::Binary {
            op, left, right, ..
        } => Ok(format!(
            "{} {} {}",
            stencil_offset(left)?,
            op.symbol(),
            stencil_offset(right)?
        )),
        other => Err(CodegenError::Unsupported(format!(
            "{} in a stencil index",
            other.kind_name()
        ))),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Visitor
// ══════════════════════════════════════════════════════════════════════════════

impl AstVisitor for CpuEmitter<'_> {
    type Error = CodegenError;

    fn enter(&mut self, node: &Node) -> CodegenResult<Flow> {
        match node {
            Node::Sequence(_)
            | Node::FuncCallArgs(_)
            | Node::Identifier(_)
            | Node::FuncArgsDecl(_) => {}
            Node::TypeExpr { .. }
            | Node::FuncTypeExpr { .. }
            | Node::FuncDecl { .. }
            | Node::FuncStart { .. } => return Ok(Flow::SkipChildren),

            // ── Expressions ──
            Node::Number { text, .. } => self.write(&format!("double({text})")),
            Node::Str(text) => self.write(&string_literal(text)),
            Node::Binary { .. } | Node::Comparison { .. } => self.write("("),
            Node::Negate(_) => self.write("-"),
            Node::Norm { .. } => self.write("er.norm("),
            Node::Trinary { .. } => self.write("er.trinaryIf("),
            Node::Relation { op, .. } => match op {
                RelationOp::On => self.write("er.operatorOn("),
                RelationOp::Extend => self.write("er.operatorExtend("),
            },
            Node::VarRef { name, .. } => self.write(name),
            Node::FuncRef { name } => {
                let prefix = if self.calls.last() == Some(&true) {
                    "AD"
                } else {
                    ""
                };
                self.write(&format!("{prefix}{name}"));
            }
            Node::FuncCall { name, .. } => {
                self.calls.push(name == NEWTON_SOLVE);
                let callee = if self.symbols.is_user_function(name) {
                    format!("{}{name}", self.ad_prefix())
                } else {
                    runtime_name(name)
                };
                self.write(&format!("{callee}("));
            }
            Node::ArrayLiteral { .. } => self.write("makeArray("),
            Node::RandomAccess { expr, .. } => {
                if is_column_access(expr) {
                    self.write("CollOfScalar(");
                }
            }
            Node::StencilAccess { grid, indices } => {
                let text = self.stencil_access(grid, indices)?;
                self.write(&text);
                return Ok(Flow::SkipChildren);
            }
            Node::StencilIndex(_) => {
                let text = stencil_offset(node)?;
                self.write(&text);
            }

            // ── Statements ──
            Node::VarDecl { name, ty, init, .. } => {
                if init.is_none() || ty.mutable {
                    let cpp = self.cpp_type(ty)?;
                    self.start_line();
                    self.write(&format!("{cpp} {name};"));
                    self.end_line();
                }
                self.suppressed = true;
            }
            Node::VarAssign {
                name, var_ty, form, ..
            } => self.enter_assignment(name, var_ty, *form)?,
            Node::FuncAssign { start, body } => {
                self.emit_function(start, body)?;
                return Ok(Flow::SkipChildren);
            }
            Node::Return(_) => {
                self.start_line();
                self.write("return ");
            }
            Node::FuncCallStmt(_) => self.start_line(),
            Node::Loop {
                variable,
                set,
                scope,
                ..
            } => self.enter_loop(variable, set, scope)?,
            Node::StencilAssign {
                access, declares, ..
            } => self.enter_stencil(access, *declares)?,
        }
        Ok(Flow::Continue)
    }

    fn between(&mut self, node: &Node, index: usize) -> CodegenResult<()> {
        match node {
            Node::Binary { op, .. } => self.write(&format!(" {} ", op.symbol())),
            Node::Comparison { op, .. } => self.write(&format!(" {} ", op.symbol())),
            Node::Relation { left, .. } => {
                self.write(", ");
                if let Some(domain) = self.relation_domain(left)? {
                    self.write(&format!("{domain}, "));
                }
            }
            Node::Trinary { .. } | Node::FuncCallArgs(_) | Node::ArrayLiteral { .. } => {
                self.write(", ")
            }
            // The type expression is done; the initializer is emitted.
            Node::VarDecl { .. } if index == 0 => self.suppressed = false,
            Node::StencilAssign { .. } => self.write(" = "),
            _ => {}
        }
        Ok(())
    }

    fn leave(&mut self, node: &Node) -> CodegenResult<()> {
        match node {
            Node::Binary { .. }
            | Node::Comparison { .. }
            | Node::Norm { .. }
            | Node::Trinary { .. }
            | Node::Relation { .. }
            | Node::ArrayLiteral { .. } => self.write(")"),
            Node::FuncCall { .. } => {
                self.calls.pop();
                self.write(")");
            }
            Node::RandomAccess { expr, index, .. } => {
                if is_column_access(expr) {
                    self.write(&format!(".col({index}))"));
                } else {
                    self.write(&format!("[{index}]"));
                }
            }
            Node::VarDecl { .. } => self.suppressed = false,
            Node::VarAssign { .. } | Node::Return(_) | Node::FuncCallStmt(_) => {
                self.write(";");
                self.end_line();
            }
            Node::Loop { .. } => {
                self.scopes.pop();
                self.indent -= 1;
                self.start_line();
                self.write("}");
                self.end_line();
            }
            Node::StencilAssign { .. } => {
                self.write(";");
                self.end_line();
                self.indent -= 1;
                self.start_line();
                self.write("});");
                self.end_line();
            }
            _ => {}
        }
        Ok(())
    }
}
