//! The symbol table: scopes, variables, functions and the entity-set lattice.
//!
//! One [`SymbolTable`] lives for exactly one compilation. The grammar driver
//! threads it by `&mut` through the semantic actions, and code generation
//! reads it by `&` afterwards. It is never shared between compilations.
//!
//! Scopes are stored in an arena and addressed by [`ScopeId`]. Name lookup
//! starts in the current scope (locals, then parameters) and continues
//! through the lexical parents, so loop bodies and function bodies can read
//! the bindings of the program around them.

use std::collections::HashMap;

use equelle_types::{EntitySetId, ErrorCode, FunctionSignature, ValueType};
use tracing::{debug, trace};

use crate::builtins::{self, CANONICAL_SETS};
use crate::error::{SemaResult, SemanticError};

/// Name of the top-level program scope.
pub const MAIN_SCOPE_NAME: &str = "Main";

/// Name of a function scope whose real name has not been parsed yet.
pub const TEMPORARY_FUNCTION_NAME: &str = "TemporaryFunction";

/// Name given to entity sets until they are assigned to a variable.
pub const ANONYMOUS_ENTITY_SET: &str = "AnonymousEntitySet";

// ══════════════════════════════════════════════════════════════════════════════
// Scopes and variables
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

impl ScopeId {
    pub const MAIN: ScopeId = ScopeId(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Main,
    Function,
    Loop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub ty: ValueType,
    pub assigned: bool,
}

#[derive(Debug, Clone)]
pub struct Scope {
    name: String,
    kind: ScopeKind,
    parent: Option<ScopeId>,
    params: Vec<Variable>,
    locals: Vec<Variable>,
    entity_sets: Vec<EntitySetId>,
    signature: Option<FunctionSignature>,
    defined: bool,
}

impl Scope {
    fn new(name: impl Into<String>, kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Self {
            name: name.into(),
            kind,
            parent,
            params: Vec::new(),
            locals: Vec::new(),
            entity_sets: Vec::new(),
            signature: None,
            defined: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn params(&self) -> &[Variable] {
        &self.params
    }

    pub fn locals(&self) -> &[Variable] {
        &self.locals
    }

    /// Entity sets minted while this scope was current.
    pub fn entity_sets(&self) -> &[EntitySetId] {
        &self.entity_sets
    }

    pub fn signature(&self) -> Option<&FunctionSignature> {
        self.signature.as_ref()
    }

    /// Whether a function scope has had its body parsed.
    pub fn is_defined(&self) -> bool {
        self.defined
    }

    /// A variable declared directly in this scope.
    pub fn find(&self, name: &str) -> Option<&Variable> {
        self.locals
            .iter()
            .chain(&self.params)
            .find(|v| v.name == name)
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.locals
            .iter_mut()
            .chain(self.params.iter_mut())
            .find(|v| v.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct EntitySet {
    pub id: EntitySetId,
    pub parent: Option<EntitySetId>,
    pub name: String,
}

// ══════════════════════════════════════════════════════════════════════════════
// SymbolTable
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    /// Named scopes: `Main`, user functions and loop bodies.
    scope_names: HashMap<String, ScopeId>,
    functions: HashMap<String, FunctionSignature>,
    /// Indexed by `EntitySetId`.
    entity_sets: Vec<EntitySet>,
    current: ScopeId,
    next_loop_index: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self {
            scopes: vec![Scope::new(MAIN_SCOPE_NAME, ScopeKind::Main, None)],
            scope_names: HashMap::from([(MAIN_SCOPE_NAME.to_string(), ScopeId::MAIN)]),
            functions: HashMap::new(),
            entity_sets: Vec::new(),
            current: ScopeId::MAIN,
            next_loop_index: 0,
        };
        for set in CANONICAL_SETS {
            table.entity_sets.push(EntitySet {
                id: set.id,
                parent: set.parent,
                name: format!("{}()", set.accessor),
            });
        }
        for (name, signature) in builtins::signatures() {
            table.functions.insert(name.to_string(), signature);
        }
        table
    }

    // ──────────────────────────────────────────────────────────────────────
    // Variables
    // ──────────────────────────────────────────────────────────────────────

    /// Declare `name` in the current scope.
    pub fn declare_variable(&mut self, name: &str, ty: ValueType) -> SemaResult<()> {
        let scope = self.scope_mut(self.current);
        if scope.find(name).is_some() {
            return Err(SemanticError::new(
                ErrorCode::VARIABLE_ALREADY_DECLARED,
                format!("variable {name} already declared in {}", scope.name),
            ));
        }
        trace!(name, ty = %ty, scope = %scope.name, "declare variable");
        scope.locals.push(Variable {
            name: name.to_string(),
            ty,
            assigned: false,
        });
        Ok(())
    }

    /// Declare a pre-assigned parameter-like binding in the current scope.
    pub fn declare_parameter(&mut self, name: &str, ty: ValueType) -> SemaResult<()> {
        let scope = self.scope_mut(self.current);
        if scope.find(name).is_some() {
            return Err(SemanticError::new(
                ErrorCode::VARIABLE_ALREADY_DECLARED,
                format!("parameter {name} already declared in {}", scope.name),
            ));
        }
        scope.params.push(Variable {
            name: name.to_string(),
            ty,
            assigned: true,
        });
        Ok(())
    }

    pub fn is_variable_declared(&self, name: &str) -> bool {
        self.lookup_from(self.current, name).is_some()
    }

    pub fn is_variable_assigned(&self, name: &str) -> SemaResult<bool> {
        Ok(self.resolve(name)?.assigned)
    }

    pub fn set_variable_assigned(&mut self, name: &str, assigned: bool) -> SemaResult<()> {
        self.resolve_mut(name)?.assigned = assigned;
        Ok(())
    }

    pub fn variable_type(&self, name: &str) -> SemaResult<ValueType> {
        Ok(self.resolve(name)?.ty.clone())
    }

    pub fn set_variable_type(&mut self, name: &str, ty: ValueType) -> SemaResult<()> {
        self.resolve_mut(name)?.ty = ty;
        Ok(())
    }

    /// Look up a variable as seen from the named scope.
    pub fn variable_in(&self, scope_name: &str, name: &str) -> Option<&Variable> {
        let scope = *self.scope_names.get(scope_name)?;
        self.lookup_from(scope, name)
    }

    fn lookup_from(&self, scope: ScopeId, name: &str) -> Option<&Variable> {
        let mut next = Some(scope);
        while let Some(id) = next {
            let scope = self.scope(id);
            if let Some(var) = scope.find(name) {
                return Some(var);
            }
            next = scope.parent;
        }
        None
    }

    fn resolve(&self, name: &str) -> SemaResult<&Variable> {
        self.lookup_from(self.current, name)
            .ok_or_else(|| SemanticError::internal(format!("variable {name} not found")))
    }

    fn resolve_mut(&mut self, name: &str) -> SemaResult<&mut Variable> {
        let mut next = Some(self.current);
        while let Some(id) = next {
            if self.scope(id).find(name).is_some() {
                return self
                    .scope_mut(id)
                    .find_mut(name)
                    .ok_or_else(|| SemanticError::internal(format!("variable {name} vanished")));
            }
            next = self.scope(id).parent;
        }
        Err(SemanticError::internal(format!("variable {name} not found")))
    }

    // ──────────────────────────────────────────────────────────────────────
    // Functions
    // ──────────────────────────────────────────────────────────────────────

    /// Register a function. Only the program body (including loops in it)
    /// may declare functions; declaring an existing name again does nothing.
    pub fn declare_function(&mut self, name: &str, signature: FunctionSignature) -> SemaResult<()> {
        if let Some(function) = self.enclosing_function() {
            return Err(SemanticError::new(
                ErrorCode::NESTED_FUNCTION,
                format!(
                    "cannot declare function {name} inside function {}",
                    self.scope(function).name
                ),
            ));
        }
        if !self.functions.contains_key(name) {
            debug!(name, params = signature.arity(), "declare function");
            self.functions.insert(name.to_string(), signature);
        }
        Ok(())
    }

    pub fn is_function_declared(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(name)
    }

    /// Whether `name` is a function written in Equelle rather than a built-in.
    pub fn is_user_function(&self, name: &str) -> bool {
        self.scope_names
            .get(name)
            .is_some_and(|&id| self.scope(id).kind == ScopeKind::Function)
    }

    // ──────────────────────────────────────────────────────────────────────
    // Scope navigation
    // ──────────────────────────────────────────────────────────────────────

    pub fn current_scope(&self) -> ScopeId {
        self.current
    }

    pub fn current_function(&self) -> &Scope {
        self.scope(self.current)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0]
    }

    pub fn scope_by_name(&self, name: &str) -> Option<&Scope> {
        self.scope_names.get(name).map(|&id| self.scope(id))
    }

    /// The nearest function scope around the current one, if any.
    pub fn enclosing_function(&self) -> Option<ScopeId> {
        let mut next = Some(self.current);
        while let Some(id) = next {
            if self.scope(id).kind == ScopeKind::Function {
                return Some(id);
            }
            next = self.scope(id).parent;
        }
        None
    }

    /// Make the named function's scope current.
    pub fn set_current_function(&mut self, name: &str) -> SemaResult<()> {
        let id = *self
            .scope_names
            .get(name)
            .ok_or_else(|| SemanticError::internal(format!("no scope named {name}")))?;
        trace!(from = %self.scope(self.current).name, to = name, "enter scope");
        self.current = id;
        Ok(())
    }

    /// Return to the lexical parent of the current scope.
    pub fn leave_scope(&mut self) -> SemaResult<()> {
        let scope = self.scope(self.current);
        let parent = scope
            .parent
            .ok_or_else(|| SemanticError::internal("cannot leave the Main scope"))?;
        trace!(from = %scope.name, "leave scope");
        self.current = parent;
        Ok(())
    }

    /// Open an unnamed function scope for parsing a function type's
    /// parameters, and make it current.
    pub fn open_temporary_function(&mut self) -> ScopeId {
        self.push_scope(Scope::new(
            TEMPORARY_FUNCTION_NAME,
            ScopeKind::Function,
            Some(self.current),
        ))
    }

    /// Give the current function scope its real name. The variables it
    /// declared while its type was parsed become pre-assigned parameters.
    pub fn rename_current_function(&mut self, name: &str) -> SemaResult<()> {
        if self.scope_names.contains_key(name) {
            return Err(SemanticError::new(
                ErrorCode::FUNCTION_ALREADY_DEFINED,
                format!("a scope named {name} already exists"),
            ));
        }
        let id = self.current;
        let entry = self.scope_mut(id);
        if entry.kind != ScopeKind::Function {
            return Err(SemanticError::internal(format!(
                "cannot rename {} to {name}: not a function scope",
                entry.name
            )));
        }
        entry.name = name.to_string();
        let params = std::mem::take(&mut entry.locals);
        entry.params.extend(params.into_iter().map(|v| Variable {
            assigned: true,
            ..v
        }));
        self.scope_names.insert(name.to_string(), id);
        Ok(())
    }

    pub fn retype_current_function(&mut self, signature: FunctionSignature) -> SemaResult<()> {
        let id = self.current;
        let entry = self.scope_mut(id);
        if entry.kind != ScopeKind::Function {
            return Err(SemanticError::internal(format!(
                "{} is not a function scope",
                entry.name
            )));
        }
        entry.signature = Some(signature);
        Ok(())
    }

    /// Rename and retype a temporary function scope after its declaration,
    /// leaving the current scope unchanged.
    pub fn bind_function_scope(&mut self, scope: ScopeId, name: &str) -> SemaResult<()> {
        let signature = self
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| SemanticError::internal(format!("{name} is not declared")))?;
        let outer = self.current;
        self.current = scope;
        let bound = self
            .rename_current_function(name)
            .and_then(|()| self.retype_current_function(signature));
        self.current = outer;
        bound
    }

    /// Record that the current function's body has been parsed.
    pub fn mark_current_defined(&mut self) {
        self.scope_mut(self.current).defined = true;
    }

    /// Open the scope of a loop body, named `ForLoopWithIndex<N>`, and make it
    /// current. Returns the scope's name.
    pub fn open_loop_scope(&mut self) -> String {
        let name = format!("ForLoopWithIndex{}", self.next_loop_index);
        self.next_loop_index += 1;
        let id = self.push_scope(Scope::new(name.clone(), ScopeKind::Loop, Some(self.current)));
        self.scope_names.insert(name.clone(), id);
        name
    }

    fn push_scope(&mut self, scope: Scope) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(scope);
        self.current = id;
        id
    }

    // ──────────────────────────────────────────────────────────────────────
    // Entity sets
    // ──────────────────────────────────────────────────────────────────────

    /// Mint a new anonymous entity set below `parent`.
    pub fn declare_entity_set(&mut self, parent: Option<EntitySetId>) -> EntitySetId {
        let id = EntitySetId(self.entity_sets.len() as u32);
        self.entity_sets.push(EntitySet {
            id,
            parent,
            name: ANONYMOUS_ENTITY_SET.to_string(),
        });
        self.scope_mut(self.current).entity_sets.push(id);
        debug!(id = %id, parent = ?parent, "declare entity set");
        id
    }

    /// Whether `candidate` equals `domain` or lies below it in the lattice.
    pub fn is_subset(&self, candidate: EntitySetId, domain: EntitySetId) -> bool {
        let mut next = Some(candidate);
        while let Some(id) = next {
            if id == domain {
                return true;
            }
            next = self.entity_set(id).and_then(|s| s.parent);
        }
        false
    }

    pub fn entity_set(&self, id: EntitySetId) -> Option<&EntitySet> {
        self.entity_sets.get(id.0 as usize)
    }

    pub fn entity_set_name(&self, id: EntitySetId) -> Option<&str> {
        self.entity_set(id).map(|s| s.name.as_str())
    }

    pub fn set_entity_set_name(&mut self, id: EntitySetId, name: &str) -> SemaResult<()> {
        let set = self
            .entity_sets
            .get_mut(id.0 as usize)
            .ok_or_else(|| SemanticError::internal(format!("unknown entity set {id}")))?;
        debug!(id = %id, name, "name entity set");
        set.name = name.to_string();
        Ok(())
    }

    pub fn is_anonymous(&self, id: EntitySetId) -> bool {
        self.entity_set_name(id) == Some(ANONYMOUS_ENTITY_SET)
    }

    /// Render a type as Equelle source, with entity sets by name.
    pub fn type_string(&self, ty: &ValueType) -> String {
        ty.describe(|id| {
            self.entity_set_name(id)
                .map(str::to_string)
                .unwrap_or_else(|| id.to_string())
        })
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equelle_types::{BasicKind, Domain};

    fn scalar() -> ValueType {
        ValueType::single(BasicKind::Scalar)
    }

    #[test]
    fn test_canonical_sets_are_reflexive_subsets() {
        let table = SymbolTable::new();
        for set in CANONICAL_SETS {
            assert!(table.is_subset(set.id, set.id), "{}", set.accessor);
        }
    }

    #[test]
    fn test_subset_is_transitive() {
        let mut table = SymbolTable::new();
        let a = table.declare_entity_set(Some(EntitySetId::BOUNDARY_FACES));
        let b = table.declare_entity_set(Some(a));
        assert!(table.is_subset(b, a));
        assert!(table.is_subset(a, EntitySetId::ALL_FACES));
        assert!(table.is_subset(b, EntitySetId::ALL_FACES));
        assert!(!table.is_subset(EntitySetId::ALL_FACES, b));
        assert!(!table.is_subset(b, EntitySetId::ALL_CELLS));
    }

    #[test]
    fn test_runtime_sets_start_after_canonical() {
        let mut table = SymbolTable::new();
        assert_eq!(table.declare_entity_set(None), EntitySetId::FIRST_RUNTIME);
        assert_eq!(table.declare_entity_set(None), EntitySetId(13));
    }

    #[test]
    fn test_entity_set_naming() {
        let mut table = SymbolTable::new();
        assert_eq!(table.entity_set_name(EntitySetId::ALL_CELLS), Some("AllCells()"));
        let id = table.declare_entity_set(Some(EntitySetId::ALL_CELLS));
        assert!(table.is_anonymous(id));
        table.set_entity_set_name(id, "wells").unwrap();
        assert_eq!(table.entity_set_name(id), Some("wells"));
        assert!(!table.is_anonymous(id));
        assert_eq!(table.scope(ScopeId::MAIN).entity_sets(), [id]);
    }

    #[test]
    fn test_duplicate_declaration_fails() {
        let mut table = SymbolTable::new();
        table.declare_variable("x", scalar()).unwrap();
        let err = table.declare_variable("x", scalar()).unwrap_err();
        assert_eq!(err.code, ErrorCode::VARIABLE_ALREADY_DECLARED);
    }

    #[test]
    fn test_unresolved_lookup_is_internal_error() {
        let table = SymbolTable::new();
        assert!(!table.is_variable_declared("ghost"));
        assert_eq!(
            table.variable_type("ghost").unwrap_err().code,
            ErrorCode::INTERNAL
        );
    }

    #[test]
    fn test_loop_scope_sees_enclosing_bindings() {
        let mut table = SymbolTable::new();
        table.declare_variable("u0", scalar()).unwrap();
        let name = table.open_loop_scope();
        assert_eq!(name, "ForLoopWithIndex0");
        table.declare_parameter("dt", scalar()).unwrap();
        assert!(table.is_variable_declared("u0"));
        assert!(table.is_variable_assigned("dt").unwrap());
        table.leave_scope().unwrap();
        assert!(!table.is_variable_declared("dt"));
        assert_eq!(table.open_loop_scope(), "ForLoopWithIndex1");
    }

    #[test]
    fn test_temporary_function_becomes_named_scope() {
        let mut table = SymbolTable::new();
        let temp = table.open_temporary_function();
        table.declare_variable("u", scalar()).unwrap();
        table.leave_scope().unwrap();
        let sig = FunctionSignature::new(vec![], scalar());
        table.declare_function("f", sig.clone()).unwrap();
        table.bind_function_scope(temp, "f").unwrap();

        let scope = table.scope_by_name("f").unwrap();
        assert_eq!(scope.params().len(), 1);
        assert!(scope.params()[0].assigned);
        assert!(scope.locals().is_empty());
        assert_eq!(scope.signature(), Some(&sig));
        assert!(table.is_user_function("f"));
        assert!(!table.is_user_function("AllCells"));
    }

    #[test]
    fn test_rename_and_retype_current_function() {
        let mut table = SymbolTable::new();
        table.open_temporary_function();
        table.declare_variable("a", scalar()).unwrap();
        table.rename_current_function("g").unwrap();
        let sig = FunctionSignature::new(vec![], scalar());
        table.retype_current_function(sig.clone()).unwrap();

        assert_eq!(table.current_function().name(), "g");
        let scope = table.scope_by_name("g").unwrap();
        assert_eq!(scope.params()[0].name, "a");
        assert_eq!(scope.signature(), Some(&sig));
        table.leave_scope().unwrap();
        assert_eq!(table.current_scope(), ScopeId::MAIN);
    }

    #[test]
    fn test_rename_outside_function_is_internal_error() {
        let mut table = SymbolTable::new();
        let err = table.rename_current_function("g").unwrap_err();
        assert_eq!(err.code, ErrorCode::INTERNAL);
    }

    #[test]
    fn test_declare_function_inside_function_fails() {
        let mut table = SymbolTable::new();
        table.open_temporary_function();
        let err = table
            .declare_function("g", FunctionSignature::new(vec![], scalar()))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NESTED_FUNCTION);
    }

    #[test]
    fn test_redeclaring_function_is_a_no_op() {
        let mut table = SymbolTable::new();
        let first = FunctionSignature::new(vec![], scalar());
        table.declare_function("f", first.clone()).unwrap();
        table
            .declare_function("f", FunctionSignature::new(vec![], ValueType::invalid()))
            .unwrap();
        assert_eq!(table.function("f"), Some(&first));
    }

    #[test]
    fn test_variable_in_resolves_through_parents() {
        let mut table = SymbolTable::new();
        table
            .declare_variable(
                "timesteps",
                ValueType::sequence(BasicKind::Scalar),
            )
            .unwrap();
        let loop_scope = table.open_loop_scope();
        table.declare_parameter("dt", scalar()).unwrap();
        table.leave_scope().unwrap();
        assert_eq!(table.variable_in(&loop_scope, "dt").map(|v| &v.ty), Some(&scalar()));
        assert!(table.variable_in(&loop_scope, "timesteps").is_some());
        assert!(table.variable_in(MAIN_SCOPE_NAME, "dt").is_none());
    }

    #[test]
    fn test_type_string_uses_set_names() {
        let table = SymbolTable::new();
        let ty = ValueType::collection(
            BasicKind::Scalar,
            Domain::PendingSubsetOf(EntitySetId::BOUNDARY_FACES),
        );
        assert_eq!(
            table.type_string(&ty),
            "Collection Of Scalar Subset Of BoundaryFaces()"
        );
    }
}
