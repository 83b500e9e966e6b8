//! The Equelle value-type model.
//!
//! A [`ValueType`] is a basic kind together with its composite shape
//! (single value, collection over mesh entities, or sequence), an optional
//! fixed array size, a mutability flag and the entity-set identities that
//! describe where a collection lives.
//!
//! Types are plain data: nothing here touches the symbol table. Rendering a
//! type with entity-set *names* is done by the symbol table, which owns them.

use serde::Serialize;
use std::fmt;

// ══════════════════════════════════════════════════════════════════════════════
// Basic kinds
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BasicKind {
    Bool,
    Scalar,
    Vector,
    String,
    Cell,
    Face,
    Edge,
    Vertex,
    /// Stencil index coordinates `i`, `j`, `k` of a Cartesian grid.
    StencilI,
    StencilJ,
    StencilK,
    /// The type of statement-only nodes.
    Invalid,
}

impl BasicKind {
    /// Cells, faces, edges and vertices.
    pub fn is_entity(self) -> bool {
        matches!(self, Self::Cell | Self::Face | Self::Edge | Self::Vertex)
    }

    pub fn is_stencil_index(self) -> bool {
        matches!(self, Self::StencilI | Self::StencilJ | Self::StencilK)
    }

    /// Scalar or vector.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Scalar | Self::Vector)
    }

    /// The name used in Equelle source.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::Scalar => "Scalar",
            Self::Vector => "Vector",
            Self::String => "String",
            Self::Cell => "Cell",
            Self::Face => "Face",
            Self::Edge => "Edge",
            Self::Vertex => "Vertex",
            Self::StencilI => "StencilI",
            Self::StencilJ => "StencilJ",
            Self::StencilK => "StencilK",
            Self::Invalid => "Invalid",
        }
    }
}

impl fmt::Display for BasicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Composite {
    Single,
    /// Indexed over a set of mesh entities.
    Collection,
    Sequence,
}

// ══════════════════════════════════════════════════════════════════════════════
// Entity sets and domains
// ══════════════════════════════════════════════════════════════════════════════

/// Handle of a node in the entity-set lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntitySetId(pub u32);

impl EntitySetId {
    pub const INTERIOR_CELLS: Self = Self(0);
    pub const BOUNDARY_CELLS: Self = Self(1);
    pub const ALL_CELLS: Self = Self(2);
    pub const INTERIOR_FACES: Self = Self(3);
    pub const BOUNDARY_FACES: Self = Self(4);
    pub const ALL_FACES: Self = Self(5);
    pub const INTERIOR_EDGES: Self = Self(6);
    pub const BOUNDARY_EDGES: Self = Self(7);
    pub const ALL_EDGES: Self = Self(8);
    pub const INTERIOR_VERTICES: Self = Self(9);
    pub const BOUNDARY_VERTICES: Self = Self(10);
    pub const ALL_VERTICES: Self = Self(11);

    /// First identity handed out for sets created while compiling.
    pub const FIRST_RUNTIME: Self = Self(12);

    pub fn is_canonical(self) -> bool {
        self < Self::FIRST_RUNTIME
    }
}

impl fmt::Display for EntitySetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a collection is indexed.
///
/// `PendingSubsetOf` is produced only by a `Subset Of` type expression and is
/// turned into `Bound` by assignment or call resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Domain {
    NotApplicable,
    Bound(EntitySetId),
    PendingSubsetOf(EntitySetId),
}

impl Domain {
    pub fn bound(self) -> Option<EntitySetId> {
        match self {
            Self::Bound(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(self, Self::PendingSubsetOf(_))
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// ValueType
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ValueType {
    pub basic: BasicKind,
    pub composite: Composite,
    pub array_size: Option<usize>,
    pub mutable: bool,
    pub domain: Domain,
    /// The set the *elements* of an entity collection are drawn from, when it
    /// differs from the collection's own domain (e.g. `FirstCell(faces)`
    /// holds cells of `AllCells()` indexed over `faces`).
    pub subset_of: Option<EntitySetId>,
}

impl ValueType {
    /// A single value of the given kind.
    pub fn single(basic: BasicKind) -> Self {
        Self {
            basic,
            composite: Composite::Single,
            array_size: None,
            mutable: false,
            domain: Domain::NotApplicable,
            subset_of: None,
        }
    }

    pub fn invalid() -> Self {
        Self::single(BasicKind::Invalid)
    }

    pub fn collection(basic: BasicKind, domain: Domain) -> Self {
        Self {
            composite: Composite::Collection,
            domain,
            ..Self::single(basic)
        }
    }

    /// A canonical or user entity set used as a value: its elements are the
    /// set itself.
    pub fn domain_of(basic: BasicKind, set: EntitySetId) -> Self {
        Self::collection(basic, Domain::Bound(set))
    }

    pub fn sequence(basic: BasicKind) -> Self {
        Self {
            composite: Composite::Sequence,
            ..Self::single(basic)
        }
    }

    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_subset_of(mut self, set: EntitySetId) -> Self {
        self.subset_of = Some(set);
        self
    }

    pub fn with_array_size(mut self, size: usize) -> Self {
        self.array_size = Some(size);
        self
    }

    pub fn with_mutable(mut self, mutable: bool) -> Self {
        self.mutable = mutable;
        self
    }

    // ── Predicates ──

    pub fn is_invalid(&self) -> bool {
        self.basic == BasicKind::Invalid
    }

    /// A plain single value: not a collection, sequence or array.
    pub fn is_basic(&self) -> bool {
        self.composite == Composite::Single && self.array_size.is_none() && !self.is_invalid()
    }

    pub fn is_collection(&self) -> bool {
        self.composite == Composite::Collection
    }

    pub fn is_sequence(&self) -> bool {
        self.composite == Composite::Sequence
    }

    pub fn is_array(&self) -> bool {
        self.array_size.is_some()
    }

    pub fn is_numeric(&self) -> bool {
        self.basic.is_numeric()
    }

    pub fn is_entity_collection(&self) -> bool {
        self.is_collection() && self.basic.is_entity()
    }

    /// An entity collection with a concrete domain.
    pub fn is_domain(&self) -> bool {
        self.is_entity_collection() && !self.is_array() && self.domain.bound().is_some()
    }

    // ── Derived types ──

    /// The set an entity collection's elements are drawn from.
    pub fn element_domain(&self) -> Option<EntitySetId> {
        self.subset_of.or(self.domain.bound())
    }

    /// The type of one element of a sequence.
    pub fn element_type(&self) -> ValueType {
        ValueType {
            composite: Composite::Single,
            mutable: false,
            ..self.clone()
        }
    }

    /// The same type without the mutable qualifier.
    pub fn immutable(&self) -> ValueType {
        self.clone().with_mutable(false)
    }

    /// Whether a value of type `value` may be stored in a variable declared
    /// with `self`. Mutability is a property of the binding, not the value,
    /// and an unconstrained element source accepts any.
    pub fn accepts(&self, value: &ValueType) -> bool {
        let mut value = value.clone().with_mutable(self.mutable);
        if self.subset_of.is_none() {
            value.subset_of = None;
        }
        *self == value
    }

    /// Render the type, naming entity sets through `set_name`.
    pub fn describe(&self, set_name: impl Fn(EntitySetId) -> String) -> String {
        let mut out = String::new();
        if self.mutable {
            out.push_str("Mutable ");
        }
        if let Some(n) = self.array_size {
            out.push_str(&format!("Array Of {n} "));
        }
        match self.composite {
            Composite::Single => out.push_str(self.basic.name()),
            Composite::Sequence => {
                out.push_str("Sequence Of ");
                out.push_str(self.basic.name());
            }
            Composite::Collection => {
                out.push_str("Collection Of ");
                out.push_str(self.basic.name());
                match self.domain {
                    Domain::Bound(id) => {
                        out.push_str(" On ");
                        out.push_str(&set_name(id));
                    }
                    Domain::PendingSubsetOf(id) => {
                        out.push_str(" Subset Of ");
                        out.push_str(&set_name(id));
                    }
                    Domain::NotApplicable => {}
                }
            }
        }
        out
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(|id| id.to_string()))
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Function signatures
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Param {
    pub name: String,
    pub ty: ValueType,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Argument positions a dynamic return type is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DynamicReturn {
    pub basic_from: Option<usize>,
    pub domain_from: Option<usize>,
    /// Argument whose domain becomes the parent of a freshly minted set.
    pub subset_from: Option<usize>,
}

impl DynamicReturn {
    pub fn new(
        basic_from: Option<usize>,
        domain_from: Option<usize>,
        subset_from: Option<usize>,
    ) -> Self {
        Self {
            basic_from,
            domain_from,
            subset_from,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionSignature {
    pub params: Vec<Param>,
    pub ret: ValueType,
    pub dynamic: Option<DynamicReturn>,
}

impl FunctionSignature {
    pub fn new(params: Vec<Param>, ret: ValueType) -> Self {
        Self {
            params,
            ret,
            dynamic: None,
        }
    }

    pub fn with_dynamic(mut self, dynamic: DynamicReturn) -> Self {
        self.dynamic = Some(dynamic);
        self
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// The return type for a call with the given argument types.
    ///
    /// A declared `Subset Of` domain is returned as it is, still pending;
    /// see [`Self::resolve_new_domain`].
    pub fn resolve_return(&self, args: &[ValueType]) -> ValueType {
        let Some(dynamic) = self.dynamic else {
            return self.ret.clone();
        };
        let mut ret = self.ret.clone();
        if let Some(arg) = dynamic.basic_from.and_then(|i| args.get(i)) {
            ret.basic = arg.basic;
        }
        if let Some(arg) = dynamic.domain_from.and_then(|i| args.get(i)) {
            ret.domain = arg.domain;
        }
        ret
    }

    /// The parent of the entity set a call produces, if it produces one.
    ///
    /// Only entity collections can introduce a new set. The parent comes from
    /// the designated subset-source argument, or from a declared
    /// `Subset Of` return type. Only entity-collection returns get a
    /// concretized domain; any other `Subset Of` return stays pending.
    pub fn resolve_new_domain(&self, args: &[ValueType]) -> Option<EntitySetId> {
        let ret = self.resolve_return(args);
        if !ret.is_entity_collection() {
            return None;
        }
        if let Some(index) = self.dynamic.and_then(|d| d.subset_from) {
            return args.get(index).and_then(|arg| arg.domain.bound());
        }
        match ret.domain {
            Domain::PendingSubsetOf(parent) => Some(parent),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells_on(set: EntitySetId) -> ValueType {
        ValueType::domain_of(BasicKind::Cell, set)
    }

    #[test]
    fn test_scalar_subset_return_stays_pending() {
        let pending = Domain::PendingSubsetOf(EntitySetId::ALL_CELLS);
        let sig =
            FunctionSignature::new(vec![], ValueType::collection(BasicKind::Scalar, pending));
        assert_eq!(sig.resolve_return(&[]).domain, pending);
        assert_eq!(sig.resolve_new_domain(&[]), None);
    }

    #[test]
    fn test_predicates() {
        let scalar = ValueType::single(BasicKind::Scalar);
        assert!(scalar.is_basic());
        assert!(!scalar.is_collection());
        assert!(!scalar.with_array_size(3).is_basic());

        let all_cells = cells_on(EntitySetId::ALL_CELLS);
        assert!(all_cells.is_entity_collection());
        assert!(all_cells.is_domain());

        let pending = ValueType::collection(
            BasicKind::Face,
            Domain::PendingSubsetOf(EntitySetId::BOUNDARY_FACES),
        );
        assert!(pending.is_entity_collection());
        assert!(!pending.is_domain());

        let values = ValueType::collection(BasicKind::Scalar, Domain::Bound(EntitySetId::ALL_CELLS));
        assert!(!values.is_entity_collection());
    }

    #[test]
    fn test_element_domain_prefers_subset_source() {
        let first = cells_on(EntitySetId::INTERIOR_FACES).with_subset_of(EntitySetId::ALL_CELLS);
        assert_eq!(first.element_domain(), Some(EntitySetId::ALL_CELLS));
        assert_eq!(
            cells_on(EntitySetId::BOUNDARY_CELLS).element_domain(),
            Some(EntitySetId::BOUNDARY_CELLS)
        );
    }

    #[test]
    fn test_accepts_ignores_mutability() {
        let declared = ValueType::collection(BasicKind::Scalar, Domain::Bound(EntitySetId::ALL_CELLS))
            .with_mutable(true);
        let value = declared.immutable();
        assert!(declared.accepts(&value));
        assert!(!declared.accepts(&value.with_domain(Domain::Bound(EntitySetId::ALL_FACES))));
    }

    #[test]
    fn test_static_return() {
        let sig = FunctionSignature::new(vec![], cells_on(EntitySetId::ALL_CELLS));
        assert_eq!(sig.resolve_return(&[]), cells_on(EntitySetId::ALL_CELLS));
        assert_eq!(sig.resolve_new_domain(&[]), None);
    }

    #[test]
    fn test_dynamic_return_takes_domain_from_argument() {
        let sig = FunctionSignature::new(
            vec![Param::new("entities", ValueType::invalid())],
            ValueType::collection(BasicKind::Scalar, Domain::NotApplicable),
        )
        .with_dynamic(DynamicReturn::new(None, Some(0), None));
        let ret = sig.resolve_return(&[cells_on(EntitySetId::INTERIOR_CELLS)]);
        assert_eq!(ret.basic, BasicKind::Scalar);
        assert_eq!(ret.domain, Domain::Bound(EntitySetId::INTERIOR_CELLS));
        // Missing argument falls back to the declared return.
        assert_eq!(sig.resolve_return(&[]).domain, Domain::NotApplicable);
    }

    #[test]
    fn test_dynamic_subset_return() {
        let sig = FunctionSignature::new(
            vec![
                Param::new("name", ValueType::single(BasicKind::String)),
                Param::new("entities", ValueType::invalid()),
            ],
            ValueType::collection(BasicKind::Cell, Domain::NotApplicable),
        )
        .with_dynamic(DynamicReturn::new(Some(1), None, Some(1)));
        let args = [
            ValueType::single(BasicKind::String),
            ValueType::domain_of(BasicKind::Face, EntitySetId::BOUNDARY_FACES),
        ];
        assert_eq!(sig.resolve_return(&args).basic, BasicKind::Face);
        assert_eq!(
            sig.resolve_new_domain(&args),
            Some(EntitySetId::BOUNDARY_FACES)
        );

        // A non-entity result never mints a set.
        let scalars = [
            ValueType::single(BasicKind::String),
            ValueType::single(BasicKind::Scalar),
        ];
        assert_eq!(sig.resolve_new_domain(&scalars), None);
    }

    #[test]
    fn test_pending_return_mints_from_declared_bound() {
        let sig = FunctionSignature::new(
            vec![],
            ValueType::collection(
                BasicKind::Face,
                Domain::PendingSubsetOf(EntitySetId::ALL_FACES),
            ),
        );
        assert_eq!(sig.resolve_new_domain(&[]), Some(EntitySetId::ALL_FACES));
    }

    #[test]
    fn test_display() {
        let ty = ValueType::collection(BasicKind::Scalar, Domain::Bound(EntitySetId::ALL_CELLS))
            .with_mutable(true);
        assert_eq!(ty.to_string(), "Mutable Collection Of Scalar On #2");
        assert_eq!(
            ValueType::sequence(BasicKind::Scalar).to_string(),
            "Sequence Of Scalar"
        );
        assert_eq!(
            ValueType::single(BasicKind::Vector).with_array_size(2).to_string(),
            "Array Of 2 Vector"
        );
    }
}
