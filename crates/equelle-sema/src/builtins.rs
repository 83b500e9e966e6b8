//! Built-in functions and canonical entity sets.
//!
//! Everything registered here is provided by the numerical runtime; the
//! compiler only knows the names and how their result types are computed.

use equelle_types::{
    BasicKind, Domain, DynamicReturn, EntitySetId, FunctionSignature, Param, ValueType,
};

/// One of the twelve whole-mesh entity sets.
#[derive(Debug, Clone, Copy)]
pub struct CanonicalSet {
    pub id: EntitySetId,
    /// The accessor function, e.g. `AllCells`.
    pub accessor: &'static str,
    pub kind: BasicKind,
    /// Interior and boundary sets are subsets of the matching "all" set.
    pub parent: Option<EntitySetId>,
}

const fn set(
    id: EntitySetId,
    accessor: &'static str,
    kind: BasicKind,
    parent: Option<EntitySetId>,
) -> CanonicalSet {
    CanonicalSet {
        id,
        accessor,
        kind,
        parent,
    }
}

pub const CANONICAL_SETS: [CanonicalSet; 12] = [
    set(EntitySetId::INTERIOR_CELLS, "InteriorCells", BasicKind::Cell, Some(EntitySetId::ALL_CELLS)),
    set(EntitySetId::BOUNDARY_CELLS, "BoundaryCells", BasicKind::Cell, Some(EntitySetId::ALL_CELLS)),
    set(EntitySetId::ALL_CELLS, "AllCells", BasicKind::Cell, None),
    set(EntitySetId::INTERIOR_FACES, "InteriorFaces", BasicKind::Face, Some(EntitySetId::ALL_FACES)),
    set(EntitySetId::BOUNDARY_FACES, "BoundaryFaces", BasicKind::Face, Some(EntitySetId::ALL_FACES)),
    set(EntitySetId::ALL_FACES, "AllFaces", BasicKind::Face, None),
    set(EntitySetId::INTERIOR_EDGES, "InteriorEdges", BasicKind::Edge, Some(EntitySetId::ALL_EDGES)),
    set(EntitySetId::BOUNDARY_EDGES, "BoundaryEdges", BasicKind::Edge, Some(EntitySetId::ALL_EDGES)),
    set(EntitySetId::ALL_EDGES, "AllEdges", BasicKind::Edge, None),
    set(EntitySetId::INTERIOR_VERTICES, "InteriorVertices", BasicKind::Vertex, Some(EntitySetId::ALL_VERTICES)),
    set(EntitySetId::BOUNDARY_VERTICES, "BoundaryVertices", BasicKind::Vertex, Some(EntitySetId::ALL_VERTICES)),
    set(EntitySetId::ALL_VERTICES, "AllVertices", BasicKind::Vertex, None),
];

// ──────────────────────────────────────────────────────────────────────
// Signature helpers
// ──────────────────────────────────────────────────────────────────────

fn sig(params: &[(&str, ValueType)], ret: ValueType) -> FunctionSignature {
    FunctionSignature::new(
        params
            .iter()
            .map(|(name, ty)| Param::new(*name, ty.clone()))
            .collect(),
        ret,
    )
}

/// Argument types of built-ins are not checked; this marks "anything".
fn any() -> ValueType {
    ValueType::invalid()
}

fn scalar() -> ValueType {
    ValueType::single(BasicKind::Scalar)
}

fn string() -> ValueType {
    ValueType::single(BasicKind::String)
}

fn collection_of(kind: BasicKind) -> ValueType {
    ValueType::collection(kind, Domain::NotApplicable)
}

/// Domain taken from argument `i`.
fn domain_from(i: usize) -> DynamicReturn {
    DynamicReturn::new(None, Some(i), None)
}

/// Every built-in function with its signature.
pub fn signatures() -> Vec<(&'static str, FunctionSignature)> {
    use BasicKind::*;

    let mut all: Vec<(&'static str, FunctionSignature)> = CANONICAL_SETS
        .iter()
        .map(|s| (s.accessor, sig(&[], ValueType::domain_of(s.kind, s.id))))
        .collect();

    all.extend([
        // ── User input ──
        (
            "UserSpecifiedScalarWithDefault",
            sig(&[("default", scalar())], scalar()),
        ),
        (
            "UserSpecifiedCollectionOfScalar",
            sig(&[("entities", any())], collection_of(Scalar)).with_dynamic(domain_from(0)),
        ),
        (
            "InputScalarWithDefault",
            sig(&[("name", string()), ("default", scalar())], scalar()),
        ),
        (
            "InputCollectionOfScalar",
            sig(&[("name", string()), ("entities", any())], collection_of(Scalar))
                .with_dynamic(domain_from(1)),
        ),
        (
            "InputDomainSubsetOf",
            sig(&[("name", string()), ("entities", any())], collection_of(Cell))
                .with_dynamic(DynamicReturn::new(Some(1), None, Some(1))),
        ),
        (
            "InputSequenceOfScalar",
            sig(&[("name", string())], ValueType::sequence(Scalar)),
        ),
        // ── Grid topology and geometry ──
        (
            "FirstCell",
            sig(
                &[("faces", any())],
                collection_of(Cell).with_subset_of(EntitySetId::ALL_CELLS),
            )
            .with_dynamic(domain_from(0)),
        ),
        (
            "SecondCell",
            sig(
                &[("faces", any())],
                collection_of(Cell).with_subset_of(EntitySetId::ALL_CELLS),
            )
            .with_dynamic(domain_from(0)),
        ),
        (
            "IsEmpty",
            sig(&[("entities", any())], collection_of(Bool)).with_dynamic(domain_from(0)),
        ),
        (
            "Centroid",
            sig(&[("entities", any())], collection_of(Vector)).with_dynamic(domain_from(0)),
        ),
        (
            "Normal",
            sig(&[("faces", any())], collection_of(Vector)).with_dynamic(domain_from(0)),
        ),
        // ── Discrete operators ──
        (
            "Gradient",
            sig(
                &[("values", any())],
                ValueType::collection(Scalar, Domain::Bound(EntitySetId::INTERIOR_FACES)),
            ),
        ),
        (
            "Divergence",
            sig(
                &[("fluxes", any())],
                ValueType::collection(Scalar, Domain::Bound(EntitySetId::ALL_CELLS)),
            ),
        ),
        (
            "Dot",
            sig(&[("a", any()), ("b", any())], collection_of(Scalar)).with_dynamic(domain_from(0)),
        ),
        (
            "Sqrt",
            sig(&[("values", any())], collection_of(Scalar)).with_dynamic(domain_from(0)),
        ),
        // ── Reductions ──
        ("MaxReduce", sig(&[("values", any())], scalar())),
        ("MinReduce", sig(&[("values", any())], scalar())),
        ("SumReduce", sig(&[("values", any())], scalar())),
        ("ProdReduce", sig(&[("values", any())], scalar())),
        // ── Solvers and output ──
        (
            "NewtonSolve",
            sig(&[("residual", any()), ("guess", any())], collection_of(Scalar))
                .with_dynamic(domain_from(1)),
        ),
        (
            "Output",
            sig(&[("tag", string()), ("data", any())], ValueType::invalid()),
        ),
    ]);
    all
}
