//! # neo4j-gds: Compressed Graph Storage Core
//!
//! An in-memory graph store and the algorithms that run directly against it,
//! reimplementing the storage core of Neo4j Graph Data Science in Rust.
//!
//! ## Design Principles
//!
//! 1. **Compressed adjacency**: one run per node, `[degree: u32][vlong deltas…]`
//!    of sorted target ids, living in fixed-size pages of a paged byte store.
//! 2. **Lock-free reads**: finished topologies are immutable; any number of
//!    cursors decode them concurrently.
//! 3. **Contention-free writes**: builder workers bump-allocate inside pages
//!    they own; the only shared state is the next-page counter.
//! 4. **Trait-first**: [`Graph`] is the contract between storage views and
//!    algorithms. Algorithms never see pages, only cursors.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use neo4j_gds::{GraphStoreBuilder, Node, Relationship, Direction};
//! use neo4j_gds::algo::similarity::{NodeSimilarity, NodeSimilarityConfig};
//!
//! # fn example() -> neo4j_gds::Result<()> {
//! let mut builder = GraphStoreBuilder::default();
//! builder.add_node(Node::new(1).with_labels(["Person"]))?;
//! builder.add_node(Node::new(2).with_labels(["Person"]))?;
//! builder.add_node(Node::new(10).with_labels(["Item"]))?;
//! builder.add_relationship(Relationship::new(1, 10, "LIKES"));
//! builder.add_relationship(Relationship::new(2, 10, "LIKES"));
//! let store = builder.build()?;
//!
//! let graph = store.graph("LIKES", Direction::Outgoing)?;
//! let config = NodeSimilarityConfig::builder().top_k(5).build()?;
//! if let Some(result) = NodeSimilarity::new(&graph, config)?.compute()? {
//!     for row in result.stream() {
//!         println!("{} ~ {} = {}", row.node1, row.node2, row.similarity);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! | Layer | Module | Description |
//! |-------|--------|-------------|
//! | Model | `model` | Loader DTOs: external ids, labels, property values |
//! | Identifiers | `idmap` | External ↔ dense internal id bijection |
//! | Storage | `storage` | Pages, cursors, topologies, graph views, store |
//! | Builder | `builder` | Parallel page-based construction + aggregation |
//! | Algorithms | `algo` | Node similarity, triangle intersection |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod idmap;
pub mod storage;
pub mod builder;
pub mod concurrency;
pub mod progress;
pub mod algo;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Node, Relationship, Value, ValueType, PropertyMap,
    NodeId, Direction, Orientation,
};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{
    Graph, AdjacencyCursor, CompressedCursor,
    CsrGraph, UnionGraph, NodeFilteredGraph,
    GraphStore, ReleaseReport,
};

// ============================================================================
// Re-exports: Builder
// ============================================================================

pub use builder::{
    Aggregation, GraphStoreBuilder, GraphStoreConfig,
    PropertyConfig, RelationshipsBuilder, RelationshipsConfig, SelfLoops,
};

pub use idmap::IdMap;
pub use concurrency::TerminationFlag;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unknown node {id} referenced by {context}")]
    UnknownNode { id: u64, context: String },

    #[error("Node {0} was registered more than once")]
    DuplicateNode(u64),

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Aggregation error: {0}")]
    Aggregation(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Release blocked: {0}")]
    ReleaseBlocked(String),

    #[error("Graph store has been released")]
    Released,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Error::ResourceExhausted(format!("worker pool: {err}"))
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(err: std::collections::TryReserveError) -> Self {
        Error::ResourceExhausted(format!("page allocation: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
