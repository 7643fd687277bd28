//! # Algorithms
//!
//! Algorithms consume a [`Graph`](crate::storage::Graph) through cursors and
//! never materialize whole adjacency lists they do not need.
//!
//! | Algorithm | Module | Output |
//! |-----------|--------|--------|
//! | NodeSimilarity | `similarity` | scored node pairs, top-k / top-n bounded |
//! | GraphIntersect | `intersect` | triangles `a < b < c` |
//! | TriangleCount | `intersect` | per-node triangle counts, clustering coefficients |

pub mod intersect;
pub mod similarity;
