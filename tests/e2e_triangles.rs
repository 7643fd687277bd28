//! End-to-end tests for triangle enumeration and triangle counting.
//!
//! Fixture: a 4-clique on nodes 1..=4 with a pendant node 5 hanging off 4.
//! Each test exercises: GraphStoreBuilder -> undirected view -> GraphIntersect.

use std::collections::BTreeSet;
use std::sync::Arc;

use neo4j_gds::algo::intersect::{triangles, IntersectConfig, Triangle, TriangleCount};
use neo4j_gds::{
    Direction, Error, Graph, GraphStore, GraphStoreBuilder, IdMap, Node, NodeId, Orientation, Relationship,
    RelationshipsBuilder, RelationshipsConfig, TerminationFlag,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

// ============================================================================
// Helpers
// ============================================================================

fn clique_store() -> GraphStore {
    let mut builder = GraphStoreBuilder::default();
    builder
        .add_nodes((1..=5).map(|id| Node::new(id).with_labels([if id == 5 { "Leaf" } else { "Core" }])))
        .unwrap();
    builder
        .relationship_type("LINK", RelationshipsConfig::new().with_orientation(Orientation::Undirected))
        .unwrap();
    builder
        .relationship_type("EXTRA", RelationshipsConfig::new().with_orientation(Orientation::Undirected))
        .unwrap();
    builder.relationship_type("DIRECTED", RelationshipsConfig::new()).unwrap();
    builder.add_relationships([
        Relationship::new(1, 2, "LINK"),
        Relationship::new(1, 3, "LINK"),
        Relationship::new(2, 3, "LINK"),
        Relationship::new(1, 4, "LINK"),
        Relationship::new(2, 4, "LINK"),
        Relationship::new(3, 4, "LINK"),
        Relationship::new(4, 5, "LINK"),
        // closes 3-4-5 only when EXTRA is unioned in; 1-2 duplicates LINK
        Relationship::new(3, 5, "EXTRA"),
        Relationship::new(2, 1, "EXTRA"),
        Relationship::new(1, 2, "DIRECTED"),
    ]);
    builder.build().unwrap()
}

fn triangle(a: u64, b: u64, c: u64) -> Triangle {
    Triangle { a, b, c }
}

fn undirected_graph(node_count: u64, edges: &[(u64, u64)]) -> neo4j_gds::CsrGraph {
    let id_map = Arc::new(IdMap::from_original_ids((0..node_count).map(NodeId)).unwrap());
    let config = RelationshipsConfig::new().with_orientation(Orientation::Undirected);
    let builder = RelationshipsBuilder::new(id_map.clone(), config, 3).unwrap();
    for &(s, t) in edges {
        builder.add(s, t);
    }
    builder.build().unwrap().into_graph(id_map, None).unwrap()
}

fn brute_force(node_count: u64, edges: &[(u64, u64)]) -> Vec<Triangle> {
    let set: BTreeSet<(u64, u64)> = edges
        .iter()
        .filter(|(s, t)| s != t)
        .flat_map(|&(s, t)| [(s, t), (t, s)])
        .collect();
    let mut found = Vec::new();
    for a in 0..node_count {
        for b in a + 1..node_count {
            for c in b + 1..node_count {
                if set.contains(&(a, b)) && set.contains(&(b, c)) && set.contains(&(a, c)) {
                    found.push(triangle(a, b, c));
                }
            }
        }
    }
    found
}

// ============================================================================
// 1. Enumeration
// ============================================================================

#[test]
fn test_clique_triangles() {
    let store = clique_store();
    let graph = store.graph("LINK", Direction::Outgoing).unwrap();
    let found = triangles(&graph, &IntersectConfig::default(), &TerminationFlag::new()).unwrap().unwrap();
    assert_eq!(
        found,
        vec![triangle(0, 1, 2), triangle(0, 1, 3), triangle(0, 2, 3), triangle(1, 2, 3)]
    );
}

#[test]
fn test_union_of_types() {
    let store = clique_store();
    let union = store.union_graph(&["LINK", "EXTRA"], Direction::Outgoing).unwrap();
    assert!(union.is_undirected());
    let found = triangles(&union, &IntersectConfig::default(), &TerminationFlag::new()).unwrap().unwrap();
    assert_eq!(found.len(), 5, "1-2 is stored twice but closes its triangles once");
    assert!(found.contains(&triangle(2, 3, 4)));
}

#[test]
fn test_node_filtered() {
    let store = clique_store();
    let union = store.union_graph(&["LINK", "EXTRA"], Direction::Outgoing).unwrap();
    let core = store.node_filtered(union, &["Core"], 2).unwrap();
    let found = triangles(&core, &IntersectConfig::default(), &TerminationFlag::new()).unwrap().unwrap();
    assert_eq!(found.len(), 4, "the leaf is filtered out");
}

#[test]
fn test_max_degree() {
    let store = clique_store();
    let graph = store.graph("LINK", Direction::Outgoing).unwrap();
    // node 4 has degree 4 and drops out with its three triangles
    let config = IntersectConfig { max_degree: 3, ..IntersectConfig::default() };
    let found = triangles(&graph, &config, &TerminationFlag::new()).unwrap().unwrap();
    assert_eq!(found, vec![triangle(0, 1, 2)]);
}

#[test]
fn test_shared_neighbor_behind_a_gap() {
    // 1's neighbors {0, 2, 3} interleave with 0's remaining {3}
    let graph = undirected_graph(4, &[(0, 1), (0, 3), (1, 3), (1, 2)]);
    let found = triangles(&graph, &IntersectConfig::default(), &TerminationFlag::new()).unwrap().unwrap();
    assert_eq!(found, vec![triangle(0, 1, 3)]);

    let counted = TriangleCount::new(&graph, IntersectConfig::default()).unwrap().compute().unwrap().unwrap();
    assert_eq!(counted.triangle_counts(), &[Some(1), Some(1), Some(0), Some(1)]);
}

#[test]
fn test_directed_rejected() {
    let store = clique_store();
    let graph = store.graph("DIRECTED", Direction::Outgoing).unwrap();
    let result = triangles(&graph, &IntersectConfig::default(), &TerminationFlag::new());
    assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    let count = TriangleCount::new(&graph, IntersectConfig::default()).unwrap();
    assert!(matches!(count.compute(), Err(Error::InvalidConfiguration(_))));
}

#[test]
fn test_terminated() {
    let store = clique_store();
    let graph = store.graph("LINK", Direction::Outgoing).unwrap();
    let flag = TerminationFlag::new();
    flag.terminate();
    assert_eq!(triangles(&graph, &IntersectConfig::default(), &flag).unwrap(), None);
}

// ============================================================================
// 2. Counting and clustering coefficients
// ============================================================================

#[test]
fn test_triangle_count() {
    let store = clique_store();
    let graph = store.graph("LINK", Direction::Outgoing).unwrap();
    let result = TriangleCount::new(&graph, IntersectConfig::default()).unwrap().compute().unwrap().unwrap();

    assert_eq!(result.global_triangle_count(), 4);
    assert_eq!(result.triangle_counts(), &[Some(3), Some(3), Some(3), Some(3), Some(0)]);
    assert_eq!(result.local_clustering_coefficient(0), Some(1.0));
    // node 4: 3 triangles among 4 neighbors
    assert_eq!(result.local_clustering_coefficient(3), Some(0.5));
    assert_eq!(result.local_clustering_coefficient(4), Some(0.0));
    assert_eq!(result.average_clustering_coefficient(), 0.7);
}

#[test]
fn test_config_from_json() {
    let config = IntersectConfig::from_json(r#"{"max_degree": 3, "concurrency": 2}"#).unwrap();
    assert_eq!(config, IntersectConfig { concurrency: 2, max_degree: 3 });
    assert!(IntersectConfig::from_json(r#"{"concurrency": 0}"#).is_err());
}

// ============================================================================
// 3. Agreement with brute force
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_matches_brute_force(
        edges in prop::collection::vec((0u64..12, 0u64..12), 0..60),
        concurrency in 1usize..6,
    ) {
        let graph = undirected_graph(12, &edges);
        let config = IntersectConfig { concurrency, ..IntersectConfig::default() };
        let found = triangles(&graph, &config, &TerminationFlag::new()).unwrap().unwrap();
        let expected = brute_force(12, &edges);
        prop_assert_eq!(&found, &expected);

        let counted = TriangleCount::new(&graph, config).unwrap().compute().unwrap().unwrap();
        prop_assert_eq!(counted.global_triangle_count(), expected.len() as u64);
        for node in 0..12 {
            let corners = expected.iter().filter(|t| t.a == node || t.b == node || t.c == node).count() as u64;
            prop_assert_eq!(counted.triangle_count(node), Some(corners));
        }
    }
}
