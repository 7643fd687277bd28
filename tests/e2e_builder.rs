//! End-to-end tests for loading graph stores.
//!
//! Covers relationship aggregation, property defaults, orientation, inverse
//! indexes, node property columns, load errors and oversized adjacency runs.
//! Each test exercises: GraphStoreBuilder / RelationshipsBuilder -> GraphStore -> Graph views.

use std::sync::Arc;

use neo4j_gds::storage::NodePropertyValues;
use neo4j_gds::{
    AdjacencyCursor, Aggregation, Direction, Error, Graph, GraphStore, GraphStoreBuilder, GraphStoreConfig, IdMap,
    Node, NodeId, Orientation, PropertyConfig, Relationship, RelationshipsBuilder, RelationshipsConfig, SelfLoops,
    Value,
};
use pretty_assertions::assert_eq;

// ============================================================================
// Helpers
// ============================================================================

fn weighted_store(config: RelationshipsConfig) -> GraphStore {
    let mut builder = GraphStoreBuilder::default();
    builder.add_nodes((1..=3).map(Node::new)).unwrap();
    builder.relationship_type("ROAD", config).unwrap();
    builder.add_relationships([
        Relationship::new(1, 2, "ROAD").with_property("km", 4.0),
        Relationship::new(1, 2, "ROAD").with_property("km", 1.5),
        Relationship::new(1, 2, "ROAD").with_property("km", 2.5),
        Relationship::new(1, 3, "ROAD").with_property("km", 7.0),
        Relationship::new(3, 1, "ROAD"),
    ]);
    builder.build().unwrap()
}

/// `(target, property)` pairs of `node`, in external ids.
fn weighted<G: Graph>(graph: &G, node: u64) -> Vec<(u64, f64)> {
    let internal = graph.to_mapped_node_id(NodeId(node)).unwrap();
    let mut out = Vec::new();
    graph.for_each_relationship_with_property(internal, f64::NAN, &mut |_, target, value| {
        out.push((graph.to_original_node_id(target).0, value));
        true
    });
    out
}

fn km(aggregation: Aggregation) -> RelationshipsConfig {
    RelationshipsConfig::new()
        .with_aggregation(aggregation)
        .with_property(PropertyConfig::new("km").with_default_value(-1.0))
}

// ============================================================================
// 1. Without aggregation parallel relationships are kept
// ============================================================================

#[test]
fn test_parallel_relationships_kept() {
    let store = weighted_store(km(Aggregation::None));
    let graph = store.graph_with_property("ROAD", Direction::Outgoing, "km").unwrap();

    assert_eq!(graph.degree(0), 4);
    assert_eq!(store.relationship_count(), 5);
    let mut found = weighted(&graph, 1);
    found.sort_by(|x, y| x.0.cmp(&y.0).then(x.1.total_cmp(&y.1)));
    assert_eq!(found, vec![(2, 1.5), (2, 2.5), (2, 4.0), (3, 7.0)]);
}

// ============================================================================
// 2. Merging aggregations
// ============================================================================

#[test]
fn test_sum_min_max() {
    for (aggregation, expected) in [(Aggregation::Sum, 8.0), (Aggregation::Min, 1.5), (Aggregation::Max, 4.0)] {
        let store = weighted_store(km(aggregation));
        let graph = store.graph_with_property("ROAD", Direction::Outgoing, "km").unwrap();
        assert_eq!(graph.relationship_count(), 3, "{aggregation:?}");
        assert_eq!(weighted(&graph, 1), vec![(2, expected), (3, 7.0)], "{aggregation:?}");
    }
}

#[test]
fn test_single_keeps_one_value() {
    let store = weighted_store(km(Aggregation::Single));
    let graph = store.graph_with_property("ROAD", Direction::Outgoing, "km").unwrap();
    let found = weighted(&graph, 1);
    assert_eq!(found.len(), 2);
    assert!([4.0, 1.5, 2.5].contains(&found[0].1));
}

#[test]
fn test_count_per_property() {
    let config = RelationshipsConfig::new()
        .with_aggregation(Aggregation::Max)
        .with_property(PropertyConfig::new("km"))
        .with_property(PropertyConfig::new("trips").with_aggregation(Aggregation::Count));
    let store = weighted_store(config);

    assert_eq!(store.relationship_property_keys("ROAD").unwrap(), vec!["km", "trips"]);
    let trips = store.graph_with_property("ROAD", Direction::Outgoing, "trips").unwrap();
    assert_eq!(weighted(&trips, 1), vec![(2, 3.0), (3, 1.0)]);
}

// ============================================================================
// 3. Property defaults
// ============================================================================

#[test]
fn test_missing_property_uses_default() {
    let store = weighted_store(km(Aggregation::Sum));
    let graph = store.graph_with_property("ROAD", Direction::Outgoing, "km").unwrap();
    assert_eq!(weighted(&graph, 3), vec![(1, -1.0)]);

    // a view without a property reports the caller's fallback
    let plain = store.graph("ROAD", Direction::Outgoing).unwrap();
    assert!(!plain.has_relationship_property());
    let mut seen = Vec::new();
    plain.for_each_relationship_with_property(2, 0.5, &mut |_, _, value| {
        seen.push(value);
        true
    });
    assert_eq!(seen, vec![0.5]);
}

#[test]
fn test_non_numeric_relationship_property() {
    let mut builder = GraphStoreBuilder::default();
    builder.add_nodes([Node::new(1), Node::new(2)]).unwrap();
    builder.relationship_type("R", km(Aggregation::None)).unwrap();
    builder.add_relationship(Relationship::new(1, 2, "R").with_property("km", vec![1.0, 2.0]));
    assert!(matches!(builder.build(), Err(Error::TypeError { .. })));
}

#[test]
fn test_unknown_property_key() {
    let store = weighted_store(km(Aggregation::Sum));
    assert!(matches!(
        store.graph_with_property("ROAD", Direction::Outgoing, "minutes"),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(store.graph("RAIL", Direction::Outgoing), Err(Error::NotFound(_))));
}

// ============================================================================
// 4. Orientation and inverse index
// ============================================================================

#[test]
fn test_inverse_index() {
    let store = weighted_store(km(Aggregation::Sum).with_inverse_index(true));
    assert!(store.has_inverse_index("ROAD").unwrap());

    let incoming = store.graph_with_property("ROAD", Direction::Incoming, "km").unwrap();
    assert_eq!(weighted(&incoming, 2), vec![(1, 8.0)]);
    assert_eq!(weighted(&incoming, 1), vec![(3, -1.0)]);
}

#[test]
fn test_incoming_without_index_rejected() {
    let store = weighted_store(km(Aggregation::Sum));
    assert!(matches!(
        store.graph("ROAD", Direction::Incoming),
        Err(Error::InvalidConfiguration(_))
    ));
    assert!(store.graph("ROAD", Direction::Both).is_err());
}

#[test]
fn test_reverse_orientation() {
    let store = weighted_store(km(Aggregation::Sum).with_orientation(Orientation::Reverse));
    let graph = store.graph_with_property("ROAD", Direction::Outgoing, "km").unwrap();
    assert_eq!(weighted(&graph, 2), vec![(1, 8.0)]);
    assert_eq!(weighted(&graph, 1), vec![(3, -1.0)]);
}

#[test]
fn test_undirected_orientation() {
    let store = weighted_store(km(Aggregation::Max).with_orientation(Orientation::Undirected));
    let graph = store.graph_with_property("ROAD", Direction::Outgoing, "km").unwrap();
    assert!(graph.is_undirected());
    // 1-3 arrives from both sides and merges with MAX
    assert_eq!(weighted(&graph, 1), vec![(2, 4.0), (3, 7.0)]);
    assert_eq!(weighted(&graph, 3), vec![(1, 7.0)]);
    // undirected topologies answer INCOMING with themselves
    let incoming = store.graph("ROAD", Direction::Incoming).unwrap();
    assert_eq!(incoming.relationship_count(), graph.relationship_count());
}

#[test]
fn test_drop_self_loops() {
    let mut builder = GraphStoreBuilder::default();
    builder.add_nodes([Node::new(1), Node::new(2)]).unwrap();
    builder
        .relationship_type("R", RelationshipsConfig::new().with_self_loops(SelfLoops::Drop))
        .unwrap();
    builder.add_relationships([Relationship::new(1, 1, "R"), Relationship::new(1, 2, "R")]);
    let store = builder.build().unwrap();
    let graph = store.graph("R", Direction::Outgoing).unwrap();
    assert_eq!(graph.adjacency_cursor(0).collect::<Vec<_>>(), vec![1]);
}

// ============================================================================
// 5. Load errors
// ============================================================================

#[test]
fn test_duplicate_node() {
    let mut builder = GraphStoreBuilder::default();
    builder.add_nodes([Node::new(5), Node::new(5)]).unwrap();
    assert!(matches!(builder.build(), Err(Error::DuplicateNode(5))));
}

#[test]
fn test_unknown_endpoint_fails_whole_build() {
    let mut builder = GraphStoreBuilder::new(GraphStoreConfig { concurrency: 2 }).unwrap();
    builder.add_nodes([Node::new(1), Node::new(2)]).unwrap();
    builder.add_relationships([Relationship::new(1, 2, "R"), Relationship::new(2, 77, "R")]);
    match builder.build() {
        Err(Error::UnknownNode { id, .. }) => assert_eq!(id, 77),
        other => panic!("expected UnknownNode, got {other:?}"),
    }
}

#[test]
fn test_conflicting_aggregations() {
    let config = RelationshipsConfig::new()
        .with_aggregation(Aggregation::Sum)
        .with_property(PropertyConfig::new("w").with_aggregation(Aggregation::None));
    let mut builder = GraphStoreBuilder::default();
    assert!(matches!(builder.relationship_type("R", config), Err(Error::InvalidConfiguration(_))));
}

#[test]
fn test_config_from_json() {
    let config = GraphStoreConfig::from_json(r#"{"concurrency": 3}"#).unwrap();
    assert_eq!(config.concurrency, 3);
    assert!(GraphStoreConfig::from_json(r#"{"concurrency": 0}"#).is_err());
}

// ============================================================================
// 6. Node properties
// ============================================================================

#[test]
fn test_node_property_columns() {
    let mut builder = GraphStoreBuilder::default();
    builder
        .add_nodes([
            Node::new(30).with_labels(["Person"]).with_property("age", 41).with_property("scores", vec![1.0, 2.0]),
            Node::new(10).with_labels(["Person"]).with_property("age", 29),
            Node::new(20).with_labels(["City"]).with_property("population", 8.9),
        ])
        .unwrap();
    let store = builder.build().unwrap();

    let age = store.node_property("age").unwrap();
    assert!(matches!(age, NodePropertyValues::Int(_)));
    assert_eq!(age.int_value(0), Some(29));
    assert_eq!(age.int_value(1), None, "the city has no age");
    assert_eq!(age.value(2), Value::Int(41));
    assert_eq!(store.node_property("scores").unwrap().value(2), Value::FloatArray(vec![1.0, 2.0]));
    assert_eq!(store.node_property("population").unwrap().float_value(1), Some(8.9));

    assert_eq!(store.node_properties().keys(), vec!["age", "population", "scores"]);
    assert_eq!(store.node_properties().keys_for_label("Person"), vec!["age", "scores"]);
}

// ============================================================================
// 7. Build output does not depend on concurrency
// ============================================================================

#[test]
fn test_concurrency_independent_layout() {
    let relationships: Vec<Relationship> = (0..2_000u64)
        .map(|i| Relationship::new(i % 97, (i * 31) % 211, "R"))
        .collect();
    let build = |concurrency| {
        let mut builder = GraphStoreBuilder::new(GraphStoreConfig { concurrency }).unwrap();
        builder.add_nodes((0..211).map(Node::new)).unwrap();
        builder.add_relationships(relationships.clone());
        builder.build().unwrap()
    };
    let sequential = build(1);
    let parallel = build(8);

    let left = sequential.graph("R", Direction::Outgoing).unwrap();
    let right = parallel.graph("R", Direction::Outgoing).unwrap();
    for node in 0..211 {
        assert_eq!(
            left.adjacency_cursor(node).collect::<Vec<_>>(),
            right.adjacency_cursor(node).collect::<Vec<_>>(),
            "node {node}"
        );
    }
}

// ============================================================================
// 8. Runs larger than a page
// ============================================================================

#[test]
fn test_oversized_run_gets_dedicated_page() {
    let node_count = 300_001;
    let id_map = Arc::new(IdMap::from_original_ids((0..node_count).map(NodeId)).unwrap());
    let builder = RelationshipsBuilder::new(id_map.clone(), RelationshipsConfig::new(), 4).unwrap();
    for target in 1..node_count {
        builder.add(0, target);
    }
    builder.add(1, 2);
    builder.add(node_count - 1, 0);
    let graph = builder.build().unwrap().into_graph(id_map, None).unwrap();

    assert_eq!(graph.degree(0), 300_000);
    // 4 header bytes + one byte per delta does not fit a 256 KiB page
    assert!(graph.topology().store().page_count() >= 3);

    let mut cursor = graph.adjacency_cursor(0);
    assert_eq!(cursor.skip_until(149_999), Some(150_000));
    assert_eq!(cursor.advance(299_999), Some(299_999));
    assert_eq!(cursor.next(), Some(300_000));
    assert_eq!(cursor.next(), None);

    assert_eq!(graph.adjacency_cursor(1).collect::<Vec<_>>(), vec![2]);
    assert_eq!(graph.adjacency_cursor(node_count - 1).collect::<Vec<_>>(), vec![0]);
}
