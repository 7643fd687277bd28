//! # Relationships Builder
//!
//! Turns a stream of `(source, target, properties…)` triples in internal ids
//! into compressed topologies.
//!
//! ## Phases
//!
//! | Phase | Concurrency | Work |
//! |-------|-------------|------|
//! | Ingest | any thread, `&self` | orient, drop self-loops, append to the source's shard buffer |
//! | Build | one task per shard | counting-sort by source, sort targets, aggregate, encode runs |
//! | Assemble | single | concatenate offsets, place sealed pages into stores |
//!
//! Shards own disjoint, contiguous source ranges, so encoding needs no
//! coordination beyond the page-claim counter.

use std::ops::Range;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::aggregation::{aggregate_run, Aggregation};
use super::allocator::{PageAllocator, PageClaim};
use crate::concurrency::{run_in_pool, validate_concurrency};
use crate::idmap::IdMap;
use crate::model::{NodeId, Orientation, PropertyMap};
use crate::storage::offsets::AdjacencyOffsets;
use crate::storage::paged::{PagedByteStore, DEGREE_HEADER_BYTES};
use crate::storage::store::RelationshipTopologies;
use crate::storage::topology::{PropertyStore, Topology};
use crate::storage::varint::{delta_encoded_size, encode_vlong};
use crate::{Error, Result};

/// Shard buffers per worker.
const SHARDS_PER_WORKER: u64 = 4;

// ============================================================================
// Configuration
// ============================================================================

/// One relationship property to load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyConfig {
    pub key: String,
    /// `Default` inherits the relationship aggregation.
    pub aggregation: Aggregation,
    /// Stored for relationships without this property.
    pub default_value: f64,
}

impl Default for PropertyConfig {
    fn default() -> Self {
        Self { key: String::new(), aggregation: Aggregation::Default, default_value: f64::NAN }
    }
}

impl PropertyConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), ..Self::default() }
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn with_default_value(mut self, default_value: f64) -> Self {
        self.default_value = default_value;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelfLoops {
    #[default]
    Keep,
    Drop,
}

/// How one relationship type is projected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelationshipsConfig {
    pub orientation: Orientation,
    pub aggregation: Aggregation,
    pub properties: Vec<PropertyConfig>,
    /// Also build the incoming topology. Ignored for undirected types.
    pub index_inverse: bool,
    pub self_loops: SelfLoops,
}

impl RelationshipsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn with_property(mut self, property: PropertyConfig) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_inverse_index(mut self, index_inverse: bool) -> Self {
        self.index_inverse = index_inverse;
        self
    }

    pub fn with_self_loops(mut self, self_loops: SelfLoops) -> Self {
        self.self_loops = self_loops;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let merging = self.aggregation.merges();
        for (index, property) in self.properties.iter().enumerate() {
            if property.key.is_empty() {
                return Err(Error::InvalidConfiguration("relationship property key must not be empty".into()));
            }
            if self.properties[..index].iter().any(|p| p.key == property.key) {
                return Err(Error::InvalidConfiguration(format!(
                    "relationship property '{}' configured twice",
                    property.key
                )));
            }
            let resolved = self.property_aggregation(property);
            if resolved.merges() != merging {
                return Err(Error::InvalidConfiguration(format!(
                    "property '{}' aggregation {:?} cannot be combined with relationship aggregation {:?}",
                    property.key, property.aggregation, self.aggregation
                )));
            }
        }
        Ok(())
    }

    fn property_aggregation(&self, property: &PropertyConfig) -> Aggregation {
        match property.aggregation {
            Aggregation::Default => self.aggregation.resolve(),
            concrete => concrete,
        }
    }
}

// ============================================================================
// Shard buffers
// ============================================================================

#[derive(Debug, Default)]
struct ShardBuffer {
    sources: Vec<u64>,
    targets: Vec<u64>,
    properties: Vec<f64>,
}

/// Relationships of one direction, sharded by source range.
#[derive(Debug)]
struct AdjacencyBuffer {
    shard_size: u64,
    shards: Vec<Mutex<ShardBuffer>>,
}

impl AdjacencyBuffer {
    fn new(node_count: u64, concurrency: usize) -> Self {
        let shard_size = node_count
            .div_ceil(concurrency as u64 * SHARDS_PER_WORKER)
            .max(1);
        let shard_count = node_count.div_ceil(shard_size) as usize;
        let shards = (0..shard_count).map(|_| Mutex::new(ShardBuffer::default())).collect();
        Self { shard_size, shards }
    }

    #[inline]
    fn push(&self, source: u64, target: u64, properties: &[f64]) {
        let mut shard = self.shards[(source / self.shard_size) as usize].lock();
        shard.sources.push(source);
        shard.targets.push(target);
        shard.properties.extend_from_slice(properties);
    }
}

/// Output of encoding one shard.
#[derive(Debug, Default)]
struct EncodedShard {
    offsets: Vec<u64>,
    property_offsets: Vec<Vec<u64>>,
    pages: Vec<(usize, Box<[u8]>)>,
    property_pages: Vec<Vec<(usize, Box<[u8]>)>>,
    relationship_count: u64,
}

// ============================================================================
// RelationshipsBuilder
// ============================================================================

/// Concurrent ingestion into per-shard buffers, then a parallel build.
#[derive(Debug)]
pub struct RelationshipsBuilder {
    id_map: Arc<IdMap>,
    config: RelationshipsConfig,
    aggregation: Aggregation,
    property_aggregations: Vec<Aggregation>,
    defaults: SmallVec<[f64; 4]>,
    concurrency: usize,
    outgoing: AdjacencyBuffer,
    incoming: Option<AdjacencyBuffer>,
}

impl RelationshipsBuilder {
    pub fn new(id_map: Arc<IdMap>, config: RelationshipsConfig, concurrency: usize) -> Result<Self> {
        validate_concurrency(concurrency)?;
        config.validate()?;
        let node_count = id_map.node_count();
        let property_aggregations = config
            .properties
            .iter()
            .map(|property| config.property_aggregation(property))
            .collect();
        let defaults = config.properties.iter().map(|p| p.default_value).collect();
        let index_inverse = config.index_inverse && config.orientation != Orientation::Undirected;
        Ok(Self {
            aggregation: config.aggregation.resolve(),
            property_aggregations,
            defaults,
            concurrency,
            outgoing: AdjacencyBuffer::new(node_count, concurrency),
            incoming: index_inverse.then(|| AdjacencyBuffer::new(node_count, concurrency)),
            id_map,
            config,
        })
    }

    pub fn config(&self) -> &RelationshipsConfig {
        &self.config
    }

    /// Add a relationship between internal ids, with default property values.
    pub fn add(&self, source: u64, target: u64) {
        self.add_with_properties(source, target, &self.defaults);
    }

    /// Add a relationship between internal ids. `properties` follows the
    /// order of the configured property keys.
    pub fn add_with_properties(&self, source: u64, target: u64, properties: &[f64]) {
        debug_assert_eq!(properties.len(), self.defaults.len());
        debug_assert!(source < self.id_map.node_count() && target < self.id_map.node_count());
        if source == target && self.config.self_loops == SelfLoops::Drop {
            return;
        }
        let (forward_source, forward_target) = match self.config.orientation {
            Orientation::Natural | Orientation::Undirected => (source, target),
            Orientation::Reverse => (target, source),
        };
        self.outgoing.push(forward_source, forward_target, properties);
        if self.config.orientation == Orientation::Undirected && source != target {
            self.outgoing.push(target, source, properties);
        }
        if let Some(incoming) = &self.incoming {
            incoming.push(forward_target, forward_source, properties);
        }
    }

    /// Add a relationship between external ids, reading the configured
    /// properties from `properties`.
    pub fn add_original(&self, source: NodeId, target: NodeId, properties: &PropertyMap) -> Result<()> {
        let context = || format!("relationship ({source})->({target})");
        let internal_source = self
            .id_map
            .to_internal(source)
            .ok_or_else(|| Error::UnknownNode { id: source.0, context: context() })?;
        let internal_target = self
            .id_map
            .to_internal(target)
            .ok_or_else(|| Error::UnknownNode { id: target.0, context: context() })?;

        if self.config.properties.is_empty() {
            self.add(internal_source, internal_target);
            return Ok(());
        }
        let mut values: SmallVec<[f64; 4]> = SmallVec::with_capacity(self.defaults.len());
        for (property, default) in self.config.properties.iter().zip(&self.defaults) {
            let value = match properties.get(&property.key) {
                None => *default,
                Some(value) if value.is_null() => *default,
                Some(value) => value.as_float().ok_or_else(|| Error::TypeError {
                    expected: "FLOAT".into(),
                    got: value.type_name().into(),
                })?,
            };
            values.push(value);
        }
        self.add_with_properties(internal_source, internal_target, &values);
        Ok(())
    }

    /// Sort, aggregate and compress everything added so far.
    pub fn build(self) -> Result<RelationshipTopologies> {
        let Self { id_map, config, aggregation, property_aggregations, defaults, concurrency, outgoing, incoming } =
            self;
        let node_count = id_map.node_count();
        let undirected = config.orientation == Orientation::Undirected;
        let encoder = ShardEncoder { aggregation, property_aggregations: &property_aggregations };

        let (outgoing, incoming) = run_in_pool(concurrency, || -> Result<_> {
            let outgoing = encoder.build(outgoing, node_count, undirected, &defaults)?;
            let incoming = incoming
                .map(|buffer| encoder.build(buffer, node_count, false, &defaults))
                .transpose()?;
            Ok((outgoing, incoming))
        })??;

        let keys = || config.properties.iter().map(|p| p.key.clone());
        let (outgoing, outgoing_columns) = outgoing;
        let outgoing_properties = keys().zip(outgoing_columns).collect();
        let (incoming, incoming_properties) = match incoming {
            Some((topology, columns)) => (Some(Arc::new(topology)), keys().zip(columns).collect()),
            None => (None, HashMap::new()),
        };

        Ok(RelationshipTopologies {
            outgoing: Arc::new(outgoing),
            incoming,
            outgoing_properties,
            incoming_properties,
        })
    }
}

// ============================================================================
// Encoding
// ============================================================================

struct ShardEncoder<'a> {
    aggregation: Aggregation,
    property_aggregations: &'a [Aggregation],
}

impl ShardEncoder<'_> {
    fn build(
        &self,
        buffer: AdjacencyBuffer,
        node_count: u64,
        undirected: bool,
        defaults: &[f64],
    ) -> Result<(Topology, Vec<Arc<PropertyStore>>)> {
        let width = self.property_aggregations.len();
        let claim = PageClaim::new();
        let property_claims: Vec<PageClaim> = (0..width).map(|_| PageClaim::new()).collect();
        let shard_size = buffer.shard_size;

        let shards = buffer
            .shards
            .into_par_iter()
            .enumerate()
            .map(|(index, shard)| {
                let start = index as u64 * shard_size;
                let range = start..(start + shard_size).min(node_count);
                self.encode_shard(shard.into_inner(), range, &claim, &property_claims)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut offsets = Vec::with_capacity(node_count as usize);
        let mut pages = Vec::new();
        let mut property_offsets: Vec<Vec<u64>> = vec![Vec::with_capacity(node_count as usize); width];
        let mut property_pages: Vec<Vec<(usize, Box<[u8]>)>> = vec![Vec::new(); width];
        let mut relationship_count = 0;
        for shard in shards {
            offsets.extend_from_slice(&shard.offsets);
            pages.extend(shard.pages);
            relationship_count += shard.relationship_count;
            for (column, shard_offsets) in property_offsets.iter_mut().zip(&shard.property_offsets) {
                column.extend_from_slice(shard_offsets);
            }
            for (column, shard_pages) in property_pages.iter_mut().zip(shard.property_pages) {
                column.extend(shard_pages);
            }
        }

        let store = PagedByteStore::from_pages(claim.page_count(), pages);
        tracing::debug!(
            nodes = node_count,
            relationships = relationship_count,
            pages = store.page_count(),
            bytes = store.allocated_bytes(),
            "builder.topology.built"
        );
        let topology = Topology::new(AdjacencyOffsets::new(offsets), store, relationship_count, undirected);

        let properties = property_offsets
            .into_iter()
            .zip(property_pages)
            .zip(property_claims.iter().zip(defaults))
            .map(|((offsets, pages), (claim, &default_value))| {
                let store = PagedByteStore::from_pages(claim.page_count(), pages);
                Arc::new(PropertyStore::new(AdjacencyOffsets::new(offsets), store, default_value))
            })
            .collect();
        Ok((topology, properties))
    }

    fn encode_shard(
        &self,
        buffer: ShardBuffer,
        range: Range<u64>,
        claim: &PageClaim,
        property_claims: &[PageClaim],
    ) -> Result<EncodedShard> {
        let width = self.property_aggregations.len();
        let len = (range.end - range.start) as usize;

        // counting sort of row indices by source
        let mut starts = vec![0usize; len + 1];
        for &source in &buffer.sources {
            starts[(source - range.start) as usize + 1] += 1;
        }
        for index in 1..=len {
            starts[index] += starts[index - 1];
        }
        let mut fill = starts.clone();
        let mut order = vec![0usize; buffer.sources.len()];
        for (row, &source) in buffer.sources.iter().enumerate() {
            let slot = &mut fill[(source - range.start) as usize];
            order[*slot] = row;
            *slot += 1;
        }

        let mut allocator = PageAllocator::new(claim);
        let mut property_allocators: Vec<PageAllocator<'_>> = property_claims.iter().map(PageAllocator::new).collect();
        let mut encoded = EncodedShard {
            offsets: vec![0; len],
            property_offsets: vec![vec![0; len]; width],
            ..EncodedShard::default()
        };

        let mut entries: Vec<(u64, usize)> = Vec::new();
        let mut targets: Vec<u64> = Vec::new();
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); width];
        for local in 0..len {
            let rows = &order[starts[local]..starts[local + 1]];
            if rows.is_empty() {
                continue;
            }
            entries.clear();
            entries.extend(rows.iter().map(|&row| (buffer.targets[row], row)));
            aggregate_run(
                &mut entries,
                &buffer.properties,
                self.aggregation,
                self.property_aggregations,
                &mut targets,
                &mut columns,
            )?;

            encoded.offsets[local] = write_adjacency_run(&mut allocator, &targets)?;
            for ((allocator, column), offsets) in property_allocators
                .iter_mut()
                .zip(&columns)
                .zip(encoded.property_offsets.iter_mut())
            {
                offsets[local] = write_property_run(allocator, column)?;
            }
            encoded.relationship_count += targets.len() as u64;
        }

        encoded.pages = allocator.finish();
        encoded.property_pages = property_allocators.into_iter().map(PageAllocator::finish).collect();
        Ok(encoded)
    }
}

/// Write `[degree][vlong deltas…]` for sorted `targets`; returns its offset.
fn write_adjacency_run(allocator: &mut PageAllocator<'_>, targets: &[u64]) -> Result<u64> {
    let degree = u32::try_from(targets.len())
        .map_err(|_| Error::ResourceExhausted(format!("degree {} exceeds u32", targets.len())))?;
    let len = DEGREE_HEADER_BYTES + delta_encoded_size(targets);
    let handle = allocator.allocate(len)?;
    handle.bytes[..DEGREE_HEADER_BYTES].copy_from_slice(&degree.to_le_bytes());
    let mut position = DEGREE_HEADER_BYTES;
    let mut last = 0;
    for &target in targets {
        position = encode_vlong(target - last, handle.bytes, position);
        last = target;
    }
    debug_assert_eq!(position, len);
    Ok(handle.offset)
}

/// Write one little-endian `f64` per value; returns the run's offset.
fn write_property_run(allocator: &mut PageAllocator<'_>, values: &[f64]) -> Result<u64> {
    let handle = allocator.allocate(values.len() * std::mem::size_of::<f64>())?;
    for (chunk, value) in handle.bytes.chunks_exact_mut(8).zip(values) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
    Ok(handle.offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::cursor::AdjacencyCursor;
    use pretty_assertions::assert_eq;

    fn id_map(count: u64) -> Arc<IdMap> {
        Arc::new(IdMap::from_original_ids((0..count).map(NodeId)).unwrap())
    }

    fn targets(topology: &Topology, node: u64) -> Vec<u64> {
        topology.cursor(node).collect()
    }

    #[test]
    fn test_sorted_runs_with_parallel_edges() {
        let builder = RelationshipsBuilder::new(id_map(4), RelationshipsConfig::new(), 2).unwrap();
        for (s, t) in [(0, 3), (0, 1), (0, 3), (2, 0)] {
            builder.add(s, t);
        }
        let built = builder.build().unwrap();
        assert_eq!(targets(&built.outgoing, 0), vec![1, 3, 3]);
        assert_eq!(targets(&built.outgoing, 1), Vec::<u64>::new());
        assert_eq!(built.outgoing.degree(2), 1);
        assert_eq!(built.outgoing.relationship_count(), 4);
        assert!(built.incoming.is_none());
    }

    #[test]
    fn test_aggregation_and_properties() {
        let config = RelationshipsConfig::new()
            .with_aggregation(Aggregation::Sum)
            .with_property(PropertyConfig::new("weight"))
            .with_property(PropertyConfig::new("hits").with_aggregation(Aggregation::Count));
        let builder = RelationshipsBuilder::new(id_map(3), config, 1).unwrap();
        builder.add_with_properties(0, 2, &[1.5, 0.0]);
        builder.add_with_properties(0, 2, &[2.0, 0.0]);
        builder.add_with_properties(0, 1, &[4.0, 0.0]);
        let built = builder.build().unwrap();

        assert_eq!(targets(&built.outgoing, 0), vec![1, 2]);
        let weight = &built.outgoing_properties["weight"];
        assert_eq!(weight.cursor(0, 2).collect::<Vec<_>>(), vec![4.0, 3.5]);
        let hits = &built.outgoing_properties["hits"];
        assert_eq!(hits.cursor(0, 2).collect::<Vec<_>>(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_orientation_and_inverse_index() {
        let config = RelationshipsConfig::new()
            .with_orientation(Orientation::Reverse)
            .with_inverse_index(true);
        let builder = RelationshipsBuilder::new(id_map(3), config, 2).unwrap();
        builder.add(0, 1);
        builder.add(0, 2);
        let built = builder.build().unwrap();
        assert_eq!(targets(&built.outgoing, 1), vec![0]);
        assert_eq!(targets(&built.outgoing, 0), Vec::<u64>::new());
        let incoming = built.incoming.unwrap();
        assert_eq!(targets(&incoming, 0), vec![1, 2]);
    }

    #[test]
    fn test_undirected_self_loops() {
        let config = RelationshipsConfig::new().with_orientation(Orientation::Undirected);
        let builder = RelationshipsBuilder::new(id_map(2), config, 1).unwrap();
        builder.add(0, 1);
        builder.add(1, 1);
        let built = builder.build().unwrap();
        assert!(built.outgoing.is_undirected());
        assert_eq!(targets(&built.outgoing, 0), vec![1]);
        assert_eq!(targets(&built.outgoing, 1), vec![0, 1]);

        let config = RelationshipsConfig::new().with_self_loops(SelfLoops::Drop);
        let builder = RelationshipsBuilder::new(id_map(2), config, 1).unwrap();
        builder.add(1, 1);
        assert_eq!(builder.build().unwrap().outgoing.relationship_count(), 0);
    }

    #[test]
    fn test_mixed_aggregation_rejected() {
        let config = RelationshipsConfig::new()
            .with_aggregation(Aggregation::None)
            .with_property(PropertyConfig::new("w").with_aggregation(Aggregation::Sum));
        assert!(matches!(config.validate(), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_config_from_json() {
        let config = RelationshipsConfig::from_json(
            r#"{"orientation":"UNDIRECTED","aggregation":"MAX","properties":[{"key":"w"}]}"#,
        )
        .unwrap();
        assert_eq!(config.orientation, Orientation::Undirected);
        assert_eq!(config.properties[0].aggregation, Aggregation::Default);
        assert!(config.properties[0].default_value.is_nan());
        assert!(RelationshipsConfig::from_json(r#"{"bogus":1}"#).is_err());
    }

    #[test]
    fn test_cursor_skip_over_built_run() {
        let builder = RelationshipsBuilder::new(id_map(1_000), RelationshipsConfig::new(), 4).unwrap();
        for target in (0..1_000).step_by(7) {
            builder.add(5, target);
        }
        let built = builder.build().unwrap();
        let mut cursor = built.outgoing.cursor(5);
        assert_eq!(cursor.skip_until(500), Some(504));
        assert_eq!(cursor.advance(511), Some(511));
        assert_eq!(cursor.remaining() as usize, (511..1_000).step_by(7).count() - 1);
    }
}
