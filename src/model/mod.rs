//! # Loader Model
//!
//! Plain DTOs that cross the boundary between a loader and the storage core.
//! The loader speaks in external node ids and property maps; everything
//! behind the builder speaks in dense internal ids.
//!
//! Design rule: no storage types here. This module is pure data: no
//! pages and no cursors.

pub mod node;
pub mod relationship;
pub mod value;
pub mod property_map;

pub use node::{Node, NodeId};
pub use relationship::{Relationship, Direction, Orientation};
pub use value::{Value, ValueType};
pub use property_map::PropertyMap;
