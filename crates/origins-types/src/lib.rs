//! Foundation types for Origins.
//!
//! Every other Origins crate depends on `origins-types`. It defines the
//! entity/revision data model and its store representation.
//!
//! # Key Types
//!
//! - [`Entity`] -- one immutable revision of a logical entity
//! - [`Node`] / [`Edge`] -- revisions with and without endpoints
//! - [`RevisionId`] -- UUID v7 revision identifier, never reused
//! - [`ContentHash`] -- BLAKE3 digest of an entity's properties
//! - [`Direction`] / [`Dependence`] -- closed edge enumerations
//! - [`Reason`] -- why a revision was invalidated
//! - [`Packed`] -- flattened attribute map as stored in the graph

pub mod entity;
pub mod error;
pub mod hash;
pub mod ident;
pub mod kind;
pub mod pack;
pub mod reason;
pub mod time;

pub use entity::{
    Attributes, Changes, Edge, Entity, Invalidation, Node, Properties, Versioned,
};
pub use error::{TypeError, TypeResult};
pub use hash::ContentHash;
pub use ident::RevisionId;
pub use kind::{Dependence, Direction, Model};
pub use pack::{pack_properties, unpack_properties, Packed, PREFIX};
pub use reason::Reason;
pub use time::Timestamp;
