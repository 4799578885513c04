//! Foundation types for KeyTree Sync (KTS).
//!
//! KTS is a client-side synchronization layer that overlays locally edited
//! data on top of server-fetched data. Everything it stores lives in trees
//! addressed by key paths; this crate provides those building blocks.
//!
//! # Key Types
//!
//! - [`KeyPath`] / [`Segment`] -- immutable addresses into a tree
//! - [`Value`] -- a tagged `Leaf(Scalar) | Container(map)` value
//! - [`OverlayTree`] -- a persistent, structurally shared tree snapshot
//! - [`compose`] / [`merge`] -- layered reads with precedence
//! - [`Canonical`] -- deterministic encoding for content hashing

pub mod canonical;
pub mod error;
pub mod path;
pub mod tree;
pub mod value;

pub use canonical::Canonical;
pub use error::TypeError;
pub use path::{KeyPath, Segment};
pub use tree::{compose, OverlayTree};
pub use value::{merge, merge_opt, Map, Scalar, Value};
