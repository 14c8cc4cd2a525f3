//! # docsync-types
//!
//! Wire format types for the docsync document synchronization protocol.
//!
//! This crate provides the foundational types used across all docsync crates:
//! - [`DocumentId`], [`Version`], [`Capability`], [`Format`] - Identity and session types
//! - [`Operation`], [`Patch`] - Versioned range-replace patches
//! - [`ProtocolError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod patch;

pub use error::ProtocolError;
pub use ids::{Capability, DocumentId, Format, Version};
pub use patch::{Operation, Patch};
