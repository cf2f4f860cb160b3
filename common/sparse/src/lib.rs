// Licensed under the Apache-2.0 license

//! Android sparse image container: header layout, signature check and a
//! decoder that expands chunks through caller-supplied storage callbacks.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod decoder;
pub mod error;
pub mod header;

pub use decoder::{AndroidSparseDecoder, SparseDecoder, SparseStorage, SparseSummary, SparseTarget};
pub use error::SparseError;
pub use header::{is_sparse_image, ChunkHeader, ChunkType, SparseHeader};
