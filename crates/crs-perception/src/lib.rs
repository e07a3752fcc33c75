//! `crs-perception` – where the toolpath comes from and which frame it is in.
//!
//! # Modules
//!
//! - [`transform`] – [`TfEngine`][transform::TfEngine]: graph of named
//!   frames and stamped transforms, queried through the
//!   [`TransformProvider`][transform::TransformProvider] trait.
//! - [`frame_transformer`] – re-expresses every pose of a
//!   [`ToolPath`][crs_types::ToolPath] in another frame.
//! - [`toolpath`] – [`ToolpathSource`][toolpath::ToolpathSource] and the JSON
//!   raster file loader.

pub mod frame_transformer;
pub mod toolpath;
pub mod transform;

pub use frame_transformer::{resolve_and_transform, transform_path};
pub use toolpath::{InMemoryToolpath, JsonToolpathLoader, ToolpathSource};
pub use transform::{TfEngine, TransformProvider};
