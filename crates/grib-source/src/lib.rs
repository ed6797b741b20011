//! HTTP GRIB2 data source.
//!
//! Availability is decided by the presence of the `.idx` inventory next to a
//! GRIB2 file; fields are pulled with HTTP Range requests covering exactly
//! one message each and decoded with the `grib` crate.

pub mod client;
pub mod decode;
pub mod error;
pub mod idx;
pub mod template;

pub use client::{HttpGribSource, HttpSourceConfig};
pub use error::SourceError;
pub use idx::{ByteRange, Inventory, InventoryEntry};
