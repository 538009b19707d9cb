//! Bulk JSON import and export of the catalog.
//!
//! - [`FieldMapping`] - JSON pointers naming where each catalog field lives
//! - [`import_file`] - reads a document through a mapping into sets and items
//! - [`export_file`] - writes every set with its items and per-grade prices
//!
//! The default mapping reads the export format, so an export can be loaded
//! back into an empty database.

mod error;
mod export;
mod import;
mod mapping;

pub use error::TransferError;
pub use export::{ExportCard, ExportSale, ExportSet, ExportSummary, build_export, export_file};
pub use import::{
    ImportPlan, ImportRecord, ImportSummary, extract_records, import_file, import_records,
    split_label, variant_slug,
};
pub use mapping::{FieldMapping, load_mapping};

/// Result type for transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;
