//! Bulk inventory import from CSV files
//!
//! Rows flow strictly in sequence:
//! [`row`] (ingestion) → [`normalize`] → [`validate`] → [`resolve`] →
//! [`images`] (acquisition) → persistence and aggregation in [`pipeline`].

pub mod images;
pub mod normalize;
pub mod pipeline;
pub mod resolve;
pub mod row;
pub mod validate;

pub use images::{AcquireError, HttpImageFetcher, ImageAcquirer, ImageFetcher, ImageStore, StoredImage};
pub use normalize::{convert_date_format, parse_images, InventoryRow, YearValue};
pub use pipeline::{ImportError, ImportResponse, InventoryImporter};
pub use resolve::{ReferenceResolver, ResolveError, ResolvedReferences};
pub use row::{read_rows, RawInventoryRow, RowRecord};
pub use validate::{validate_row, ValidatedRow};
