pub mod normalize;
pub mod registry;

pub use normalize::{locate_header_row, normalize_header, normalize_headers, NormalizedHeaders};
pub use registry::{ColumnRole, CommonName, DatasetKind, DatasetSchema, Label, ReconcilePolicy};
