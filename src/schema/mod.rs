pub mod column;
pub mod registry;

pub use column::{Aggregation, ColumnSpec, Config};
pub use registry::{merge, validate_patch, DATABASE_REGISTRY_CONFIG, META_TEMPLATE};
