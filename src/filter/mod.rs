pub mod filter_order;
pub mod params;
pub mod query_spec;
pub mod types;

pub use params::{ParamValue, QueryParams};
pub use query_spec::QuerySpecBuilder;
pub use types::*;
