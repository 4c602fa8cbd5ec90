pub mod types;
pub mod filter;
pub mod filter_where;
pub mod filter_order;
pub mod evaluate;
pub mod search;
pub mod error;

pub use types::*;
pub use filter::Filter;
pub use error::FilterError;
pub use evaluate::Matcher;
pub use search::parse_search_keyword;
