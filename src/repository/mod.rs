pub mod handler;
pub mod list;

pub use handler::{DbHandler, HandlerKind, CONFIG_KEY, UUID_KEY};
pub use list::{ListParams, ListResponse, PageWindow};
