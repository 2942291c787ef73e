//! Paginated collection client module.

mod page_source;

pub use page_source::*;
