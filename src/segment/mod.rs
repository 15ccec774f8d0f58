//! Contact segmentation: filter compiler and saved lists

pub mod filter;
pub mod lists;
pub(crate) mod sql;

pub use filter::{sort_contacts, ContactQuery, FilterConfig, OrderBy};
pub use lists::ListManager;
