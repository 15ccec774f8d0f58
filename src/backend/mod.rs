//! Backend selection and fallback dispatch

pub mod dispatch;
pub mod selector;

pub use dispatch::Dispatcher;
pub use selector::BackendSelector;
