//! # Resource
//!
//! Capability contracts implemented by the resource kinds, and the finalizer
//! manager that works against any of them.

mod finalizer;
mod interfaces;

pub use finalizer::APIFinalizer;
pub use interfaces::*;
