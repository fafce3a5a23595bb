//! Error types for the EZPass protocol layer.

mod dom;
mod ezpass;
mod store;
mod sync;

pub use dom::*;
pub use ezpass::*;
pub use store::*;
pub use sync::*;
