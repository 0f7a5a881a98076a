//! C ABI surface shared with the native engine.
#![allow(clippy::missing_safety_doc)]

pub mod callback;
pub mod engine;
pub mod function;
pub mod require;
pub mod string;

#[allow(unused_imports)]
pub mod prelude {
    pub use super::callback::*;
    pub use super::engine::*;
    pub use super::function::*;
    pub use super::require::*;
    pub use super::string::*;
}
