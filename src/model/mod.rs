//! Model file management.

mod loader;

pub use loader::{ModelCache, ModelType};
