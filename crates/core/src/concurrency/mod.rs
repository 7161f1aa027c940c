pub mod singleton_map;

pub use singleton_map::{InvalidResult, SingletonError, SingletonMap};
