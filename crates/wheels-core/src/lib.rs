pub mod config;
pub mod constants;
pub mod effects;
pub mod engine;
pub mod error;
pub mod field;
pub mod frame;
pub mod graph;
pub mod library;
pub mod looper;
pub mod mixer;
pub mod observers;
pub mod offline;
pub mod probe;
pub mod sampler;
pub mod scale;
pub mod shape;
pub mod voice;

pub use config::*;
pub use effects::*;
pub use engine::*;
pub use error::*;
pub use field::*;
pub use frame::*;
pub use graph::*;
pub use library::*;
pub use looper::*;
pub use mixer::*;
pub use observers::*;
pub use offline::*;
pub use probe::*;
pub use sampler::*;
pub use scale::*;
pub use shape::*;
pub use voice::*;
