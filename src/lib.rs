pub mod c_api;
pub mod config;
pub mod error;
pub mod galaxy;
pub mod quadtree;
pub mod scheduler;
pub mod star;
pub mod world;

pub use c_api::WorldConfig;
pub use config::Config;
pub use error::WorldError;
pub use quadtree::{Child, Node, Quad, Quadtree};
pub use scheduler::WorkerPool;
pub use star::Star;
pub use world::{StepStats, World};
