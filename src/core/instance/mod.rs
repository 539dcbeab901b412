pub mod model;

pub use model::{Instance, InstanceState};
