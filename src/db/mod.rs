pub mod compliance;
pub mod deliveries;
pub mod pool;
pub mod schema;
pub mod systems;

pub use pool::{create_pool, health_check, run_migrations};
