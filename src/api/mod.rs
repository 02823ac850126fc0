pub mod compliance;
pub mod deliveries;
pub mod gateway;
pub mod health;
pub mod routes;
pub mod systems;

pub use routes::{create_router, AppState};
