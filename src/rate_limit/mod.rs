pub mod fixed_window;
pub mod limiter;

pub use fixed_window::{FixedWindowCounter, WindowCheck};
pub use limiter::RateLimiter;
