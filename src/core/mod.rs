pub mod breaker;
pub mod fallback;
pub mod health;

pub use breaker::*;
pub use fallback::*;
pub use health::*;
