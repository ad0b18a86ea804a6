pub mod limiter;
pub mod runtime;
