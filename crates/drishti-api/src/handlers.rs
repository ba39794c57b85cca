//! Request handlers.

pub mod forecast;
pub mod frames;
pub mod health;
pub mod zones;

pub use forecast::*;
pub use frames::*;
pub use health::*;
pub use zones::*;
