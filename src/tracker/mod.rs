pub mod eta;
pub mod geo;
pub mod matcher;
pub mod orientation;
pub mod session;
