pub mod analysis;
pub mod axes;
pub mod models;
