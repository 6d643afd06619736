pub mod row;
pub mod segment;
pub mod stats;
