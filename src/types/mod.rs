pub mod dataset;
pub mod month;
