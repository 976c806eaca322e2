pub mod adapter;
pub mod calc;
pub mod integration;
pub mod series;
pub mod system;
pub mod types;
