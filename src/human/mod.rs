pub mod assessor;
pub mod error;
