pub mod document;
pub mod errors;
