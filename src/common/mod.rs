pub mod digest;
pub mod errors;
pub mod traits;
pub mod types;
