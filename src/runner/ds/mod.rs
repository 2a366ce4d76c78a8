pub mod env_record;
pub mod error;
pub mod function;
pub mod object;
pub mod operations;
pub mod value;
