pub mod registration;
pub mod search;
