pub mod matcher;
pub mod parse;
pub mod registration;
pub mod resolve;
