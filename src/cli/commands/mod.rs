pub mod password;
pub mod resolve;
pub mod token;
