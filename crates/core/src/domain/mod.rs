pub mod function;
pub mod queue;
pub mod request;
pub mod user;
