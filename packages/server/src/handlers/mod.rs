pub mod admin;
pub mod games;
