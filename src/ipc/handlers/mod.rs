pub mod access;
pub mod core;
pub mod grade;
pub mod reports;
pub mod setup;
