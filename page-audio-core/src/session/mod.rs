pub mod capture;
pub mod publisher;
