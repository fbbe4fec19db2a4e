pub mod dashboard;
pub mod window;
