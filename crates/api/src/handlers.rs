pub mod access_control;
pub mod health;

// Re-export common types
pub use access_control::ErrorResponse;
