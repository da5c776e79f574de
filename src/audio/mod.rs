#[cfg(feature = "live")]
pub mod capture;
pub mod file;
pub mod source;
pub mod spectrum;
