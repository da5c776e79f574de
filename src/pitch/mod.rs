pub mod note;
pub mod segment;
