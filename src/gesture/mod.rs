pub mod recognizer;
pub mod table;
