pub mod collection;
pub mod db;
pub mod types;
pub mod vector_index;
