pub mod document;
pub mod mongodb;
pub mod sqlite;
