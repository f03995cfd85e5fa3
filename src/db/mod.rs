pub mod accessors;
pub mod connection;
pub mod models;
