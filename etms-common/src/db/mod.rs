//! Database schema and repositories

pub mod init;
pub mod layers;
pub mod migrations;
pub mod models;
pub mod seeds;
pub mod settings;
pub mod submissions;
pub mod taxonomy;
pub mod trees;
pub mod users;

pub use init::init_database;
pub use models::*;
