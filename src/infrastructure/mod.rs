pub mod settings;
pub mod sqlite_repo;
