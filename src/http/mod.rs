pub mod pagination;
pub mod routes;
pub mod routing;
pub mod security;
pub mod static_files;
pub mod types;
