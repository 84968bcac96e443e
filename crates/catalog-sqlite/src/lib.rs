mod open;
mod models;
mod insert;
mod query;
mod schema;
pub mod reports;

pub use open::{ensure_schema, Db, SharedDb};
pub use models::*;
pub use schema::CATALOG_TABLES;
