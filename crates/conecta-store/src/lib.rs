pub mod database;
pub mod error;
pub mod fiscales;
pub mod knowledge;
pub mod messages;
pub mod row_helpers;
pub mod schema;
pub mod sessions;
pub mod users;

pub use database::Database;
pub use error::StoreError;
