//! SQLite access: query execution and CSV import

pub mod execute;
pub mod import;

pub use execute::execute_query;
pub use import::{import_csv, import_directory};
