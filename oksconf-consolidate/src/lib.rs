//! Whole-database operations over OKS configuration databases.
//!
//! * [`resolve_includes`] computes the include closure of a file
//! * [`consolidate_db`] rewrites one database into a single flattened file
//! * [`consolidate_files`] and [`merge_into`] merge several databases into one
//! * [`create_database`] starts an empty database with looked up includes
//! * [`set_enabled`], [`session_apps`] and [`database_apps`] maintain and inspect sessions
//!
mod apps;
mod create;
mod merge;
mod resolve;
mod session;

pub use apps::{database_apps, session_apps};
pub use create::{create_database, data_file_name, find_include};
pub use merge::{
    consolidate_db, consolidate_files, dangling_references, merge_into, DanglingReference,
    MergeReport,
};
pub use resolve::{resolve_includes, schema_files};
pub use session::{find_session, set_enabled, ToggleReport};
