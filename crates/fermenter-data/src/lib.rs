//! Data-driven loading of fermenter content.
//!
//! A content directory holds `items`, `processes` and `fermenters` files
//! (each as `.ron`, `.toml` or `.json`) and an optional `settings` file.
//! Names are resolved into catalog ids and the catalog is validated before
//! anything is returned.

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, FermenterData, load_fermenter_data, load_settings};
