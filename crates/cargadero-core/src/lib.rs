pub mod attribute;
pub mod db;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod query;
pub mod reconcile;
pub mod records;
pub mod validate;
