pub mod collector;
pub mod consent;
pub mod identity;
pub mod settings_store;
pub mod types;
