pub mod builder;
pub mod catalog_store;
pub mod defaults;
pub mod matching;
