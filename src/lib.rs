pub mod catalog;
pub mod config;
pub mod export;
pub mod fetch;
pub mod query;
pub mod summary;
pub mod table;
pub mod warehouse;
pub mod workbook;
