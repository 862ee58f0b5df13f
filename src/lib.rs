pub mod app;
pub mod archive;
pub mod config;
pub mod date_resolver;
pub mod domain;
pub mod download;
pub mod error;
pub mod http;
pub mod image_processing;
pub mod layout;
pub mod manual;
pub mod output;
pub mod page_store;
pub mod providers;
pub mod retention;
