pub mod app;
pub mod combine;
pub mod config;
pub mod contact;
pub mod discovery;
pub mod domain;
pub mod error;
pub mod filter;
pub mod geo;
pub mod geofetch;
pub mod output;
pub mod prompt;
pub mod relocate;
pub mod table;
