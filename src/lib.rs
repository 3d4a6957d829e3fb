// Library exports for newsdesk
// Integration tests drive the router and workflows through these modules

pub mod auth;
pub mod backup;
pub mod comments;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod moderation;
pub mod notify;
pub mod routes;
pub mod settings;
pub mod state;
pub mod tickets;
