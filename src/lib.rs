#[macro_use]
extern crate diesel;
#[macro_use]
extern crate serde_derive;

pub mod about;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod forms;
pub mod messages;
pub mod models;
pub mod paginator;
pub mod responses;
pub mod routes;
pub mod schema;
pub mod state;
pub mod views;
