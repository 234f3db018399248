mod database {
    pub mod actions;
    pub mod error;
    pub mod filters;
    pub mod form;
    pub mod pagination;
    pub mod schema;
    pub mod serializers;
    pub mod validation;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod api {
    pub mod auth;
    pub mod catalog;
    pub mod recipes;
    pub mod reply;
    pub mod routes;
    pub mod users;
}
mod constants;

pub mod commands;
pub mod config;
pub mod export;
pub mod media;
pub mod state;

pub use api::*;
pub use authentication::*;
pub use constants::*;
pub use database::*;
