pub mod auth;
pub mod config;
pub mod dashboard;
pub mod focus_timer;
pub mod invite;
pub mod notes;
pub mod photo;
pub mod project;
pub mod status;
