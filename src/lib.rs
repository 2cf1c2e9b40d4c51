pub mod app_config;
pub mod approval;
pub mod cache;
pub mod comments;
pub mod db;
pub mod error;
pub mod karma;
pub mod middleware;
pub mod notifications;
pub mod orm;
pub mod role;
pub mod slug;
pub mod user;
pub mod votes;
pub mod web;

pub use error::AppError;
