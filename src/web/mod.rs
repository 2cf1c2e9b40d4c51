pub mod admin;
pub mod approval;
pub mod comments;
pub mod karma;
pub mod post;
pub mod votes;

use crate::AppError;
use actix_web::web::{JsonConfig, PathConfig, QueryConfig};

/// Configures the web app by adding services from each web file.
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // Malformed input gets the same JSON error body as every other failure.
    conf.app_data(
        QueryConfig::default()
            .error_handler(|err, _| AppError::validation(err.to_string()).into()),
    )
    .app_data(
        JsonConfig::default().error_handler(|err, _| AppError::validation(err.to_string()).into()),
    )
    .app_data(
        PathConfig::default().error_handler(|err, _| AppError::validation(err.to_string()).into()),
    );

    // Descending order. Order is important.
    // Route resolution will stop at the first match.
    approval::configure(conf);
    post::configure(conf);
    karma::configure(conf);
    votes::configure(conf);
    comments::configure(conf);
    admin::configure(conf);
}
