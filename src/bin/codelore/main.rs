use actix_session::{config::PersistentSession, storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::{Key, SameSite};
use actix_web::http::header;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use codelore::app_config::AppConfig;
use codelore::cache::CommentCache;
use codelore::middleware::ClientCtx;
use codelore::notifications::dispatcher::{run_dispatcher, KarmaEvents};
use env_logger::Env;
use rand::{distributions::Alphanumeric, Rng};
use std::time::Duration;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = codelore::db::connect(&config.database)
        .await
        .context("Failed to connect to the database")?;
    if config.database.create_schema {
        codelore::db::create_schema(&db)
            .await
            .context("Failed to create the database schema")?;
    }

    let secret_key = match std::env::var("SECRET_KEY") {
        Ok(key) if key.len() >= 64 => Key::from(key.as_bytes()),
        other => {
            let random_string: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(128)
                .map(char::from)
                .collect();
            log::warn!("SECRET_KEY was invalid ({}). Session cookies will be invalidated every time the application is restarted. A secret key must be at least 64 bytes to be accepted.",
                match other {
                    Ok(_) => "shorter than 64 bytes".to_owned(),
                    Err(e) => e.to_string(),
                });
            Key::from(random_string.as_bytes())
        }
    };

    let (events, receiver) = KarmaEvents::channel();
    let dispatcher = actix_web::rt::spawn(run_dispatcher(db.clone(), receiver));

    let comment_cache = CommentCache::new(&config.comments);
    let bind = config.server.bind.clone();
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);

    let server = {
        let db = db.clone();
        let config = config.clone();
        let events = events.clone();

        HttpServer::new(move || {
            // Last wrap runs first: logger, session, client, headers.
            App::new()
                .app_data(Data::new(db.clone()))
                .app_data(Data::new(config.clone()))
                .app_data(Data::new(events.clone()))
                .app_data(Data::new(comment_cache.clone()))
                .wrap(
                    DefaultHeaders::new()
                        .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
                        .add(("Referrer-Policy", "strict-origin-when-cross-origin")),
                )
                .wrap(ClientCtx::default())
                .wrap(
                    SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                        .cookie_same_site(SameSite::Lax)
                        .cookie_secure(false)
                        .session_lifecycle(PersistentSession::default())
                        .build(),
                )
                .wrap(Logger::default())
                .configure(codelore::web::configure)
        })
        .bind(&bind)
        .with_context(|| format!("Failed to bind {}", bind))?
    };

    log::info!("Listening on {}", bind);
    server.run().await?;

    // The dispatcher stops once every sender is gone. Workers drop theirs
    // when the server stops; this one is ours.
    drop(events);
    if actix_web::rt::time::timeout(grace, dispatcher).await.is_err() {
        log::warn!("Karma dispatcher did not drain within {:?}", grace);
    }

    Ok(())
}
