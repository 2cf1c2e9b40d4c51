//! Resolves the signed-in user once per request.
//!
//! Authentication itself lives outside this service: the identity provider
//! writes the user id into the session cookie and [`ClientCtx`] turns it
//! into a `users` row that handlers can check roles against.

use crate::orm::users;
use crate::AppError;
use actix_session::Session;
use actix_web::dev::{self, Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{web::Data, Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::{ready, LocalBoxFuture, Ready};
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use std::rc::Rc;

/// Session key the authentication provider writes the user id under.
pub const SESSION_USER_KEY: &str = "user_id";

/// Who is making the request. Stored in request extensions by the middleware.
#[derive(Clone, Debug, Default)]
pub struct Viewer {
    pub user: Option<users::Model>,
}

impl Viewer {
    async fn load(session: &Session, db: &DatabaseConnection) -> Result<Self, DbErr> {
        let user_id = session.get::<i32>(SESSION_USER_KEY).unwrap_or_else(|e| {
            log::warn!("Ignoring malformed session user id: {}", e);
            None
        });

        let user = match user_id {
            Some(id) => users::Entity::find_by_id(id).one(db).await?,
            None => None,
        };
        if let (Some(id), None) = (user_id, &user) {
            log::debug!("Session refers to unknown user {}", id);
        }

        Ok(Self { user })
    }
}

/// Request extractor and middleware in one.
///
/// As middleware it loads the [`Viewer`]; as an extractor it hands that
/// viewer to the handler, or a guest when the middleware did not run.
#[derive(Clone, Debug)]
pub struct ClientCtx(Data<Viewer>);

impl Default for ClientCtx {
    fn default() -> Self {
        Self(Data::new(Viewer::default()))
    }
}

impl ClientCtx {
    pub fn get_id(&self) -> Option<i32> {
        self.0.user.as_ref().map(|u| u.id)
    }

    pub fn get_user(&self) -> Option<&users::Model> {
        self.0.user.as_ref()
    }

    /// The caller's id, or `Unauthenticated` for guests.
    pub fn require_login(&self) -> Result<i32, AppError> {
        self.get_id().ok_or_else(AppError::unauthenticated)
    }

    /// Like `require_login`, but hands back the whole user for role checks.
    pub fn require_user(&self) -> Result<&users::Model, AppError> {
        self.get_user().ok_or_else(AppError::unauthenticated)
    }
}

impl FromRequest for ClientCtx {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let viewer = req.extensions().get::<Data<Viewer>>().cloned();
        ready(Ok(viewer.map(ClientCtx).unwrap_or_default()))
    }
}

impl<S: 'static, B> Transform<S, ServiceRequest> for ClientCtx
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoadViewer<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoadViewer {
            service: Rc::new(service),
        }))
    }
}

pub struct LoadViewer<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoadViewer<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();

        // The session must be extracted from the bare HttpRequest before the
        // ServiceRequest is rebuilt around it.
        let (http_req, payload) = req.into_parts();
        let session = Session::extract(&http_req).into_inner();
        let req = ServiceRequest::from_parts(http_req, payload);

        Box::pin(async move {
            let db = req.app_data::<Data<DatabaseConnection>>().cloned();

            // No database or no session means the request runs as a guest.
            match (db, session) {
                (Some(db), Ok(session)) => match Viewer::load(&session, &db).await {
                    Ok(viewer) => {
                        req.extensions_mut().insert(Data::new(viewer));
                    }
                    Err(e) => log::error!("Unable to load session user: {}", e),
                },
                (_, Err(e)) => log::error!("Session unavailable in client middleware: {}", e),
                (None, Ok(_)) => {}
            }

            svc.call(req).await
        })
    }
}
