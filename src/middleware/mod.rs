mod client_ctx;

pub use client_ctx::{ClientCtx, Viewer, SESSION_USER_KEY};
