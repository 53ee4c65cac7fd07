mod handlers;
mod routers;

pub use self::routers::{configure_router, AppRouter, Router};
