use super::handlers::{metrics, reports, status};
use crate::reports::{ReportCache, ReportStore};
use actix_web::web;
use prometheus::Registry;
use std::sync::Arc;

pub trait Router {
    fn register_routes(&self, service_config: &mut web::ServiceConfig);
}

impl<T: Router> Router for Option<T> {
    fn register_routes(&self, service_config: &mut web::ServiceConfig) {
        if let Some(router) = self {
            router.register_routes(service_config)
        }
    }
}

pub fn configure_router(router: &impl Router) -> impl FnOnce(&mut web::ServiceConfig) + '_ {
    |service_config| router.register_routes(service_config)
}

pub struct AppRouter {
    store: web::Data<ReportStore>,
    cache: web::Data<ReportCache>,
    registry: web::Data<Registry>,
}

impl AppRouter {
    pub fn new(store: Arc<ReportStore>, cache: Arc<ReportCache>, registry: Registry) -> Self {
        Self {
            store: web::Data::from(store),
            cache: web::Data::from(cache),
            registry: web::Data::new(registry),
        }
    }
}

impl Router for AppRouter {
    fn register_routes(&self, service_config: &mut web::ServiceConfig) {
        service_config
            .app_data(self.store.clone())
            .app_data(self.cache.clone())
            .app_data(self.registry.clone())
            .route("/health", web::get().to(status::status))
            .route("/metrics", web::get().to(metrics::metrics))
            .service(
                web::scope("/api/v1")
                    .route("/reports", web::get().to(reports::list))
                    .route("/reports/{name}", web::get().to(reports::get)),
            );
    }
}
