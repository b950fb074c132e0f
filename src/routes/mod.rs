// Route exports
pub mod pairing;

use actix_web::web;

pub use pairing::AppState;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(pairing::configure),
    );
}
