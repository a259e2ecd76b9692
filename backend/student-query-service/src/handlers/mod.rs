pub mod students;

use actix_web::web;

/// Register read API and health routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(students::health))
        .route("/ready", web::get().to(students::ready))
        .service(web::scope("/api/v1").route("/students", web::get().to(students::list_students)));
}
