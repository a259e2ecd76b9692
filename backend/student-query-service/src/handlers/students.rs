use actix_web::{web, HttpResponse};
use std::sync::Arc;
use tracing::warn;

use crate::error::ServiceError;
use crate::services::StudentQueryService;

/// GET /api/v1/students
pub async fn list_students(
    service: web::Data<Arc<StudentQueryService>>,
) -> Result<HttpResponse, ServiceError> {
    let students = service.get_all().await?;
    Ok(HttpResponse::Ok().json(students))
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

/// Ready once the backing store answers
pub async fn ready(service: web::Data<Arc<StudentQueryService>>) -> HttpResponse {
    match service.health_check().await {
        Ok(()) => HttpResponse::Ok().body("READY"),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            HttpResponse::ServiceUnavailable().body(format!("NOT READY: {}", e))
        }
    }
}
