use actix_web::web;

use crate::controllers::auth_controller::AuthController;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/api/auth/register",
        web::post().to(AuthController::register),
    )
    .route(
        "/api/auth/otp/request",
        web::post().to(AuthController::request_otp),
    )
    .route(
        "/api/auth/otp/verify",
        web::post().to(AuthController::verify_otp),
    );
}
