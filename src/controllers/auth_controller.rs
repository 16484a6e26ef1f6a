use actix_web::http::StatusCode;
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use validator::Validate;

use crate::models::otp::{OtpIssued, OtpPurpose};
use crate::models::user::NewUser;
use crate::service::auth_service::{AuthError, AuthService};

pub struct AuthController;

#[derive(Deserialize)]
pub struct RequestOtpRequest {
    pub email: String,
    #[serde(default)]
    pub purpose: OtpPurpose,
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
    #[serde(default)]
    pub purpose: OtpPurpose,
}

impl AuthController {
    pub async fn register(
        service: web::Data<AuthService>,
        request: web::Json<NewUser>,
    ) -> impl Responder {
        let new_user = request.into_inner();
        if let Err(errors) = new_user.validate() {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "success": false,
                "error": errors.to_string(),
            }));
        }

        match service.register(new_user).await {
            Ok(issued) => issued_response(issued, "OTP sent to email. Please verify your account"),
            Err(err) => error_response(err),
        }
    }

    pub async fn request_otp(
        service: web::Data<AuthService>,
        request: web::Json<RequestOtpRequest>,
    ) -> impl Responder {
        match service.request_otp(&request.email, request.purpose).await {
            Ok(issued) => issued_response(issued, "Verification code sent"),
            Err(err) => error_response(err),
        }
    }

    pub async fn verify_otp(
        service: web::Data<AuthService>,
        request: web::Json<VerifyOtpRequest>,
    ) -> impl Responder {
        match service.verify_otp(&request.email, &request.otp, request.purpose) {
            Ok(Some(user)) => HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "message": "Verification successful",
                "user": user,
            })),
            Ok(None) => HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "message": "Verification successful",
            })),
            Err(err) => error_response(err),
        }
    }
}

fn issued_response(issued: OtpIssued, message: &str) -> HttpResponse {
    let mut body = serde_json::json!({
        "success": true,
        "message": message,
        "expiresIn": issued.expires_in,
        "emailSent": issued.email_sent,
    });
    if let Some(code) = issued.dev_code {
        body["devCode"] = serde_json::Value::String(code);
    }
    HttpResponse::Ok().json(body)
}

fn error_response(err: AuthError) -> HttpResponse {
    let status = match &err {
        AuthError::InvalidEmail | AuthError::MalformedCode | AuthError::CodeNotFound => {
            StatusCode::BAD_REQUEST
        }
        AuthError::EmailTaken => StatusCode::CONFLICT,
        AuthError::UnknownAccount => StatusCode::NOT_FOUND,
        AuthError::Cooldown { .. } => StatusCode::TOO_MANY_REQUESTS,
        AuthError::CodeExpired | AuthError::TooManyAttempts | AuthError::InvalidCode { .. } => {
            StatusCode::UNAUTHORIZED
        }
        AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };

    HttpResponse::build(status).json(serde_json::json!({
        "success": false,
        "error": err.to_string(),
    }))
}
