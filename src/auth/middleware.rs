use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;
use tracing::warn;

/// Bearer token from the `Authorization` header, or from an `access_token`
/// query parameter. The query form exists for the SSE stream: `EventSource`
/// cannot set request headers.
fn extract_token(req: &ServiceRequest) -> Result<String, &'static str> {
    if let Some(header) = req.headers().get("Authorization") {
        let value = header
            .to_str()
            .map_err(|_| "Invalid Authorization header encoding")?;
        return value
            .strip_prefix("Bearer ")
            .map(str::to_owned)
            .ok_or("Authorization header must start with Bearer");
    }

    req.query_string()
        .split('&')
        .find_map(|pair| pair.strip_prefix("access_token="))
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .ok_or("Missing Authorization header")
}

fn unauthorized(req: ServiceRequest, error: &str) -> Result<ServiceResponse<BoxBody>, Error> {
    warn!(path = %req.path(), error, "rejected unauthenticated request");
    let resp = HttpResponse::Unauthorized().json(json!({"error": error}));
    Ok(req.into_response(resp.map_into_boxed_body()))
}

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;
    let jwt_secret = config.jwt_secret.clone();

    let token = match extract_token(&req) {
        Ok(t) => t,
        Err(reason) => return unauthorized(req, reason),
    };

    let claims = match verify_token(&token, &jwt_secret) {
        Ok(c) => c,
        Err(_) => return unauthorized(req, "Invalid or expired token"),
    };

    req.extensions_mut().insert(AuthUser {
        user_id: claims.sub,
    });

    next.call(req).await
}
