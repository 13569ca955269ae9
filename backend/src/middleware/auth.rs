//! Authentication middleware
//!
//! JWT authentication and role capability guards

use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use shared::RoleProfile;

use crate::error::{AppError, AppResult, ErrorDetail, ErrorResponse};
use crate::services::auth::Claims;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: uuid::Uuid,
    pub username: String,
    pub role_name: String,
    pub department: String,
    pub wh_asignados: Option<String>,
}

impl AuthUser {
    pub fn profile(&self) -> RoleProfile {
        RoleProfile::new(self.role_name.clone(), self.department.clone())
    }

    /// Fail with 403 unless the role passes `check`
    pub fn require(&self, check: fn(&RoleProfile) -> bool, action: &str) -> AppResult<()> {
        if check(&self.profile()) {
            Ok(())
        } else {
            tracing::warn!(
                user = %self.username,
                role = %self.role_name,
                action,
                "Capability check failed"
            );
            Err(AppError::Forbidden {
                message: format!("Role '{}' may not {}", self.role_name, action),
                message_es: format!("El puesto '{}' no puede {}", self.role_name, action),
            })
        }
    }

    pub fn require_supervisor(&self) -> AppResult<()> {
        self.require(RoleProfile::is_supervisor, "use the supervisor panel")
    }

    pub fn require_admin(&self) -> AppResult<()> {
        self.require(RoleProfile::is_admin, "access administration")
    }

    pub fn require_lab(&self) -> AppResult<()> {
        self.require(RoleProfile::is_lab_technician, "work in the lab")
    }

    pub fn require_depot(&self) -> AppResult<()> {
        self.require(RoleProfile::has_depot_access, "access the depot")
    }

    pub fn has_warehouse_access(&self, wh: i32) -> bool {
        self.profile()
            .has_warehouse_access(self.wh_asignados.as_deref(), wh)
    }
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => {
            return unauthorized_response("Missing or invalid Authorization header");
        }
    };

    // Middleware runs without state, so the secret comes from the environment
    let jwt_secret = std::env::var("ASICLAB__JWT__SECRET")
        .unwrap_or_else(|_| "development-secret-key".to_string());

    let claims = match decode_jwt(token, &jwt_secret) {
        Ok(claims) => claims,
        Err(msg) => {
            return unauthorized_response(&msg);
        }
    };

    let user_id = match uuid::Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return unauthorized_response("Invalid user ID in token"),
    };

    let auth_user = AuthUser {
        user_id,
        username: claims.username,
        role_name: claims.role,
        department: claims.department,
        wh_asignados: claims.wh_asignados,
    };

    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {}", e))
}

fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message_en: message.to_string(),
            message_es: "No autorizado".to_string(),
            field: None,
        },
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| {
                let error = ErrorResponse {
                    error: ErrorDetail {
                        code: "UNAUTHORIZED".to_string(),
                        message_en: "Authentication required".to_string(),
                        message_es: "Debe iniciar sesión".to_string(),
                        field: None,
                    },
                };
                (StatusCode::UNAUTHORIZED, Json(error))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str, dept: &str, whs: Option<&str>) -> AuthUser {
        AuthUser {
            user_id: uuid::Uuid::new_v4(),
            username: "tester".to_string(),
            role_name: role.to_string(),
            department: dept.to_string(),
            wh_asignados: whs.map(str::to_string),
        }
    }

    #[test]
    fn test_guards() {
        assert!(user("Supervisor WH", "WH", None).require_supervisor().is_ok());
        assert!(user("Tecnico Operaciones WH", "WH", None)
            .require_supervisor()
            .is_err());
        assert!(user("Tecnico Lab", "Lab", None).require_lab().is_ok());
        assert!(user("Supervisor Deposito", "Deposito", None)
            .require_depot()
            .is_ok());
        assert!(user("Supervisor WH", "WH", None).require_admin().is_err());
    }

    #[test]
    fn test_warehouse_access_uses_assignments() {
        let tech = user("Tecnico Operaciones WH", "WH", Some("1,2"));
        assert!(tech.has_warehouse_access(2));
        assert!(!tech.has_warehouse_access(3));
        assert!(user("Site Manager", "Global", None).has_warehouse_access(3));
    }
}
