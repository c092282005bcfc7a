//! OpenAPI Documentation

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Tracker API OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Simple Diet Tracker API",
        version = "1.0.0",
        description = "Accounts and daily intake records"
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "accounts", description = "Login, registration and account info"),
        (name = "records", description = "Daily intake records"),
        (name = "monitoring", description = "Health")
    ),
    paths(
        super::accounts::login,
        super::accounts::registration,
        super::accounts::me,
        super::records::list_records,
        super::records::create_record,
        super::records::delete_record,
        super::health::health,
    ),
    components(
        schemas(
            crate::domain::Account,
            crate::domain::Record,
            super::accounts::CredentialsRequest,
            super::accounts::LoginResponse,
            super::records::CreateRecordRequest,
            super::common::ApiError,
            super::common::CreatedResponse,
            super::common::FieldError,
            super::health::HealthResponse,
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct TrackerApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
