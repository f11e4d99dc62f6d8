use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "jsontable API",
        version = "0.1.0",
        description = "Polls a JSON endpoint and serves the records it holds as a table."
    ),
    paths(
        crate::routes::index,
        crate::routes::panel,
        crate::routes::panel_table,
        crate::routes::fetch,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::PanelResponse,
        crate::dto::TableResponse,
        crate::dto::CellResponse,
        crate::dto::FetchMessageRequest,
        crate::dto::FetchReplyResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "panel", description = "Rendered and structured panel views"),
        (name = "fetch", description = "Ad-hoc fetch channel"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds Bearer token security scheme to the OpenAPI spec.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("token")
                        .description(Some(
                            "Admin token. Set via JSONTABLE_ADMIN_TOKEN environment variable.",
                        ))
                        .build(),
                ),
            );
        }
    }
}
