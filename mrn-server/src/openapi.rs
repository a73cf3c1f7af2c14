//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3 document served at `/api-docs/openapi.json`.

use utoipa::OpenApi;

use crate::handlers::{
    DuplicateWarningResponse, HealthResponse, IdentifierDisplayResponse, PatientResponse,
    ReadyResponse, ResolveRequest, ResolveResponse, SearchResponse,
};

/// MRN patient identity API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "MRN - Patient Identity API",
        version = "0.1.0",
        description = r#"
## Patient identity resolution

Resolves exactly one patient record from whatever identifiers a caller has,
and searches patients by name or medical identifier.

### Lookup order

1. `systemId` as an opaque record id
2. `systemId` reinterpreted as a medical identifier
3. `medicalIdentifier`
4. `emailAddress` (containment over contact data; shared emails are reported)

Medical identifiers are exactly five ASCII letters and digits with at least
one of each, compared case-insensitively.

### Caller identity

Resolve and search require the `x-caller-id` and `x-caller-role` headers set
by the gateway. Only `staff` and `admin` callers may look up patients.
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    tags(
        (name = "Patients", description = "Resolve and search patient records"),
        (name = "Identifiers", description = "Medical identifier formatting"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::resolve::resolve_handler,
        crate::handlers::search::search_handler,
        crate::handlers::identifier::display_identifier_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            ResolveRequest,
            ResolveResponse,
            PatientResponse,
            DuplicateWarningResponse,
            SearchResponse,
            IdentifierDisplayResponse,
        )
    )
)]
pub struct ApiDoc;
