use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Autoshop API",
        version = "1.0.0",
        description = r#"
# Autoshop Workshop Management API

Backend API for a vehicle-service shop: invoicing, parts catalog, customer
and vehicle records, and staff administration. Serves the admin console, the
customer portal and the public site.

## Authentication

All `/api/v1` endpoints require a JWT bearer token obtained from
`POST /auth/login`:

```
Authorization: Bearer <your-jwt-token>
```

Access is capability-based per role (admin, manager, mechanic, frontdesk).

## Invoicing semantics

- Line-item `amount` is always recomputed server-side as `quantity * rate`.
- `grand_total = parts_total + labor_total - discount_amount` and
  `balance_amount = grand_total - paid_amount` are written together.
- Updating an invoice replaces its line items wholesale.
- Part-type items are linked to the parts catalog by case-insensitive name
  match; unmatched descriptions create a catalog entry as a side effect.

## Pagination

List endpoints accept `page` (default 1) and `per_page` (default 20).
"#,
        contact(name = "Autoshop", email = "support@autoshop.dev")
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::services::invoices::NewInvoiceItem,
        crate::services::invoices::CreateInvoiceRequest,
        crate::services::invoices::InvoiceItemResponse,
        crate::services::invoices::InvoiceResponse,
        crate::services::invoices::InvoiceListResponse,
        crate::services::invoices::InvoicePrintResponse,
        crate::services::parts::CreatePartRequest,
        crate::services::parts::UpdatePartRequest,
        crate::services::parts::PartListResponse,
        crate::services::customers::CustomerInput,
        crate::services::customers::CustomerListResponse,
        crate::services::vehicles::VehicleInput,
        crate::services::vehicles::VehicleListResponse,
        crate::services::users::CreateUserRequest,
        crate::services::users::UpdateUserRequest,
        crate::services::users::UserResponse,
        crate::services::users::UserListResponse,
    )),
    tags(
        (name = "invoices", description = "Invoice lifecycle"),
        (name = "parts", description = "Parts catalog management"),
        (name = "customers", description = "Customer records"),
        (name = "vehicles", description = "Vehicle records"),
        (name = "users", description = "Staff administration"),
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
