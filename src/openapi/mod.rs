use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stockroom API",
        description = r#"
Warehouse inventory management API.

Products, suppliers and warehouses form the catalog. Incoming stock is
recorded as receipts; validating a receipt posts its quantities to the
per-warehouse inventory levels and writes the stock-movement ledger.
Deliveries and transfers track outbound and inter-warehouse paperwork.
User accounts are mirrored from Clerk via a signed webhook.
        "#
    ),
    tags(
        (name = "Products", description = "Product catalog endpoints"),
        (name = "Receipts", description = "Incoming stock receipts"),
        (name = "Reports", description = "Aggregated reporting endpoints"),
        (name = "Webhooks", description = "Identity provider webhooks")
    ),
    paths(
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::receipts::update_receipt_status,
        crate::handlers::reports::dashboard,
        crate::handlers::webhooks::clerk_webhook,
    ),
    components(
        schemas(
            crate::services::products::CreateProductInput,
            crate::services::products::UpdateProductInput,
            crate::services::receipts::CreateReceiptInput,
            crate::services::receipts::ReceiptItemInput,
            crate::handlers::receipts::UpdateStatusRequest,
            crate::entities::receipt::ReceiptStatus,
            crate::entities::delivery::DeliveryStatus,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
