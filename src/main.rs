use authorization_service::interface::{
    ClearCachesResponse,
    ConditionDto,
    CreatePrivilegeSetRequest,
    ErrorResponse,
    // DTOs
    EvaluateRequest,
    EvaluateResponse,
    ImportXmlRequest,
    PrivilegeSetListResponse,
    PrivilegeSetResponse,
    SatisfiabilityRequest,
    SatisfiabilityResponse,
    UpdatePrivilegeSetRequest,
    XmlExportResponse,
    clear_caches_handler,
    create_privilege_set_handler,
    delete_privilege_set_handler,
    evaluate_handler,
    export_privilege_set_xml_handler,
    get_privilege_set_handler,
    import_privilege_set_xml_handler,
    list_privilege_sets_handler,
    satisfiability_handler,
    update_privilege_set_handler,
};
use authorization_service::{AppConfig, AppStateBuilder};
use axum::{Router, routing::post};
use dotenvy::dotenv;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(utoipa::OpenApi)]
#[openapi(
    paths(
        authorization_service::interface::http_handlers::evaluate_handler,
        authorization_service::interface::http_handlers::satisfiability_handler,
        authorization_service::interface::http_handlers::create_privilege_set_handler,
        authorization_service::interface::http_handlers::list_privilege_sets_handler,
        authorization_service::interface::http_handlers::get_privilege_set_handler,
        authorization_service::interface::http_handlers::update_privilege_set_handler,
        authorization_service::interface::http_handlers::delete_privilege_set_handler,
        authorization_service::interface::http_handlers::import_privilege_set_xml_handler,
        authorization_service::interface::http_handlers::export_privilege_set_xml_handler,
        authorization_service::interface::http_handlers::clear_caches_handler,
    ),
    components(schemas(
        EvaluateRequest, EvaluateResponse, ConditionDto, SatisfiabilityRequest, SatisfiabilityResponse,
        CreatePrivilegeSetRequest, UpdatePrivilegeSetRequest, PrivilegeSetResponse, PrivilegeSetListResponse,
        ImportXmlRequest, XmlExportResponse, ClearCachesResponse, ErrorResponse
    )),
    tags(
        (name = "Evaluation", description = "Privilege set evaluation endpoints"),
        (name = "PrivilegeSets", description = "Stored privilege set management endpoints")
    )
)]
pub struct ApiDoc;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse environment variables
    let config = AppConfig::from_env().expect("Failed to parse environment variables");

    // Connect to database
    let pool = PgPool::connect(&config.database_url)
        .await
        .expect("Failed to connect to DB");

    // Setup application state
    let app_state = AppStateBuilder::new()
        .with_pool(pool)
        .with_config(config.clone())
        .build()
        .await
        .expect("Failed to setup application");

    let http_addr = config.http_address();

    // Create OpenAPI documentation
    let openapi = ApiDoc::openapi();

    let v1_routes = Router::new()
        .route("/authz/evaluate", post(evaluate_handler))
        .route("/authz/satisfiability", post(satisfiability_handler))
        .route("/authz/caches/clear", post(clear_caches_handler))
        .route("/authz/privilege-sets", post(create_privilege_set_handler))
        .route(
            "/authz/privilege-sets",
            axum::routing::get(list_privilege_sets_handler),
        )
        .route(
            "/authz/privilege-sets/import-xml",
            post(import_privilege_set_xml_handler),
        )
        .route(
            "/authz/privilege-sets/{set_id}",
            axum::routing::get(get_privilege_set_handler),
        )
        .route(
            "/authz/privilege-sets/{set_id}",
            axum::routing::put(update_privilege_set_handler),
        )
        .route(
            "/authz/privilege-sets/{set_id}",
            axum::routing::delete(delete_privilege_set_handler),
        )
        .route(
            "/authz/privilege-sets/{set_id}/xml",
            axum::routing::get(export_privilege_set_xml_handler),
        );

    let app = Router::new()
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/swagger").url("/openapi.json", openapi.clone()))
        .with_state(app_state);

    let listener = TcpListener::bind(&http_addr).await.expect("Failed to bind");
    println!("HTTP server running at http://{http_addr}");
    axum::serve(listener, app).await.unwrap();
}
