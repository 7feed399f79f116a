//! # Server Configuration
//!
//! Router, shared state and OpenAPI document for the CRM API.

use std::sync::Arc;

use axum::routing::{get, patch, post, put};
use axum::{Router, middleware};
use sea_orm::DatabaseConnection;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::aggregation::AggregationEngine;
use crate::analytics::AnalyticsService;
use crate::config::AppConfig;
use crate::handlers::{self, contacts, deals, pipeline, quotes, shipping};
use crate::pipeline::PipelineService;
use crate::repositories::{ContactRepository, DealRepository, QuoteRepository};
use crate::shipping::{DistanceProvider, ShippingEstimator};
use crate::telemetry::trace_context_middleware;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub contacts: ContactRepository,
    pub deals: DealRepository,
    pub quotes: QuoteRepository,
    pub pipeline: PipelineService,
    pub aggregation: AggregationEngine,
    pub analytics: AnalyticsService,
    /// Absent until a distance provider is attached
    pub shipping: Option<ShippingEstimator>,
}

impl AppState {
    /// Builds every service over the same connection pool.
    pub fn new(config: AppConfig, db: DatabaseConnection) -> Self {
        let quotes =
            QuoteRepository::new(db.clone()).with_number_prefix(config.quote_number_prefix.clone());
        Self {
            contacts: ContactRepository::new(db.clone()),
            deals: DealRepository::new(db.clone()),
            quotes,
            pipeline: PipelineService::new(db.clone()),
            aggregation: AggregationEngine::new(db.clone()),
            analytics: AnalyticsService::new(db.clone()),
            shipping: None,
            config: Arc::new(config),
            db,
        }
    }

    /// Enables shipping estimates, using the configured origin and rates.
    pub fn with_distance_provider(mut self, provider: Arc<dyn DistanceProvider>) -> Self {
        self.shipping = Some(ShippingEstimator::new(provider, self.config.shipping.clone()));
        self
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let api = Router::new()
        .route("/contacts", post(contacts::create_contact))
        .route(
            "/contacts/{id}",
            get(contacts::get_contact)
                .patch(contacts::update_contact)
                .delete(contacts::delete_contact),
        )
        .route("/deals", post(deals::create_deal))
        .route(
            "/deals/{id}",
            get(deals::get_deal)
                .patch(deals::update_deal)
                .delete(deals::delete_deal),
        )
        .route("/deals/{id}/stage", put(deals::change_stage))
        .route("/deals/{id}/contacts", post(deals::add_deal_contact))
        .route("/quotes", post(quotes::create_quote))
        .route(
            "/quotes/{id}",
            get(quotes::get_quote)
                .patch(quotes::update_quote)
                .delete(quotes::delete_quote),
        )
        .route("/quotes/{id}/items", post(quotes::add_quote_item))
        .route("/quotes/{id}/recalculate", post(quotes::recalculate_quote))
        .route(
            "/quote-items/{id}",
            patch(quotes::update_quote_item).delete(quotes::delete_quote_item),
        )
        .route("/pipeline", get(pipeline::pipeline_board))
        .route("/analytics/deals", get(pipeline::deal_analytics))
        .route("/shipping/estimate", post(shipping::estimate_shipping));

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .nest("/api", api)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(trace_context_middleware)),
        )
}

/// Starts the server with the given configuration
pub async fn run_server(
    config: AppConfig,
    db: DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;
    let profile = config.profile.clone();

    let app = create_app(AppState::new(config, db));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::contacts::create_contact,
        crate::handlers::contacts::get_contact,
        crate::handlers::contacts::update_contact,
        crate::handlers::contacts::delete_contact,
        crate::handlers::deals::create_deal,
        crate::handlers::deals::get_deal,
        crate::handlers::deals::update_deal,
        crate::handlers::deals::delete_deal,
        crate::handlers::deals::change_stage,
        crate::handlers::deals::add_deal_contact,
        crate::handlers::quotes::create_quote,
        crate::handlers::quotes::get_quote,
        crate::handlers::quotes::update_quote,
        crate::handlers::quotes::delete_quote,
        crate::handlers::quotes::add_quote_item,
        crate::handlers::quotes::update_quote_item,
        crate::handlers::quotes::delete_quote_item,
        crate::handlers::quotes::recalculate_quote,
        crate::handlers::pipeline::pipeline_board,
        crate::handlers::pipeline::deal_analytics,
        crate::handlers::shipping::estimate_shipping,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::models::DealStage,
            crate::models::QuoteStatus,
            crate::error::ApiError,
            crate::handlers::HealthResponse,
            crate::handlers::CreatedResponse,
            crate::handlers::DeletedResponse,
            crate::handlers::contacts::ContactDto,
            crate::handlers::contacts::CreateContactDto,
            crate::handlers::contacts::UpdateContactDto,
            crate::handlers::deals::DealDto,
            crate::handlers::deals::DealContactDto,
            crate::handlers::deals::DealDetailsDto,
            crate::handlers::deals::CreateDealDto,
            crate::handlers::deals::UpdateDealDto,
            crate::handlers::deals::ChangeStageDto,
            crate::handlers::deals::StageChangeDto,
            crate::handlers::deals::LinkContactDto,
            crate::handlers::quotes::QuoteDto,
            crate::handlers::quotes::QuoteItemDto,
            crate::handlers::quotes::QuoteDetailsDto,
            crate::handlers::quotes::CreateQuoteDto,
            crate::handlers::quotes::UpdateQuoteDto,
            crate::handlers::quotes::CreateQuoteItemDto,
            crate::handlers::quotes::UpdateQuoteItemDto,
            crate::handlers::pipeline::BoardDealDto,
            crate::handlers::pipeline::StageColumnDto,
            crate::handlers::pipeline::PipelineBoardDto,
            crate::handlers::pipeline::StageTotalsDto,
            crate::handlers::pipeline::DealAnalyticsDto,
            crate::handlers::shipping::ShippingEstimateRequest,
            crate::handlers::shipping::ShippingEstimateDto,
        )
    ),
    tags(
        (name = "root", description = "Service information and health"),
        (name = "contacts", description = "Contacts"),
        (name = "deals", description = "Deals and pipeline stage changes"),
        (name = "quotes", description = "Quotes and line items"),
        (name = "pipeline", description = "Pipeline board and deal analytics"),
        (name = "shipping", description = "Freight estimates"),
    ),
    info(
        title = "CRM API",
        description = "Contacts, deals, quotes and the sales pipeline",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
