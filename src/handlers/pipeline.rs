//! # Pipeline API Handlers
//!
//! Board and analytics views. Date filters apply to `created_at` for open
//! stages and to `actual_close_date` for closed ones.

use axum::extract::State;
use axum::response::Json;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::ApiQuery;
use super::deals::DealDto;
use crate::analytics::{DealSummary, PipelineFilter};
use crate::error::{ApiError, CrmError};
use crate::models::DealStage;
use crate::money::Money;
use crate::server::AppState;

/// Query parameters shared by the board and the analytics endpoint
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PipelineQuery {
    pub salesperson_id: Option<Uuid>,
    /// Pipeline stage name, e.g. `proposal`
    pub stage: Option<String>,
    /// Substring of the deal name
    pub search: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl TryFrom<PipelineQuery> for PipelineFilter {
    type Error = ApiError;

    fn try_from(query: PipelineQuery) -> Result<Self, Self::Error> {
        let stage = query
            .stage
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::parse::<DealStage>)
            .transpose()?;

        Ok(Self {
            salesperson_id: query.salesperson_id,
            stage,
            search: query.search,
            date_from: query.date_from,
            date_to: query.date_to,
        })
    }
}

/// A deal card on the board
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BoardDealDto {
    #[serde(flatten)]
    pub deal: DealDto,
    pub contact_names: Vec<String>,
}

/// One column of the board
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StageColumnDto {
    pub stage: DealStage,
    #[schema(example = "Closed Won")]
    pub label: String,
    pub count: usize,
    #[schema(value_type = String)]
    pub value: Money,
    pub deals: Vec<BoardDealDto>,
}

/// The pipeline board, one column per stage in pipeline order
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PipelineBoardDto {
    pub stages: Vec<StageColumnDto>,
}

/// Per-stage count and value
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StageTotalsDto {
    pub stage: DealStage,
    pub count: u64,
    #[schema(value_type = String)]
    pub value: Money,
}

/// Headline deal analytics
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DealAnalyticsDto {
    #[schema(value_type = String, example = "15000.00")]
    pub won_value: Money,
    pub won_count: u64,
    pub lost_count: u64,
    /// Percent of closed deals that were won, one decimal
    #[schema(value_type = String, example = "66.7")]
    pub win_rate: Decimal,
    #[schema(value_type = String)]
    pub average_won_value: Money,
    #[schema(value_type = String)]
    pub pipeline_value: Money,
    pub total_deals: u64,
    pub by_stage: Vec<StageTotalsDto>,
}

impl From<DealSummary> for DealAnalyticsDto {
    fn from(summary: DealSummary) -> Self {
        Self {
            won_value: summary.won_value,
            won_count: summary.won_count,
            lost_count: summary.lost_count,
            win_rate: summary.win_rate,
            average_won_value: summary.average_won_value,
            pipeline_value: summary.pipeline_value,
            total_deals: summary.total_deals,
            by_stage: summary
                .by_stage
                .into_iter()
                .map(|(stage, totals)| StageTotalsDto {
                    stage,
                    count: totals.count,
                    value: totals.value,
                })
                .collect(),
        }
    }
}

/// Deals grouped by stage
#[utoipa::path(
    get,
    path = "/api/pipeline",
    params(PipelineQuery),
    responses(
        (status = 200, description = "Pipeline board", body = PipelineBoardDto),
        (status = 400, description = "Unknown stage or malformed query", body = ApiError)
    ),
    tag = "pipeline"
)]
pub async fn pipeline_board(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PipelineQuery>,
) -> Result<Json<PipelineBoardDto>, ApiError> {
    let filter = PipelineFilter::try_from(query)?;
    let board = state.analytics.pipeline_board(&filter).await?;

    let stages = board
        .into_iter()
        .map(|(stage, deals)| -> Result<StageColumnDto, ApiError> {
            let value = Money::try_sum(deals.iter().map(|d| d.deal.value()))
                .map_err(CrmError::from)?;
            Ok(StageColumnDto {
                stage,
                label: stage.label().to_string(),
                count: deals.len(),
                value,
                deals: deals
                    .into_iter()
                    .map(|d| BoardDealDto {
                        deal: d.deal.into(),
                        contact_names: d.contact_names,
                    })
                    .collect(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(PipelineBoardDto { stages }))
}

/// Won/lost totals, win rate and open pipeline value
#[utoipa::path(
    get,
    path = "/api/analytics/deals",
    params(PipelineQuery),
    responses(
        (status = 200, description = "Deal analytics", body = DealAnalyticsDto),
        (status = 400, description = "Unknown stage or malformed query", body = ApiError)
    ),
    tag = "pipeline"
)]
pub async fn deal_analytics(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PipelineQuery>,
) -> Result<Json<DealAnalyticsDto>, ApiError> {
    let filter = PipelineFilter::try_from(query)?;
    let summary = state.analytics.deal_summary(&filter).await?;
    Ok(Json(summary.into()))
}
