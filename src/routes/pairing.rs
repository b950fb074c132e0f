use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

use crate::core::{EnqueueOutcome, MatchEngine, MatchError};
use crate::models::{
    DequeueResponse, EnqueueRequest, EnqueueResponse, ErrorResponse, HealthResponse, ParticipantId, PartnerResponse,
    QueueStatsResponse, SearchRequest, SearchResponse, SearchStatus, TierDepth, UnpairResponse,
};
use crate::services::SharedStore;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MatchEngine>,
    pub store: Arc<dyn SharedStore>,
}

/// Configure all pairing routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/search", web::post().to(search))
        .route("/queue", web::post().to(enqueue))
        .route("/queue/stats", web::get().to(queue_stats))
        .route("/queue/{participant_id}", web::delete().to(dequeue))
        .route("/partner/{participant_id}", web::get().to(partner))
        .route("/pair/{participant_id}", web::delete().to(unpair));
}

fn validation_failed(errors: validator::ValidationErrors) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: "Validation failed".to_string(),
        message: errors.to_string(),
        status_code: 400,
    })
}

fn engine_failure(context: &str, e: MatchError) -> HttpResponse {
    tracing::error!("{}: {}", context, e);
    match e {
        MatchError::Store(e) => HttpResponse::ServiceUnavailable().json(ErrorResponse {
            error: context.to_string(),
            message: e.to_string(),
            status_code: 503,
        }),
        MatchError::Profile(e) => HttpResponse::BadGateway().json(ErrorResponse {
            error: context.to_string(),
            message: e.to_string(),
            status_code: 502,
        }),
    }
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let status = match state.store.ping().await {
        Ok(()) => "healthy",
        Err(e) => {
            tracing::warn!("Shared store ping failed: {}", e);
            "degraded"
        }
    };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Search for a partner
///
/// POST /api/v1/search
///
/// Request body:
/// ```json
/// {
///   "participantId": "string",
///   "genderPreference": "male|female|any"
/// }
/// ```
///
/// A participant that is already paired gets its current partner back
/// without a new search.
async fn search(state: web::Data<AppState>, req: web::Json<SearchRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }

    let id = ParticipantId::from(req.participant_id.as_str());

    match state.engine.partner(&id).await {
        Ok(Some(partner)) => {
            return HttpResponse::Ok().json(SearchResponse {
                participant_id: id,
                partner_id: Some(partner),
                status: SearchStatus::AlreadyPaired,
            })
        }
        Ok(None) => {}
        Err(e) => return engine_failure("Failed to look up pairing", e),
    }

    tracing::debug!("Search requested by {} (preference: {:?})", id, req.gender_preference);

    let partner = state.engine.search(&id, req.gender_preference).await;
    let status = if partner.is_some() {
        SearchStatus::Paired
    } else {
        SearchStatus::Waiting
    };

    HttpResponse::Ok().json(SearchResponse {
        participant_id: id,
        partner_id: partner,
        status,
    })
}

/// Join the waiting queue
///
/// POST /api/v1/queue
async fn enqueue(state: web::Data<AppState>, req: web::Json<EnqueueRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }

    let id = ParticipantId::from(req.participant_id.as_str());

    match state.engine.enqueue(&id).await {
        Ok(outcome) => {
            if outcome == EnqueueOutcome::Ineligible {
                tracing::info!("Enqueue refused for ineligible participant {}", id);
            }
            HttpResponse::Ok().json(EnqueueResponse {
                participant_id: id,
                outcome: outcome.as_str().to_string(),
                tier: outcome.tier(),
            })
        }
        Err(e) => engine_failure("Failed to enqueue", e),
    }
}

/// Leave every queue
///
/// DELETE /api/v1/queue/{participantId}
async fn dequeue(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = ParticipantId::from(path.into_inner());

    match state.engine.dequeue(&id).await {
        Ok(removed) => HttpResponse::Ok().json(DequeueResponse {
            participant_id: id,
            removed,
        }),
        Err(e) => engine_failure("Failed to dequeue", e),
    }
}

/// Waiting participants per tier
///
/// GET /api/v1/queue/stats
async fn queue_stats(state: web::Data<AppState>) -> impl Responder {
    match state.engine.queue_depths().await {
        Ok(depths) => {
            let total = depths.iter().map(|(_, waiting)| waiting).sum();
            let tiers = depths
                .into_iter()
                .map(|(tier, waiting)| TierDepth { tier, waiting })
                .collect();
            HttpResponse::Ok().json(QueueStatsResponse { tiers, total })
        }
        Err(e) => engine_failure("Failed to read queue depths", e),
    }
}

/// Current partner, if any
///
/// GET /api/v1/partner/{participantId}
async fn partner(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = ParticipantId::from(path.into_inner());

    match state.engine.partner(&id).await {
        Ok(partner_id) => HttpResponse::Ok().json(PartnerResponse {
            participant_id: id,
            partner_id,
        }),
        Err(e) => engine_failure("Failed to look up pairing", e),
    }
}

/// End the current pairing
///
/// DELETE /api/v1/pair/{participantId}
async fn unpair(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = ParticipantId::from(path.into_inner());

    match state.engine.unpair(&id).await {
        Ok(former_partner_id) => HttpResponse::Ok().json(UnpairResponse {
            participant_id: id,
            former_partner_id,
        }),
        Err(e) => engine_failure("Failed to unpair", e),
    }
}
