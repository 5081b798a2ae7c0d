//! HTTP router.
//!
//! Returns a composable `Router` with every route nested under `/api/`.
//!
//! Layer stack (outermost → innermost):
//! 1. CORS (GET/POST only) → 2. `Cache-Control: no-store` → 3. Access log

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the ledger API router.
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        // Scheduling
        .route("/appointments", post(endpoints::appointments::create))
        .route("/appointments/:id", get(endpoints::appointments::detail))
        .route(
            "/appointments/:id/history",
            get(endpoints::appointments::history),
        )
        .route(
            "/appointments/:id/transition",
            post(endpoints::appointments::transition),
        )
        .route(
            "/appointments/:id/reschedule",
            post(endpoints::appointments::reschedule),
        )
        .route(
            "/practitioners/:id/appointments",
            get(endpoints::appointments::list_for_practitioner),
        )
        // Visits
        .route("/visits", post(endpoints::visits::open))
        .route("/visits/:id", get(endpoints::visits::detail))
        .route("/visits/:id/history", get(endpoints::visits::history))
        .route("/visits/:id/advance", post(endpoints::visits::advance))
        .route("/visits/:id/complete", post(endpoints::visits::complete))
        .route("/open-visits", get(endpoints::visits::list_open))
        // Clinical notes (append + read only)
        .route(
            "/visits/:id/notes",
            get(endpoints::notes::resolved).post(endpoints::notes::append),
        )
        .route("/visits/:id/notes/raw", get(endpoints::notes::raw))
        .route("/visits/:id/notes/verify", get(endpoints::notes::verify))
        .route("/visits/:id/notes/:note_id", get(endpoints::notes::detail))
        // Vitals
        .route(
            "/visits/:id/vitals",
            get(endpoints::vitals::list).post(endpoints::vitals::record),
        )
        .with_state(ctx)
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE]),
        );

    Router::new().nest("/api", api)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::LedgerPolicy;
    use crate::db::repository::tests::{seed_identities, Seeded};
    use crate::db::DEFAULT_BUSY_TIMEOUT;

    struct Harness {
        router: Router,
        ids: Seeded,
        _dir: tempfile::TempDir,
    }

    fn harness_with(policy: LedgerPolicy) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let core = CoreState::new(dir.path().join("ledger.db"), DEFAULT_BUSY_TIMEOUT, policy);
        core.initialize().unwrap();
        let ids = seed_identities(&core.open_db().unwrap());
        Harness {
            router: api_router(Arc::new(core)),
            ids,
            _dir: dir,
        }
    }

    fn harness() -> Harness {
        harness_with(LedgerPolicy::default())
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1 << 20).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    fn booking(ids: &Seeded, start: &str, end: &str) -> Value {
        json!({
            "practitioner_id": ids.practitioner,
            "client_id": ids.client,
            "patient_id": ids.patient,
            "start_at": start,
            "end_at": end,
            "appointment_type": "consultation",
            "reason": "Limping"
        })
    }

    async fn open_visit(h: &Harness) -> String {
        let (status, json) = send(
            &h.router,
            "POST",
            "/api/visits",
            Some(json!({
                "patient_id": h.ids.patient,
                "client_id": h.ids.client,
                "practitioner_id": h.ids.practitioner,
                "chief_complaint": "Coughing"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        json["visit"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let h = harness();
        let (status, json) = send(&h.router, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["open_visits"], 0);
    }

    #[tokio::test]
    async fn responses_are_not_cacheable() {
        let h = harness();
        let request = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
        let response = h.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.headers().get("cache-control").unwrap(), "no-store");
    }

    #[tokio::test]
    async fn booking_then_overlap_returns_conflict() {
        let h = harness();
        let (status, first) = send(
            &h.router,
            "POST",
            "/api/appointments",
            Some(booking(&h.ids, "2026-06-01T10:00:00Z", "2026-06-01T10:30:00Z")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(first["status"], "scheduled");

        let (status, _) = send(
            &h.router,
            "POST",
            "/api/appointments",
            Some(booking(&h.ids, "2026-06-01T10:30:00Z", "2026-06-01T11:00:00Z")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, err) = send(
            &h.router,
            "POST",
            "/api/appointments",
            Some(booking(&h.ids, "2026-06-01T10:15:00Z", "2026-06-01T10:45:00Z")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["error"]["code"], "SCHEDULING_CONFLICT");
        assert_eq!(err["error"]["conflict"]["appointment_id"], first["id"]);

        let uri = format!(
            "/api/practitioners/{}/appointments?from=2026-06-01T00:00:00Z&to=2026-06-02T00:00:00Z",
            h.ids.practitioner
        );
        let (status, list) = send(&h.router, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["appointments"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn appointment_transitions_and_history() {
        let h = harness();
        let (_, appt) = send(
            &h.router,
            "POST",
            "/api/appointments",
            Some(booking(&h.ids, "2026-06-02T09:00:00Z", "2026-06-02T09:20:00Z")),
        )
        .await;
        let id = appt["id"].as_str().unwrap();

        let (status, cancelled) = send(
            &h.router,
            "POST",
            &format!("/api/appointments/{id}/transition"),
            Some(json!({ "status": "cancelled", "cancellation_reason": "Owner travelling" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cancelled["cancellation_reason"], "Owner travelling");

        let (status, err) = send(
            &h.router,
            "POST",
            &format!("/api/appointments/{id}/transition"),
            Some(json!({ "status": "confirmed" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["error"]["code"], "ILLEGAL_TRANSITION");

        let (status, history) =
            send(&h.router, "GET", &format!("/api/appointments/{id}/history"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["events"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reschedule_moves_appointment() {
        let h = harness();
        let (_, appt) = send(
            &h.router,
            "POST",
            "/api/appointments",
            Some(booking(&h.ids, "2026-06-03T09:00:00Z", "2026-06-03T09:30:00Z")),
        )
        .await;
        let id = appt["id"].as_str().unwrap();
        let (status, moved) = send(
            &h.router,
            "POST",
            &format!("/api/appointments/{id}/reschedule"),
            Some(json!({ "start_at": "2026-06-03T13:00:00Z", "end_at": "2026-06-03T13:30:00Z" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, fetched) = send(&h.router, "GET", &format!("/api/appointments/{id}"), None).await;
        assert_eq!(fetched["start_at"], moved["start_at"]);
    }

    #[tokio::test]
    async fn invalid_booking_interval_is_400() {
        let h = harness();
        let (status, err) = send(
            &h.router,
            "POST",
            "/api/appointments",
            Some(booking(&h.ids, "2026-06-01T11:00:00Z", "2026-06-01T10:00:00Z")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"]["code"], "VALIDATION");
    }

    #[tokio::test]
    async fn malformed_id_is_400_and_unknown_id_is_404() {
        let h = harness();
        let (status, err) = send(&h.router, "GET", "/api/visits/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"]["code"], "BAD_REQUEST");

        let (status, err) =
            send(&h.router, "GET", &format!("/api/visits/{}", uuid::Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn notes_flow_with_correction() {
        let h = harness();
        let visit_id = open_visit(&h).await;
        let notes_uri = format!("/api/visits/{visit_id}/notes");

        let (status, original) = send(
            &h.router,
            "POST",
            &notes_uri,
            Some(json!({
                "author_id": h.ids.practitioner,
                "note_type": "soap",
                "content": { "assessment": "kennel cough" }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, correction) = send(
            &h.router,
            "POST",
            &notes_uri,
            Some(json!({
                "author_id": h.ids.practitioner,
                "note_type": "soap",
                "content": { "assessment": "tracheal collapse" },
                "corrects_note_id": original["id"]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, resolved) = send(&h.router, "GET", &notes_uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resolved["resolution"], "all_leaves");
        let lineages = resolved["lineages"].as_array().unwrap();
        assert_eq!(lineages.len(), 1);
        assert_eq!(lineages[0]["root_id"], original["id"]);
        assert_eq!(lineages[0]["notes"][0]["id"], correction["id"]);

        let (_, raw) = send(&h.router, "GET", &format!("{notes_uri}/raw"), None).await;
        assert_eq!(raw["notes"].as_array().unwrap().len(), 2);

        let (_, report) = send(&h.router, "GET", &format!("{notes_uri}/verify"), None).await;
        assert_eq!(report["checked"], 2);
        assert!(report["mismatched"].as_array().unwrap().is_empty());

        let note_id = original["id"].as_str().unwrap();
        let (status, single) = send(&h.router, "GET", &format!("{notes_uri}/{note_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(single["content"]["assessment"], "kennel cough");
    }

    #[tokio::test]
    async fn notes_cannot_be_edited_or_deleted() {
        let h = harness();
        let visit_id = open_visit(&h).await;
        let notes_uri = format!("/api/visits/{visit_id}/notes");
        let (_, note) = send(
            &h.router,
            "POST",
            &notes_uri,
            Some(json!({
                "author_id": h.ids.practitioner,
                "note_type": "general",
                "content": "Owner consented to x-ray"
            })),
        )
        .await;
        let note_uri = format!("{notes_uri}/{}", note["id"].as_str().unwrap());

        let (status, _) = send(&h.router, "DELETE", &notes_uri, None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        let (status, _) = send(&h.router, "DELETE", &note_uri, None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        let (status, _) = send(&h.router, "PUT", &note_uri, Some(json!({ "content": "edited" }))).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        let (status, _) = send(&h.router, "PATCH", &note_uri, Some(json!({ "content": "edited" }))).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let (_, raw) = send(&h.router, "GET", &format!("{notes_uri}/raw"), None).await;
        assert_eq!(raw["notes"][0]["content"], "Owner consented to x-ray");
    }

    #[tokio::test]
    async fn closed_visit_rejects_notes_when_configured() {
        let h = harness_with(LedgerPolicy {
            allow_post_close_addenda: false,
            ..LedgerPolicy::default()
        });
        let visit_id = open_visit(&h).await;
        let (status, outcome) =
            send(&h.router, "POST", &format!("/api/visits/{visit_id}/complete"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["visit"]["status"], "completed");

        let (status, err) = send(
            &h.router,
            "POST",
            &format!("/api/visits/{visit_id}/notes"),
            Some(json!({
                "author_id": h.ids.practitioner,
                "note_type": "general",
                "content": { "text": "late" }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["error"]["code"], "VISIT_CLOSED");

        let (status, err) = send(
            &h.router,
            "POST",
            &format!("/api/visits/{visit_id}/advance"),
            Some(json!({ "status": "in_progress" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["error"]["code"], "ILLEGAL_TRANSITION");
    }

    #[tokio::test]
    async fn vitals_record_and_range_check() {
        let h = harness();
        let visit_id = open_visit(&h).await;
        let uri = format!("/api/visits/{visit_id}/vitals");

        let (status, reading) = send(
            &h.router,
            "POST",
            &uri,
            Some(json!({
                "recorder_id": h.ids.practitioner,
                "weight_kg": 31.5,
                "temperature_c": 38.7,
                "body_condition_score": 6
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(reading["body_condition_score"], 6);

        for pain in [14, 300, -1] {
            let (status, err) = send(
                &h.router,
                "POST",
                &uri,
                Some(json!({ "recorder_id": h.ids.practitioner, "pain_score": pain })),
            )
            .await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "pain_score {pain}");
            assert_eq!(err["error"]["code"], "OUT_OF_RANGE", "pain_score {pain}");
        }

        let (status, list) = send(&h.router, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["readings"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn open_visits_listing_and_history() {
        let h = harness();
        let visit_id = open_visit(&h).await;
        let (_, open) = send(&h.router, "GET", "/api/open-visits", None).await;
        assert_eq!(open["visits"].as_array().unwrap().len(), 1);

        send(
            &h.router,
            "POST",
            &format!("/api/visits/{visit_id}/advance"),
            Some(json!({ "status": "in_progress" })),
        )
        .await;
        let (_, history) =
            send(&h.router, "GET", &format!("/api/visits/{visit_id}/history"), None).await;
        assert_eq!(history["events"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let h = harness();
        let (status, _) = send(&h.router, "GET", "/api/invoices", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
