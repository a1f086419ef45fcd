use axum::routing::{get, patch, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{admin, auth, health_check, payment, registration};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // identity
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify", get(auth::verify))
        .route("/auth/resend-verification", post(auth::resend_verification))
        .route("/auth/password-reset/request", post(auth::request_password_reset))
        .route("/auth/password-reset/confirm", post(auth::confirm_password_reset))
        .route("/auth/me", get(auth::me))
        // public registration flow
        .route("/tickets", get(registration::list_tickets))
        .route("/tickets/:registration_id", get(registration::ticket_view))
        .route("/registrations/status", get(registration::registration_status))
        .route("/registrations", post(registration::register))
        // payment gateway browser callback
        .route("/payments/callback", get(payment::payment_callback))
        // admin dashboard
        .route(
            "/admin/registrations",
            get(admin::list_registrations).post(admin::create_registration),
        )
        .route(
            "/admin/registrations/:id",
            get(admin::registration_detail).delete(admin::delete_registration),
        )
        .route(
            "/admin/registrations/:id/attendance",
            patch(admin::update_attendance),
        )
        .route("/admin/registrations/:id/qr", get(admin::registration_qr))
        .route("/admin/tickets", post(admin::create_ticket))
        .route(
            "/admin/tickets/:id",
            put(admin::update_ticket).delete(admin::delete_ticket),
        )
        .route(
            "/admin/settings",
            get(admin::get_settings).put(admin::update_settings),
        )
        .route("/admin/export.csv", get(admin::export_csv))
        .route("/admin/broadcast", post(admin::broadcast))
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer())
        .layer(create_cors_layer())
        .with_state(state)
}
