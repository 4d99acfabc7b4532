use axum::{Router, middleware};
use tower_http::trace::TraceLayer;

use crate::{
    AppState,
    handler::{
        auth::auth_handler, course::course_handler, enrollment::enrollment_handler,
        payment::payment_handler, review::review_handler, users::users_handler,
    },
    middleware::auth,
};

pub fn create_router(app_state: AppState) -> Router {
    let api_route = Router::new()
        .nest("/auth", auth_handler())
        .nest(
            "/users",
            users_handler().layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .nest("/courses", course_handler(app_state.clone()))
        .nest(
            "/enrollments",
            enrollment_handler().layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .nest(
            "/payments",
            payment_handler().layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .nest("/reviews", review_handler(app_state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    Router::new().nest("/api", api_route)
}
