pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};

use crate::feedback::handlers as feedback;
use crate::generation::handlers as generation;
use crate::resume::handlers as resume;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    let resume_routes = Router::new()
        .route("/create", post(resume::handle_create_resume))
        .route("/update", put(resume::handle_update_resume))
        .route(
            "/get-all-resume/:userId",
            get(resume::handle_get_all_resumes),
        )
        .route(
            "/get-resume-by-id/:resumeId",
            get(resume::handle_get_resume_by_id),
        )
        .route(
            "/get-all-conversation/:resumeId",
            get(resume::handle_get_all_conversation),
        )
        .route(
            "/unique-template-name",
            post(resume::handle_unique_template_name),
        )
        .route(
            "/delete-resume-by-id/:id",
            delete(resume::handle_delete_resume),
        );

    let generation_routes = Router::new()
        .route(
            "/createHtmlTemplate",
            post(generation::handle_create_html_template),
        )
        .route(
            "/createHtmlWithTemplate",
            post(generation::handle_create_html_with_template),
        )
        .route(
            "/convert-image",
            post(generation::handle_convert_image).layer(DefaultBodyLimit::max(upload_limit)),
        );

    let feedback_routes = Router::new()
        .route("/AddFeedback", post(feedback::handle_add_feedback))
        .route("/GetFeedback", post(feedback::handle_get_feedback));

    let api = Router::new()
        .nest("/resume", resume_routes)
        .nest("/openAi", generation_routes)
        .nest("/feedback", feedback_routes);

    Router::new()
        .route("/health", get(health::health_handler))
        .nest("/api/v1", api)
        .with_state(state)
}
