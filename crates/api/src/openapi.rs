use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::{lessons, series, system, tracking, users};
use edu_models::{
    ActiveLesson, AnnouncementReport, AnnouncementRequest, CreateUserRequest, CurrentLesson,
    DeleteDocumentRequest, EnterLessonRequest, Lesson, LessonDraft, LessonPatch, Role, Serie,
    SerieDraft, SeriePatch, SubscriptionOutcome, SyncUserRequest, TabRequest, TrackingAck,
    UnsubscriptionOutcome, UpdateUserRequest, User,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        system::root,
        system::health_check,
        system::metrics,
        system::me_test,
        users::create_profile,
        users::current_profile,
        users::sync_user,
        users::get_user,
        users::update_user,
        series::create_serie,
        series::list_series,
        series::subscribed_series,
        series::my_series,
        series::search_series,
        series::get_serie,
        series::update_serie,
        series::delete_serie,
        series::subscribe,
        series::unsubscribe,
        series::notify_subscribers,
        lessons::create_lesson,
        lessons::list_lessons,
        lessons::get_lesson,
        lessons::update_lesson,
        lessons::delete_lesson,
        lessons::delete_document,
        tracking::enter_lesson,
        tracking::exit_lesson,
        tracking::focus_lesson,
        tracking::current_lesson,
    ),
    components(
        schemas(
            User,
            Role,
            CreateUserRequest,
            UpdateUserRequest,
            SyncUserRequest,
            Serie,
            SerieDraft,
            SeriePatch,
            SubscriptionOutcome,
            UnsubscriptionOutcome,
            AnnouncementRequest,
            AnnouncementReport,
            Lesson,
            LessonDraft,
            LessonPatch,
            DeleteDocumentRequest,
            EnterLessonRequest,
            TabRequest,
            TrackingAck,
            ActiveLesson,
            CurrentLesson,
        )
    ),
    tags(
        (name = "system", description = "Health, metrics and diagnostics"),
        (name = "users", description = "User profiles"),
        (name = "series", description = "Course series and subscriptions"),
        (name = "lessons", description = "Lessons and their media"),
        (name = "tracking", description = "Which lesson a learner is watching"),
    ),
    info(
        title = "EduConnect API",
        description = "Course series, lessons, subscriptions and learner tracking",
        version = "0.1.0"
    ),
    servers(
        (url = "http://localhost:5001", description = "Local development server")
    )
)]
pub struct ApiDoc;

pub fn create_swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/apidocs")
        .url("/openapi.json", ApiDoc::openapi())
        .config(
            utoipa_swagger_ui::Config::new(["/openapi.json"])
                .try_it_out_enabled(true)
                .display_request_duration(true),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_resource() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/health",
            "/api/v1/users/{user_id}",
            "/api/v1/series/{serie_id}/lessons/{lesson_id}/documents",
            "/api/v1/tracking/user/{user_id}/current",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "missing {expected}"
            );
        }
    }

    #[test]
    fn every_parameter_is_described() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let paths = doc["paths"].as_object().unwrap();
        let mut checked = 0;
        for (path, item) in paths {
            for (method, operation) in item.as_object().unwrap() {
                let Some(params) = operation.get("parameters").and_then(|p| p.as_array()) else {
                    continue;
                };
                for param in params {
                    checked += 1;
                    assert!(
                        param["description"].as_str().is_some_and(|d| !d.is_empty()),
                        "{method} {path}: parameter {} has no description",
                        param["name"]
                    );
                }
            }
        }
        assert!(checked > 0);

        let lesson = &doc["paths"]["/api/v1/series/{serie_id}/lessons/{lesson_id}"]["get"];
        let names: Vec<&str> = lesson["parameters"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["serie_id", "lesson_id"]);
    }
}
