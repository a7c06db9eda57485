use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{canvas_client, CurrentUser};
use crate::core::state::AppState;
use crate::schemas::quiz::{
    AnswersQuery, CacheInvalidationResponse, GradeQuestionRequest, GradeQuestionResponse,
};
use crate::services::answer_cache;
use crate::services::quiz_answers::detect::{detect_quiz_type, QuizTypeInfo};
use crate::services::quiz_answers::{load_submission_answers, AnswersRequest};
use crate::services::quiz_grading::{grade_question, GradeRequest};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:course_id/quizzes/:quiz_id/type", get(quiz_type))
        .route(
            "/:course_id/quizzes/:quiz_id/submissions/:submission_id/answers",
            get(submission_answers).delete(invalidate_answers),
        )
        .route("/:course_id/quizzes/:quiz_id/submissions/:submission_id/grade", post(grade))
}

/// Canvas IDs are numeric, but SIS-style `sis_course_id:ABC-1` references are accepted too.
fn validate_id(field: &str, value: &str) -> Result<(), ApiError> {
    let valid = !value.is_empty()
        && value.len() <= 128
        && value.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | ':'));
    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("invalid {field}")))
    }
}

fn optional_id(field: &str, value: Option<String>) -> Result<Option<String>, ApiError> {
    match value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty()) {
        Some(value) => {
            validate_id(field, &value)?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

async fn quiz_type(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path((course_id, quiz_id)): Path<(String, String)>,
) -> Result<Json<QuizTypeInfo>, ApiError> {
    validate_id("course_id", &course_id)?;
    validate_id("quiz_id", &quiz_id)?;

    let client = canvas_client(&state, &user).await?;
    let info = detect_quiz_type(&client, &course_id, &quiz_id)
        .await
        .map_err(|err| ApiError::from_canvas(err.canvas()))?;
    Ok(Json(info))
}

async fn submission_answers(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path((course_id, quiz_id, submission_id)): Path<(String, String, String)>,
    Query(params): Query<AnswersQuery>,
) -> Result<Json<Value>, ApiError> {
    validate_id("course_id", &course_id)?;
    validate_id("quiz_id", &quiz_id)?;
    validate_id("submission_id", &submission_id)?;
    let user_id = optional_id("user_id", params.user_id)?;

    let key =
        answer_cache::cache_key(&user.id, &course_id, &quiz_id, &submission_id, user_id.as_deref());
    if !params.force_refresh {
        if let Some(cached) = answer_cache::load(state.redis(), &key).await {
            tracing::debug!(key = %key, "Serving quiz answers from cache");
            return Ok(Json(answer_cache::mark_cached(cached)));
        }
    }

    let client = canvas_client(&state, &user).await?;
    let request = AnswersRequest { course_id, quiz_id, submission_id, user_id };
    let answers = load_submission_answers(&client, &request).await?;

    answer_cache::store(state.redis(), &key, &answers).await;

    let body = serde_json::to_value(&answers)
        .map_err(|e| ApiError::internal(e, "Failed to encode submission answers"))?;
    Ok(Json(body))
}

async fn invalidate_answers(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path((course_id, quiz_id, submission_id)): Path<(String, String, String)>,
    Query(params): Query<AnswersQuery>,
) -> Result<Json<CacheInvalidationResponse>, ApiError> {
    validate_id("course_id", &course_id)?;
    validate_id("quiz_id", &quiz_id)?;
    validate_id("submission_id", &submission_id)?;
    let user_id = optional_id("user_id", params.user_id)?;

    let key =
        answer_cache::cache_key(&user.id, &course_id, &quiz_id, &submission_id, user_id.as_deref());
    let invalidated = answer_cache::invalidate(state.redis(), &key).await;
    Ok(Json(CacheInvalidationResponse { invalidated }))
}

async fn grade(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path((course_id, quiz_id, submission_id)): Path<(String, String, String)>,
    Json(payload): Json<GradeQuestionRequest>,
) -> Result<Json<GradeQuestionResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if !payload.score.is_finite() {
        return Err(ApiError::BadRequest("score must be a finite number".to_string()));
    }
    validate_id("course_id", &course_id)?;
    validate_id("quiz_id", &quiz_id)?;
    validate_id("submission_id", &submission_id)?;
    let question_id = optional_id("question_id", payload.question_id)?;
    let user_id = optional_id("user_id", payload.user_id)?;

    let client = canvas_client(&state, &user).await?;
    let request = GradeRequest {
        course_id,
        quiz_id,
        submission_id,
        question_id,
        user_id,
        score: payload.score,
        comment: payload.comment,
    };
    let outcome = grade_question(&client, &request).await?;

    // The answers view may have been cached with or without the student id.
    for student_id in [request.user_id.as_deref(), None] {
        let key = answer_cache::cache_key(
            &user.id,
            &request.course_id,
            &request.quiz_id,
            &request.submission_id,
            student_id,
        );
        answer_cache::invalidate(state.redis(), &key).await;
    }

    Ok(Json(GradeQuestionResponse {
        success: true,
        quiz_type: outcome.quiz_type,
        result: outcome.result,
        previous_score: outcome.previous_score,
        posted_grade: outcome.posted_grade,
    }))
}

#[cfg(test)]
mod tests {
    use super::validate_id;

    #[test]
    fn ids_are_restricted_to_path_safe_characters() {
        assert!(validate_id("course_id", "12345").is_ok());
        assert!(validate_id("course_id", "sis_course_id:ABC-1").is_ok());
        assert!(validate_id("course_id", "").is_err());
        assert!(validate_id("course_id", "1/../2").is_err());
        assert!(validate_id("course_id", "1?x=2").is_err());
    }
}
