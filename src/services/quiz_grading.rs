use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::services::canvas::{CanvasApi, CanvasError};
use crate::services::quiz_answers::detect::{detect_quiz_type, DetectionError, QuizKind};

#[derive(Debug, Clone)]
pub(crate) struct GradeRequest {
    pub(crate) course_id: String,
    pub(crate) quiz_id: String,
    pub(crate) submission_id: String,
    pub(crate) question_id: Option<String>,
    pub(crate) user_id: Option<String>,
    pub(crate) score: f64,
    pub(crate) comment: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct GradeOutcome {
    pub(crate) quiz_type: QuizKind,
    pub(crate) result: Value,
    pub(crate) previous_score: Option<f64>,
    pub(crate) posted_grade: Option<f64>,
}

#[derive(Debug, Error)]
pub(crate) enum GradingError {
    #[error(transparent)]
    Detection(#[from] DetectionError),
    #[error("user_id is required to grade a New Quizzes question")]
    MissingUserId,
    #[error("question_id is required to grade a classic quiz question")]
    MissingQuestionId,
    #[error("quiz submission {0} has no attempt number")]
    MissingAttempt(String),
    #[error("Canvas {stage} failed: {source}")]
    Canvas {
        stage: &'static str,
        #[source]
        source: CanvasError,
    },
}

impl GradingError {
    fn canvas(stage: &'static str) -> impl FnOnce(CanvasError) -> Self {
        move |source| GradingError::Canvas { stage, source }
    }
}

/// Post one question's score. Classic quizzes are scored per question; New
/// Quizzes only take a whole-assignment grade, so the question score is added
/// to the current total.
pub(crate) async fn grade_question(
    api: &dyn CanvasApi,
    request: &GradeRequest,
) -> Result<GradeOutcome, GradingError> {
    let quiz = detect_quiz_type(api, &request.course_id, &request.quiz_id).await?;
    let endpoints = quiz.endpoints();

    let outcome = match quiz.assignment_id.as_deref() {
        Some(assignment_id) => {
            let user_id = request.user_id.as_deref().ok_or(GradingError::MissingUserId)?;
            let path = endpoints.assignment_submission(assignment_id, user_id);

            let current = api.get_json(&path).await.map_err(GradingError::canvas("submission lookup"))?;
            let previous = current.get("score").and_then(Value::as_f64).unwrap_or(0.0);
            let total = previous + request.score;

            let mut payload = json!({"submission": {"posted_grade": score_value(total)}});
            if let Some(comment) = non_blank(request.comment.as_deref()) {
                payload["comment"] = json!({"text_comment": comment});
            }

            let result =
                api.put_json(&path, &payload).await.map_err(GradingError::canvas("grade update"))?;
            GradeOutcome {
                quiz_type: QuizKind::NewQuizzes,
                result,
                previous_score: Some(previous),
                posted_grade: Some(total),
            }
        }
        None => {
            let question_id = request.question_id.as_deref().ok_or(GradingError::MissingQuestionId)?;
            let path = endpoints.quiz_submission(&request.submission_id);

            let current = api.get_json(&path).await.map_err(GradingError::canvas("submission lookup"))?;
            let attempt = current
                .get("quiz_submissions")
                .and_then(Value::as_array)
                .and_then(|items| items.first())
                .and_then(|submission| submission.get("attempt"))
                .and_then(Value::as_u64)
                .ok_or_else(|| GradingError::MissingAttempt(request.submission_id.clone()))?;

            let mut question = Map::new();
            question.insert("score".to_string(), score_value(request.score));
            if let Some(comment) = non_blank(request.comment.as_deref()) {
                question.insert("comment".to_string(), Value::String(comment.to_string()));
            }
            let mut questions = Map::new();
            questions.insert(question_id.to_string(), Value::Object(question));

            let payload = json!({
                "quiz_submissions": [{"attempt": attempt, "questions": questions}]
            });
            let result =
                api.put_json(&path, &payload).await.map_err(GradingError::canvas("grade update"))?;
            GradeOutcome { quiz_type: QuizKind::Classic, result, previous_score: None, posted_grade: None }
        }
    };

    tracing::info!(
        course_id = %request.course_id,
        quiz_id = %request.quiz_id,
        submission_id = %request.submission_id,
        question_id = ?request.question_id,
        quiz_type = outcome.quiz_type.as_str(),
        score = request.score,
        posted_grade = ?outcome.posted_grade,
        "Quiz question graded"
    );
    Ok(outcome)
}

/// Whole numbers go out as JSON integers so Canvas echoes them back unchanged.
pub(crate) fn score_value(score: f64) -> Value {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if score.fract() == 0.0 && score.abs() < MAX_EXACT {
        json!(score as i64)
    } else {
        json!(score)
    }
}

fn non_blank(comment: Option<&str>) -> Option<&str> {
    comment.map(str::trim).filter(|comment| !comment.is_empty())
}
