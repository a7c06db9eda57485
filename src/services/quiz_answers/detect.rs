use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::services::canvas::endpoints::{EndpointTemplates, QuizEndpoints};
use crate::services::canvas::{CanvasApi, CanvasError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum QuizKind {
    Classic,
    NewQuizzes,
}

impl QuizKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            QuizKind::Classic => "classic",
            QuizKind::NewQuizzes => "new_quizzes",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct QuizTypeInfo {
    pub(crate) course_id: String,
    pub(crate) quiz_id: String,
    pub(crate) title: Option<String>,
    pub(crate) kind: QuizKind,
    pub(crate) is_new_quizzes: bool,
    pub(crate) assignment_id: Option<String>,
    pub(crate) endpoints: EndpointTemplates,
}

impl QuizTypeInfo {
    pub(crate) fn endpoints(&self) -> QuizEndpoints {
        QuizEndpoints::new(&self.course_id, &self.quiz_id)
    }
}

#[derive(Debug, Clone, Error)]
pub(crate) enum DetectionError {
    #[error("quiz {quiz_id} metadata could not be fetched: {source}")]
    MetadataUnavailable {
        quiz_id: String,
        #[source]
        source: CanvasError,
    },
}

impl DetectionError {
    pub(crate) fn canvas(&self) -> &CanvasError {
        match self {
            DetectionError::MetadataUnavailable { source, .. } => source,
        }
    }
}

/// A backing assignment exists only when `assignment_id` is a positive JSON number.
pub(crate) fn classify_assignment_id(value: Option<&Value>) -> Option<String> {
    let Some(Value::Number(number)) = value else {
        return None;
    };
    if let Some(id) = number.as_u64() {
        return (id > 0).then(|| id.to_string());
    }
    let id = number.as_f64().filter(|id| id.is_finite() && *id > 0.0)?;
    Some(if id.fract() == 0.0 { format!("{id:.0}") } else { number.to_string() })
}

pub(crate) fn quiz_type_from_metadata(course_id: &str, quiz_id: &str, quiz: &Value) -> QuizTypeInfo {
    let assignment_id = classify_assignment_id(quiz.get("assignment_id"));
    let kind = if assignment_id.is_some() { QuizKind::NewQuizzes } else { QuizKind::Classic };
    let endpoints = QuizEndpoints::new(course_id, quiz_id).templates(assignment_id.as_deref());

    QuizTypeInfo {
        course_id: course_id.to_string(),
        quiz_id: quiz_id.to_string(),
        title: quiz.get("title").and_then(Value::as_str).map(ToString::to_string),
        kind,
        is_new_quizzes: kind == QuizKind::NewQuizzes,
        assignment_id,
        endpoints,
    }
}

/// Fetch quiz metadata and classify it. A failed fetch is an error, never an implicit "classic".
pub(crate) async fn detect_quiz_type(
    api: &dyn CanvasApi,
    course_id: &str,
    quiz_id: &str,
) -> Result<QuizTypeInfo, DetectionError> {
    let path = QuizEndpoints::new(course_id, quiz_id).quiz();
    let quiz = api.get_json(&path).await.map_err(|source| {
        tracing::error!(
            course_id = %course_id,
            quiz_id = %quiz_id,
            error = %source,
            "Quiz type detection failed"
        );
        DetectionError::MetadataUnavailable { quiz_id: quiz_id.to_string(), source }
    })?;

    let info = quiz_type_from_metadata(course_id, quiz_id, &quiz);
    tracing::debug!(
        course_id = %course_id,
        quiz_id = %quiz_id,
        quiz_type = info.kind.as_str(),
        assignment_id = ?info.assignment_id,
        "Quiz type detected"
    );
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FixtureCanvas;
    use serde_json::json;

    #[test]
    fn only_positive_numbers_mark_new_quizzes() {
        assert_eq!(classify_assignment_id(Some(&json!(55))).as_deref(), Some("55"));
        assert_eq!(classify_assignment_id(Some(&json!(55.0))).as_deref(), Some("55"));
        assert_eq!(classify_assignment_id(Some(&json!(0.5))).as_deref(), Some("0.5"));
        for value in [json!(null), json!(0), json!(0.0), json!(-3), json!(-0.5), json!("55"), json!(true)] {
            assert_eq!(classify_assignment_id(Some(&value)), None, "{value}");
        }
        assert_eq!(classify_assignment_id(None), None);
    }

    #[tokio::test]
    async fn detection_reports_assignment_and_templates() {
        let canvas = FixtureCanvas::new().with_json(
            "/api/v1/courses/1/quizzes/2",
            json!({"id": 2, "title": "Midterm", "assignment_id": 77}),
        );

        let info = detect_quiz_type(&canvas, "1", "2").await.expect("detected");
        assert_eq!(info.kind, QuizKind::NewQuizzes);
        assert!(info.is_new_quizzes);
        assert_eq!(info.assignment_id.as_deref(), Some("77"));
        assert_eq!(info.title.as_deref(), Some("Midterm"));
        assert_eq!(info.endpoints.grade, "/api/v1/courses/1/assignments/77/submissions/{user_id}");
    }

    #[tokio::test]
    async fn detection_fails_closed() {
        let canvas = FixtureCanvas::new().with_status("/api/v1/courses/1/quizzes/2", 404);

        let err = detect_quiz_type(&canvas, "1", "2").await.expect_err("must fail");
        assert_eq!(err.canvas().status(), Some(404));
    }
}
