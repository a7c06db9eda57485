use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::services::quiz_answers::detect::QuizKind;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AnswersQuery {
    #[serde(default)]
    #[serde(alias = "userId")]
    pub(crate) user_id: Option<String>,
    #[serde(default)]
    #[serde(alias = "forceRefresh")]
    pub(crate) force_refresh: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct GradeQuestionRequest {
    #[serde(default)]
    #[serde(alias = "questionId")]
    pub(crate) question_id: Option<String>,
    #[serde(default)]
    #[serde(alias = "userId")]
    pub(crate) user_id: Option<String>,
    #[validate(range(min = 0.0, message = "score must be non-negative"))]
    pub(crate) score: f64,
    #[serde(default)]
    #[validate(length(max = 10000, message = "comment must be at most 10000 characters"))]
    pub(crate) comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GradeQuestionResponse {
    pub(crate) success: bool,
    pub(crate) quiz_type: QuizKind,
    pub(crate) result: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) previous_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) posted_grade: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CacheInvalidationResponse {
    pub(crate) invalidated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn grade_request_accepts_camel_case_and_validates() {
        let request: GradeQuestionRequest =
            serde_json::from_value(json!({"questionId": "7", "score": 2.5, "comment": "ok"}))
                .expect("parse");
        assert_eq!(request.question_id.as_deref(), Some("7"));
        assert!(request.validate().is_ok());

        let negative: GradeQuestionRequest =
            serde_json::from_value(json!({"score": -1.0})).expect("parse");
        assert!(negative.validate().is_err());

        let long: GradeQuestionRequest =
            serde_json::from_value(json!({"score": 1.0, "comment": "x".repeat(10_001)}))
                .expect("parse");
        assert!(long.validate().is_err());
    }
}
