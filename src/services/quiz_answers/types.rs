use std::collections::{BTreeMap, HashMap};

use serde::{Serialize, Serializer};
use serde_json::Value;

use super::content::{AnswerKind, AnswerValue};

/// Canvas question types. Canvas spells them with a `_question` suffix; both forms parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    FillInMultipleBlanks,
    MultipleAnswers,
    MultipleDropdowns,
    Matching,
    Numerical,
    Calculated,
    Essay,
    FileUpload,
    TextOnly,
    Unknown,
}

impl QuestionType {
    pub(crate) fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.strip_suffix("_question").unwrap_or(&normalized) {
            "multiple_choice" => QuestionType::MultipleChoice,
            "true_false" => QuestionType::TrueFalse,
            "short_answer" => QuestionType::ShortAnswer,
            "fill_in_multiple_blanks" => QuestionType::FillInMultipleBlanks,
            "multiple_answers" => QuestionType::MultipleAnswers,
            "multiple_dropdowns" => QuestionType::MultipleDropdowns,
            "matching" => QuestionType::Matching,
            "numerical" => QuestionType::Numerical,
            "calculated" => QuestionType::Calculated,
            "essay" => QuestionType::Essay,
            "file_upload" => QuestionType::FileUpload,
            "text_only" => QuestionType::TextOnly,
            _ => QuestionType::Unknown,
        }
    }

    pub(crate) fn from_value(value: Option<&Value>) -> Self {
        value.and_then(Value::as_str).map(Self::parse).unwrap_or(QuestionType::Unknown)
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice_question",
            QuestionType::TrueFalse => "true_false_question",
            QuestionType::ShortAnswer => "short_answer_question",
            QuestionType::FillInMultipleBlanks => "fill_in_multiple_blanks_question",
            QuestionType::MultipleAnswers => "multiple_answers_question",
            QuestionType::MultipleDropdowns => "multiple_dropdowns_question",
            QuestionType::Matching => "matching_question",
            QuestionType::Numerical => "numerical_question",
            QuestionType::Calculated => "calculated_question",
            QuestionType::Essay => "essay_question",
            QuestionType::FileUpload => "file_upload_question",
            QuestionType::TextOnly => "text_only_question",
            QuestionType::Unknown => "unknown",
        }
    }

    /// Text-only items carry no answer and never count as a gap.
    pub(crate) fn expects_answer(self) -> bool {
        !matches!(self, QuestionType::TextOnly)
    }
}

impl Serialize for QuestionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum AnswerSource {
    AssignmentBodyJson,
    AssignmentBodyText,
    SubmissionData,
    SubmissionHistory,
    SubmissionQuestions,
    SubmissionEvents,
    NoAnswer,
}

impl AnswerSource {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            AnswerSource::AssignmentBodyJson => "assignment_body_json",
            AnswerSource::AssignmentBodyText => "assignment_body_text",
            AnswerSource::SubmissionData => "submission_data",
            AnswerSource::SubmissionHistory => "submission_history",
            AnswerSource::SubmissionQuestions => "submission_questions",
            AnswerSource::SubmissionEvents => "submission_events",
            AnswerSource::NoAnswer => "no_answer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum MappingStrategy {
    DirectQuestionId,
    PositionBased,
    SubmissionQuestionId,
    Unmapped,
}

/// Canonical question as fetched from Canvas.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct CanvasQuestion {
    pub(crate) id: String,
    pub(crate) position: u32,
    pub(crate) question_type: QuestionType,
    pub(crate) question_name: String,
    pub(crate) question_text: String,
    pub(crate) points_possible: Option<f64>,
}

impl CanvasQuestion {
    /// `index` is the zero-based order in the Canvas listing; it stands in for a missing position.
    pub(crate) fn from_value(value: &Value, index: usize) -> Option<Self> {
        let id = canvas_id(value.get("id")?)?;
        let position = value
            .get("position")
            .and_then(Value::as_u64)
            .and_then(|position| u32::try_from(position).ok())
            .filter(|position| *position > 0)
            .unwrap_or_else(|| fallback_position(index));

        Some(Self {
            id,
            position,
            question_type: QuestionType::from_value(value.get("question_type")),
            question_name: string_field(value, "question_name"),
            question_text: string_field(value, "question_text"),
            points_possible: value.get("points_possible").and_then(Value::as_f64),
        })
    }
}

/// One candidate answer from a single extraction source. Several may exist per question.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawAnswer {
    pub(crate) submission_question_id: Option<String>,
    pub(crate) original_question_id: Option<String>,
    pub(crate) position_in_quiz: Option<u32>,
    pub(crate) answer: Option<AnswerValue>,
    pub(crate) question_type: QuestionType,
    pub(crate) source: AnswerSource,
    pub(crate) points: Option<f64>,
    pub(crate) correct: Option<bool>,
}

impl RawAnswer {
    pub(crate) fn new(source: AnswerSource, question_type: QuestionType) -> Self {
        Self {
            submission_question_id: None,
            original_question_id: None,
            position_in_quiz: None,
            answer: None,
            question_type,
            source,
            points: None,
            correct: None,
        }
    }
}

/// The reconciled answer bound to exactly one canonical question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ProcessedAnswer {
    pub(crate) question_id: String,
    pub(crate) position: u32,
    pub(crate) question_type: QuestionType,
    pub(crate) question_name: String,
    pub(crate) question_text: String,
    pub(crate) points_possible: Option<f64>,
    pub(crate) answer: Option<AnswerValue>,
    pub(crate) answer_kind: Option<AnswerKind>,
    pub(crate) source: AnswerSource,
    pub(crate) mapping_strategy: Option<MappingStrategy>,
    pub(crate) submission_question_id: Option<String>,
    pub(crate) points: Option<f64>,
    pub(crate) correct: Option<bool>,
}

impl ProcessedAnswer {
    pub(crate) fn bind(question: &CanvasQuestion, raw: RawAnswer, strategy: MappingStrategy) -> Self {
        Self {
            question_id: question.id.clone(),
            position: question.position,
            question_type: question.question_type,
            question_name: question.question_name.clone(),
            question_text: question.question_text.clone(),
            points_possible: question.points_possible,
            answer_kind: raw.answer.as_ref().map(AnswerValue::kind),
            answer: raw.answer,
            source: raw.source,
            mapping_strategy: Some(strategy),
            submission_question_id: raw.submission_question_id,
            points: raw.points,
            correct: raw.correct,
        }
    }

    pub(crate) fn placeholder(question: &CanvasQuestion) -> Self {
        Self {
            question_id: question.id.clone(),
            position: question.position,
            question_type: question.question_type,
            question_name: question.question_name.clone(),
            question_text: question.question_text.clone(),
            points_possible: question.points_possible,
            answer: None,
            answer_kind: None,
            source: AnswerSource::NoAnswer,
            mapping_strategy: None,
            submission_question_id: None,
            points: None,
            correct: None,
        }
    }
}

/// An answer no mapping strategy could place; surfaced to the grader with its raw IDs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct UnmappedAnswer {
    pub(crate) submission_question_id: Option<String>,
    pub(crate) original_question_id: Option<String>,
    pub(crate) position_in_quiz: Option<u32>,
    pub(crate) question_type: QuestionType,
    pub(crate) answer: Option<AnswerValue>,
    pub(crate) answer_kind: Option<AnswerKind>,
    pub(crate) source: AnswerSource,
    pub(crate) mapping_strategy: MappingStrategy,
    pub(crate) points: Option<f64>,
    pub(crate) correct: Option<bool>,
}

impl From<RawAnswer> for UnmappedAnswer {
    fn from(raw: RawAnswer) -> Self {
        Self {
            submission_question_id: raw.submission_question_id,
            original_question_id: raw.original_question_id,
            position_in_quiz: raw.position_in_quiz,
            question_type: raw.question_type,
            answer_kind: raw.answer.as_ref().map(AnswerValue::kind),
            answer: raw.answer,
            source: raw.source,
            mapping_strategy: MappingStrategy::Unmapped,
            points: raw.points,
            correct: raw.correct,
        }
    }
}

/// Lookup indexes over the quiz's questions, built once per request.
#[derive(Debug, Clone, Default)]
pub(crate) struct QuestionMaps {
    questions: Vec<CanvasQuestion>,
    by_id: HashMap<String, usize>,
    by_position: BTreeMap<u32, usize>,
}

impl QuestionMaps {
    pub(crate) fn build(questions: Vec<CanvasQuestion>) -> Self {
        let mut by_id = HashMap::new();
        let mut by_position = BTreeMap::new();
        for (index, question) in questions.iter().enumerate() {
            by_id.entry(question.id.clone()).or_insert(index);
            by_position.entry(question.position).or_insert(index);
        }
        Self { questions, by_id, by_position }
    }

    pub(crate) fn from_values(values: &[Value]) -> Self {
        let questions = values
            .iter()
            .enumerate()
            .filter_map(|(index, value)| CanvasQuestion::from_value(value, index))
            .collect();
        Self::build(questions)
    }

    pub(crate) fn questions(&self) -> &[CanvasQuestion] {
        &self.questions
    }

    pub(crate) fn len(&self) -> usize {
        self.questions.len()
    }

    pub(crate) fn index_of_id(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub(crate) fn index_of_position(&self, position: u32) -> Option<usize> {
        self.by_position.get(&position).copied()
    }

    pub(crate) fn question(&self, index: usize) -> Option<&CanvasQuestion> {
        self.questions.get(index)
    }

    pub(crate) fn essay_questions(&self) -> impl Iterator<Item = &CanvasQuestion> {
        self.questions.iter().filter(|question| question.question_type == QuestionType::Essay)
    }

    /// Best-effort type for an answer that has not been mapped yet.
    pub(crate) fn type_hint(&self, id: Option<&str>, position: Option<u32>) -> QuestionType {
        id.and_then(|id| self.index_of_id(id))
            .or_else(|| position.and_then(|position| self.index_of_position(position)))
            .and_then(|index| self.question(index))
            .map(|question| question.question_type)
            .unwrap_or(QuestionType::Unknown)
    }
}

/// Normalize a Canvas identifier that may arrive as a number, a numeric string, or `question_<id>`.
pub(crate) fn canvas_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) => {
            let trimmed = text.trim();
            let trimmed = trimmed.strip_prefix("question_").unwrap_or(trimmed);
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    }
}

pub(crate) fn fallback_position(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}

fn string_field(value: &Value, key: &str) -> String {
    value.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn question_type_accepts_both_spellings() {
        assert_eq!(QuestionType::parse("essay_question"), QuestionType::Essay);
        assert_eq!(QuestionType::parse("essay"), QuestionType::Essay);
        assert_eq!(QuestionType::parse(" Matching_Question "), QuestionType::Matching);
        assert_eq!(QuestionType::parse("hot_spot"), QuestionType::Unknown);
        assert_eq!(QuestionType::from_value(None), QuestionType::Unknown);
    }

    #[test]
    fn canvas_id_normalizes_shapes() {
        assert_eq!(canvas_id(&json!(42)).as_deref(), Some("42"));
        assert_eq!(canvas_id(&json!(" 42 ")).as_deref(), Some("42"));
        assert_eq!(canvas_id(&json!("question_42")).as_deref(), Some("42"));
        assert_eq!(canvas_id(&json!("")), None);
        assert_eq!(canvas_id(&json!(null)), None);
    }

    #[test]
    fn question_position_falls_back_to_listing_order() {
        let question = CanvasQuestion::from_value(
            &json!({"id": 7, "question_type": "essay_question", "position": null}),
            2,
        )
        .expect("question");
        assert_eq!(question.position, 3);
        assert!(CanvasQuestion::from_value(&json!({"position": 1}), 0).is_none());
    }

    #[test]
    fn maps_keep_first_question_on_collisions() {
        let maps = QuestionMaps::from_values(&[
            json!({"id": 1, "position": 1, "question_type": "essay_question"}),
            json!({"id": 2, "position": 1, "question_type": "multiple_choice_question"}),
        ]);

        assert_eq!(maps.index_of_position(1), Some(0));
        assert_eq!(maps.index_of_id("2"), Some(1));
        assert_eq!(maps.type_hint(Some("2"), None), QuestionType::MultipleChoice);
        assert_eq!(maps.type_hint(Some("99"), Some(1)), QuestionType::Essay);
        assert_eq!(maps.type_hint(None, None), QuestionType::Unknown);
    }
}
