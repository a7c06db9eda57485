//! Per-source answer parsers. Each takes already-fetched Canvas payloads and
//! produces unmapped [`RawAnswer`]s; none of them perform I/O.

use serde_json::{Map, Value};

use super::content::{extract_answer, extract_entry, is_blank_text, AnswerValue};
use super::types::{canvas_id, fallback_position, AnswerSource, QuestionMaps, QuestionType, RawAnswer};

/// Parse an assignment submission `body`.
///
/// JSON with a `responses`/`answers` collection yields one answer per entry. A
/// non-JSON body (or a JSON string) is taken as the essay answer when the quiz
/// has exactly one essay question.
pub(crate) fn answers_from_body(
    body: &str,
    maps: &QuestionMaps,
    json_source: AnswerSource,
    text_source: AnswerSource,
) -> Vec<RawAnswer> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(object)) => response_entries(&object)
            .map(|entries| answers_from_response_map(entries, maps, json_source))
            .unwrap_or_default(),
        Ok(Value::String(text)) => sole_essay_answer(&text, maps, text_source).into_iter().collect(),
        Ok(_) => Vec::new(),
        Err(_) => sole_essay_answer(body, maps, text_source).into_iter().collect(),
    }
}

fn response_entries(object: &Map<String, Value>) -> Option<&Value> {
    ["responses", "answers"]
        .iter()
        .find_map(|key| object.get(*key).filter(|value| value.is_object() || value.is_array()))
}

fn answers_from_response_map(entries: &Value, maps: &QuestionMaps, source: AnswerSource) -> Vec<RawAnswer> {
    match entries {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| {
                let original = canvas_id(&Value::String(key.clone()));
                let question_type = maps.type_hint(original.as_deref(), None);
                let mut raw = RawAnswer::new(source, question_type);
                raw.answer = extract_entry(value, question_type);
                raw.points = value.get("points").and_then(Value::as_f64);
                raw.correct = value.get("correct").and_then(Value::as_bool);
                raw.original_question_id = original;
                raw
            })
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let original = item.get("question_id").or_else(|| item.get("id")).and_then(canvas_id);
                let position = explicit_position(item).or_else(|| {
                    original.is_none().then(|| fallback_position(index))
                });
                let question_type = declared_type(item)
                    .unwrap_or_else(|| maps.type_hint(original.as_deref(), position));
                let mut raw = RawAnswer::new(source, question_type);
                raw.answer = extract_entry(item, question_type);
                raw.points = item.get("points").and_then(Value::as_f64);
                raw.correct = item.get("correct").and_then(Value::as_bool);
                raw.original_question_id = original;
                raw.position_in_quiz = position;
                raw
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn sole_essay_answer(text: &str, maps: &QuestionMaps, source: AnswerSource) -> Option<RawAnswer> {
    if is_blank_text(text) {
        return None;
    }
    let mut essays = maps.essay_questions();
    let essay = essays.next()?;
    if essays.next().is_some() {
        return None;
    }

    let mut raw = RawAnswer::new(source, QuestionType::Essay);
    raw.original_question_id = Some(essay.id.clone());
    raw.position_in_quiz = Some(essay.position);
    raw.answer = Some(AnswerValue::Text(text.trim().to_string()));
    Some(raw)
}

/// Classic `submission_data`: one record per question, in quiz order.
pub(crate) fn answers_from_submission_data(
    entries: &[Value],
    maps: &QuestionMaps,
    source: AnswerSource,
) -> Vec<RawAnswer> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.is_object())
        .map(|(index, entry)| {
            let original = entry.get("question_id").and_then(canvas_id);
            let position = fallback_position(index);
            let question_type = maps.type_hint(original.as_deref(), Some(position));
            let mut raw = RawAnswer::new(source, question_type);
            raw.answer = extract_answer(entry, question_type);
            raw.points = entry.get("points").and_then(Value::as_f64);
            raw.correct = entry.get("correct").and_then(Value::as_bool);
            raw.original_question_id = original;
            raw.position_in_quiz = Some(position);
            raw
        })
        .collect()
}

/// Replay submission history, latest attempt first, through the same parsers as the live submission.
pub(crate) fn answers_from_history(entries: &[Value], maps: &QuestionMaps) -> Vec<RawAnswer> {
    let mut ordered: Vec<&Value> = entries.iter().filter(|entry| entry.is_object()).collect();
    ordered.sort_by_key(|entry| std::cmp::Reverse(attempt_of(entry)));

    ordered
        .into_iter()
        .flat_map(|entry| {
            let mut answers = entry
                .get("submission_data")
                .and_then(Value::as_array)
                .map(|data| answers_from_submission_data(data, maps, AnswerSource::SubmissionHistory))
                .unwrap_or_default();
            if let Some(body) = entry.get("body").and_then(Value::as_str) {
                answers.extend(answers_from_body(
                    body,
                    maps,
                    AnswerSource::SubmissionHistory,
                    AnswerSource::SubmissionHistory,
                ));
            }
            answers
        })
        .collect()
}

/// The entry with the highest `attempt`, if any.
pub(crate) fn latest_history_entry(entries: &[Value]) -> Option<&Value> {
    entries.iter().filter(|entry| entry.is_object()).max_by_key(|entry| attempt_of(entry))
}

fn attempt_of(entry: &Value) -> i64 {
    entry.get("attempt").and_then(Value::as_i64).unwrap_or(0)
}

/// `quiz_submissions/:id/questions`. Pages may arrive wrapped in `quiz_submission_questions`.
pub(crate) fn answers_from_submission_questions(pages: &[Value], maps: &QuestionMaps) -> Vec<RawAnswer> {
    flatten_collection(pages, "quiz_submission_questions")
        .into_iter()
        .map(|item| {
            let submission_question_id = item.get("id").and_then(canvas_id);
            let original = item
                .get("quiz_question_id")
                .or_else(|| item.get("question_id"))
                .and_then(canvas_id);
            let position = explicit_position(item);
            let question_type = declared_type(item).unwrap_or_else(|| {
                maps.type_hint(original.as_deref().or(submission_question_id.as_deref()), position)
            });

            let mut raw = RawAnswer::new(AnswerSource::SubmissionQuestions, question_type);
            raw.answer = extract_answer(item, question_type);
            raw.correct = item.get("correct").and_then(Value::as_bool);
            raw.submission_question_id = submission_question_id;
            raw.original_question_id = original;
            raw.position_in_quiz = position;
            raw
        })
        .collect()
}

/// Essay answers recorded by `question_answered` events, most recent event first.
pub(crate) fn answers_from_events(pages: &[Value], maps: &QuestionMaps) -> Vec<RawAnswer> {
    let events = flatten_collection(pages, "quiz_submission_events");

    events
        .into_iter()
        .rev()
        .filter(|event| event.get("event_type").and_then(Value::as_str) == Some("question_answered"))
        .flat_map(|event| match event.get("event_data") {
            Some(Value::Array(items)) => items.iter().collect::<Vec<_>>(),
            Some(item @ Value::Object(_)) => vec![item],
            _ => Vec::new(),
        })
        .filter_map(|datum| {
            let original = datum
                .get("quiz_question_id")
                .or_else(|| datum.get("question_id"))
                .and_then(canvas_id)?;
            let index = maps.index_of_id(&original)?;
            let question = maps.question(index)?;
            if question.question_type != QuestionType::Essay {
                return None;
            }

            let mut raw = RawAnswer::new(AnswerSource::SubmissionEvents, QuestionType::Essay);
            raw.answer = extract_answer(datum, QuestionType::Essay);
            raw.original_question_id = Some(original);
            raw.position_in_quiz = Some(question.position);
            Some(raw)
        })
        .collect()
}

fn flatten_collection<'a>(pages: &'a [Value], wrapper: &str) -> Vec<&'a Value> {
    pages
        .iter()
        .flat_map(|page| match page.get(wrapper) {
            Some(Value::Array(items)) => items.iter().collect::<Vec<_>>(),
            Some(_) => Vec::new(),
            None => match page {
                Value::Array(items) => items.iter().collect(),
                Value::Object(_) => vec![page],
                _ => Vec::new(),
            },
        })
        .collect()
}

fn explicit_position(item: &Value) -> Option<u32> {
    item.get("position")
        .and_then(Value::as_u64)
        .and_then(|position| u32::try_from(position).ok())
        .filter(|position| *position > 0)
}

fn declared_type(item: &Value) -> Option<QuestionType> {
    let question_type = QuestionType::from_value(item.get("question_type"));
    (question_type != QuestionType::Unknown).then_some(question_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn maps() -> QuestionMaps {
        QuestionMaps::from_values(&[
            json!({"id": 101, "position": 1, "question_type": "multiple_choice_question"}),
            json!({"id": 102, "position": 2, "question_type": "essay_question"}),
            json!({"id": 103, "position": 3, "question_type": "text_only_question"}),
        ])
    }

    #[test]
    fn plain_text_body_goes_to_the_only_essay() {
        let answers = answers_from_body(
            "My answer here",
            &maps(),
            AnswerSource::AssignmentBodyJson,
            AnswerSource::AssignmentBodyText,
        );

        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].original_question_id.as_deref(), Some("102"));
        assert_eq!(answers[0].source, AnswerSource::AssignmentBodyText);
        assert_eq!(answers[0].answer, Some(AnswerValue::Text("My answer here".into())));
    }

    #[test]
    fn plain_text_is_ambiguous_with_two_essays() {
        let maps = QuestionMaps::from_values(&[
            json!({"id": 1, "position": 1, "question_type": "essay_question"}),
            json!({"id": 2, "position": 2, "question_type": "essay_question"}),
        ]);
        let answers = answers_from_body(
            "text",
            &maps,
            AnswerSource::AssignmentBodyJson,
            AnswerSource::AssignmentBodyText,
        );
        assert!(answers.is_empty());
    }

    #[test]
    fn json_body_responses_map_yields_one_answer_per_entry() {
        let body = json!({"responses": {"101": {"answer_id": 5}, "question_102": "Essay"}}).to_string();
        let answers = answers_from_body(
            &body,
            &maps(),
            AnswerSource::AssignmentBodyJson,
            AnswerSource::AssignmentBodyText,
        );

        assert_eq!(answers.len(), 2);
        let essay = answers
            .iter()
            .find(|answer| answer.original_question_id.as_deref() == Some("102"))
            .expect("essay entry");
        assert_eq!(essay.question_type, QuestionType::Essay);
        assert_eq!(essay.answer, Some(AnswerValue::Text("Essay".into())));
        assert!(answers.iter().all(|answer| answer.source == AnswerSource::AssignmentBodyJson));
    }

    #[test]
    fn json_body_without_responses_is_ignored() {
        let answers = answers_from_body(
            r#"{"unrelated": true}"#,
            &maps(),
            AnswerSource::AssignmentBodyJson,
            AnswerSource::AssignmentBodyText,
        );
        assert!(answers.is_empty());
    }

    #[test]
    fn submission_data_is_index_aligned() {
        let data = vec![json!({"question_id": 101, "answer_id": 9, "correct": true, "points": 1.0}), json!({"text": ""})];
        let answers = answers_from_submission_data(&data, &maps(), AnswerSource::SubmissionData);

        assert_eq!(answers[0].position_in_quiz, Some(1));
        assert_eq!(answers[0].answer, Some(AnswerValue::Text("9".into())));
        assert_eq!(answers[0].correct, Some(true));
        assert_eq!(answers[1].original_question_id, None);
        assert_eq!(answers[1].position_in_quiz, Some(2));
        assert_eq!(answers[1].question_type, QuestionType::Essay);
    }

    #[test]
    fn history_is_replayed_latest_attempt_first() {
        let history = vec![
            json!({"attempt": 1, "submission_data": [{"question_id": 102, "text": "first"}]}),
            json!({"attempt": 2, "submission_data": [{"question_id": 102, "text": "second"}]}),
        ];
        let answers = answers_from_history(&history, &maps());

        assert_eq!(answers[0].answer, Some(AnswerValue::Text("second".into())));
        assert!(answers.iter().all(|answer| answer.source == AnswerSource::SubmissionHistory));
        assert_eq!(latest_history_entry(&history).and_then(|entry| entry.get("attempt")), Some(&json!(2)));
    }

    #[test]
    fn submission_questions_keep_both_identifiers() {
        let pages = vec![json!({"quiz_submission_questions": [
            {"id": 9001, "quiz_question_id": 102, "question_type": "essay_question", "answer": "<p>Body</p>"}
        ]})];
        let answers = answers_from_submission_questions(&pages, &maps());

        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].submission_question_id.as_deref(), Some("9001"));
        assert_eq!(answers[0].original_question_id.as_deref(), Some("102"));
        assert_eq!(answers[0].position_in_quiz, None);
        assert_eq!(answers[0].answer, Some(AnswerValue::Text("<p>Body</p>".into())));
    }

    #[test]
    fn events_only_yield_essay_answers_newest_first() {
        let pages = vec![json!({"quiz_submission_events": [
            {"event_type": "question_answered", "event_data": [{"quiz_question_id": "102", "answer": "draft"}]},
            {"event_type": "question_flagged", "event_data": {"quiz_question_id": "102"}},
            {"event_type": "question_answered", "event_data": [
                {"quiz_question_id": "101", "answer": "7"},
                {"quiz_question_id": "102", "answer": "final"}
            ]}
        ]})];
        let answers = answers_from_events(&pages, &maps());

        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].answer, Some(AnswerValue::Text("final".into())));
        assert_eq!(answers[1].answer, Some(AnswerValue::Text("draft".into())));
        assert!(answers.iter().all(|answer| answer.position_in_quiz == Some(2)));
    }
}
