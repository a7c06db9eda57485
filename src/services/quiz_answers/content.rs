//! Answer payload normalization. Everything here is pure and total: unknown or
//! malformed input yields `None`, never an error.

use std::borrow::Cow;

use serde::Serialize;
use serde_json::{Map, Value};

use super::types::QuestionType;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub(crate) enum AnswerValue {
    Text(String),
    Choices(Vec<Value>),
    Matches(Vec<MatchPair>),
    Blanks(Vec<BlankAnswer>),
    Unknown(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum AnswerKind {
    Text,
    Choices,
    Matches,
    Blanks,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct MatchPair {
    pub(crate) match_id: String,
    pub(crate) answer_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct BlankAnswer {
    pub(crate) blank_id: String,
    pub(crate) answer_text: String,
}

impl AnswerValue {
    pub(crate) fn kind(&self) -> AnswerKind {
        match self {
            AnswerValue::Text(_) => AnswerKind::Text,
            AnswerValue::Choices(_) => AnswerKind::Choices,
            AnswerValue::Matches(_) => AnswerKind::Matches,
            AnswerValue::Blanks(_) => AnswerKind::Blanks,
            AnswerValue::Unknown(_) => AnswerKind::Unknown,
        }
    }

    pub(crate) fn is_effectively_empty(&self) -> bool {
        match self {
            AnswerValue::Text(text) => is_blank_text(text),
            AnswerValue::Choices(items) => items.is_empty(),
            AnswerValue::Matches(pairs) => pairs.is_empty(),
            AnswerValue::Blanks(blanks) => blanks.is_empty(),
            AnswerValue::Unknown(value) => is_blank_value(value),
        }
    }
}

pub(crate) fn is_effectively_empty(answer: Option<&AnswerValue>) -> bool {
    answer.map_or(true, AnswerValue::is_effectively_empty)
}

/// Same emptiness rule applied to an uninterpreted JSON value.
pub(crate) fn is_blank_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => is_blank_text(text),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

pub(crate) fn is_blank_text(text: &str) -> bool {
    text.trim().is_empty() || strip_html(text).trim().is_empty()
}

/// Drop markup tags and non-breaking-space entities. A `<` not followed by a tag name is kept.
pub(crate) fn strip_html(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        let opens_tag = ch == '<'
            && chars
                .peek()
                .is_some_and(|next| next.is_ascii_alphabetic() || matches!(next, '/' | '!' | '?'));
        if opens_tag {
            for inner in chars.by_ref() {
                if inner == '>' {
                    break;
                }
            }
            output.push(' ');
            continue;
        }
        output.push(ch);
    }

    output.replace("&nbsp;", " ").replace("&#160;", " ")
}

const DEFAULT_FIELDS: &[&str] = &["answer", "text", "answer_text", "response"];
const TEXT_FIELDS: &[&str] = &["text", "answer", "answer_text", "response"];
const CHOICE_FIELDS: &[&str] = &["answer_id", "answer", "text", "answer_text", "response"];

fn answer_fields(question_type: QuestionType) -> &'static [&'static str] {
    match question_type {
        QuestionType::Essay | QuestionType::ShortAnswer => TEXT_FIELDS,
        QuestionType::MultipleChoice | QuestionType::TrueFalse => CHOICE_FIELDS,
        _ => DEFAULT_FIELDS,
    }
}

/// Whether `item` looks like a Canvas answer record rather than a bare answer payload.
pub(crate) fn has_answer_field(item: &Value) -> bool {
    item.as_object().is_some_and(|object| {
        CHOICE_FIELDS.iter().any(|field| object.contains_key(*field))
            || object.keys().any(|key| key.starts_with("answer_for_") || is_choice_flag_key(key))
    })
}

/// Pull the most plausible answer out of a Canvas answer record.
pub(crate) fn extract_answer(item: &Value, question_type: QuestionType) -> Option<AnswerValue> {
    let raw = answer_field(item, question_type)?;
    normalize_for_type(&raw, question_type)
}

/// Like [`extract_answer`], but a value without answer fields is taken as the answer itself.
pub(crate) fn extract_entry(value: &Value, question_type: QuestionType) -> Option<AnswerValue> {
    if has_answer_field(value) {
        extract_answer(value, question_type)
    } else {
        normalize_for_type(value, question_type)
    }
}

fn answer_field(item: &Value, question_type: QuestionType) -> Option<Cow<'_, Value>> {
    let Some(object) = item.as_object() else {
        return (!item.is_null()).then_some(Cow::Borrowed(item));
    };

    // Canvas sends `"text": ""` alongside the per-blank and per-choice keys.
    if let Some(structured) = structured_field(object, question_type) {
        return Some(Cow::Owned(structured));
    }

    let present: Vec<&Value> = answer_fields(question_type)
        .iter()
        .filter_map(|field| object.get(*field).filter(|value| !value.is_null()))
        .collect();
    present
        .iter()
        .find(|value| !is_blank_value(value))
        .or_else(|| present.first())
        .map(|value| Cow::Borrowed(*value))
}

fn structured_field(object: &Map<String, Value>, question_type: QuestionType) -> Option<Value> {
    match question_type {
        QuestionType::FillInMultipleBlanks | QuestionType::MultipleDropdowns => {
            let blanks: Map<String, Value> = object
                .iter()
                .filter_map(|(key, value)| {
                    key.strip_prefix("answer_for_").map(|blank| (blank.to_string(), value.clone()))
                })
                .collect();
            (!blanks.is_empty()).then_some(Value::Object(blanks))
        }
        QuestionType::MultipleAnswers => {
            let has_flags = object.keys().any(|key| is_choice_flag_key(key));
            let selected: Vec<Value> = object
                .iter()
                .filter(|(key, value)| is_choice_flag_key(key) && is_truthy_flag(value))
                .filter_map(|(key, _)| key.strip_prefix("answer_"))
                .map(|id| Value::String(id.to_string()))
                .collect();
            has_flags.then_some(Value::Array(selected))
        }
        QuestionType::Matching => {
            // `answer_<left answer id>` holds the chosen match id; blank means unmatched.
            let has_pairs = object.keys().any(|key| is_choice_flag_key(key));
            let pairs: Vec<Value> = object
                .iter()
                .filter(|(key, value)| is_choice_flag_key(key) && !is_blank_value(value))
                .filter_map(|(key, value)| {
                    let answer_id = key.strip_prefix("answer_")?;
                    Some(serde_json::json!({ "answer_id": answer_id, "match_id": value }))
                })
                .collect();
            has_pairs.then_some(Value::Array(pairs))
        }
        _ => None,
    }
}

fn normalize_for_type(raw: &Value, question_type: QuestionType) -> Option<AnswerValue> {
    if raw.is_null() {
        return None;
    }

    match question_type {
        QuestionType::TextOnly => None,
        QuestionType::Matching => normalize_matches(raw).or_else(|| answer_from_value(raw)),
        QuestionType::FillInMultipleBlanks | QuestionType::MultipleDropdowns => {
            normalize_blanks(raw).or_else(|| answer_from_value(raw))
        }
        QuestionType::MultipleAnswers => match raw {
            Value::Array(items) => Some(AnswerValue::Choices(items.clone())),
            other => answer_from_value(other),
        },
        _ => answer_from_value(raw),
    }
}

/// Shape-directed fallback used when the question type gives no better hint.
pub(crate) fn answer_from_value(value: &Value) -> Option<AnswerValue> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(AnswerValue::Text(text.clone())),
        Value::Number(number) => Some(AnswerValue::Text(number.to_string())),
        Value::Bool(flag) => Some(AnswerValue::Text(flag.to_string())),
        Value::Array(items) => Some(AnswerValue::Choices(items.clone())),
        Value::Object(_) => Some(AnswerValue::Unknown(value.clone())),
    }
}

fn normalize_matches(raw: &Value) -> Option<AnswerValue> {
    let pairs = match raw {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                let object = item.as_object()?;
                let match_id = object
                    .get("match_id")
                    .or_else(|| object.get("answer_id"))
                    .and_then(scalar_text)?;
                let answer_text = ["answer_text", "text", "match_text"]
                    .iter()
                    .find_map(|field| object.get(*field).and_then(scalar_text))
                    .or_else(|| {
                        object
                            .get("match_id")
                            .and_then(|_| object.get("answer_id"))
                            .and_then(scalar_text)
                    })
                    .unwrap_or_default();
                Some(MatchPair { match_id, answer_text })
            })
            .collect::<Vec<_>>(),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| MatchPair {
                match_id: key.clone(),
                answer_text: value_text(value),
            })
            .collect(),
        _ => return None,
    };
    Some(AnswerValue::Matches(pairs))
}

fn normalize_blanks(raw: &Value) -> Option<AnswerValue> {
    let blanks = match raw {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| BlankAnswer { blank_id: key.clone(), answer_text: value_text(value) })
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                let object = item.as_object()?;
                let blank_id =
                    object.get("blank_id").or_else(|| object.get("blank")).and_then(scalar_text)?;
                let answer_text = ["answer_text", "text", "answer"]
                    .iter()
                    .find_map(|field| object.get(*field))
                    .map(value_text)
                    .unwrap_or_default();
                Some(BlankAnswer { blank_id, answer_text })
            })
            .collect::<Vec<_>>(),
        _ => return None,
    };
    Some(AnswerValue::Blanks(blanks))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Object(object) => ["answer_text", "text", "answer"]
            .iter()
            .find_map(|field| object.get(*field))
            .map(value_text)
            .unwrap_or_default(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(", "),
        other => scalar_text(other).unwrap_or_default(),
    }
}

/// `answer_<digits>` keys are Canvas's per-choice flags for multiple-answer questions.
fn is_choice_flag_key(key: &str) -> bool {
    key.strip_prefix("answer_")
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|ch| ch.is_ascii_digit()))
}

fn is_truthy_flag(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => matches!(text.trim(), "1" | "true"),
        _ => false,
    }
}
