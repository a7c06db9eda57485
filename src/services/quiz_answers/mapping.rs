use super::types::{MappingStrategy, QuestionMaps, RawAnswer};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MappingOutcome {
    Mapped { question_index: usize, strategy: MappingStrategy, raw: RawAnswer },
    Unmapped(RawAnswer),
}

/// Bind a raw answer to a canonical question: original question ID, then quiz
/// position, then submission question ID.
pub(crate) fn map_answer(raw: RawAnswer, maps: &QuestionMaps) -> MappingOutcome {
    let by_original = raw
        .original_question_id
        .as_deref()
        .and_then(|id| maps.index_of_id(id))
        .map(|index| (index, MappingStrategy::DirectQuestionId));
    let by_position = || {
        raw.position_in_quiz
            .and_then(|position| maps.index_of_position(position))
            .map(|index| (index, MappingStrategy::PositionBased))
    };
    let by_submission_question = || {
        raw.submission_question_id
            .as_deref()
            .and_then(|id| maps.index_of_id(id))
            .map(|index| (index, MappingStrategy::SubmissionQuestionId))
    };

    match by_original.or_else(by_position).or_else(by_submission_question) {
        Some((question_index, strategy)) => MappingOutcome::Mapped { question_index, strategy, raw },
        None => {
            tracing::debug!(
                original_question_id = ?raw.original_question_id,
                submission_question_id = ?raw.submission_question_id,
                position = ?raw.position_in_quiz,
                source = raw.source.as_str(),
                "Answer could not be mapped to a quiz question"
            );
            MappingOutcome::Unmapped(raw)
        }
    }
}

pub(crate) fn map_all(raws: Vec<RawAnswer>, maps: &QuestionMaps) -> Vec<MappingOutcome> {
    raws.into_iter().map(|raw| map_answer(raw, maps)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::quiz_answers::types::{AnswerSource, QuestionType};
    use serde_json::json;

    fn maps() -> QuestionMaps {
        QuestionMaps::from_values(&[
            json!({"id": 10, "position": 1, "question_type": "multiple_choice_question"}),
            json!({"id": 20, "position": 2, "question_type": "essay_question"}),
        ])
    }

    fn raw() -> RawAnswer {
        RawAnswer::new(AnswerSource::SubmissionData, QuestionType::Unknown)
    }

    #[test]
    fn original_id_wins_over_position() {
        let mut answer = raw();
        answer.original_question_id = Some("20".into());
        answer.position_in_quiz = Some(1);

        match map_answer(answer, &maps()) {
            MappingOutcome::Mapped { question_index, strategy, .. } => {
                assert_eq!(question_index, 1);
                assert_eq!(strategy, MappingStrategy::DirectQuestionId);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_id_falls_back_to_position() {
        let mut answer = raw();
        answer.original_question_id = Some("999".into());
        answer.position_in_quiz = Some(2);

        match map_answer(answer, &maps()) {
            MappingOutcome::Mapped { question_index, strategy, .. } => {
                assert_eq!(question_index, 1);
                assert_eq!(strategy, MappingStrategy::PositionBased);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn submission_question_id_is_last_resort() {
        let mut answer = raw();
        answer.submission_question_id = Some("10".into());
        answer.position_in_quiz = Some(7);

        match map_answer(answer, &maps()) {
            MappingOutcome::Mapped { question_index, strategy, .. } => {
                assert_eq!(question_index, 0);
                assert_eq!(strategy, MappingStrategy::SubmissionQuestionId);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unmatched_answers_are_kept() {
        let mut answer = raw();
        answer.original_question_id = Some("404".into());
        assert!(matches!(map_answer(answer.clone(), &maps()), MappingOutcome::Unmapped(kept) if kept == answer));
    }
}
