use std::collections::BTreeMap;

use super::content::is_effectively_empty;
use super::mapping::MappingOutcome;
use super::types::{ProcessedAnswer, QuestionMaps, QuestionType, UnmappedAnswer};

/// Reconciled state keyed by question index. Each [`absorb`](Self::absorb)
/// consumes the previous state and returns the next one; an entry is only
/// replaced while it is still effectively empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Reconciliation {
    answers: BTreeMap<usize, ProcessedAnswer>,
    unmapped: Vec<UnmappedAnswer>,
}

impl Reconciliation {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub(crate) fn absorb(self, outcomes: Vec<MappingOutcome>, maps: &QuestionMaps) -> Self {
        outcomes.into_iter().fold(self, |state, outcome| state.absorb_one(outcome, maps))
    }

    fn absorb_one(mut self, outcome: MappingOutcome, maps: &QuestionMaps) -> Self {
        match outcome {
            MappingOutcome::Mapped { question_index, strategy, raw } => {
                let Some(question) = maps.question(question_index) else {
                    self.unmapped.push(raw.into());
                    return self;
                };
                let candidate = ProcessedAnswer::bind(question, raw, strategy);
                let replace = self.answers.get(&question_index).map_or(true, |kept| {
                    is_effectively_empty(kept.answer.as_ref())
                        && !is_effectively_empty(candidate.answer.as_ref())
                });
                if replace {
                    self.answers.insert(question_index, candidate);
                }
            }
            MappingOutcome::Unmapped(raw) => {
                let candidate = UnmappedAnswer::from(raw);
                let existing = self.unmapped.iter_mut().find(|kept| {
                    kept.original_question_id == candidate.original_question_id
                        && kept.submission_question_id == candidate.submission_question_id
                        && kept.position_in_quiz == candidate.position_in_quiz
                });
                match existing {
                    Some(kept) => {
                        if is_effectively_empty(kept.answer.as_ref())
                            && !is_effectively_empty(candidate.answer.as_ref())
                        {
                            *kept = candidate;
                        }
                    }
                    None => self.unmapped.push(candidate),
                }
            }
        }
        self
    }

    /// Indices of answerable questions that still have no non-empty answer.
    pub(crate) fn gaps(&self, maps: &QuestionMaps) -> Vec<usize> {
        maps.questions()
            .iter()
            .enumerate()
            .filter(|(_, question)| question.question_type.expects_answer())
            .filter(|(index, _)| {
                self.answers
                    .get(index)
                    .map_or(true, |answer| is_effectively_empty(answer.answer.as_ref()))
            })
            .map(|(index, _)| index)
            .collect()
    }

    pub(crate) fn essay_gaps(&self, maps: &QuestionMaps) -> Vec<usize> {
        self.gaps(maps)
            .into_iter()
            .filter(|index| {
                maps.question(*index)
                    .is_some_and(|question| question.question_type == QuestionType::Essay)
            })
            .collect()
    }

    /// One answer per question in quiz order, with placeholders for questions nothing answered.
    pub(crate) fn complete(mut self, maps: &QuestionMaps) -> (Vec<ProcessedAnswer>, Vec<UnmappedAnswer>) {
        let answers = maps
            .questions()
            .iter()
            .enumerate()
            .map(|(index, question)| {
                self.answers.remove(&index).unwrap_or_else(|| ProcessedAnswer::placeholder(question))
            })
            .collect();
        (answers, self.unmapped)
    }
}
