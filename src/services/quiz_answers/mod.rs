//! Quiz submission answer reconciliation.
//!
//! Canvas exposes a student's quiz answers through several overlapping
//! endpoints, none of which is complete on its own. The loader detects the
//! quiz engine, then walks the sources in priority order. Each source only
//! fills questions that are still effectively empty, and the result always
//! holds exactly one answer per quiz question.

pub(crate) mod content;
pub(crate) mod detect;
pub(crate) mod mapping;
pub(crate) mod reconcile;
pub(crate) mod sources;
pub(crate) mod types;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::{metrics, time};
use crate::services::canvas::{CanvasApi, CanvasError};

use self::content::is_effectively_empty;
use self::detect::{detect_quiz_type, DetectionError, QuizKind, QuizTypeInfo};
use self::mapping::map_all;
use self::reconcile::Reconciliation;
use self::types::{AnswerSource, ProcessedAnswer, QuestionMaps, RawAnswer, UnmappedAnswer};

#[derive(Debug, Clone)]
pub(crate) struct AnswersRequest {
    pub(crate) course_id: String,
    pub(crate) quiz_id: String,
    pub(crate) submission_id: String,
    /// Student whose assignment submission backs a New Quizzes attempt.
    pub(crate) user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SubmissionAnswers {
    pub(crate) answers: Vec<ProcessedAnswer>,
    pub(crate) unmapped_answers: Vec<UnmappedAnswer>,
    pub(crate) debug_info: DebugInfo,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct DebugInfo {
    pub(crate) quiz_type: QuizKind,
    pub(crate) assignment_id: Option<String>,
    pub(crate) question_count: usize,
    pub(crate) raw_answer_count: usize,
    pub(crate) unmapped_count: usize,
    pub(crate) cached: bool,
    pub(crate) fetched_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) questions_error: Option<String>,
    pub(crate) strategies: Vec<StrategyReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum StrategyOutcome {
    Ok,
    Empty,
    Skipped,
    Failed,
}

impl StrategyOutcome {
    fn as_str(self) -> &'static str {
        match self {
            StrategyOutcome::Ok => "ok",
            StrategyOutcome::Empty => "empty",
            StrategyOutcome::Skipped => "skipped",
            StrategyOutcome::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct StrategyReport {
    pub(crate) source: AnswerSource,
    pub(crate) outcome: StrategyOutcome,
    pub(crate) answers_found: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

#[derive(Debug, Error)]
pub(crate) enum AnswersError {
    #[error(transparent)]
    Detection(#[from] DetectionError),
    #[error("user_id is required for New Quizzes submissions")]
    MissingUserId,
    #[error("submission {submission_id} could not be fetched: {source}")]
    Submission {
        submission_id: String,
        #[source]
        source: CanvasError,
    },
}

/// Load and reconcile every answer of one quiz submission.
pub(crate) async fn load_submission_answers(
    api: &dyn CanvasApi,
    request: &AnswersRequest,
) -> Result<SubmissionAnswers, AnswersError> {
    let quiz = detect_quiz_type(api, &request.course_id, &request.quiz_id).await?;
    let endpoints = quiz.endpoints();

    let mut questions_error = None;
    let question_values = match api.get_all(&endpoints.questions()).await {
        Ok(values) => values,
        Err(err) => {
            tracing::warn!(
                course_id = %request.course_id,
                quiz_id = %request.quiz_id,
                error = %err,
                "Quiz questions unavailable; answers will be reported unmapped"
            );
            questions_error = Some(err.to_string());
            Vec::new()
        }
    };
    let maps = QuestionMaps::from_values(&question_values);

    let mut pipeline = Pipeline::new(request, &maps);
    match quiz.assignment_id.as_deref() {
        Some(assignment_id) => pipeline.run_new_quizzes(api, &quiz, assignment_id).await?,
        None => pipeline.run_classic(api, &quiz).await?,
    }

    Ok(pipeline.finish(&quiz, questions_error))
}

struct Pipeline<'a> {
    request: &'a AnswersRequest,
    maps: &'a QuestionMaps,
    state: Reconciliation,
    reports: Vec<StrategyReport>,
    raw_count: usize,
}

impl<'a> Pipeline<'a> {
    fn new(request: &'a AnswersRequest, maps: &'a QuestionMaps) -> Self {
        Self { request, maps, state: Reconciliation::new(), reports: Vec::new(), raw_count: 0 }
    }

    async fn run_new_quizzes(
        &mut self,
        api: &dyn CanvasApi,
        quiz: &QuizTypeInfo,
        assignment_id: &str,
    ) -> Result<(), AnswersError> {
        let user_id = self.request.user_id.as_deref().ok_or(AnswersError::MissingUserId)?;

        let path = quiz.endpoints().assignment_submission_with_history(assignment_id, user_id);
        let submission = api.get_json(&path).await.map_err(|source| self.fatal(source))?;

        match submission.get("body").and_then(Value::as_str) {
            Some(body) => self.apply(
                AnswerSource::AssignmentBodyJson,
                sources::answers_from_body(
                    body,
                    self.maps,
                    AnswerSource::AssignmentBodyJson,
                    AnswerSource::AssignmentBodyText,
                ),
            ),
            None => self.skip(AnswerSource::AssignmentBodyJson),
        }

        self.apply_history(&submission);
        self.fill_from_submission_questions(api, quiz).await;
        self.fill_from_events(api, quiz).await;
        Ok(())
    }

    async fn run_classic(&mut self, api: &dyn CanvasApi, quiz: &QuizTypeInfo) -> Result<(), AnswersError> {
        let path = quiz.endpoints().quiz_submission_with_history(&self.request.submission_id);
        let payload = api.get_json(&path).await.map_err(|source| self.fatal(source))?;

        let assignment_submission = payload
            .get("submissions")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .cloned()
            .unwrap_or(Value::Null);
        let history = history_entries(&assignment_submission);

        let submission_data = payload
            .get("quiz_submissions")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .and_then(|quiz_submission| quiz_submission.get("submission_data"))
            .or_else(|| assignment_submission.get("submission_data"))
            .or_else(|| {
                sources::latest_history_entry(history)
                    .and_then(|entry| entry.get("submission_data"))
            })
            .and_then(Value::as_array);

        match submission_data {
            Some(data) => self.apply(
                AnswerSource::SubmissionData,
                sources::answers_from_submission_data(data, self.maps, AnswerSource::SubmissionData),
            ),
            None => self.skip(AnswerSource::SubmissionData),
        }

        self.apply_history(&assignment_submission);
        self.fill_from_submission_questions(api, quiz).await;
        self.fill_from_events(api, quiz).await;
        Ok(())
    }

    fn apply_history(&mut self, submission: &Value) {
        let history = history_entries(submission);
        if history.is_empty() {
            self.skip(AnswerSource::SubmissionHistory);
        } else {
            self.apply(
                AnswerSource::SubmissionHistory,
                sources::answers_from_history(history, self.maps),
            );
        }
    }

    async fn fill_from_submission_questions(&mut self, api: &dyn CanvasApi, quiz: &QuizTypeInfo) {
        if self.state.gaps(self.maps).is_empty() && !self.maps.questions().is_empty() {
            self.skip(AnswerSource::SubmissionQuestions);
            return;
        }

        let path = quiz.endpoints().submission_questions(&self.request.submission_id);
        match api.get_all(&path).await {
            Ok(pages) => self.apply(
                AnswerSource::SubmissionQuestions,
                sources::answers_from_submission_questions(&pages, self.maps),
            ),
            Err(err) => self.fail(AnswerSource::SubmissionQuestions, &err),
        }
    }

    async fn fill_from_events(&mut self, api: &dyn CanvasApi, quiz: &QuizTypeInfo) {
        if self.state.essay_gaps(self.maps).is_empty() {
            self.skip(AnswerSource::SubmissionEvents);
            return;
        }

        let path = quiz.endpoints().submission_events(&self.request.submission_id);
        match api.get_all(&path).await {
            Ok(pages) => self.apply(
                AnswerSource::SubmissionEvents,
                sources::answers_from_events(&pages, self.maps),
            ),
            Err(err) => self.fail(AnswerSource::SubmissionEvents, &err),
        }
    }

    fn apply(&mut self, source: AnswerSource, answers: Vec<RawAnswer>) {
        let answers_found =
            answers.iter().filter(|raw| !is_effectively_empty(raw.answer.as_ref())).count();
        let outcome = if answers_found > 0 { StrategyOutcome::Ok } else { StrategyOutcome::Empty };

        self.raw_count += answers.len();
        let outcomes = map_all(answers, self.maps);
        self.state = std::mem::take(&mut self.state).absorb(outcomes, self.maps);
        self.report(source, outcome, answers_found, None);
    }

    fn skip(&mut self, source: AnswerSource) {
        self.report(source, StrategyOutcome::Skipped, 0, None);
    }

    fn fail(&mut self, source: AnswerSource, err: &CanvasError) {
        tracing::warn!(
            course_id = %self.request.course_id,
            quiz_id = %self.request.quiz_id,
            submission_id = %self.request.submission_id,
            source = source.as_str(),
            error = %err,
            "Answer source failed; continuing with the next one"
        );
        self.report(source, StrategyOutcome::Failed, 0, Some(err.to_string()));
    }

    fn fatal(&self, source: CanvasError) -> AnswersError {
        tracing::error!(
            course_id = %self.request.course_id,
            quiz_id = %self.request.quiz_id,
            submission_id = %self.request.submission_id,
            error = %source,
            "Primary submission fetch failed"
        );
        AnswersError::Submission { submission_id: self.request.submission_id.clone(), source }
    }

    fn report(
        &mut self,
        source: AnswerSource,
        outcome: StrategyOutcome,
        answers_found: usize,
        error: Option<String>,
    ) {
        metrics::record_strategy_outcome(source.as_str(), outcome.as_str());
        self.reports.push(StrategyReport { source, outcome, answers_found, error });
    }

    fn finish(self, quiz: &QuizTypeInfo, questions_error: Option<String>) -> SubmissionAnswers {
        let (answers, unmapped_answers) = self.state.complete(self.maps);
        let debug_info = DebugInfo {
            quiz_type: quiz.kind,
            assignment_id: quiz.assignment_id.clone(),
            question_count: self.maps.len(),
            raw_answer_count: self.raw_count,
            unmapped_count: unmapped_answers.len(),
            cached: false,
            fetched_at: time::format_offset(time::now_utc()),
            questions_error,
            strategies: self.reports,
        };

        tracing::info!(
            course_id = %self.request.course_id,
            quiz_id = %self.request.quiz_id,
            submission_id = %self.request.submission_id,
            quiz_type = quiz.kind.as_str(),
            questions = debug_info.question_count,
            raw_answers = debug_info.raw_answer_count,
            unmapped = debug_info.unmapped_count,
            "Quiz submission answers reconciled"
        );

        SubmissionAnswers { answers, unmapped_answers, debug_info }
    }
}

fn history_entries(submission: &Value) -> &[Value] {
    submission
        .get("submission_history")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
