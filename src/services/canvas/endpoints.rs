use serde::Serialize;

/// Path builders for one quiz. Paths are relative to the instructor's Canvas host.
#[derive(Debug, Clone)]
pub(crate) struct QuizEndpoints {
    course_id: String,
    quiz_id: String,
}

/// Endpoint templates handed to the UI, with `{submission_id}` / `{user_id}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct EndpointTemplates {
    pub(crate) quiz: String,
    pub(crate) questions: String,
    pub(crate) submission: String,
    pub(crate) submission_questions: String,
    pub(crate) submission_events: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) assignment_submission: Option<String>,
    pub(crate) grade: String,
}

impl QuizEndpoints {
    pub(crate) fn new(course_id: &str, quiz_id: &str) -> Self {
        Self { course_id: course_id.to_string(), quiz_id: quiz_id.to_string() }
    }

    fn quiz_base(&self) -> String {
        format!("/api/v1/courses/{}/quizzes/{}", self.course_id, self.quiz_id)
    }

    pub(crate) fn quiz(&self) -> String {
        self.quiz_base()
    }

    pub(crate) fn questions(&self) -> String {
        format!("{}/questions", self.quiz_base())
    }

    pub(crate) fn quiz_submission(&self, submission_id: &str) -> String {
        format!("{}/submissions/{}", self.quiz_base(), submission_id)
    }

    /// Quiz submission with the backing assignment submission (and its history) side-loaded.
    pub(crate) fn quiz_submission_with_history(&self, submission_id: &str) -> String {
        format!("{}?include[]=submission", self.quiz_submission(submission_id))
    }

    pub(crate) fn submission_questions(&self, submission_id: &str) -> String {
        format!("/api/v1/quiz_submissions/{submission_id}/questions")
    }

    pub(crate) fn submission_events(&self, submission_id: &str) -> String {
        format!("{}/events", self.quiz_submission(submission_id))
    }

    pub(crate) fn assignment_submission(&self, assignment_id: &str, user_id: &str) -> String {
        format!(
            "/api/v1/courses/{}/assignments/{}/submissions/{}",
            self.course_id, assignment_id, user_id
        )
    }

    pub(crate) fn assignment_submission_with_history(
        &self,
        assignment_id: &str,
        user_id: &str,
    ) -> String {
        format!(
            "{}?include[]=submission_history",
            self.assignment_submission(assignment_id, user_id)
        )
    }

    pub(crate) fn templates(&self, assignment_id: Option<&str>) -> EndpointTemplates {
        let submission = "{submission_id}";
        let user = "{user_id}";
        let assignment_submission =
            assignment_id.map(|assignment| self.assignment_submission(assignment, user));
        let grade = assignment_submission
            .clone()
            .unwrap_or_else(|| self.quiz_submission(submission));

        EndpointTemplates {
            quiz: self.quiz(),
            questions: self.questions(),
            submission: self.quiz_submission(submission),
            submission_questions: self.submission_questions(submission),
            submission_events: self.submission_events(submission),
            assignment_submission,
            grade,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::QuizEndpoints;

    #[test]
    fn classic_templates_grade_through_quiz_submission() {
        let endpoints = QuizEndpoints::new("12", "34");
        let templates = endpoints.templates(None);

        assert_eq!(templates.quiz, "/api/v1/courses/12/quizzes/34");
        assert_eq!(templates.grade, "/api/v1/courses/12/quizzes/34/submissions/{submission_id}");
        assert_eq!(templates.submission_questions, "/api/v1/quiz_submissions/{submission_id}/questions");
        assert!(templates.assignment_submission.is_none());
    }

    #[test]
    fn assignment_backed_templates_grade_through_assignment() {
        let endpoints = QuizEndpoints::new("12", "34");
        let templates = endpoints.templates(Some("56"));

        assert_eq!(
            templates.assignment_submission.as_deref(),
            Some("/api/v1/courses/12/assignments/56/submissions/{user_id}")
        );
        assert_eq!(templates.grade, "/api/v1/courses/12/assignments/56/submissions/{user_id}");
    }
}
