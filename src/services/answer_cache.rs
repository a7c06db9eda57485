use crate::core::redis::RedisHandle;
use crate::services::quiz_answers::SubmissionAnswers;

/// Cache key for one instructor's view of one quiz submission.
///
/// New Quizzes answers are fetched by student, so the student id is part of the key (`-` when absent).
pub(crate) fn cache_key(
    instructor_id: &str,
    course_id: &str,
    quiz_id: &str,
    submission_id: &str,
    student_id: Option<&str>,
) -> String {
    let student_id = student_id.map(str::trim).filter(|id| !id.is_empty()).unwrap_or("-");
    format!("quiz-answers:{instructor_id}:{course_id}:{quiz_id}:{submission_id}:{student_id}")
}

/// Cached responses are stored as the serialized JSON body. Read and decode failures count as misses.
pub(crate) async fn load(redis: &RedisHandle, key: &str) -> Option<serde_json::Value> {
    let raw = match redis.get_string(key).await {
        Ok(raw) => raw?,
        Err(err) => {
            tracing::warn!(key = %key, error = %err, "Answer cache read failed");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(key = %key, error = %err, "Discarding unreadable cached answers");
            None
        }
    }
}

pub(crate) async fn store(redis: &RedisHandle, key: &str, answers: &SubmissionAnswers) {
    let encoded = match serde_json::to_string(answers) {
        Ok(encoded) => encoded,
        Err(err) => {
            tracing::warn!(key = %key, error = %err, "Failed to encode answers for cache");
            return;
        }
    };

    if let Err(err) = redis.set_string(key, &encoded).await {
        tracing::warn!(key = %key, error = %err, "Answer cache write failed");
    }
}

pub(crate) async fn invalidate(redis: &RedisHandle, key: &str) -> bool {
    match redis.delete(key).await {
        Ok(removed) => removed,
        Err(err) => {
            tracing::warn!(key = %key, error = %err, "Answer cache invalidation failed");
            false
        }
    }
}

/// Marks a cached body as served from cache.
pub(crate) fn mark_cached(mut body: serde_json::Value) -> serde_json::Value {
    if let Some(debug_info) = body.get_mut("debug_info").and_then(serde_json::Value::as_object_mut) {
        debug_info.insert("cached".to_string(), serde_json::Value::Bool(true));
    }
    body
}
