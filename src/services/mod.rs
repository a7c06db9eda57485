pub(crate) mod answer_cache;
pub(crate) mod canvas;
pub(crate) mod canvas_proxy;
pub(crate) mod quiz_answers;
pub(crate) mod quiz_grading;
