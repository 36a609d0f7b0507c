//! Central grading orchestrator.
//!
//! Scores a submission question by question (free-text answers concurrently,
//! bounded by `parallelism`), aggregates, and commits the result together
//! with its progress and rank updates.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::error::{ProviderError, StoreError, SubmitError};
use crate::model::{CodeLanguage, GeneratedQuestion, Question, QuestionKind, Quiz, Submission};
use crate::progress::Rank;
use crate::results::{GradingMethod, QuestionOutcome, ScoreSheet, TestResult};
use crate::scoring::{
    aggregate, fraction_of, is_blank, score_generated, score_local, SYNTAX_PARTIAL_CREDIT_PERCENT,
};
use crate::session::{placeholder_questions, IssuedQuiz, SessionCache};
use crate::store::{CommitOutcome, GradebookStore};
use crate::traits::{
    GenerationRequest, GradeRequest, GradeResponse, Grader, QuestionGenerator,
    SyntaxCheckRequest, SyntaxChecker,
};

/// Configuration for the grading engine.
#[derive(Debug, Clone)]
pub struct GradingEngineConfig {
    /// Maximum concurrent grader calls per submission.
    pub parallelism: usize,
    /// Upper bound on a single grader call.
    pub grader_timeout: Duration,
    /// Retries on transient grader errors.
    pub max_grader_retries: u32,
    /// Delay before the first retry; doubles after each.
    pub retry_delay: Duration,
    /// Language assumed for code questions that do not name one.
    pub default_code_language: CodeLanguage,
}

impl Default for GradingEngineConfig {
    fn default() -> Self {
        Self {
            parallelism: 4,
            grader_timeout: Duration::from_secs(20),
            max_grader_retries: 1,
            retry_delay: Duration::from_millis(500),
            default_code_language: CodeLanguage::Python,
        }
    }
}

/// A committed submission with its per-question breakdown.
#[derive(Debug, Clone)]
pub struct Submitted {
    pub sheet: ScoreSheet,
    pub outcome: CommitOutcome,
}

impl Submitted {
    pub fn result(&self) -> &TestResult {
        &self.outcome.result
    }
}

/// The grading engine.
pub struct GradingEngine {
    grader: Arc<dyn Grader>,
    checker: Arc<dyn SyntaxChecker>,
    generator: Option<Arc<dyn QuestionGenerator>>,
    store: Arc<dyn GradebookStore>,
    sessions: SessionCache,
    config: GradingEngineConfig,
}

impl GradingEngine {
    pub fn new(
        grader: Arc<dyn Grader>,
        checker: Arc<dyn SyntaxChecker>,
        store: Arc<dyn GradebookStore>,
        config: GradingEngineConfig,
    ) -> Self {
        Self {
            grader,
            checker,
            generator: None,
            store,
            sessions: SessionCache::new(),
            config,
        }
    }

    /// Attach the generator used to issue dynamic quizzes.
    pub fn with_generator(mut self, generator: Arc<dyn QuestionGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn store(&self) -> &Arc<dyn GradebookStore> {
        &self.store
    }

    /// Score a static quiz without recording anything.
    pub async fn score(&self, quiz: &Quiz, submission: &Submission) -> ScoreSheet {
        let semaphore = Semaphore::new(self.config.parallelism.max(1));

        let mut pending: FuturesUnordered<_> = quiz
            .questions
            .iter()
            .enumerate()
            .map(|(index, question)| {
                let semaphore = &semaphore;
                async move {
                    let _permit = semaphore.acquire().await.ok();
                    (index, self.grade_question(question, submission).await)
                }
            })
            .collect();

        let mut slots: Vec<Option<QuestionOutcome>> = vec![None; quiz.questions.len()];
        while let Some((index, outcome)) = pending.next().await {
            slots[index] = Some(outcome);
        }

        aggregate(slots.into_iter().flatten().collect(), quiz.total_possible())
    }

    /// Grade, record and return the stored result.
    pub async fn submit(
        &self,
        quiz: &Quiz,
        submission: &Submission,
        learner_id: &str,
    ) -> Result<TestResult, SubmitError> {
        Ok(self
            .submit_detailed(quiz, submission, learner_id)
            .await?
            .outcome
            .result)
    }

    /// Grade and record a submission, returning the breakdown as well.
    ///
    /// For a dynamic quiz the learner's issued question set is scored; it
    /// is dropped only once the result is committed.
    #[tracing::instrument(skip(self, quiz, submission), fields(quiz = %quiz.id))]
    pub async fn submit_detailed(
        &self,
        quiz: &Quiz,
        submission: &Submission,
        learner_id: &str,
    ) -> Result<Submitted, SubmitError> {
        let (sheet, total_questions) = if quiz.is_dynamic() {
            let issued = self.sessions.peek(learner_id, &quiz.id)?;
            (
                score_generated(&issued.questions, submission),
                issued.questions.len(),
            )
        } else {
            (self.score(quiz, submission).await, quiz.questions.len())
        };

        let result = TestResult {
            id: Uuid::new_v4(),
            learner_id: learner_id.to_string(),
            subject_id: quiz.subject_id.clone(),
            quiz_id: Some(quiz.id.clone()),
            score: sheet.final_score,
            total_questions: total_questions as u32,
            earned_points: sheet.total_earned,
            correct_count: sheet.correct_count,
            snapshot: sheet.snapshot.clone(),
            completed_at: Utc::now(),
        };

        let outcome = self.store.commit(result).await.map_err(|e| {
            tracing::error!("could not record result for {learner_id}: {e}");
            e
        })?;

        if quiz.is_dynamic() {
            self.sessions.clear(learner_id, &quiz.id);
        }

        tracing::info!(
            "recorded {}% for {learner_id} ({} of {} correct), rank {}",
            outcome.result.score,
            outcome.result.correct_count,
            outcome.result.total_questions,
            outcome.rank
        );

        Ok(Submitted { sheet, outcome })
    }

    /// Generate and issue a fresh question set of a dynamic quiz.
    ///
    /// Generated questions whose answer is not one of their options are
    /// dropped. Falls back to placeholder questions when generation fails or
    /// nothing usable comes back.
    pub async fn start(&self, quiz: &Quiz, learner_id: &str) -> Result<IssuedQuiz, SubmitError> {
        let params = quiz
            .generation
            .as_ref()
            .ok_or_else(|| SubmitError::NotDynamic(quiz.id.clone()))?;

        let generated = match &self.generator {
            Some(generator) => {
                let request = GenerationRequest::Topic {
                    topic: params.topic.clone(),
                    grade_level: params.grade_level.clone(),
                    count: params.count,
                };
                match generator.generate(&request).await {
                    Ok(questions) if !questions.is_empty() => questions,
                    Ok(_) => {
                        tracing::warn!("generator '{}' returned no questions", generator.name());
                        Vec::new()
                    }
                    Err(e) => {
                        tracing::warn!("question generation failed: {e:#}");
                        Vec::new()
                    }
                }
            }
            None => {
                tracing::warn!("no question generator configured");
                Vec::new()
            }
        };

        let usable: Vec<GeneratedQuestion> = generated
            .into_iter()
            .filter(|q| {
                let ok = q.has_valid_answer();
                if !ok {
                    tracing::warn!(
                        "dropping generated question '{}': answer '{}' is not an option",
                        q.question,
                        q.correct_answer
                    );
                }
                ok
            })
            .take(params.count)
            .collect();

        let questions = if usable.is_empty() {
            placeholder_questions(&params.topic, &params.grade_level, params.count)
        } else {
            usable
        };

        let issued = IssuedQuiz::new(&quiz.id, learner_id, questions);
        self.sessions.issue(issued.clone());
        Ok(issued)
    }

    /// Reinstate a previously issued question set (e.g. loaded from disk).
    pub fn resume(&self, issued: IssuedQuiz) {
        self.sessions.issue(issued);
    }

    pub async fn recompute_rank(&self, learner_id: &str) -> Result<Rank, StoreError> {
        self.store.recompute_rank(learner_id).await
    }

    /// Administrative purge of everything recorded for a learner.
    pub async fn remove_learner(&self, learner_id: &str) -> Result<usize, StoreError> {
        let removed = self.store.remove_learner(learner_id).await?;
        tracing::info!("removed {removed} results for {learner_id}");
        Ok(removed)
    }

    async fn grade_question(
        &self,
        question: &Question,
        submission: &Submission,
    ) -> QuestionOutcome {
        if let Some(outcome) = score_local(question, submission) {
            return outcome;
        }

        let outcome = |earned, method, feedback| QuestionOutcome {
            question_id: question.id.clone(),
            earned,
            possible: question.points,
            method,
            feedback,
        };

        let answer = match submission.text(&question.id) {
            Some(a) if !is_blank(Some(a)) => a,
            _ => return outcome(0, GradingMethod::Unanswered, None),
        };

        if let QuestionKind::Code { language, .. } = &question.kind {
            let language = language.unwrap_or(self.config.default_code_language);
            if self.checker.supports(language) {
                let request = SyntaxCheckRequest {
                    code: answer.to_string(),
                    language,
                };
                match self.checker.check(&request).await {
                    Ok(verdict) if !verdict.valid => {
                        return outcome(
                            fraction_of(question.points, SYNTAX_PARTIAL_CREDIT_PERCENT),
                            GradingMethod::SyntaxRejected {
                                message: verdict.message,
                            },
                            None,
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("syntax check for '{}' failed: {e:#}", question.id);
                    }
                }
            }
        }

        let request = GradeRequest {
            question: question.text.clone(),
            answer: answer.to_string(),
            reference_answer: question.kind.reference_answer().map(String::from),
        };

        match grade_with_retry(self.grader.as_ref(), &request, &self.config).await {
            Ok(response) => outcome(
                fraction_of(question.points, response.score),
                GradingMethod::External {
                    percentage: response.score.min(100),
                },
                Some(response.feedback),
            ),
            Err(e) => {
                tracing::warn!("grading '{}' degraded to zero: {e:#}", question.id);
                outcome(
                    0,
                    GradingMethod::Degraded {
                        reason: e.to_string(),
                    },
                    None,
                )
            }
        }
    }
}

/// Call the grader under a timeout, retrying transient failures with
/// exponential backoff.
async fn grade_with_retry(
    grader: &dyn Grader,
    request: &GradeRequest,
    config: &GradingEngineConfig,
) -> anyhow::Result<GradeResponse> {
    let mut last_error = None;
    let mut retry_delay = config.retry_delay;

    for retry in 0..=config.max_grader_retries {
        if retry > 0 {
            tokio::time::sleep(retry_delay).await;
            retry_delay = (retry_delay * 2).min(Duration::from_secs(60));
        }

        match tokio::time::timeout(config.grader_timeout, grader.grade(request)).await {
            Ok(Ok(response)) => return Ok(response),
            Ok(Err(e)) => {
                if let Some(provider_error) = e.downcast_ref::<ProviderError>() {
                    if provider_error.is_permanent() {
                        return Err(e);
                    }
                    if let Some(ms) = provider_error.retry_after_ms() {
                        retry_delay = Duration::from_millis(ms);
                    }
                }
                last_error = Some(e);
            }
            Err(_) => {
                last_error = Some(ProviderError::Timeout(config.grader_timeout.as_secs()).into());
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("grader '{}' gave no answer", grader.name())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChoiceOption, GenerationParams, MatchPair};
    use crate::store::MemoryStore;
    use crate::traits::{NoSyntaxChecker, SyntaxVerdict};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    // -- fakes ---------------------------------------------------------------

    struct FixedGrader {
        score: u32,
        calls: AtomicU32,
    }

    impl FixedGrader {
        fn new(score: u32) -> Arc<Self> {
            Arc::new(Self {
                score,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Grader for FixedGrader {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn grade(&self, _: &GradeRequest) -> anyhow::Result<GradeResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(GradeResponse {
                score: self.score,
                feedback: "ok".into(),
            })
        }
    }

    struct FailingGrader {
        error: fn() -> ProviderError,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Grader for FailingGrader {
        fn name(&self) -> &str {
            "failing"
        }

        async fn grade(&self, _: &GradeRequest) -> anyhow::Result<GradeResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err((self.error)().into())
        }
    }

    struct HangingGrader;

    #[async_trait]
    impl Grader for HangingGrader {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn grade(&self, _: &GradeRequest) -> anyhow::Result<GradeResponse> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(GradeResponse::clamped(100, ""))
        }
    }

    struct RejectingChecker;

    #[async_trait]
    impl SyntaxChecker for RejectingChecker {
        fn supports(&self, language: CodeLanguage) -> bool {
            language == CodeLanguage::Python
        }

        async fn check(&self, _: &SyntaxCheckRequest) -> anyhow::Result<SyntaxVerdict> {
            Ok(SyntaxVerdict::invalid("SyntaxError: invalid syntax"))
        }
    }

    struct BrokenChecker;

    #[async_trait]
    impl SyntaxChecker for BrokenChecker {
        fn supports(&self, _: CodeLanguage) -> bool {
            true
        }

        async fn check(&self, _: &SyntaxCheckRequest) -> anyhow::Result<SyntaxVerdict> {
            anyhow::bail!("python3 not found")
        }
    }

    struct FailingStore;

    #[async_trait]
    impl GradebookStore for FailingStore {
        async fn commit(&self, _: TestResult) -> Result<CommitOutcome, StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }
        async fn recompute_rank(&self, _: &str) -> Result<Rank, StoreError> {
            Ok(Rank::NewMember)
        }
        async fn results_for(&self, _: &str) -> Result<Vec<TestResult>, StoreError> {
            Ok(vec![])
        }
        async fn progress_for(
            &self,
            _: &str,
        ) -> Result<Vec<crate::progress::Progress>, StoreError> {
            Ok(vec![])
        }
        async fn rank_of(&self, _: &str) -> Result<Option<Rank>, StoreError> {
            Ok(None)
        }
        async fn all_results(&self) -> Result<Vec<TestResult>, StoreError> {
            Ok(vec![])
        }
        async fn remove_learner(&self, _: &str) -> Result<usize, StoreError> {
            Ok(0)
        }
    }

    struct FixedGenerator(Vec<GeneratedQuestion>);

    #[async_trait]
    impl QuestionGenerator for FixedGenerator {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, _: &GenerationRequest) -> anyhow::Result<Vec<GeneratedQuestion>> {
            Ok(self.0.clone())
        }
    }

    // -- builders ------------------------------------------------------------

    fn fast_config() -> GradingEngineConfig {
        GradingEngineConfig {
            retry_delay: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn engine(grader: Arc<dyn Grader>, checker: Arc<dyn SyntaxChecker>) -> GradingEngine {
        GradingEngine::new(grader, checker, Arc::new(MemoryStore::new()), fast_config())
    }

    fn question(id: &str, points: u32, kind: QuestionKind) -> Question {
        Question {
            id: id.into(),
            text: format!("question {id}"),
            points,
            kind,
        }
    }

    fn mc(id: &str, correct: &str) -> Question {
        question(
            id,
            10,
            QuestionKind::MultipleChoice {
                options: ["A", "B", "C", "D"]
                    .iter()
                    .map(|l| ChoiceOption {
                        label: (*l).into(),
                        text: (*l).into(),
                    })
                    .collect(),
                correct: correct.into(),
            },
        )
    }

    fn text(id: &str) -> Question {
        question(
            id,
            10,
            QuestionKind::Text {
                reference_answer: Some("photosynthesis".into()),
            },
        )
    }

    fn code(id: &str) -> Question {
        question(
            id,
            10,
            QuestionKind::Code {
                language: None,
                reference_answer: None,
            },
        )
    }

    fn quiz(questions: Vec<Question>) -> Quiz {
        Quiz {
            id: "quiz-1".into(),
            title: "Quiz".into(),
            subject_id: Some("science".into()),
            questions,
            generation: None,
        }
    }

    fn dynamic_quiz() -> Quiz {
        Quiz {
            id: "dyn-1".into(),
            title: "Generated".into(),
            subject_id: Some("math".into()),
            questions: vec![],
            generation: Some(GenerationParams {
                topic: "Fractions".into(),
                grade_level: "5".into(),
                count: 3,
            }),
        }
    }

    // -- scenarios -----------------------------------------------------------

    #[tokio::test]
    async fn all_multiple_choice_correct() {
        let engine = engine(FixedGrader::new(0), Arc::new(NoSyntaxChecker));
        let quiz = quiz(vec![mc("q1", "A"), mc("q2", "C")]);
        let submission = Submission::new().with_text("q1", "A").with_text("q2", "C");

        let result = engine.submit(&quiz, &submission, "ann").await.unwrap();
        assert_eq!(result.score, 100);
        assert_eq!(result.earned_points, 20);
        assert_eq!(result.correct_count, 2);
        assert_eq!(result.total_questions, 2);
    }

    #[tokio::test]
    async fn matching_half_right() {
        let engine = engine(FixedGrader::new(0), Arc::new(NoSyntaxChecker));
        let pairs = (1..=4)
            .map(|i| MatchPair {
                left: format!("l{i}"),
                right: format!("r{i}"),
            })
            .collect();
        let quiz = quiz(vec![question("m", 10, QuestionKind::Matching { pairs })]);
        let submission = Submission::new().with_positions("m", ["r1", "r3", "r2", "r4"]);

        let sheet = engine.score(&quiz, &submission).await;
        assert_eq!(sheet.outcomes[0].earned, 5);
        assert_eq!(sheet.final_score, 50);
    }

    #[tokio::test]
    async fn free_text_uses_grader_percentage() {
        let grader = FixedGrader::new(73);
        let engine = engine(grader.clone(), Arc::new(NoSyntaxChecker));
        let quiz = quiz(vec![text("t")]);
        let submission = Submission::new().with_text("t", "plants make food");

        let sheet = engine.score(&quiz, &submission).await;
        assert_eq!(sheet.outcomes[0].earned, 7);
        assert_eq!(
            sheet.outcomes[0].method,
            GradingMethod::External { percentage: 73 }
        );
        assert_eq!(grader.calls(), 1);
    }

    #[tokio::test]
    async fn syntax_error_gets_partial_credit_without_grader() {
        let grader = FixedGrader::new(100);
        let engine = engine(grader.clone(), Arc::new(RejectingChecker));
        let quiz = quiz(vec![code("c")]);
        let submission = Submission::new().with_text("c", "def f(:\n  pass");

        let sheet = engine.score(&quiz, &submission).await;
        assert_eq!(sheet.outcomes[0].earned, 2);
        assert!(matches!(
            sheet.outcomes[0].method,
            GradingMethod::SyntaxRejected { .. }
        ));
        assert_eq!(grader.calls(), 0);
    }

    #[tokio::test]
    async fn empty_free_text_never_calls_grader() {
        let grader = FixedGrader::new(100);
        let engine = engine(grader.clone(), Arc::new(RejectingChecker));
        let quiz = quiz(vec![text("t"), code("c")]);
        let submission = Submission::new().with_text("t", "   ");

        let sheet = engine.score(&quiz, &submission).await;
        assert!(sheet.outcomes.iter().all(|o| o.earned == 0));
        assert!(sheet
            .outcomes
            .iter()
            .all(|o| o.method == GradingMethod::Unanswered));
        assert_eq!(grader.calls(), 0);
    }

    #[tokio::test]
    async fn rank_crosses_threshold_on_commit() {
        let engine = engine(FixedGrader::new(0), Arc::new(NoSyntaxChecker));
        let quiz = quiz(vec![mc("q1", "A")]);
        let right = Submission::new().with_text("q1", "A");

        for _ in 0..4 {
            engine.submit(&quiz, &right, "ann").await.unwrap();
        }
        let submitted = engine.submit_detailed(&quiz, &right, "ann").await.unwrap();
        assert_eq!(submitted.outcome.rank, Rank::Knowledgeable);
        assert_eq!(engine.recompute_rank("ann").await.unwrap(), Rank::Knowledgeable);
        assert_eq!(submitted.outcome.progress.unwrap().percentage, 100);
    }

    // -- degradation ---------------------------------------------------------

    #[tokio::test]
    async fn broken_checker_falls_through_to_grader() {
        let grader = FixedGrader::new(90);
        let engine = engine(grader.clone(), Arc::new(BrokenChecker));
        let quiz = quiz(vec![code("c")]);
        let submission = Submission::new().with_text("c", "print(1)");

        let sheet = engine.score(&quiz, &submission).await;
        assert_eq!(sheet.outcomes[0].earned, 9);
        assert_eq!(grader.calls(), 1);
    }

    #[tokio::test]
    async fn transient_errors_are_retried_then_degraded() {
        let grader = Arc::new(FailingGrader {
            error: || ProviderError::NetworkError("reset".into()),
            calls: AtomicU32::new(0),
        });
        let engine = engine(grader.clone(), Arc::new(NoSyntaxChecker));
        let quiz = quiz(vec![text("t"), mc("q", "B")]);
        let submission = Submission::new().with_text("t", "answer").with_text("q", "B");

        let result = engine.submit(&quiz, &submission, "ann").await.unwrap();
        assert_eq!(grader.calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.earned_points, 10);
        assert_eq!(result.score, 50);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let grader = Arc::new(FailingGrader {
            error: || ProviderError::AuthenticationFailed("bad key".into()),
            calls: AtomicU32::new(0),
        });
        let engine = engine(grader.clone(), Arc::new(NoSyntaxChecker));
        let quiz = quiz(vec![text("t")]);
        let submission = Submission::new().with_text("t", "answer");

        let sheet = engine.score(&quiz, &submission).await;
        assert_eq!(grader.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            sheet.outcomes[0].method,
            GradingMethod::Degraded { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn grader_timeout_degrades_and_still_commits() {
        let engine = GradingEngine::new(
            Arc::new(HangingGrader),
            Arc::new(NoSyntaxChecker),
            Arc::new(MemoryStore::new()),
            GradingEngineConfig {
                max_grader_retries: 0,
                ..Default::default()
            },
        );
        let quiz = quiz(vec![text("t"), mc("q", "A")]);
        let submission = Submission::new().with_text("t", "answer").with_text("q", "A");

        let submitted = engine.submit_detailed(&quiz, &submission, "ann").await.unwrap();
        assert_eq!(submitted.sheet.outcomes[0].earned, 0);
        assert_eq!(submitted.result().score, 50);
        assert_eq!(engine.store().results_for("ann").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn outcomes_keep_quiz_order() {
        let engine = GradingEngine::new(
            FixedGrader::new(50),
            Arc::new(NoSyntaxChecker),
            Arc::new(MemoryStore::new()),
            GradingEngineConfig {
                parallelism: 2,
                ..fast_config()
            },
        );
        let questions: Vec<_> = (0..6)
            .map(|i| {
                if i % 2 == 0 {
                    text(&format!("q{i}"))
                } else {
                    mc(&format!("q{i}"), "A")
                }
            })
            .collect();
        let mut submission = Submission::new();
        for i in 0..6 {
            submission = submission.with_text(format!("q{i}"), "A");
        }

        let sheet = engine.score(&quiz(questions), &submission).await;
        let ids: Vec<_> = sheet.outcomes.iter().map(|o| o.question_id.as_str()).collect();
        assert_eq!(ids, ["q0", "q1", "q2", "q3", "q4", "q5"]);
        assert_eq!(sheet.total_earned, 15 + 30);
    }

    #[tokio::test]
    async fn persistence_failure_surfaces_as_store_error() {
        let engine = GradingEngine::new(
            FixedGrader::new(0),
            Arc::new(NoSyntaxChecker),
            Arc::new(FailingStore),
            fast_config(),
        );
        let quiz = quiz(vec![mc("q1", "A")]);
        let err = engine
            .submit(&quiz, &Submission::new().with_text("q1", "A"), "ann")
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Store(_)));
    }

    // -- dynamic quizzes -----------------------------------------------------

    #[tokio::test]
    async fn dynamic_quiz_round_trip() {
        let generated = placeholder_questions("Fractions", "5", 3)
            .into_iter()
            .zip(["A", "B", "C"])
            .map(|(mut q, correct)| {
                q.correct_answer = correct.into();
                q
            })
            .collect();
        let engine = engine(FixedGrader::new(0), Arc::new(NoSyntaxChecker))
            .with_generator(Arc::new(FixedGenerator(generated)));
        let quiz = dynamic_quiz();

        let issued = engine.start(&quiz, "ann").await.unwrap();
        assert_eq!(issued.questions.len(), 3);

        let submission = Submission::new()
            .with_text("0", "A")
            .with_text("1", "B")
            .with_text("2", "A");
        let result = engine.submit(&quiz, &submission, "ann").await.unwrap();
        assert_eq!(result.correct_count, 2);
        assert_eq!(result.score, 66);
        let snapshot = result.snapshot.unwrap();
        assert_eq!(snapshot.replay(), (2, 66));

        // The session is consumed
        let err = engine.submit(&quiz, &submission, "ann").await.unwrap_err();
        assert!(matches!(err, SubmitError::SessionExpired { .. }));
    }

    #[tokio::test]
    async fn expired_session_writes_nothing() {
        let engine = engine(FixedGrader::new(0), Arc::new(NoSyntaxChecker));
        let err = engine
            .submit(&dynamic_quiz(), &Submission::new().with_text("0", "A"), "ann")
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::SessionExpired { .. }));
        assert!(engine.store().all_results().await.unwrap().is_empty());
        assert!(engine.store().rank_of("ann").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn start_without_generator_uses_placeholders() {
        let engine = engine(FixedGrader::new(0), Arc::new(NoSyntaxChecker));
        let issued = engine.start(&dynamic_quiz(), "ann").await.unwrap();
        assert_eq!(issued.questions.len(), 3);
        assert!(issued.questions.iter().all(|q| q.correct_answer == "A"));
    }

    fn generated_with_answer(question: &str, correct: &str) -> GeneratedQuestion {
        let mut q = placeholder_questions("Fractions", "5", 1).remove(0);
        q.question = question.into();
        q.correct_answer = correct.into();
        q
    }

    #[tokio::test]
    async fn start_drops_questions_whose_answer_is_not_an_option() {
        let generated = vec![
            generated_with_answer("Half of 8?", "Z"),
            generated_with_answer("Half of 10?", "C"),
        ];
        let engine = engine(FixedGrader::new(0), Arc::new(NoSyntaxChecker))
            .with_generator(Arc::new(FixedGenerator(generated)));

        let issued = engine.start(&dynamic_quiz(), "ann").await.unwrap();
        assert_eq!(issued.questions.len(), 1);
        assert_eq!(issued.questions[0].question, "Half of 10?");
        assert_eq!(issued.questions[0].correct_answer, "C");
    }

    #[tokio::test]
    async fn start_falls_back_when_no_generated_answer_is_an_option() {
        let generated = vec![
            generated_with_answer("Half of 8?", "Z"),
            generated_with_answer("Half of 10?", ""),
        ];
        let engine = engine(FixedGrader::new(0), Arc::new(NoSyntaxChecker))
            .with_generator(Arc::new(FixedGenerator(generated)));

        let issued = engine.start(&dynamic_quiz(), "ann").await.unwrap();
        assert_eq!(issued.questions.len(), 3);
        assert!(issued.questions.iter().all(|q| q.has_valid_answer()));
        assert!(issued
            .questions
            .iter()
            .all(|q| q.question.starts_with("Sample question on Fractions")));
    }

    #[tokio::test]
    async fn start_rejects_static_quiz() {
        let engine = engine(FixedGrader::new(0), Arc::new(NoSyntaxChecker));
        let err = engine.start(&quiz(vec![mc("q", "A")]), "ann").await.unwrap_err();
        assert!(matches!(err, SubmitError::NotDynamic(_)));
    }

    #[tokio::test]
    async fn resumed_session_can_be_submitted() {
        let engine = engine(FixedGrader::new(0), Arc::new(NoSyntaxChecker));
        let issued = IssuedQuiz::new("dyn-1", "ann", placeholder_questions("x", "5", 2));
        engine.resume(issued);

        let submission = Submission::new().with_text("0", "A").with_text("1", "A");
        let result = engine.submit(&dynamic_quiz(), &submission, "ann").await.unwrap();
        assert_eq!(result.score, 100);
        assert_eq!(result.earned_points, result.correct_count);
    }

    #[tokio::test]
    async fn failed_commit_keeps_session_for_resubmission() {
        let engine = GradingEngine::new(
            FixedGrader::new(0),
            Arc::new(NoSyntaxChecker),
            Arc::new(FailingStore),
            fast_config(),
        );
        let quiz = dynamic_quiz();
        engine.start(&quiz, "ann").await.unwrap();

        let submission = Submission::new().with_text("0", "A");
        let err = engine.submit(&quiz, &submission, "ann").await.unwrap_err();
        assert!(matches!(err, SubmitError::Store(_)));
        let err = engine.submit(&quiz, &submission, "ann").await.unwrap_err();
        assert!(matches!(err, SubmitError::Store(_)));
    }

    #[tokio::test]
    async fn remove_learner_purges_history() {
        let engine = engine(FixedGrader::new(0), Arc::new(NoSyntaxChecker));
        let quiz = quiz(vec![mc("q1", "A")]);
        engine
            .submit(&quiz, &Submission::new().with_text("q1", "A"), "ann")
            .await
            .unwrap();
        assert_eq!(engine.remove_learner("ann").await.unwrap(), 1);
        assert!(engine.store().results_for("ann").await.unwrap().is_empty());
    }
}
