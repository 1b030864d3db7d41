//! Three-stage authoring flow: create master → generate variations → review.
//!
//! [`PipelineSession`] is a plain serializable value. Its transition methods
//! are pure and enforce the stage order; [`AuthoringPipeline`] performs the
//! model and storage calls around them.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use quizbuilder_llm::ChatBackend;
use quizbuilder_shared::{
    AppConfig, ChatMessage, FormatErrorReason, Question, QuestionKind, QuizBuilderError, Result,
    SessionId, Shape, Stage, ValidationIssue,
};

use crate::formatter::StructuredFormatter;
use crate::generator::QuestionGenerator;
use crate::prompts;
use crate::quiz::QuizRun;
use crate::store::{NewQuiz, Notifier, NotifyOutcome, QuestionStore};

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Who is authoring, for which class, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthoringContext {
    pub teacher_id: String,
    pub class_id: String,
    pub class_level: String,
    pub question_kind: QuestionKind,
    pub variation_count: u32,
}

impl AuthoringContext {
    /// Context with class level, kind and count taken from `[defaults]`.
    pub fn from_config(
        config: &AppConfig,
        teacher_id: impl Into<String>,
        class_id: impl Into<String>,
    ) -> Self {
        Self {
            teacher_id: teacher_id.into(),
            class_id: class_id.into(),
            class_level: config.defaults.class_level.clone(),
            question_kind: config.defaults.question_kind,
            variation_count: config.defaults.variation_count,
        }
    }
}

/// State of one authoring session. Discarded when the author leaves;
/// only submitted content reaches the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSession {
    id: SessionId,
    context: AuthoringContext,
    stage: Stage,
    history: Vec<ChatMessage>,
    master_question: Option<Question>,
    master_question_id: Option<String>,
    variations: Vec<Question>,
    /// Last user message sent in the current stage, for regeneration.
    stage_prompt: Option<String>,
    activity_id: Option<String>,
    submitted: bool,
}

/// Snapshot of everything a submission writes.
#[derive(Debug, Clone)]
pub struct Submission {
    pub master: Question,
    pub variations: Vec<Question>,
}

impl Submission {
    /// Activity content stored alongside the variation rows.
    pub fn content(&self, master_question_id: &str) -> Value {
        json!({
            "masterQuestionId": master_question_id,
            "masterQuestion": self.master,
            "questions": self.variations,
        })
    }
}

impl PipelineSession {
    pub fn new(context: AuthoringContext) -> Self {
        Self {
            id: SessionId::new(),
            context,
            stage: Stage::default(),
            history: Vec::new(),
            master_question: None,
            master_question_id: None,
            variations: Vec::new(),
            stage_prompt: None,
            activity_id: None,
            submitted: false,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn context(&self) -> &AuthoringContext {
        &self.context
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn master_question(&self) -> Option<&Question> {
        self.master_question.as_ref()
    }

    pub fn master_question_id(&self) -> Option<&str> {
        self.master_question_id.as_deref()
    }

    pub fn variations(&self) -> &[Question] {
        &self.variations
    }

    pub fn activity_id(&self) -> Option<&str> {
        self.activity_id.as_deref()
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    fn require_stage(&self, expected: Stage, action: &str) -> Result<()> {
        if self.stage != expected {
            return Err(QuizBuilderError::invalid_stage(action, self.stage));
        }
        Ok(())
    }

    fn advance(&mut self) {
        if let Some(next) = self.stage.next() {
            info!(session = %self.id, from = %self.stage, to = %next, "stage transition");
            self.stage = next;
            self.stage_prompt = None;
        }
    }

    /// Append one successful user/assistant exchange.
    pub fn record_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.history.push(ChatMessage::user(user));
        self.history.push(ChatMessage::assistant(assistant));
    }

    /// Accept a validated master question and move to variation generation.
    pub fn accept_master(&mut self, question: Question) -> Result<()> {
        self.require_stage(Stage::CreateMaster, "accept a master question")?;
        let issues = question.validate();
        if !issues.is_empty() {
            return Err(QuizBuilderError::InvalidQuestion {
                issues: issues.iter().map(ToString::to_string).collect(),
            });
        }
        self.master_question = Some(question);
        self.master_question_id = None;
        self.advance();
        Ok(())
    }

    /// Accept a batch of variations and move to review.
    ///
    /// Elements are kept even when invalid; see [`Self::variation_issues`].
    pub fn accept_variations(&mut self, questions: Vec<Question>) -> Result<()> {
        self.require_stage(Stage::GenerateVariations, "accept variations")?;
        if questions.is_empty() {
            return Err(QuizBuilderError::format(FormatErrorReason::EmptyArray));
        }
        self.variations = questions;
        self.advance();
        Ok(())
    }

    /// Replace the variation at `index`. Returns the new question's problems,
    /// if any; an invalid edit is kept and blocks submission until fixed.
    pub fn edit_variation(&mut self, index: usize, question: Question) -> Result<Vec<ValidationIssue>> {
        self.require_stage(Stage::Review, "edit a variation")?;
        if self.submitted {
            return Err(QuizBuilderError::validation("this quiz has already been submitted"));
        }
        let len = self.variations.len();
        let slot = self.variations.get_mut(index).ok_or_else(|| {
            QuizBuilderError::validation(format!("no variation at index {index} (have {len})"))
        })?;
        let issues = question.validate();
        *slot = question;
        Ok(issues)
    }

    /// Validation problems per variation index, skipping clean ones.
    pub fn variation_issues(&self) -> Vec<(usize, Vec<ValidationIssue>)> {
        self.variations
            .iter()
            .enumerate()
            .map(|(i, q)| (i, q.validate()))
            .filter(|(_, issues)| !issues.is_empty())
            .collect()
    }

    /// Check that everything is valid and snapshot what will be written.
    pub fn prepare_submission(&self) -> Result<Submission> {
        self.require_stage(Stage::Review, "submit")?;
        if self.submitted {
            return Err(QuizBuilderError::validation("this quiz has already been submitted"));
        }
        let master = self
            .master_question
            .clone()
            .ok_or_else(|| QuizBuilderError::validation("no master question to submit"))?;

        let mut problems: Vec<String> = master
            .validate()
            .iter()
            .map(|issue| format!("master question: {issue}"))
            .collect();
        for (index, issues) in self.variation_issues() {
            problems.extend(
                issues
                    .iter()
                    .map(|issue| format!("variation {}: {issue}", index + 1)),
            );
        }
        if !problems.is_empty() {
            return Err(QuizBuilderError::InvalidQuestion { issues: problems });
        }

        Ok(Submission {
            master,
            variations: self.variations.clone(),
        })
    }

    /// Start a self-graded replay of master + variations.
    pub fn test_run(&self) -> Result<QuizRun> {
        self.require_stage(Stage::Review, "start test mode")?;
        let questions = self
            .master_question
            .iter()
            .chain(self.variations.iter())
            .cloned()
            .collect();
        Ok(QuizRun::new(questions))
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MasterOutcome {
    pub question: Question,
    pub master_question_id: Option<String>,
    /// Set when the immediate save failed. The master is saved again on submit.
    pub persist_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VariationsOutcome {
    pub count: usize,
    pub issues: Vec<(usize, Vec<ValidationIssue>)>,
}

#[derive(Debug, Clone)]
pub enum Regenerated {
    Master(MasterOutcome),
    Variations(VariationsOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationStatus {
    Sent(NotifyOutcome),
    /// Fan-out failed after the quiz was stored; the quiz stays published.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    pub master_question_id: String,
    pub activity_id: String,
    pub variation_count: usize,
    pub notification: NotificationStatus,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives a [`PipelineSession`] through the model and storage calls.
pub struct AuthoringPipeline<B, S, N> {
    backend: B,
    store: S,
    notifier: N,
    config: AppConfig,
}

impl<B, S, N> AuthoringPipeline<B, S, N>
where
    B: ChatBackend,
    S: QuestionStore,
    N: Notifier,
{
    pub fn new(backend: B, store: S, notifier: N, config: AppConfig) -> Self {
        Self {
            backend,
            store,
            notifier,
            config,
        }
    }

    pub fn new_session(&self, teacher_id: &str, class_id: &str) -> PipelineSession {
        PipelineSession::new(AuthoringContext::from_config(
            &self.config,
            teacher_id,
            class_id,
        ))
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn formatter(&self) -> StructuredFormatter<'_, B> {
        StructuredFormatter::new(
            &self.backend,
            &self.config.llm.model,
            &self.config.formatting.call,
        )
    }

    fn generator(&self) -> QuestionGenerator<'_, B> {
        QuestionGenerator::new(&self.backend, &self.config.llm.model, &self.config.generation)
    }

    /// Generate and format a master question from the author's instructions.
    pub async fn create_master(
        &self,
        session: &mut PipelineSession,
        instructions: &str,
    ) -> Result<MasterOutcome> {
        self.run_master(session, instructions).await
    }

    /// Generate variations of the accepted master question.
    pub async fn generate_variations(
        &self,
        session: &mut PipelineSession,
        extra: Option<&str>,
    ) -> Result<VariationsOutcome> {
        session.require_stage(Stage::GenerateVariations, "generate variations")?;
        let master = session
            .master_question
            .as_ref()
            .ok_or_else(|| QuizBuilderError::validation("no master question accepted yet"))?;
        let message =
            prompts::variations_user_message(master, session.context.variation_count, extra);
        self.run_variations(session, &message).await
    }

    /// Re-issue the current stage's last prompt. The stage does not change
    /// unless the new attempt succeeds.
    pub async fn regenerate(&self, session: &mut PipelineSession) -> Result<Regenerated> {
        if session.stage == Stage::Review {
            return Err(QuizBuilderError::invalid_stage("regenerate", session.stage));
        }
        let prompt = session
            .stage_prompt
            .clone()
            .ok_or_else(|| QuizBuilderError::validation("nothing to regenerate in this stage yet"))?;

        match session.stage {
            Stage::CreateMaster => self.run_master(session, &prompt).await.map(Regenerated::Master),
            _ => self
                .run_variations(session, &prompt)
                .await
                .map(Regenerated::Variations),
        }
    }

    #[instrument(skip_all, fields(session = %session.id))]
    async fn run_master(
        &self,
        session: &mut PipelineSession,
        user_message: &str,
    ) -> Result<MasterOutcome> {
        session.require_stage(Stage::CreateMaster, "create a master question")?;
        session.stage_prompt = Some(user_message.to_string());

        let system = prompts::master_system_context(&session.context);
        let reply = self
            .generator()
            .generate(user_message, &session.history, &system)
            .await?;
        session.record_exchange(user_message, reply.as_str());

        let question = self
            .formatter()
            .format(&reply, Shape::Single)
            .await?
            .into_vec()
            .into_iter()
            .next()
            .ok_or_else(|| QuizBuilderError::format(FormatErrorReason::EmptyArray))?;

        session.accept_master(question.clone())?;

        // Awaited inline. A failed save lands on the outcome and never blocks
        // the stage; submit saves the master again.
        let (master_question_id, persist_error) = match self
            .store
            .create_master_question(&question, &session.context.class_id)
            .await
        {
            Ok(id) => {
                info!(%id, "master question saved");
                session.master_question_id = Some(id.clone());
                (Some(id), None)
            }
            Err(e) => {
                warn!(error = %e, "could not save master question, will retry on submit");
                (None, Some(e.to_string()))
            }
        };

        Ok(MasterOutcome {
            question,
            master_question_id,
            persist_error,
        })
    }

    #[instrument(skip_all, fields(session = %session.id))]
    async fn run_variations(
        &self,
        session: &mut PipelineSession,
        user_message: &str,
    ) -> Result<VariationsOutcome> {
        session.require_stage(Stage::GenerateVariations, "generate variations")?;
        session.stage_prompt = Some(user_message.to_string());

        let system = prompts::variations_system_context(&session.context);
        let reply = self
            .generator()
            .generate(user_message, &session.history, &system)
            .await?;
        session.record_exchange(user_message, reply.as_str());

        let questions = self
            .formatter()
            .format(&reply, Shape::Array)
            .await?
            .into_vec();
        let count = questions.len();
        session.accept_variations(questions)?;

        let issues = session.variation_issues();
        if !issues.is_empty() {
            warn!(flagged = issues.len(), count, "some variations need review");
        }
        Ok(VariationsOutcome { count, issues })
    }

    /// Persist the reviewed quiz and notify the class.
    ///
    /// The master question id from an earlier attempt is reused. The quiz
    /// itself is written in one call, so a failed attempt leaves nothing to
    /// clean up and calling this again is safe.
    #[instrument(skip_all, fields(session = %session.id))]
    pub async fn submit(&self, session: &mut PipelineSession) -> Result<SubmissionReceipt> {
        let submission = session.prepare_submission()?;
        let ctx = session.context.clone();

        let master_question_id = match session.master_question_id.clone() {
            Some(id) => id,
            None => {
                let id = self
                    .store
                    .create_master_question(&submission.master, &ctx.class_id)
                    .await?;
                session.master_question_id = Some(id.clone());
                id
            }
        };

        // Rebuilt from the current session on every attempt.
        let content = submission.content(&master_question_id);
        let activity_id = self
            .store
            .create_quiz(&NewQuiz {
                class_id: &ctx.class_id,
                class_level: &ctx.class_level,
                teacher_id: &ctx.teacher_id,
                master_question_id: &master_question_id,
                content: &content,
                variations: &submission.variations,
            })
            .await?;
        session.activity_id = Some(activity_id.clone());

        session.submitted = true;
        info!(%activity_id, variations = submission.variations.len(), "quiz submitted");

        let message = format!(
            "Un nouveau quiz de {} questions est disponible !",
            submission.variations.len()
        );
        let notification = match self
            .notifier
            .notify_class(&ctx.class_id, &activity_id, &message)
            .await
        {
            Ok(outcome) => NotificationStatus::Sent(outcome),
            Err(e) => {
                warn!(error = %e, "quiz stored but students were not notified");
                NotificationStatus::Failed(e.to_string())
            }
        };

        Ok(SubmissionReceipt {
            master_question_id,
            activity_id,
            variation_count: submission.variations.len(),
            notification,
        })
    }
}
