//! Test mode: replay an authored set as a self-graded quiz.

use serde::{Deserialize, Serialize};

use quizbuilder_shared::{Label, Question, QuizBuilderError, Result};

/// Feedback for one answered question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub chosen: Label,
    pub correct: bool,
    pub correct_answer: Option<Label>,
    pub explanation: Option<String>,
}

/// A quiz run over a snapshot of questions. Answering never touches the
/// session the questions came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizRun {
    pub questions: Vec<Question>,
    pub current_question: usize,
    pub score: u32,
    pub answers: Vec<AnswerOutcome>,
}

impl QuizRun {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            current_question: 0,
            score: 0,
            answers: Vec::new(),
        }
    }

    pub fn current(&self) -> Option<&Question> {
        self.questions.get(self.current_question)
    }

    pub fn is_finished(&self) -> bool {
        self.current_question >= self.questions.len()
    }

    /// Grade `label` against the current question and move on.
    pub fn answer(&mut self, label: Label) -> Result<AnswerOutcome> {
        let question = self
            .current()
            .ok_or_else(|| QuizBuilderError::validation("the quiz is already finished"))?;

        let outcome = AnswerOutcome {
            chosen: label,
            correct: question.correct_answer == Some(label),
            correct_answer: question.correct_answer,
            explanation: question.explanation.clone(),
        };

        if outcome.correct {
            self.score += 1;
        }
        self.answers.push(outcome.clone());
        self.current_question += 1;
        Ok(outcome)
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }
}
