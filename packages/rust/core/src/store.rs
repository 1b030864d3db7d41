//! Persistence seams used by the authoring pipeline.
//!
//! [`QuestionStore`] and [`Notifier`] are implemented for the libSQL
//! [`Storage`] and for shared references, so one database handle can serve
//! both roles. Tests substitute in-memory fakes.

use std::future::Future;

use serde_json::Value;

use quizbuilder_shared::{Question, Result};
use quizbuilder_storage::{ActivityStatus, NewActivity, QUIZ_ACTIVITY, Storage};

/// Everything one submission writes besides the master question.
#[derive(Debug, Clone)]
pub struct NewQuiz<'a> {
    pub class_id: &'a str,
    pub class_level: &'a str,
    pub teacher_id: &'a str,
    pub master_question_id: &'a str,
    pub content: &'a Value,
    pub variations: &'a [Question],
}

/// Where accepted questions and published quizzes are written.
pub trait QuestionStore: Send + Sync {
    /// Persist a validated master question. Returns its id.
    fn create_master_question(
        &self,
        question: &Question,
        class_id: &str,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Create the quiz activity and its variation rows as one write. On
    /// error nothing is stored. Returns the activity id.
    fn create_quiz(&self, quiz: &NewQuiz<'_>) -> impl Future<Output = Result<String>> + Send;
}

/// Result of a class notification fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// One notification per enrolled student.
    Delivered(usize),
    /// The class has nobody enrolled. Not an error.
    NoStudents,
}

/// Tells a class's students that a new activity exists.
pub trait Notifier: Send + Sync {
    fn notify_class(
        &self,
        class_id: &str,
        activity_id: &str,
        message: &str,
    ) -> impl Future<Output = Result<NotifyOutcome>> + Send;
}

impl<T: QuestionStore> QuestionStore for &T {
    fn create_master_question(
        &self,
        question: &Question,
        class_id: &str,
    ) -> impl Future<Output = Result<String>> + Send {
        (**self).create_master_question(question, class_id)
    }

    fn create_quiz(&self, quiz: &NewQuiz<'_>) -> impl Future<Output = Result<String>> + Send {
        (**self).create_quiz(quiz)
    }
}

impl<T: Notifier> Notifier for &T {
    fn notify_class(
        &self,
        class_id: &str,
        activity_id: &str,
        message: &str,
    ) -> impl Future<Output = Result<NotifyOutcome>> + Send {
        (**self).notify_class(class_id, activity_id, message)
    }
}

impl QuestionStore for Storage {
    async fn create_master_question(&self, question: &Question, class_id: &str) -> Result<String> {
        self.insert_master_question(question, class_id).await
    }

    async fn create_quiz(&self, quiz: &NewQuiz<'_>) -> Result<String> {
        let activity = NewActivity {
            activity_type: QUIZ_ACTIVITY,
            class_id: quiz.class_id,
            class_level: quiz.class_level,
            teacher_id: quiz.teacher_id,
            content: quiz.content,
            status: ActivityStatus::Published,
        };
        self.insert_quiz(&activity, quiz.master_question_id, quiz.variations)
            .await
    }
}

impl Notifier for Storage {
    async fn notify_class(
        &self,
        class_id: &str,
        activity_id: &str,
        message: &str,
    ) -> Result<NotifyOutcome> {
        match self
            .insert_class_notifications(class_id, activity_id, message)
            .await?
        {
            0 => Ok(NotifyOutcome::NoStudents),
            n => Ok(NotifyOutcome::Delivered(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizbuilder_shared::Label;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    async fn storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("qb_core_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn question(prompt: &str) -> Question {
        Question {
            prompt: prompt.into(),
            options: Label::ALL.iter().map(|l| (*l, l.to_string())).collect::<BTreeMap<_, _>>(),
            correct_answer: Some(Label::A),
            explanation: Some("A est juste.".into()),
            kind: None,
        }
    }

    async fn publish<S: QuestionStore>(store: &S, variations: &[Question]) -> Result<String> {
        let content = serde_json::json!({"questions": variations});
        store
            .create_quiz(&NewQuiz {
                class_id: "class-1",
                class_level: "CM2",
                teacher_id: "teacher-1",
                master_question_id: "master-1",
                content: &content,
                variations,
            })
            .await
    }

    async fn notify<N: Notifier>(notifier: &N, activity_id: &str) -> Result<NotifyOutcome> {
        notifier.notify_class("class-1", activity_id, "Nouveau quiz").await
    }

    #[tokio::test]
    async fn storage_notifier_reports_empty_class() {
        let storage = storage().await;
        let activity = publish(&storage, &[question("q")]).await.unwrap();

        let outcome = storage.notify_class("class-1", &activity, "Nouveau quiz").await.unwrap();
        assert_eq!(outcome, NotifyOutcome::NoStudents);

        storage.enroll_student("class-1", "eleve-1").await.unwrap();
        let outcome = storage.notify_class("class-1", &activity, "Nouveau quiz").await.unwrap();
        assert_eq!(outcome, NotifyOutcome::Delivered(1));
    }

    #[tokio::test]
    async fn storage_quiz_is_published_with_rows() {
        let storage = storage().await;
        let batch = vec![question("un"), question("deux")];
        let id = publish(&storage, &batch).await.unwrap();

        let row = storage.get_activity(&id).await.unwrap().expect("row");
        assert_eq!(row.activity_type, "quiz");
        assert_eq!(row.status, ActivityStatus::Published);
        assert_eq!(row.class_level, "CM2");
        assert_eq!(storage.list_variations(&id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn shared_reference_serves_both_roles() {
        let storage = storage().await;
        let by_ref = &storage;
        let id = publish(&by_ref, &[question("q")]).await.unwrap();
        let outcome = notify(&by_ref, &id).await.unwrap();
        assert_eq!(outcome, NotifyOutcome::NoStudents);
    }
}
