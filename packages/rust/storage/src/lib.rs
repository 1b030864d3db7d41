//! Turso Embedded / libSQL storage layer (offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding master questions,
//! published quiz activities, their variation rows, class enrollments and
//! student notifications.
//!
//! **Access rules:**
//! - authoring commands: read-write via [`Storage::open`]
//! - listing commands: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use serde::Serialize;
use uuid::Uuid;

use quizbuilder_shared::{Question, QuizBuilderError, Result};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// Publication state of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Draft,
    Published,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

impl std::str::FromStr for ActivityStatus {
    type Err = QuizBuilderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            other => Err(QuizBuilderError::persistence(format!(
                "unknown activity status {other:?}"
            ))),
        }
    }
}

/// Activity type written by the authoring flow.
pub const QUIZ_ACTIVITY: &str = "quiz";

/// Fields needed to create an activity.
#[derive(Debug, Clone)]
pub struct NewActivity<'a> {
    pub activity_type: &'a str,
    pub class_id: &'a str,
    pub class_level: &'a str,
    pub teacher_id: &'a str,
    pub content: &'a serde_json::Value,
    pub status: ActivityStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct MasterQuestionRow {
    pub id: String,
    pub class_id: String,
    pub question: Question,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityRow {
    pub id: String,
    pub activity_type: String,
    pub class_id: String,
    pub class_level: String,
    pub teacher_id: String,
    pub content: serde_json::Value,
    pub status: ActivityStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariationRow {
    pub position: u32,
    pub master_question_id: String,
    pub question: Question,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationRow {
    pub id: String,
    pub student_id: String,
    pub class_id: String,
    pub activity_id: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

fn db_err(e: libsql::Error) -> QuizBuilderError {
    QuizBuilderError::persistence(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| QuizBuilderError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path).build().await.map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(QuizBuilderError::persistence(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path).build().await.map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    QuizBuilderError::persistence(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            // Table doesn't exist yet
            Err(_) => 0,
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(QuizBuilderError::persistence(
                "database is opened in read-only mode",
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Master questions
    // -----------------------------------------------------------------------

    /// Insert a master question. Returns the generated ID.
    pub async fn insert_master_question(&self, question: &Question, class_id: &str) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        let json = to_json(question)?;
        self.conn
            .execute(
                "INSERT INTO master_questions (id, class_id, kind, question_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.as_str(),
                    class_id,
                    question.kind.map(|k| k.as_str()),
                    json.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(db_err)?;
        tracing::debug!(%id, class_id, "stored master question");
        Ok(id)
    }

    pub async fn get_master_question(&self, id: &str) -> Result<Option<MasterQuestionRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, class_id, question_json, created_at FROM master_questions WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(MasterQuestionRow {
                id: row.get::<String>(0).map_err(db_err)?,
                class_id: row.get::<String>(1).map_err(db_err)?,
                question: from_json(&row.get::<String>(2).map_err(db_err)?)?,
                created_at: parse_time(&row.get::<String>(3).map_err(db_err)?)?,
            })),
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Activities
    // -----------------------------------------------------------------------

    /// Insert an activity. Returns the generated ID.
    pub async fn insert_activity(&self, activity: &NewActivity<'_>) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        let content = to_json(activity.content)?;
        write_activity(&self.conn, &id, activity, &content, &now)
            .await
            .map_err(db_err)?;
        tracing::info!(%id, activity_type = activity.activity_type, "created activity");
        Ok(id)
    }

    /// Insert an activity together with its variation rows in one
    /// transaction. Nothing is written if any row fails.
    pub async fn insert_quiz(
        &self,
        activity: &NewActivity<'_>,
        master_question_id: &str,
        questions: &[Question],
    ) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        let content = to_json(activity.content)?;
        let encoded = questions.iter().map(to_json).collect::<Result<Vec<_>>>()?;

        let tx = self.conn.transaction().await.map_err(db_err)?;
        let written = async {
            write_activity(&tx, &id, activity, &content, &now).await?;
            write_variations(&tx, &id, master_question_id, activity.class_id, &encoded).await
        }
        .await;
        if let Err(e) = written {
            tx.rollback().await.map_err(db_err)?;
            return Err(db_err(e));
        }
        tx.commit().await.map_err(db_err)?;

        tracing::info!(%id, count = questions.len(), status = activity.status.as_str(), "stored quiz");
        Ok(id)
    }

    pub async fn get_activity(&self, id: &str) -> Result<Option<ActivityRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, activity_type, class_id, class_level, teacher_id, content_json, status, created_at
                 FROM activities WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_activity(&row)?)),
            None => Ok(None),
        }
    }

    /// Activities created by `teacher_id`, newest first.
    pub async fn list_activities(&self, teacher_id: &str) -> Result<Vec<ActivityRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, activity_type, class_id, class_level, teacher_id, content_json, status, created_at
                 FROM activities WHERE teacher_id = ?1 ORDER BY created_at DESC, id DESC",
                params![teacher_id],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_activity(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Variations
    // -----------------------------------------------------------------------

    /// Insert all variations of an activity in one transaction.
    /// Returns the number of rows written.
    pub async fn insert_variations(
        &self,
        questions: &[Question],
        master_question_id: &str,
        activity_id: &str,
        class_id: &str,
    ) -> Result<usize> {
        self.check_writable()?;
        let encoded = questions.iter().map(to_json).collect::<Result<Vec<_>>>()?;
        let tx = self.conn.transaction().await.map_err(db_err)?;
        if let Err(e) =
            write_variations(&tx, activity_id, master_question_id, class_id, &encoded).await
        {
            tx.rollback().await.map_err(db_err)?;
            return Err(db_err(e));
        }

        tx.commit().await.map_err(db_err)?;
        tracing::info!(activity_id, count = questions.len(), "stored variations");
        Ok(questions.len())
    }

    /// Variations of an activity in their original order.
    pub async fn list_variations(&self, activity_id: &str) -> Result<Vec<VariationRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT position, master_question_id, question_json
                 FROM quiz_variations WHERE activity_id = ?1 ORDER BY position",
                params![activity_id],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(VariationRow {
                position: row.get::<u32>(0).map_err(db_err)?,
                master_question_id: row.get::<String>(1).map_err(db_err)?,
                question: from_json(&row.get::<String>(2).map_err(db_err)?)?,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Enrollments and notifications
    // -----------------------------------------------------------------------

    /// Enroll a student in a class. Enrolling twice is a no-op.
    pub async fn enroll_student(&self, class_id: &str, student_id: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO enrollments (class_id, student_id, enrolled_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(class_id, student_id) DO NOTHING",
                params![class_id, student_id, now.as_str()],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub async fn list_students(&self, class_id: &str) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT student_id FROM enrollments WHERE class_id = ?1 ORDER BY student_id",
                params![class_id],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row.get::<String>(0).map_err(db_err)?);
        }
        Ok(results)
    }

    /// Create one notification per enrolled student of `class_id`.
    /// Returns how many were created; zero means the class has no students.
    pub async fn insert_class_notifications(
        &self,
        class_id: &str,
        activity_id: &str,
        message: &str,
    ) -> Result<usize> {
        self.check_writable()?;
        let students = self.list_students(class_id).await?;
        if students.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction().await.map_err(db_err)?;
        for student_id in &students {
            let id = Uuid::now_v7().to_string();
            let inserted = tx
                .execute(
                    "INSERT INTO notifications (id, student_id, class_id, activity_id, message, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        id.as_str(),
                        student_id.as_str(),
                        class_id,
                        activity_id,
                        message,
                        now.as_str()
                    ],
                )
                .await;
            if let Err(e) = inserted {
                tx.rollback().await.map_err(db_err)?;
                return Err(db_err(e));
            }
        }
        tx.commit().await.map_err(db_err)?;

        tracing::info!(class_id, activity_id, count = students.len(), "notified students");
        Ok(students.len())
    }

    /// Notifications for a student, newest first.
    pub async fn list_notifications(&self, student_id: &str) -> Result<Vec<NotificationRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, student_id, class_id, activity_id, message, created_at, is_read
                 FROM notifications WHERE student_id = ?1 ORDER BY created_at DESC, id DESC",
                params![student_id],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(NotificationRow {
                id: row.get::<String>(0).map_err(db_err)?,
                student_id: row.get::<String>(1).map_err(db_err)?,
                class_id: row.get::<String>(2).map_err(db_err)?,
                activity_id: row.get::<String>(3).map_err(db_err)?,
                message: row.get::<String>(4).map_err(db_err)?,
                created_at: parse_time(&row.get::<String>(5).map_err(db_err)?)?,
                is_read: row.get::<i64>(6).map_err(db_err)? != 0,
            });
        }
        Ok(results)
    }
}

async fn write_activity(
    conn: &Connection,
    id: &str,
    activity: &NewActivity<'_>,
    content: &str,
    now: &str,
) -> std::result::Result<(), libsql::Error> {
    conn.execute(
        "INSERT INTO activities
           (id, activity_type, class_id, class_level, teacher_id, content_json, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            activity.activity_type,
            activity.class_id,
            activity.class_level,
            activity.teacher_id,
            content,
            activity.status.as_str(),
            now
        ],
    )
    .await?;
    Ok(())
}

/// Variation rows for one activity, positioned in batch order.
async fn write_variations(
    conn: &Connection,
    activity_id: &str,
    master_question_id: &str,
    class_id: &str,
    encoded: &[String],
) -> std::result::Result<(), libsql::Error> {
    for (position, json) in encoded.iter().enumerate() {
        conn.execute(
            "INSERT INTO quiz_variations
               (activity_id, master_question_id, class_id, position, question_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                activity_id,
                master_question_id,
                class_id,
                position as i64,
                json.as_str()
            ],
        )
        .await?;
    }
    Ok(())
}

fn row_to_activity(row: &libsql::Row) -> Result<ActivityRow> {
    Ok(ActivityRow {
        id: row.get::<String>(0).map_err(db_err)?,
        activity_type: row.get::<String>(1).map_err(db_err)?,
        class_id: row.get::<String>(2).map_err(db_err)?,
        class_level: row.get::<String>(3).map_err(db_err)?,
        teacher_id: row.get::<String>(4).map_err(db_err)?,
        content: from_json(&row.get::<String>(5).map_err(db_err)?)?,
        status: row.get::<String>(6).map_err(db_err)?.parse()?,
        created_at: parse_time(&row.get::<String>(7).map_err(db_err)?)?,
    })
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| QuizBuilderError::persistence(format!("failed to encode row: {e}")))
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| QuizBuilderError::persistence(format!("corrupt JSON column: {e}")))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| QuizBuilderError::persistence(format!("invalid date: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizbuilder_shared::{Label, QuestionKind};
    use std::collections::BTreeMap;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("qb_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn question(prompt: &str) -> Question {
        Question {
            prompt: prompt.into(),
            options: BTreeMap::from([
                (Label::A, "3".into()),
                (Label::B, "4".into()),
                (Label::C, "5".into()),
                (Label::D, "6".into()),
            ]),
            correct_answer: Some(Label::B),
            explanation: Some("2 + 2 = 4".into()),
            kind: Some(QuestionKind::Short),
        }
    }

    async fn sample_activity(storage: &Storage, teacher: &str) -> String {
        let content = serde_json::json!({"master": question("2+2 ?")});
        storage
            .insert_activity(&NewActivity {
                activity_type: QUIZ_ACTIVITY,
                class_id: "class-1",
                class_level: "CE1",
                teacher_id: teacher,
                content: &content,
                status: ActivityStatus::Published,
            })
            .await
            .expect("insert activity")
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("qb_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn master_question_roundtrip() {
        let storage = test_storage().await;
        let q = question("Combien font 2 + 2 ?");
        let id = storage.insert_master_question(&q, "class-1").await.unwrap();

        let row = storage.get_master_question(&id).await.unwrap().expect("row");
        assert_eq!(row.class_id, "class-1");
        assert_eq!(row.question, q);
        assert!(storage.get_master_question("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn activities_listed_per_teacher() {
        let storage = test_storage().await;
        let first = sample_activity(&storage, "teacher-1").await;
        let second = sample_activity(&storage, "teacher-1").await;
        sample_activity(&storage, "teacher-2").await;

        let listed = storage.list_activities("teacher-1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second);
        assert_eq!(listed[1].id, first);
        assert_eq!(listed[0].status, ActivityStatus::Published);
        assert_eq!(listed[0].activity_type, "quiz");

        let shown = storage.get_activity(&first).await.unwrap().expect("activity");
        assert_eq!(shown.content["master"]["correctAnswer"], "B");
    }

    #[tokio::test]
    async fn variations_keep_their_order() {
        let storage = test_storage().await;
        let master_id = storage
            .insert_master_question(&question("maître"), "class-1")
            .await
            .unwrap();
        let activity_id = sample_activity(&storage, "teacher-1").await;

        let batch: Vec<Question> = (1..=10).map(|i| question(&format!("variation {i}"))).collect();
        let written = storage
            .insert_variations(&batch, &master_id, &activity_id, "class-1")
            .await
            .unwrap();
        assert_eq!(written, 10);

        let rows = storage.list_variations(&activity_id).await.unwrap();
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0].position, 0);
        assert_eq!(rows[9].question.prompt, "variation 10");
        assert_eq!(rows[3].master_question_id, master_id);
    }

    #[tokio::test]
    async fn duplicate_variation_batch_is_rejected_whole() {
        let storage = test_storage().await;
        let master_id = storage
            .insert_master_question(&question("maître"), "class-1")
            .await
            .unwrap();
        let activity_id = sample_activity(&storage, "teacher-1").await;
        let batch = vec![question("a"), question("b")];

        storage
            .insert_variations(&batch, &master_id, &activity_id, "class-1")
            .await
            .unwrap();
        let again = storage
            .insert_variations(&batch, &master_id, &activity_id, "class-1")
            .await;
        assert!(again.is_err());
        assert_eq!(storage.list_variations(&activity_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn notifications_fan_out_to_enrolled_students() {
        let storage = test_storage().await;
        let activity_id = sample_activity(&storage, "teacher-1").await;

        storage.enroll_student("class-1", "eleve-1").await.unwrap();
        storage.enroll_student("class-1", "eleve-2").await.unwrap();
        storage.enroll_student("class-1", "eleve-2").await.unwrap();
        storage.enroll_student("class-2", "eleve-3").await.unwrap();

        let sent = storage
            .insert_class_notifications("class-1", &activity_id, "Nouveau quiz !")
            .await
            .unwrap();
        assert_eq!(sent, 2);

        let inbox = storage.list_notifications("eleve-2").await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].message, "Nouveau quiz !");
        assert!(!inbox[0].is_read);
        assert!(storage.list_notifications("eleve-3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_class_is_not_an_error() {
        let storage = test_storage().await;
        let activity_id = sample_activity(&storage, "teacher-1").await;
        let sent = storage
            .insert_class_notifications("class-vide", &activity_id, "Nouveau quiz !")
            .await
            .unwrap();
        assert_eq!(sent, 0);
    }

    fn quiz_activity<'a>(content: &'a serde_json::Value) -> NewActivity<'a> {
        NewActivity {
            activity_type: QUIZ_ACTIVITY,
            class_id: "class-1",
            class_level: "CE2",
            teacher_id: "teacher-1",
            content,
            status: ActivityStatus::Published,
        }
    }

    #[tokio::test]
    async fn quiz_written_with_its_variations() {
        let storage = test_storage().await;
        let master_id = storage
            .insert_master_question(&question("maître"), "class-1")
            .await
            .unwrap();
        let batch = vec![question("a"), question("b"), question("c")];
        let content = serde_json::json!({"masterQuestionId": master_id, "questions": batch});

        let id = storage
            .insert_quiz(&quiz_activity(&content), &master_id, &batch)
            .await
            .unwrap();

        let activity = storage.get_activity(&id).await.unwrap().expect("activity");
        assert_eq!(activity.status, ActivityStatus::Published);
        assert_eq!(activity.class_level, "CE2");
        let rows = storage.list_variations(&id).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].question.prompt, "c");
    }

    #[tokio::test]
    async fn failed_quiz_leaves_no_activity_behind() {
        let storage = test_storage().await;
        storage
            .conn
            .execute("DROP TABLE quiz_variations", params![])
            .await
            .unwrap();
        let batch = vec![question("a"), question("b")];
        let content = serde_json::json!({"questions": batch});

        let err = storage
            .insert_quiz(&quiz_activity(&content), "master-1", &batch)
            .await
            .unwrap_err();
        assert!(matches!(err, QuizBuilderError::Persistence(_)));
        assert!(storage.list_activities("teacher-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("qb_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.enroll_student("class-1", "eleve-1").await.unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert_eq!(ro.list_students("class-1").await.unwrap(), vec!["eleve-1"]);
        let result = ro.enroll_student("class-1", "eleve-2").await;
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }

    #[tokio::test]
    async fn readonly_requires_existing_file() {
        let tmp = std::env::temp_dir().join(format!("qb_missing_{}.db", Uuid::now_v7()));
        assert!(Storage::open_readonly(&tmp).await.is_err());
    }
}
