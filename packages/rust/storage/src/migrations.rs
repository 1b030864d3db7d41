//! SQL migration definitions for the QuizBuilder database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: master_questions, activities, quiz_variations",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Validated master questions, saved as soon as the teacher accepts one
CREATE TABLE IF NOT EXISTS master_questions (
    id            TEXT PRIMARY KEY,
    class_id      TEXT NOT NULL,
    kind          TEXT,
    question_json TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_master_questions_class ON master_questions(class_id);

-- Published activities (only 'quiz' is produced by the authoring flow)
CREATE TABLE IF NOT EXISTS activities (
    id            TEXT PRIMARY KEY,
    activity_type TEXT NOT NULL,
    class_id      TEXT NOT NULL,
    class_level   TEXT NOT NULL,
    teacher_id    TEXT NOT NULL,
    content_json  TEXT NOT NULL,
    status        TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_activities_teacher ON activities(teacher_id);

-- One row per variation, ordered by position within its activity
CREATE TABLE IF NOT EXISTS quiz_variations (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    activity_id        TEXT NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
    master_question_id TEXT NOT NULL REFERENCES master_questions(id),
    class_id           TEXT NOT NULL,
    position           INTEGER NOT NULL,
    question_json      TEXT NOT NULL,
    UNIQUE(activity_id, position)
);

CREATE INDEX IF NOT EXISTS idx_quiz_variations_activity ON quiz_variations(activity_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Class enrollments and student notifications",
            sql: r#"
CREATE TABLE IF NOT EXISTS enrollments (
    class_id    TEXT NOT NULL,
    student_id  TEXT NOT NULL,
    enrolled_at TEXT NOT NULL,
    PRIMARY KEY (class_id, student_id)
);

CREATE TABLE IF NOT EXISTS notifications (
    id          TEXT PRIMARY KEY,
    student_id  TEXT NOT NULL,
    class_id    TEXT NOT NULL,
    activity_id TEXT NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
    message     TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    is_read     INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_notifications_student ON notifications(student_id);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_ascend_and_record_themselves() {
        let migrations = all_migrations();
        for (i, m) in migrations.iter().enumerate() {
            assert_eq!(m.version as usize, i + 1);
            assert!(
                m.sql
                    .contains(&format!("INSERT INTO schema_migrations (version) VALUES ({})", m.version))
            );
        }
    }
}
