//! SQLite-backed repository.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

use crate::config::RoteConfig;
use crate::error::{RoteError, RoteResult};
use crate::store::Repository;
use crate::types::{Item, Learner, LearnerStatistics, PendingTask, Progress, QuestionKind};

/// SQLite-backed repository.
pub struct SqliteRepository {
    conn: Mutex<Connection>,
    /// Tick interval assigned to learners created on first contact.
    default_interval_minutes: u32,
}

impl SqliteRepository {
    /// Create a repository at the given path.
    pub fn new(path: impl AsRef<Path>) -> RoteResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
            default_interval_minutes: 30,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open the repository at the configured path, creating parent
    /// directories as needed. Learners created on first contact get the
    /// configured default tick interval.
    pub fn from_config(config: &RoteConfig) -> RoteResult<Self> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut store = Self::new(&config.db_path)?;
        store.default_interval_minutes = config.default_interval_minutes;
        Ok(store)
    }

    /// Create an in-memory repository (for testing).
    pub fn in_memory() -> RoteResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            default_interval_minutes: 30,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> RoteResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS learners (
                id TEXT PRIMARY KEY,
                external_id TEXT NOT NULL UNIQUE,
                active INTEGER NOT NULL DEFAULT 0,
                interval_minutes INTEGER NOT NULL DEFAULT 30,
                suppressed_until TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS items (
                id TEXT PRIMARY KEY,
                source_term TEXT NOT NULL UNIQUE,
                target_term TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS progress (
                id TEXT PRIMARY KEY,
                learner_id TEXT NOT NULL,
                item_id TEXT NOT NULL,
                score INTEGER NOT NULL DEFAULT 0,
                last_reviewed TEXT,
                next_due TEXT NOT NULL,
                total_attempts INTEGER NOT NULL DEFAULT 0,
                correct_attempts INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                UNIQUE (learner_id, item_id),
                FOREIGN KEY (learner_id) REFERENCES learners(id) ON DELETE CASCADE,
                FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_progress_learner ON progress(learner_id);
            CREATE INDEX IF NOT EXISTS idx_progress_due ON progress(learner_id, next_due);

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                learner_id TEXT NOT NULL,
                item_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                content TEXT NOT NULL,
                answer TEXT,
                outcome INTEGER,
                feedback TEXT,
                issued_at TEXT NOT NULL,
                FOREIGN KEY (learner_id) REFERENCES learners(id) ON DELETE CASCADE,
                FOREIGN KEY (item_id) REFERENCES items(id)
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_learner ON tasks(learner_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_pending ON tasks(learner_id, outcome);
        "#,
        )?;
        Ok(())
    }

    fn parse_datetime(s: &str) -> RoteResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RoteError::parse(e.to_string()))
    }

    fn parse_uuid(s: &str) -> RoteResult<Uuid> {
        Uuid::parse_str(s).map_err(|e| RoteError::parse(e.to_string()))
    }

    fn row_to_learner(row: &rusqlite::Row<'_>) -> RoteResult<Learner> {
        let id: String = row.get(0)?;
        let external_id: String = row.get(1)?;
        let active: i32 = row.get(2)?;
        let interval_minutes: u32 = row.get(3)?;
        let suppressed_until: Option<String> = row.get(4)?;
        let created_at: String = row.get(5)?;

        Ok(Learner {
            id: Self::parse_uuid(&id)?,
            external_id,
            active: active != 0,
            interval_minutes,
            suppressed_until: suppressed_until
                .map(|s| Self::parse_datetime(&s))
                .transpose()?,
            created_at: Self::parse_datetime(&created_at)?,
        })
    }

    fn row_to_item(row: &rusqlite::Row<'_>) -> RoteResult<Item> {
        let id: String = row.get(0)?;
        let source_term: String = row.get(1)?;
        let target_term: String = row.get(2)?;
        let created_at: String = row.get(3)?;

        Ok(Item {
            id: Self::parse_uuid(&id)?,
            source_term,
            target_term,
            created_at: Self::parse_datetime(&created_at)?,
        })
    }

    fn row_to_progress(row: &rusqlite::Row<'_>) -> RoteResult<Progress> {
        let id: String = row.get(0)?;
        let learner_id: String = row.get(1)?;
        let item_id: String = row.get(2)?;
        let score: u8 = row.get(3)?;
        let last_reviewed: Option<String> = row.get(4)?;
        let next_due: String = row.get(5)?;
        let total_attempts: u32 = row.get(6)?;
        let correct_attempts: u32 = row.get(7)?;
        let created_at: String = row.get(8)?;

        Ok(Progress {
            id: Self::parse_uuid(&id)?,
            learner_id: Self::parse_uuid(&learner_id)?,
            item_id: Self::parse_uuid(&item_id)?,
            score,
            last_reviewed: last_reviewed.map(|s| Self::parse_datetime(&s)).transpose()?,
            next_due: Self::parse_datetime(&next_due)?,
            total_attempts,
            correct_attempts,
            created_at: Self::parse_datetime(&created_at)?,
        })
    }

    fn row_to_task(row: &rusqlite::Row<'_>) -> RoteResult<PendingTask> {
        let id: String = row.get(0)?;
        let learner_id: String = row.get(1)?;
        let item_id: String = row.get(2)?;
        let kind: String = row.get(3)?;
        let content: String = row.get(4)?;
        let answer: Option<String> = row.get(5)?;
        let outcome: Option<i32> = row.get(6)?;
        let feedback: Option<String> = row.get(7)?;
        let issued_at: String = row.get(8)?;

        Ok(PendingTask {
            id: Self::parse_uuid(&id)?,
            learner_id: Self::parse_uuid(&learner_id)?,
            item_id: Self::parse_uuid(&item_id)?,
            kind: kind
                .parse::<QuestionKind>()
                .map_err(|e| RoteError::parse(format!("unknown question kind: {}", e)))?,
            content: serde_json::from_str(&content)?,
            answer,
            outcome: outcome.map(|o| o != 0),
            feedback,
            issued_at: Self::parse_datetime(&issued_at)?,
        })
    }
}

const SELECT_LEARNER: &str =
    "SELECT id, external_id, active, interval_minutes, suppressed_until, created_at FROM learners";
const SELECT_ITEM: &str = "SELECT id, source_term, target_term, created_at FROM items";
const SELECT_PROGRESS: &str = "SELECT id, learner_id, item_id, score, last_reviewed, next_due, \
     total_attempts, correct_attempts, created_at FROM progress";
const SELECT_TASK: &str =
    "SELECT id, learner_id, item_id, kind, content, answer, outcome, feedback, issued_at FROM tasks";

impl Repository for SqliteRepository {
    fn get_learner(&self, id: Uuid) -> RoteResult<Option<Learner>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", SELECT_LEARNER))?;
        stmt.query_row(params![id.to_string()], |row| Ok(Self::row_to_learner(row)))
            .optional()?
            .transpose()
    }

    fn get_learner_by_external_id(&self, external_id: &str) -> RoteResult<Option<Learner>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("{} WHERE external_id = ?1", SELECT_LEARNER))?;
        stmt.query_row(params![external_id], |row| Ok(Self::row_to_learner(row)))
            .optional()?
            .transpose()
    }

    fn get_or_create_learner(&self, external_id: &str) -> RoteResult<Learner> {
        if let Some(learner) = self.get_learner_by_external_id(external_id)? {
            return Ok(learner);
        }

        let mut learner = Learner::new(external_id);
        learner.interval_minutes = self.default_interval_minutes;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"INSERT INTO learners (id, external_id, active, interval_minutes, suppressed_until, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                learner.id.to_string(),
                learner.external_id,
                learner.active as i32,
                learner.interval_minutes,
                learner.suppressed_until.map(|dt| dt.to_rfc3339()),
                learner.created_at.to_rfc3339(),
            ],
        )?;
        Ok(learner)
    }

    fn update_learner(&self, learner: &Learner) -> RoteResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            r#"UPDATE learners SET external_id = ?2, active = ?3, interval_minutes = ?4,
               suppressed_until = ?5 WHERE id = ?1"#,
            params![
                learner.id.to_string(),
                learner.external_id,
                learner.active as i32,
                learner.interval_minutes,
                learner.suppressed_until.map(|dt| dt.to_rfc3339()),
            ],
        )?;
        if changed == 0 {
            return Err(RoteError::learner_not_found(learner.id));
        }
        Ok(())
    }

    fn list_active_learners(&self) -> RoteResult<Vec<Learner>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("{} WHERE active = 1", SELECT_LEARNER))?;
        let results = stmt.query_map([], |row| Ok(Self::row_to_learner(row)))?;
        results
            .map(|r| r.map_err(RoteError::from).and_then(|inner| inner))
            .collect()
    }

    fn get_item(&self, id: Uuid) -> RoteResult<Option<Item>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", SELECT_ITEM))?;
        stmt.query_row(params![id.to_string()], |row| Ok(Self::row_to_item(row)))
            .optional()?
            .transpose()
    }

    fn get_or_create_item(&self, source_term: &str, target_term: &str) -> RoteResult<Item> {
        let normalized = Item::normalize(source_term);
        {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn.prepare(&format!("{} WHERE source_term = ?1", SELECT_ITEM))?;
            if let Some(item) = stmt
                .query_row(params![normalized], |row| Ok(Self::row_to_item(row)))
                .optional()?
                .transpose()?
            {
                return Ok(item);
            }
        }

        let item = Item::new(source_term, target_term);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO items (id, source_term, target_term, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                item.id.to_string(),
                item.source_term,
                item.target_term,
                item.created_at.to_rfc3339(),
            ],
        )?;
        Ok(item)
    }

    fn list_items(&self) -> RoteResult<Vec<Item>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(SELECT_ITEM)?;
        let results = stmt.query_map([], |row| Ok(Self::row_to_item(row)))?;
        results
            .map(|r| r.map_err(RoteError::from).and_then(|inner| inner))
            .collect()
    }

    fn get_progress(&self, learner_id: Uuid, item_id: Uuid) -> RoteResult<Option<Progress>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE learner_id = ?1 AND item_id = ?2",
            SELECT_PROGRESS
        ))?;
        stmt.query_row(
            params![learner_id.to_string(), item_id.to_string()],
            |row| Ok(Self::row_to_progress(row)),
        )
        .optional()?
        .transpose()
    }

    fn ensure_progress(&self, learner_id: Uuid, item_id: Uuid) -> RoteResult<Progress> {
        if let Some(progress) = self.get_progress(learner_id, item_id)? {
            return Ok(progress);
        }

        let progress = Progress::new(learner_id, item_id);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"INSERT INTO progress
               (id, learner_id, item_id, score, last_reviewed, next_due,
                total_attempts, correct_attempts, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            params![
                progress.id.to_string(),
                progress.learner_id.to_string(),
                progress.item_id.to_string(),
                progress.score,
                progress.last_reviewed.map(|dt| dt.to_rfc3339()),
                progress.next_due.to_rfc3339(),
                progress.total_attempts,
                progress.correct_attempts,
                progress.created_at.to_rfc3339(),
            ],
        )?;
        Ok(progress)
    }

    fn due_for_review(
        &self,
        learner_id: Uuid,
        now: DateTime<Utc>,
        limit: usize,
    ) -> RoteResult<Vec<Progress>> {
        let conn = self.conn.lock().unwrap();
        // Priority: never-reviewed first, then lowest score, then oldest due.
        let mut stmt = conn.prepare(&format!(
            r#"{} WHERE learner_id = ?1 AND next_due <= ?2
               ORDER BY (last_reviewed IS NULL) DESC, score ASC, next_due ASC
               LIMIT ?3"#,
            SELECT_PROGRESS
        ))?;

        let results = stmt.query_map(
            params![learner_id.to_string(), now.to_rfc3339(), limit as i64],
            |row| Ok(Self::row_to_progress(row)),
        )?;
        results
            .map(|r| r.map_err(RoteError::from).and_then(|inner| inner))
            .collect()
    }

    fn update_progress(&self, progress: &Progress) -> RoteResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            r#"UPDATE progress SET score = ?2, last_reviewed = ?3, next_due = ?4,
               total_attempts = ?5, correct_attempts = ?6 WHERE id = ?1"#,
            params![
                progress.id.to_string(),
                progress.score,
                progress.last_reviewed.map(|dt| dt.to_rfc3339()),
                progress.next_due.to_rfc3339(),
                progress.total_attempts,
                progress.correct_attempts,
            ],
        )?;
        if changed == 0 {
            return Err(RoteError::NotFound {
                message: format!("progress '{}' not found", progress.id),
                code: crate::error::ErrorCode::ProgressNotFound,
                entity_id: Some(progress.id),
            });
        }
        Ok(())
    }

    fn statistics(&self, learner_id: Uuid) -> RoteResult<LearnerStatistics> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"SELECT COUNT(*),
                      COALESCE(SUM(score >= 90), 0),
                      COALESCE(SUM(score > 0 AND score < 90), 0),
                      COALESCE(SUM(score = 0), 0),
                      COALESCE(AVG(score), 0.0)
               FROM progress WHERE learner_id = ?1"#,
        )?;

        let stats = stmt.query_row(params![learner_id.to_string()], |row| {
            Ok(LearnerStatistics {
                total_items: row.get(0)?,
                learned_items: row.get(1)?,
                in_progress_items: row.get(2)?,
                new_items: row.get(3)?,
                average_score: row.get(4)?,
            })
        })?;
        Ok(stats)
    }

    fn insert_task(&self, task: &PendingTask) -> RoteResult<()> {
        let content = serde_json::to_string(&task.content)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"INSERT INTO tasks
               (id, learner_id, item_id, kind, content, answer, outcome, feedback, issued_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            params![
                task.id.to_string(),
                task.learner_id.to_string(),
                task.item_id.to_string(),
                task.kind.to_string(),
                content,
                task.answer,
                task.outcome.map(|o| o as i32),
                task.feedback,
                task.issued_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_task(&self, id: Uuid) -> RoteResult<Option<PendingTask>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", SELECT_TASK))?;
        stmt.query_row(params![id.to_string()], |row| Ok(Self::row_to_task(row)))
            .optional()?
            .transpose()
    }

    fn find_pending_task(&self, learner_id: Uuid) -> RoteResult<Option<PendingTask>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE learner_id = ?1 AND outcome IS NULL ORDER BY issued_at DESC LIMIT 1",
            SELECT_TASK
        ))?;
        stmt.query_row(params![learner_id.to_string()], |row| {
            Ok(Self::row_to_task(row))
        })
        .optional()?
        .transpose()
    }

    fn commit_grade(
        &self,
        task_id: Uuid,
        answer: &str,
        is_correct: bool,
        feedback: &str,
        progress: &Progress,
    ) -> RoteResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        // Update-if-unset: a concurrent grade loses here and the stored
        // outcome is preserved.
        let changed = tx.execute(
            r#"UPDATE tasks SET answer = ?2, outcome = ?3, feedback = ?4
               WHERE id = ?1 AND outcome IS NULL"#,
            params![task_id.to_string(), answer, is_correct as i32, feedback],
        )?;
        if changed == 0 {
            let exists: bool = tx
                .query_row(
                    "SELECT 1 FROM tasks WHERE id = ?1",
                    params![task_id.to_string()],
                    |_| Ok(true),
                )
                .optional()?
                .unwrap_or(false);
            // Rolls back on drop.
            return if exists {
                Err(RoteError::already_answered(task_id))
            } else {
                Err(RoteError::task_not_found(task_id))
            };
        }

        tx.execute(
            r#"UPDATE progress SET score = ?2, last_reviewed = ?3, next_due = ?4,
               total_attempts = ?5, correct_attempts = ?6 WHERE id = ?1"#,
            params![
                progress.id.to_string(),
                progress.score,
                progress.last_reviewed.map(|dt| dt.to_rfc3339()),
                progress.next_due.to_rfc3339(),
                progress.total_attempts,
                progress.correct_attempts,
            ],
        )?;

        tx.commit()?;
        Ok(())
    }
}
