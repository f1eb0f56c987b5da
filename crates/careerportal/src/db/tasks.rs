use super::{
    not_found_as, now, today, DbResult, DbTask, NewTask, PortalDbManager, TaskFilter, TaskSort,
    TaskStats, TaskStatus, TaskUpdate, TASK_COLUMNS,
};
use crate::error::PortalError;
use chrono::Days;
use rusqlite::{params, Connection};
use tracing::info;

/// Pending tasks due within this many days count as due soon.
const DUE_SOON_DAYS: u64 = 3;

impl PortalDbManager {
    pub fn insert_task(&self, task: &NewTask) -> DbResult<DbTask> {
        let db = self.conn()?;
        db.execute(
            "INSERT INTO tasks (student_id, title, description, due_date, priority, category,
                                status, assigned_by, completed_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9)",
            params![
                task.student_id,
                task.title,
                task.description,
                task.due_date,
                task.priority,
                task.category,
                TaskStatus::Pending,
                task.assigned_by,
                now(),
            ],
        )?;
        fetch_task(&db, db.last_insert_rowid())
    }

    pub fn get_task(&self, task_id: i64) -> DbResult<DbTask> {
        let db = self.conn()?;
        fetch_task(&db, task_id)
    }

    pub fn list_tasks(&self, student_id: i64, filter: &TaskFilter) -> DbResult<Vec<DbTask>> {
        let order = match filter.sort {
            TaskSort::DueDate => "due_date IS NULL, due_date, task_id",
            TaskSort::Priority => {
                "CASE priority WHEN 'High' THEN 0 WHEN 'Medium' THEN 1 ELSE 2 END,
                 due_date IS NULL, due_date, task_id"
            }
            TaskSort::CreatedAt => "created_at DESC, task_id DESC",
        };

        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE student_id = ?1
               AND (?2 IS NULL OR status = ?2)
               AND (?3 IS NULL OR priority = ?3)
               AND (?4 IS NULL OR category = ?4)
             ORDER BY {order}"
        ))?;
        let rows = stmt.query_map(
            params![student_id, filter.status, filter.priority, filter.category],
            DbTask::from_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn task_stats(&self, student_id: i64) -> DbResult<TaskStats> {
        let tasks = self.list_tasks(student_id, &TaskFilter::default())?;
        let today = today();
        let horizon = today
            .checked_add_days(Days::new(DUE_SOON_DAYS))
            .unwrap_or(today);

        let pending = tasks.iter().filter(|t| t.status == TaskStatus::Pending);
        Ok(TaskStats {
            total: tasks.len(),
            pending: pending.clone().count(),
            completed: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Completed)
                .count(),
            due_soon: pending
                .filter(|t| t.due_date.is_some_and(|d| d >= today && d <= horizon))
                .count(),
        })
    }

    /// Applies a partial update to one of the student's own tasks
    pub fn update_task(
        &self,
        task_id: i64,
        student_id: i64,
        update: &TaskUpdate,
    ) -> DbResult<DbTask> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;
        let current = fetch_task(&tx, task_id)?;
        if current.student_id != student_id {
            return Err(PortalError::not_found("Task"));
        }

        let status = update.status.unwrap_or(current.status);
        let completed_at = match (current.status, status) {
            (TaskStatus::Pending, TaskStatus::Completed) => Some(now()),
            (_, TaskStatus::Pending) => None,
            _ => current.completed_at,
        };

        tx.execute(
            "UPDATE tasks SET title = ?1, description = ?2, due_date = ?3, priority = ?4,
                              category = ?5, status = ?6, completed_at = ?7
             WHERE task_id = ?8",
            params![
                update.title.as_ref().unwrap_or(&current.title),
                update.description.as_ref().or(current.description.as_ref()),
                update.due_date.or(current.due_date),
                update.priority.unwrap_or(current.priority),
                update.category.as_ref().or(current.category.as_ref()),
                status,
                completed_at,
                task_id,
            ],
        )?;
        let updated = fetch_task(&tx, task_id)?;
        tx.commit()?;
        Ok(updated)
    }

    /// Marks one of the student's own tasks completed
    pub fn complete_task(&self, task_id: i64, student_id: i64) -> DbResult<DbTask> {
        let task = self.update_task(
            task_id,
            student_id,
            &TaskUpdate {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            },
        )?;
        info!("Task {task_id} completed by student {student_id}");
        Ok(task)
    }

    /// Deletes a task and returns what it was
    pub fn delete_task(&self, task_id: i64) -> DbResult<DbTask> {
        let db = self.conn()?;
        let task = fetch_task(&db, task_id)?;
        db.execute("DELETE FROM tasks WHERE task_id = ?", [task_id])?;
        Ok(task)
    }
}

fn fetch_task(conn: &Connection, task_id: i64) -> DbResult<DbTask> {
    not_found_as(
        "Task",
        conn.query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE task_id = ?"),
            [task_id],
            DbTask::from_row,
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::TaskPriority;
    use super::*;
    use chrono::NaiveDate;

    fn task(student_id: i64, title: &str, priority: TaskPriority, due: Option<NaiveDate>) -> NewTask {
        NewTask {
            student_id,
            title: title.into(),
            description: None,
            due_date: due,
            priority,
            category: Some("Applications".into()),
            assigned_by: None,
        }
    }

    fn in_days(n: u64) -> NaiveDate {
        today().checked_add_days(Days::new(n)).unwrap()
    }

    #[test]
    fn test_sorting_and_filters() {
        let db = db();
        let s = add_student(&db, "Sam", None);
        db.insert_task(&task(s, "later", TaskPriority::High, Some(in_days(10))))
            .unwrap();
        db.insert_task(&task(s, "soon", TaskPriority::Low, Some(in_days(1))))
            .unwrap();
        db.insert_task(&task(s, "undated", TaskPriority::Medium, None))
            .unwrap();

        let titles = |filter: TaskFilter| -> Vec<String> {
            db.list_tasks(s, &filter)
                .unwrap()
                .into_iter()
                .map(|t| t.title)
                .collect()
        };

        assert_eq!(titles(TaskFilter::default()), ["soon", "later", "undated"]);
        assert_eq!(
            titles(TaskFilter {
                sort: TaskSort::Priority,
                ..Default::default()
            }),
            ["later", "undated", "soon"]
        );
        assert_eq!(
            titles(TaskFilter {
                priority: Some(TaskPriority::Low),
                ..Default::default()
            }),
            ["soon"]
        );
    }

    #[test]
    fn test_stats_and_completion() {
        let db = db();
        let s = add_student(&db, "Sam", None);
        let soon = db
            .insert_task(&task(s, "soon", TaskPriority::Low, Some(in_days(2))))
            .unwrap();
        db.insert_task(&task(s, "later", TaskPriority::Low, Some(in_days(9))))
            .unwrap();

        let stats = db.task_stats(s).unwrap();
        assert_eq!((stats.total, stats.pending, stats.due_soon), (2, 2, 1));

        let done = db.complete_task(soon.task_id, s).unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.completed_at.is_some());

        let stats = db.task_stats(s).unwrap();
        assert_eq!((stats.completed, stats.due_soon), (1, 0));
    }

    #[test]
    fn test_update_keeps_unset_fields_and_checks_owner() {
        let db = db();
        let s = add_student(&db, "Sam", None);
        let other = add_student(&db, "Tia", None);
        let t = db
            .insert_task(&task(s, "essay", TaskPriority::Medium, None))
            .unwrap();

        let updated = db
            .update_task(
                t.task_id,
                s,
                &TaskUpdate {
                    title: Some("personal essay".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.title, "personal essay");
        assert_eq!(updated.category.as_deref(), Some("Applications"));
        assert!(db
            .update_task(t.task_id, other, &TaskUpdate::default())
            .is_err());

        db.delete_task(t.task_id).unwrap();
        assert!(db.get_task(t.task_id).is_err());
    }
}
