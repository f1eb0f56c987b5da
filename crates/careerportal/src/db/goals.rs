use super::{
    not_found_as, now, DbGoal, DbMilestone, DbResult, GoalStatus, GoalUpdate, GoalView,
    MilestoneStatus, MilestoneUpdate, NewGoal, NewMilestone, PortalDbManager, GOAL_COLUMNS,
    MILESTONE_COLUMNS,
};
use crate::error::PortalError;
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use tracing::info;

impl PortalDbManager {
    pub fn insert_goal(&self, goal: &NewGoal) -> DbResult<DbGoal> {
        check_dates(goal.start_date, goal.target_date)?;
        let db = self.conn()?;
        db.execute(
            "INSERT INTO goals (student_id, title, description, start_date, target_date,
                                status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                goal.student_id,
                goal.title,
                goal.description,
                goal.start_date,
                goal.target_date,
                GoalStatus::InProgress,
                now(),
            ],
        )?;
        fetch_goal(&db, db.last_insert_rowid(), goal.student_id)
    }

    /// The student's goals with their milestones, soonest target first
    pub fn list_goals(&self, student_id: i64) -> DbResult<Vec<GoalView>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {GOAL_COLUMNS} FROM goals
             WHERE student_id = ?
             ORDER BY target_date IS NULL, target_date, goal_id"
        ))?;
        let goals = stmt
            .query_map([student_id], DbGoal::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut views = Vec::with_capacity(goals.len());
        for goal in goals {
            views.push(GoalView {
                milestones: load_milestones(&db, goal.goal_id)?,
                goal,
            });
        }
        Ok(views)
    }

    /// Applies a partial update to one of the student's own goals
    pub fn update_goal(
        &self,
        goal_id: i64,
        student_id: i64,
        update: &GoalUpdate,
    ) -> DbResult<DbGoal> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;
        let current = fetch_goal(&tx, goal_id, student_id)?;
        let target_date = update.target_date.or(current.target_date);
        check_dates(current.start_date, target_date)?;

        tx.execute(
            "UPDATE goals SET title = ?1, description = ?2, target_date = ?3, status = ?4
             WHERE goal_id = ?5",
            params![
                update.title.as_ref().unwrap_or(&current.title),
                update.description.as_ref().or(current.description.as_ref()),
                target_date,
                update.status.unwrap_or(current.status),
                goal_id,
            ],
        )?;
        let updated = fetch_goal(&tx, goal_id, student_id)?;
        tx.commit()?;
        Ok(updated)
    }

    /// Deletes one of the student's goals together with its milestones
    pub fn delete_goal(&self, goal_id: i64, student_id: i64) -> DbResult<DbGoal> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;
        let goal = fetch_goal(&tx, goal_id, student_id)?;
        let milestones = tx.execute("DELETE FROM goal_milestones WHERE goal_id = ?", [goal_id])?;
        tx.execute("DELETE FROM goals WHERE goal_id = ?", [goal_id])?;
        tx.commit()?;

        info!("Goal {goal_id} of student {student_id} deleted with {milestones} milestone(s)");
        Ok(goal)
    }

    pub fn insert_milestone(
        &self,
        student_id: i64,
        milestone: &NewMilestone,
    ) -> DbResult<DbMilestone> {
        let db = self.conn()?;
        fetch_goal(&db, milestone.goal_id, student_id)?;
        db.execute(
            "INSERT INTO goal_milestones (goal_id, title, description, due_date, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                milestone.goal_id,
                milestone.title,
                milestone.description,
                milestone.due_date,
                MilestoneStatus::Pending,
                now(),
            ],
        )?;
        fetch_milestone(&db, db.last_insert_rowid(), student_id)
    }

    /// Milestones of one of the student's goals, by due date
    pub fn list_milestones(&self, goal_id: i64, student_id: i64) -> DbResult<Vec<DbMilestone>> {
        let db = self.conn()?;
        fetch_goal(&db, goal_id, student_id)?;
        load_milestones(&db, goal_id)
    }

    pub fn update_milestone(
        &self,
        milestone_id: i64,
        student_id: i64,
        update: &MilestoneUpdate,
    ) -> DbResult<DbMilestone> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;
        let current = fetch_milestone(&tx, milestone_id, student_id)?;

        tx.execute(
            "UPDATE goal_milestones SET title = ?1, description = ?2, due_date = ?3, status = ?4
             WHERE milestone_id = ?5",
            params![
                update.title.as_ref().unwrap_or(&current.title),
                update.description.as_ref().or(current.description.as_ref()),
                update.due_date.or(current.due_date),
                update.status.unwrap_or(current.status),
                milestone_id,
            ],
        )?;
        let updated = fetch_milestone(&tx, milestone_id, student_id)?;
        tx.commit()?;
        Ok(updated)
    }

    pub fn delete_milestone(&self, milestone_id: i64, student_id: i64) -> DbResult<DbMilestone> {
        let db = self.conn()?;
        let milestone = fetch_milestone(&db, milestone_id, student_id)?;
        db.execute(
            "DELETE FROM goal_milestones WHERE milestone_id = ?",
            [milestone_id],
        )?;
        Ok(milestone)
    }
}

fn check_dates(start: Option<NaiveDate>, target: Option<NaiveDate>) -> DbResult<()> {
    match (start, target) {
        (Some(start), Some(target)) if target < start => Err(PortalError::invalid(
            "Target date cannot be before the start date",
        )),
        _ => Ok(()),
    }
}

fn fetch_goal(conn: &Connection, goal_id: i64, student_id: i64) -> DbResult<DbGoal> {
    not_found_as(
        "Goal",
        conn.query_row(
            &format!("SELECT {GOAL_COLUMNS} FROM goals WHERE goal_id = ?1 AND student_id = ?2"),
            [goal_id, student_id],
            DbGoal::from_row,
        ),
    )
}

fn fetch_milestone(conn: &Connection, milestone_id: i64, student_id: i64) -> DbResult<DbMilestone> {
    not_found_as(
        "Milestone",
        conn.query_row(
            &format!(
                "SELECT {MILESTONE_COLUMNS} FROM goal_milestones
                 WHERE milestone_id = ?1
                   AND goal_id IN (SELECT goal_id FROM goals WHERE student_id = ?2)"
            ),
            [milestone_id, student_id],
            DbMilestone::from_row,
        ),
    )
}

fn load_milestones(conn: &Connection, goal_id: i64) -> DbResult<Vec<DbMilestone>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MILESTONE_COLUMNS} FROM goal_milestones
         WHERE goal_id = ?
         ORDER BY due_date IS NULL, due_date, milestone_id"
    ))?;
    let rows = stmt.query_map([goal_id], DbMilestone::from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
