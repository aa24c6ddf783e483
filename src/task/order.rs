//! Display ordering for the live task list.

use std::cmp::Ordering;

use super::Task;

/// Compare two tasks for display.
///
/// Open before closed; closed tasks put missing reports first; then
/// priority (URGENT, NORMAL, LOW); then oldest first, with an unknown
/// creation time counted as the epoch.
pub fn display_order(a: &Task, b: &Task) -> Ordering {
    a.is_done()
        .cmp(&b.is_done())
        .then_with(|| {
            if a.is_done() {
                b.is_missing().cmp(&a.is_missing())
            } else {
                Ordering::Equal
            }
        })
        .then_with(|| a.priority.rank().cmp(&b.priority.rank()))
        .then_with(|| created_millis(a).cmp(&created_millis(b)))
}

fn created_millis(task: &Task) -> i64 {
    task.created_at.map(|t| t.timestamp_millis()).unwrap_or(0)
}

/// Stable sort into display order.
pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(display_order);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Completion, MissingReport, Priority, TaskKind, TaskState};
    use chrono::{DateTime, Utc};

    fn task(id: &str, priority: Priority, created: Option<i64>) -> Task {
        Task {
            id: id.to_string(),
            text: id.to_string(),
            kind: TaskKind::AdHoc,
            standard_time: None,
            priority,
            note: None,
            created_at: created.and_then(DateTime::<Utc>::from_timestamp_millis),
            created_by: None,
            started_at: None,
            missing: None,
            inventory_history: Vec::new(),
            state: TaskState::default(),
            archived_at: None,
        }
    }

    fn closed(mut t: Task) -> Task {
        t.state = TaskState::Completed(Completion::default());
        t
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn open_by_priority_then_age() {
        let mut tasks = vec![
            task("low", Priority::Low, Some(1)),
            task("normal-new", Priority::Normal, Some(50)),
            task("urgent", Priority::Urgent, Some(99)),
            task("normal-old", Priority::Normal, Some(10)),
            task("undated", Priority::Normal, None),
        ];
        sort_tasks(&mut tasks);
        assert_eq!(
            ids(&tasks),
            ["urgent", "undated", "normal-old", "normal-new", "low"]
        );
    }

    #[test]
    fn closed_missing_first_then_priority() {
        let mut missing_low = closed(task("missing-low", Priority::Low, Some(5)));
        missing_low.missing = Some(MissingReport {
            reason: "Other".to_string(),
            reported_by: None,
        });
        let mut tasks = vec![
            closed(task("done-urgent", Priority::Urgent, Some(1))),
            task("open-low", Priority::Low, Some(100)),
            missing_low,
            closed(task("done-normal", Priority::Normal, Some(0))),
        ];
        sort_tasks(&mut tasks);
        assert_eq!(
            ids(&tasks),
            ["open-low", "missing-low", "done-urgent", "done-normal"]
        );
    }

    #[test]
    fn equal_keys_keep_input_order_and_sorting_is_idempotent() {
        let mut tasks = vec![
            task("a", Priority::Normal, Some(7)),
            task("b", Priority::Normal, Some(7)),
            task("c", Priority::Normal, Some(7)),
        ];
        sort_tasks(&mut tasks);
        assert_eq!(ids(&tasks), ["a", "b", "c"]);
        let once = tasks.clone();
        sort_tasks(&mut tasks);
        assert_eq!(tasks, once);
    }

    #[test]
    fn shuffled_input_with_distinct_keys_sorts_identically() {
        let base = vec![
            task("u1", Priority::Urgent, Some(1)),
            task("u2", Priority::Urgent, Some(2)),
            task("n1", Priority::Normal, Some(1)),
            closed(task("c1", Priority::Urgent, Some(3))),
            task("l1", Priority::Low, Some(0)),
        ];
        let mut expected = base.clone();
        sort_tasks(&mut expected);

        let mut reversed: Vec<Task> = base.iter().rev().cloned().collect();
        sort_tasks(&mut reversed);
        assert_eq!(ids(&reversed), ids(&expected));

        let mut rotated = base.clone();
        rotated.rotate_left(2);
        sort_tasks(&mut rotated);
        assert_eq!(ids(&rotated), ids(&expected));
    }
}
