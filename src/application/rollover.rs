use crate::domain::models::{Task, TaskStatus};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::task_repository::TaskRepository;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;
type IdProvider = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloverOutcome {
    /// The day already had tasks; nothing was derived.
    Existing(Vec<Task>),
    /// Seeded from `source_day`. `dropped` counts completed one-off tasks.
    CarriedForward {
        source_day: NaiveDate,
        tasks: Vec<Task>,
        dropped: usize,
    },
    NoHistory,
}

impl RolloverOutcome {
    pub fn tasks(&self) -> &[Task] {
        match self {
            Self::Existing(tasks) | Self::CarriedForward { tasks, .. } => tasks,
            Self::NoHistory => &[],
        }
    }

    pub fn into_tasks(self) -> Vec<Task> {
        match self {
            Self::Existing(tasks) | Self::CarriedForward { tasks, .. } => tasks,
            Self::NoHistory => Vec::new(),
        }
    }
}

pub fn new_task_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// Applies the survival rule to one prior-day task. Every survivor is a new
/// task with a fresh id; the prior day's record is never touched.
pub fn carry_forward(task: &Task, id: String, now: DateTime<Utc>) -> Option<Task> {
    if !task.is_recurring && task.status == TaskStatus::Done {
        return None;
    }
    let status = if task.is_recurring {
        TaskStatus::Todo
    } else {
        task.status
    };
    Some(Task {
        id,
        status,
        created_at: now,
        ..task.clone()
    })
}

pub struct RolloverEngine<R>
where
    R: TaskRepository,
{
    repository: Arc<R>,
    now_provider: NowProvider,
    id_provider: IdProvider,
}

impl<R> RolloverEngine<R>
where
    R: TaskRepository,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            now_provider: Arc::new(Utc::now),
            id_provider: Arc::new(new_task_id),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn with_id_provider(mut self, id_provider: IdProvider) -> Self {
        self.id_provider = id_provider;
        self
    }

    /// Returns the task set for `date`, seeding it from the most recent
    /// earlier day the first time the day is accessed.
    pub fn tasks_for_date(&self, date: NaiveDate) -> Result<RolloverOutcome, InfraError> {
        let existing = self
            .repository
            .load_tasks_for_date(date)
            .map_err(|error| InfraError::dependency("load_tasks_for_date", date, error))?;
        if !existing.is_empty() {
            debug!(%date, count = existing.len(), "day already seeded");
            return Ok(RolloverOutcome::Existing(existing));
        }

        let Some(source_day) = self
            .repository
            .load_most_recent_date_before(date)
            .map_err(|error| InfraError::dependency("load_most_recent_date_before", date, error))?
        else {
            info!(%date, "no earlier day with tasks; nothing to roll over");
            return Ok(RolloverOutcome::NoHistory);
        };

        let previous = self
            .repository
            .load_tasks_for_date(source_day)
            .map_err(|error| InfraError::dependency("load_tasks_for_date", source_day, error))?;

        let now = (self.now_provider)();
        let tasks = previous
            .iter()
            .filter_map(|task| carry_forward(task, (self.id_provider)(), now))
            .collect::<Vec<_>>();
        let dropped = previous.len() - tasks.len();

        self.repository
            .save_tasks_for_date(date, &tasks)
            .map_err(|error| InfraError::dependency("save_tasks_for_date", date, error))?;

        info!(
            %date,
            %source_day,
            carried = tasks.len(),
            dropped,
            "rolled tasks forward"
        );
        Ok(RolloverOutcome::CarriedForward {
            source_day,
            tasks,
            dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Period, Quadrant};
    use crate::infrastructure::task_repository::InMemoryTaskRepository;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn day(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn task(id: &str, status: TaskStatus, is_recurring: bool) -> Task {
        Task {
            id: id.to_string(),
            title: format!("Task {id}"),
            notes: "notes".to_string(),
            quadrant: Quadrant::Q1,
            period: Period::Evening,
            status,
            active: false,
            is_recurring,
            created_at: fixed_time("2026-02-15T07:00:00Z"),
        }
    }

    fn engine(repository: Arc<InMemoryTaskRepository>) -> RolloverEngine<InMemoryTaskRepository> {
        let counter = Arc::new(AtomicUsize::new(0));
        RolloverEngine::new(repository)
            .with_now_provider(Arc::new(|| fixed_time("2026-02-16T06:00:00Z")))
            .with_id_provider(Arc::new(move || {
                format!("new-{}", counter.fetch_add(1, Ordering::SeqCst))
            }))
    }

    fn status_strategy() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::Todo),
            Just(TaskStatus::Doing),
            Just(TaskStatus::Done)
        ]
    }

    #[test]
    fn survival_rule_per_task_kind() {
        let prior = vec![
            task("recurring-done", TaskStatus::Done, true),
            task("oneoff-doing", TaskStatus::Doing, false),
            task("oneoff-done", TaskStatus::Done, false),
            task("oneoff-todo", TaskStatus::Todo, false),
        ];
        let repository = Arc::new(InMemoryTaskRepository::default());
        repository
            .save_tasks_for_date(day("2026-02-15"), &prior)
            .expect("seed prior day");

        let outcome = engine(Arc::clone(&repository))
            .tasks_for_date(day("2026-02-16"))
            .expect("rollover");

        let RolloverOutcome::CarriedForward {
            source_day,
            tasks,
            dropped,
        } = outcome
        else {
            panic!("expected carried forward outcome");
        };
        assert_eq!(source_day, day("2026-02-15"));
        assert_eq!(dropped, 1);
        let titles = tasks.iter().map(|task| task.title.as_str()).collect::<Vec<_>>();
        assert_eq!(
            titles,
            vec!["Task recurring-done", "Task oneoff-doing", "Task oneoff-todo"]
        );
        assert_eq!(tasks[0].status, TaskStatus::Todo);
        assert_eq!(tasks[1].status, TaskStatus::Doing);
        assert!(tasks.iter().all(|task| task.id.starts_with("new-")));
        assert!(tasks
            .iter()
            .all(|task| task.created_at == fixed_time("2026-02-16T06:00:00Z")));
        assert!(tasks.iter().all(|task| !task.active && task.notes == "notes"));

        let untouched = repository
            .load_tasks_for_date(day("2026-02-15"))
            .expect("load prior day");
        assert_eq!(untouched, prior);
    }

    #[test]
    fn second_call_returns_persisted_set_unchanged() {
        let repository = Arc::new(InMemoryTaskRepository::default());
        repository
            .save_tasks_for_date(day("2026-02-15"), &[task("a", TaskStatus::Todo, true)])
            .expect("seed prior day");
        let engine = RolloverEngine::new(Arc::clone(&repository));

        let first = engine
            .tasks_for_date(day("2026-02-16"))
            .expect("first call")
            .into_tasks();
        let second = engine.tasks_for_date(day("2026-02-16")).expect("second call");

        assert_eq!(second, RolloverOutcome::Existing(first));
    }

    #[test]
    fn no_history_is_an_empty_result() {
        let repository = Arc::new(InMemoryTaskRepository::default());
        let outcome = engine(repository)
            .tasks_for_date(day("2026-02-16"))
            .expect("rollover");
        assert_eq!(outcome, RolloverOutcome::NoHistory);
        assert!(outcome.tasks().is_empty());
    }

    #[test]
    fn skips_back_to_the_most_recent_day_with_tasks() {
        let repository = Arc::new(InMemoryTaskRepository::default());
        repository
            .save_tasks_for_date(day("2026-02-01"), &[task("old", TaskStatus::Todo, false)])
            .expect("seed");
        repository
            .save_tasks_for_date(day("2026-02-12"), &[task("recent", TaskStatus::Todo, false)])
            .expect("seed");

        let outcome = engine(repository)
            .tasks_for_date(day("2026-02-16"))
            .expect("rollover");
        match outcome {
            RolloverOutcome::CarriedForward { source_day, tasks, .. } => {
                assert_eq!(source_day, day("2026-02-12"));
                assert_eq!(tasks[0].title, "Task recent");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn unreadable_repository_is_fatal() {
        let repository = Arc::new(InMemoryTaskRepository::default());
        repository.set_unavailable(true);
        let result = engine(repository).tasks_for_date(day("2026-02-16"));
        match result {
            Err(InfraError::Dependency { operation, day: failed_day, .. }) => {
                assert_eq!(operation, "load_tasks_for_date");
                assert_eq!(failed_day, day("2026-02-16"));
            }
            other => panic!("expected dependency error, got {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn carried_set_follows_survival_rule(
            kinds in proptest::collection::vec((status_strategy(), any::<bool>()), 0..24)
        ) {
            let prior = kinds
                .iter()
                .enumerate()
                .map(|(index, (status, recurring))| task(&format!("t{index}"), *status, *recurring))
                .collect::<Vec<_>>();
            let repository = Arc::new(InMemoryTaskRepository::default());
            repository.save_tasks_for_date(day("2026-02-15"), &prior).expect("seed");

            let carried = engine(repository)
                .tasks_for_date(day("2026-02-16"))
                .expect("rollover")
                .into_tasks();
            let carried_titles = carried.iter().map(|task| task.title.clone()).collect::<HashSet<_>>();
            let prior_ids = prior.iter().map(|task| task.id.clone()).collect::<HashSet<_>>();

            for prior_task in &prior {
                let copy = carried.iter().find(|task| task.title == prior_task.title);
                if prior_task.is_recurring {
                    let copy = copy.expect("recurring task survives");
                    prop_assert_eq!(copy.status, TaskStatus::Todo);
                } else if prior_task.status == TaskStatus::Done {
                    prop_assert!(!carried_titles.contains(&prior_task.title));
                } else {
                    let copy = copy.expect("open task survives");
                    prop_assert_eq!(copy.status, prior_task.status);
                }
            }
            prop_assert!(carried.iter().all(|task| !prior_ids.contains(&task.id)));
        }
    }
}
