//! Expands recurring templates into dated task instances.
//!
//! A run is a single sequential pass over the actor's active templates. For
//! each one the next due date on or after today is computed; if it falls
//! inside the horizon and no instance exists yet for that
//! `(template, due date)` pair, a new instance is inserted in the bucket the
//! due date classifies into.
//!
//! Correctness never depends on when the engine last ran: the existence check
//! plus the repository's uniqueness constraint make any number of runs, even
//! overlapping ones, produce at most one instance per pair.

use chrono::{DateTime, Duration, Local, NaiveDate};
use tracing::{debug, error, info, info_span, warn};

use crate::bucket::classify;
use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;
use crate::models::{NewInstance, RecurringTemplate, TaskInstance};
use crate::recurrence::{MonthlyFallback, Recurrence};
use crate::repository::TaskRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Instances are only created for due dates in `today..=today + horizon_days`.
    pub horizon_days: i64,
    pub monthly_fallback: MonthlyFallback,
}

impl EngineConfig {
    pub const DEFAULT_HORIZON_DAYS: i64 = 14;
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            horizon_days: Self::DEFAULT_HORIZON_DAYS,
            monthly_fallback: MonthlyFallback::default(),
        }
    }
}

/// Outcome of one engine run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// When the run started. Callers may persist it as a last-run hint.
    pub ran_at: DateTime<Local>,
    /// The calendar day the run treated as today.
    pub today: NaiveDate,
    /// False when there was no actor and nothing was attempted.
    pub authenticated: bool,
    /// Instances inserted by this run.
    pub instances: Vec<TaskInstance>,
    /// Templates whose instance already existed (including lost insert races).
    pub already_present: usize,
    /// Templates whose next due date lies beyond the horizon.
    pub deferred: usize,
    /// Templates whose rule could not be parsed.
    pub malformed: usize,
    /// Templates skipped because the repository failed.
    pub failed: usize,
}

impl RunReport {
    fn empty(ran_at: DateTime<Local>, today: NaiveDate) -> Self {
        RunReport {
            ran_at,
            today,
            authenticated: false,
            instances: Vec::new(),
            already_present: 0,
            deferred: 0,
            malformed: 0,
            failed: 0,
        }
    }

    /// Number of instances created.
    pub fn created(&self) -> usize {
        self.instances.len()
    }
}

/// What happened to a single template during a run.
#[derive(Debug)]
enum Outcome {
    Created(TaskInstance),
    AlreadyPresent,
    Deferred(NaiveDate),
    Malformed,
    Failed(StoreError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Engine { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs one pass over the current actor's active templates.
    ///
    /// Never fails: per-template problems are logged, counted in the report
    /// and retried naturally on the next run.
    pub fn run<R, C>(&self, repo: &mut R, clock: &C) -> RunReport
    where
        R: TaskRepository + ?Sized,
        C: Clock + ?Sized,
    {
        let ran_at = clock.now();
        let today = clock.today();
        let mut report = RunReport::empty(ran_at, today);

        let Some(owner) = repo.current_user_id() else {
            debug!("no authenticated owner; skipping recurring task generation");
            return report;
        };
        report.authenticated = true;

        let _span = info_span!("recurring_engine", owner = %owner, %today).entered();

        let templates = match repo.list_active_recurring_templates(&owner) {
            Ok(templates) => templates,
            Err(e) => {
                error!(error = %e, "failed to load recurring templates");
                return report;
            }
        };
        debug!(count = templates.len(), "loaded active recurring templates");

        for template in &templates {
            match self.process(&mut *repo, template, today) {
                Outcome::Created(instance) => {
                    info!(template = template.id, instance = instance.id, due = %instance.due_date,
                        status = %instance.status, "created recurring instance");
                    report.instances.push(instance);
                }
                Outcome::AlreadyPresent => report.already_present += 1,
                Outcome::Deferred(due) => {
                    debug!(template = template.id, %due, "next due date beyond horizon");
                    report.deferred += 1;
                }
                Outcome::Malformed => {
                    warn!(template = template.id, rule = %template.recurrence_rule,
                        "cannot compute due date for recurrence rule");
                    report.malformed += 1;
                }
                Outcome::Failed(e) => {
                    error!(template = template.id, error = %e, "failed to generate recurring instance");
                    report.failed += 1;
                }
            }
        }

        info!(created = report.created(), already_present = report.already_present,
            deferred = report.deferred, malformed = report.malformed, failed = report.failed,
            "recurring engine run complete");
        report
    }

    fn process<R>(&self, repo: &mut R, template: &RecurringTemplate, today: NaiveDate) -> Outcome
    where
        R: TaskRepository + ?Sized,
    {
        let due = match Recurrence::parse(&template.recurrence_rule) {
            Ok(rule) => rule.next_on_or_after(today, self.config.monthly_fallback),
            Err(_) => None,
        };
        let Some(due) = due else {
            return Outcome::Malformed;
        };

        // A horizon past the end of the calendar means no limit.
        let limit = Duration::try_days(self.config.horizon_days.max(0))
            .and_then(|horizon| today.checked_add_signed(horizon));
        if limit.is_some_and(|limit| due > limit) {
            return Outcome::Deferred(due);
        }

        match repo.find_instance(template.id, due) {
            Ok(Some(existing)) => {
                debug!(template = template.id, instance = existing.id, %due, "instance already exists");
                return Outcome::AlreadyPresent;
            }
            Ok(None) => {}
            Err(e) => return Outcome::Failed(e),
        }

        let fields = NewInstance::from_template(template, due, classify(due, today));
        match repo.insert_instance(fields) {
            Ok(instance) => Outcome::Created(instance),
            Err(e) if e.is_conflict() => {
                debug!(template = template.id, %due, "lost insert race; instance already exists");
                Outcome::AlreadyPresent
            }
            Err(e) => Outcome::Failed(e),
        }
    }
}

/// Runs the engine with default settings against the system clock and returns
/// how many instances were created.
pub fn run_recurring_task_engine<R>(repo: &mut R) -> usize
where
    R: TaskRepository + ?Sized,
{
    Engine::default().run(repo, &SystemClock).created()
}
