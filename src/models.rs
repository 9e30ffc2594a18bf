use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Identifier of a stored task row (templates and instances share the id space).
pub type TaskId = u64;

/// Identifier of the actor that owns tasks.
pub type OwnerId = String;

/// Planning bucket a task currently sits in.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    #[default]
    Inbox,
    Today,
    Tomorrow,
    ThisWeek,
    NextWeek,
    Backburner,
    Done,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Inbox => "inbox",
            Bucket::Today => "today",
            Bucket::Tomorrow => "tomorrow",
            Bucket::ThisWeek => "this_week",
            Bucket::NextWeek => "next_week",
            Bucket::Backburner => "backburner",
            Bucket::Done => "done",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "inbox" => Ok(Bucket::Inbox),
            "today" => Ok(Bucket::Today),
            "tomorrow" => Ok(Bucket::Tomorrow),
            "this_week" => Ok(Bucket::ThisWeek),
            "next_week" => Ok(Bucket::NextWeek),
            "backburner" => Ok(Bucket::Backburner),
            "done" => Ok(Bucket::Done),
            other => Err(format!("unknown bucket '{}'", other)),
        }
    }
}

/// What kind of work a task belongs to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Client,
    Personal,
    Idea,
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "client" => Ok(Category::Client),
            "personal" => Ok(Category::Personal),
            "idea" => Ok(Category::Idea),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Client => "client",
            Category::Personal => "personal",
            Category::Idea => "idea",
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Normal,
    Urgent,
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(Priority::Normal),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::Normal => "normal",
            Priority::Urgent => "urgent",
        })
    }
}

/// Optional block of calendar time reserved for a task.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeBlock {
    pub start: Option<DateTime<Local>>,
    pub end: Option<DateTime<Local>>,
}

/// The authoring record for a repeating task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecurringTemplate {
    /// Unique identifier for the template.
    pub id: TaskId,
    /// Owner the template (and every instance generated from it) belongs to.
    pub owner: OwnerId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    /// Reference to the client this work is for, if any.
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    /// Persisted rule string, e.g. `daily`, `weekly-monday`, `monthly-last`.
    pub recurrence_rule: String,
    /// Always true for templates; kept so rows round-trip with the shared task table.
    #[serde(default = "default_true")]
    pub is_recurring: bool,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub time_block: TimeBlock,
    /// Bucket chosen when the template was authored. Generated instances are
    /// classified by due date instead.
    #[serde(default)]
    pub status: Bucket,
    /// Timestamp when the template was created (ISO 8601).
    pub created_at: String,
}

fn default_true() -> bool {
    true
}

/// A concrete, dated task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskInstance {
    pub id: TaskId,
    pub owner: OwnerId,
    /// Template this instance was generated from; `None` for hand-made tasks
    /// and for instances orphaned by a template removal.
    #[serde(default)]
    pub parent_task_id: Option<TaskId>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    pub due_date: NaiveDate,
    pub status: Bucket,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub time_block: TimeBlock,
    #[serde(default)]
    pub completed_at: Option<DateTime<Local>>,
    pub created_at: String,
}

impl TaskInstance {
    pub fn is_done(&self) -> bool {
        self.status == Bucket::Done
    }
}

/// Field set handed to the repository when inserting an instance.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInstance {
    pub owner: OwnerId,
    pub parent_task_id: Option<TaskId>,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub client_id: Option<String>,
    pub priority: Priority,
    pub due_date: NaiveDate,
    pub status: Bucket,
    pub time_block: TimeBlock,
}

impl NewInstance {
    /// Copies the template's fields onto an instance due on `due_date`.
    pub fn from_template(template: &RecurringTemplate, due_date: NaiveDate, status: Bucket) -> Self {
        NewInstance {
            owner: template.owner.clone(),
            parent_task_id: Some(template.id),
            title: template.title.clone(),
            description: template.description.clone(),
            category: template.category,
            client_id: template.client_id.clone(),
            priority: template.priority,
            due_date,
            status,
            time_block: template.time_block,
        }
    }

    pub fn into_instance(self, id: TaskId, created_at: String) -> TaskInstance {
        TaskInstance {
            id,
            owner: self.owner,
            parent_task_id: self.parent_task_id,
            title: self.title,
            description: self.description,
            category: self.category,
            client_id: self.client_id,
            priority: self.priority,
            due_date: self.due_date,
            status: self.status,
            is_recurring: false,
            time_block: self.time_block,
            completed_at: None,
            created_at,
        }
    }
}

/// Field set for authoring a new template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTemplate {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub client_id: Option<String>,
    pub priority: Priority,
    pub recurrence_rule: String,
    pub status: Bucket,
    pub time_block: TimeBlock,
}

/// Partial update applied to an existing template; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub client_id: Option<String>,
    pub priority: Option<Priority>,
    pub recurrence_rule: Option<String>,
    pub status: Option<Bucket>,
    pub time_block_start: Option<DateTime<Local>>,
    pub time_block_end: Option<DateTime<Local>>,
}

/// What happens to generated instances when their template is removed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Keep the instances and clear their `parent_task_id`.
    #[default]
    Orphan,
    /// Remove the instances together with the template.
    Cascade,
}

impl FromStr for DeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "orphan" => Ok(DeletePolicy::Orphan),
            "cascade" => Ok(DeletePolicy::Cascade),
            other => Err(format!("unknown delete policy '{}'", other)),
        }
    }
}
