use std::collections::HashSet;

use chrono::{Local, NaiveDate};

use crate::error::StoreError;
use crate::models::{NewInstance, OwnerId, RecurringTemplate, TaskId, TaskInstance};

/// Storage operations the recurring-task engine depends on.
pub trait TaskRepository {
    /// The authenticated actor, if any.
    fn current_user_id(&self) -> Option<OwnerId>;

    /// Templates owned by `owner` that are recurring and not paused.
    fn list_active_recurring_templates(&self, owner: &str) -> Result<Vec<RecurringTemplate>, StoreError>;

    /// The instance generated from `parent_id` for `due_date`, if one exists.
    fn find_instance(&self, parent_id: TaskId, due_date: NaiveDate) -> Result<Option<TaskInstance>, StoreError>;

    /// Stores a new instance.
    ///
    /// Must fail with [`StoreError::Conflict`] when an instance with the same
    /// `(parent_task_id, due_date)` is already stored.
    fn insert_instance(&mut self, fields: NewInstance) -> Result<TaskInstance, StoreError>;
}

/// In-memory repository with switchable failures.
#[derive(Debug, Default, Clone)]
pub struct MemoryTaskStore {
    owner: Option<OwnerId>,
    templates: Vec<RecurringTemplate>,
    instances: Vec<TaskInstance>,
    next_id: TaskId,
    fail_listing: bool,
    fail_find: HashSet<TaskId>,
    fail_insert: HashSet<TaskId>,
    stale_reads: HashSet<TaskId>,
}

impl MemoryTaskStore {
    pub fn new(owner: Option<&str>) -> Self {
        MemoryTaskStore {
            owner: owner.map(str::to_string),
            next_id: 1,
            ..Default::default()
        }
    }

    /// Adds a template, assigning it the next id. Returns the id.
    pub fn add_template(&mut self, mut template: RecurringTemplate) -> TaskId {
        template.id = self.allocate_id();
        let id = template.id;
        self.templates.push(template);
        id
    }

    pub fn templates(&self) -> &[RecurringTemplate] {
        &self.templates
    }

    pub fn instances(&self) -> &[TaskInstance] {
        &self.instances
    }

    pub fn instances_of(&self, parent_id: TaskId) -> Vec<&TaskInstance> {
        self.instances
            .iter()
            .filter(|i| i.parent_task_id == Some(parent_id))
            .collect()
    }

    pub fn set_paused(&mut self, id: TaskId, paused: bool) {
        if let Some(t) = self.templates.iter_mut().find(|t| t.id == id) {
            t.is_paused = paused;
        }
    }

    /// Makes `list_active_recurring_templates` fail.
    pub fn fail_listing(&mut self, fail: bool) {
        self.fail_listing = fail;
    }

    /// Makes `find_instance` fail for instances of `parent_id`.
    pub fn fail_find_for(&mut self, parent_id: TaskId) {
        self.fail_find.insert(parent_id);
    }

    /// Makes `insert_instance` fail for instances of `parent_id`.
    pub fn fail_insert_for(&mut self, parent_id: TaskId) {
        self.fail_insert.insert(parent_id);
    }

    /// Makes `find_instance` miss existing instances of `parent_id`, the way a
    /// concurrent session sees the table before the other session's insert lands.
    pub fn stale_reads_for(&mut self, parent_id: TaskId) {
        self.stale_reads.insert(parent_id);
    }

    fn allocate_id(&mut self) -> TaskId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }
}

impl TaskRepository for MemoryTaskStore {
    fn current_user_id(&self) -> Option<OwnerId> {
        self.owner.clone()
    }

    fn list_active_recurring_templates(&self, owner: &str) -> Result<Vec<RecurringTemplate>, StoreError> {
        if self.fail_listing {
            return Err(StoreError::Unavailable("template listing failed".into()));
        }
        Ok(self
            .templates
            .iter()
            .filter(|t| t.owner == owner && t.is_recurring && !t.is_paused)
            .cloned()
            .collect())
    }

    fn find_instance(&self, parent_id: TaskId, due_date: NaiveDate) -> Result<Option<TaskInstance>, StoreError> {
        if self.fail_find.contains(&parent_id) {
            return Err(StoreError::Unavailable(format!("lookup for task {} failed", parent_id)));
        }
        if self.stale_reads.contains(&parent_id) {
            return Ok(None);
        }
        Ok(self
            .instances
            .iter()
            .find(|i| i.parent_task_id == Some(parent_id) && i.due_date == due_date)
            .cloned())
    }

    fn insert_instance(&mut self, fields: NewInstance) -> Result<TaskInstance, StoreError> {
        if let Some(parent_id) = fields.parent_task_id {
            if self.fail_insert.contains(&parent_id) {
                return Err(StoreError::Unavailable(format!("insert for task {} failed", parent_id)));
            }
            let taken = self
                .instances
                .iter()
                .any(|i| i.parent_task_id == Some(parent_id) && i.due_date == fields.due_date);
            if taken {
                return Err(StoreError::Conflict { parent_id, due_date: fields.due_date });
            }
        }
        let id = self.allocate_id();
        let instance = fields.into_instance(id, Local::now().to_rfc3339());
        self.instances.push(instance.clone());
        Ok(instance)
    }
}
