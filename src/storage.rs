use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Local, NaiveDate};
use fs4::fs_std::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::error::StoreError;
use crate::models::{
    Bucket, DeletePolicy, NewInstance, NewTemplate, OwnerId, RecurringTemplate, TaskId, TaskInstance,
    TemplateChanges,
};
use crate::recurrence::Recurrence;
use crate::repository::TaskRepository;

const TASKS_FILE: &str = "tasks.json";
const TEMPLATES_FILE: &str = "templates.json";
const LOCK_FILE: &str = "tasks.lock";

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Task repository backed by JSON files in a data directory.
///
/// Every operation reads the files fresh and writes them back whole, so two
/// store handles on the same directory see each other's writes. Writers hold
/// an exclusive lock on `tasks.lock` for the whole read-modify-write, and
/// files are replaced by rename so readers never see a partial file.
#[derive(Debug, Clone)]
pub struct JsonTaskStore {
    dir: PathBuf,
    owner: Option<OwnerId>,
}

/// Reads a JSON array file. A missing file is an empty collection.
fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut f = OpenOptions::new()
        .read(true)
        .open(path)
        .map_err(|e| StoreError::io(path, e))?;
    let mut s = String::new();
    f.read_to_string(&mut s).map_err(|e| StoreError::io(path, e))?;
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&s)?)
}

fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
    }
    Ok(())
}

/// Replaces a JSON array file, creating the data directory if needed.
fn save_json<T: Serialize>(path: &Path, items: &[T]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let s = serde_json::to_string_pretty(items)?;

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(format!(".{}.{}.tmp", process::id(), TEMP_SEQ.fetch_add(1, Ordering::Relaxed)));
    let tmp = path.with_file_name(tmp_name);

    let written = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)
        .and_then(|mut f| {
            f.write_all(s.as_bytes())?;
            f.sync_all()
        });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(StoreError::io(&tmp, e));
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StoreError::io(path, e)
    })
}

/// Exclusive hold on a data directory. Released when dropped.
struct DirLock {
    _file: File,
}

impl DirLock {
    fn acquire(dir: &Path) -> Result<Self, StoreError> {
        ensure_dir(dir)?;
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;
        file.lock_exclusive().map_err(|e| StoreError::io(&path, e))?;
        Ok(DirLock { _file: file })
    }
}

impl JsonTaskStore {
    pub fn new(dir: impl Into<PathBuf>, owner: Option<OwnerId>) -> Self {
        JsonTaskStore { dir: dir.into(), owner }
    }

    pub fn from_config(config: &Config) -> Self {
        JsonTaskStore::new(config.data_dir.clone(), config.owner.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn tasks_path(&self) -> PathBuf {
        self.dir.join(TASKS_FILE)
    }

    fn templates_path(&self) -> PathBuf {
        self.dir.join(TEMPLATES_FILE)
    }

    /// Loads every stored task instance.
    pub fn load_tasks(&self) -> Result<Vec<TaskInstance>, StoreError> {
        load_json(&self.tasks_path())
    }

    pub fn save_tasks(&self, tasks: &[TaskInstance]) -> Result<(), StoreError> {
        save_json(&self.tasks_path(), tasks)
    }

    /// Loads every stored recurring template.
    pub fn load_templates(&self) -> Result<Vec<RecurringTemplate>, StoreError> {
        load_json(&self.templates_path())
    }

    pub fn save_templates(&self, templates: &[RecurringTemplate]) -> Result<(), StoreError> {
        save_json(&self.templates_path(), templates)
    }

    /// Next free id. Templates and instances share one id space.
    fn next_id(&self) -> Result<TaskId, StoreError> {
        let max_task = self.load_tasks()?.iter().map(|t| t.id).max().unwrap_or(0);
        let max_template = self.load_templates()?.iter().map(|t| t.id).max().unwrap_or(0);
        Ok(max_task.max(max_template) + 1)
    }

    fn lock(&self) -> Result<DirLock, StoreError> {
        DirLock::acquire(&self.dir)
    }

    fn require_owner(&self) -> Result<OwnerId, StoreError> {
        self.owner.clone().ok_or(StoreError::NoOwner)
    }

    /// Stores a new recurring template after checking its rule parses.
    pub fn add_template(&self, new: NewTemplate) -> Result<RecurringTemplate, StoreError> {
        let owner = self.require_owner()?;
        let rule = Recurrence::parse(&new.recurrence_rule)?;
        let _lock = self.lock()?;
        let id = self.next_id()?;
        let template = RecurringTemplate {
            id,
            owner,
            title: new.title,
            description: new.description,
            category: new.category,
            client_id: new.client_id,
            priority: new.priority,
            recurrence_rule: rule.to_string(),
            is_recurring: true,
            is_paused: false,
            time_block: new.time_block,
            status: new.status,
            created_at: Local::now().to_rfc3339(),
        };
        let mut templates = self.load_templates()?;
        templates.push(template.clone());
        self.save_templates(&templates)?;
        debug!(template = id, rule = %template.recurrence_rule, "added recurring template");
        Ok(template)
    }

    /// Loads a single template by its id.
    pub fn template(&self, id: TaskId) -> Result<RecurringTemplate, StoreError> {
        self.load_templates()?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    /// Applies `changes` to a template. A new rule must parse.
    pub fn edit_template(&self, id: TaskId, changes: TemplateChanges) -> Result<RecurringTemplate, StoreError> {
        let rule = changes
            .recurrence_rule
            .as_deref()
            .map(Recurrence::parse)
            .transpose()?;
        let _lock = self.lock()?;
        let mut templates = self.load_templates()?;
        let t = templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))?;
        if let Some(title) = changes.title { t.title = title; }
        if let Some(d) = changes.description { t.description = Some(d); }
        if let Some(c) = changes.category { t.category = Some(c); }
        if let Some(c) = changes.client_id { t.client_id = Some(c); }
        if let Some(p) = changes.priority { t.priority = p; }
        if let Some(r) = rule { t.recurrence_rule = r.to_string(); }
        if let Some(s) = changes.status { t.status = s; }
        if let Some(start) = changes.time_block_start { t.time_block.start = Some(start); }
        if let Some(end) = changes.time_block_end { t.time_block.end = Some(end); }
        let updated = t.clone();
        self.save_templates(&templates)?;
        Ok(updated)
    }

    /// Pauses or resumes a template. Paused templates are never expanded.
    pub fn set_paused(&self, id: TaskId, paused: bool) -> Result<RecurringTemplate, StoreError> {
        let _lock = self.lock()?;
        let mut templates = self.load_templates()?;
        let t = templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))?;
        t.is_paused = paused;
        let updated = t.clone();
        self.save_templates(&templates)?;
        Ok(updated)
    }

    /// Removes a template and handles its instances according to `policy`.
    ///
    /// Returns how many instances were removed or orphaned.
    pub fn remove_template(&self, id: TaskId, policy: DeletePolicy) -> Result<usize, StoreError> {
        let _lock = self.lock()?;
        let mut templates = self.load_templates()?;
        let len_before = templates.len();
        templates.retain(|t| t.id != id);
        if templates.len() == len_before {
            return Err(StoreError::NotFound(id));
        }
        // Template first: if the instance step then fails, the instances keep
        // a dangling parent id, which no run acts on.
        self.save_templates(&templates)?;

        let mut tasks = self.load_tasks()?;
        let affected = tasks.iter().filter(|t| t.parent_task_id == Some(id)).count();
        match policy {
            DeletePolicy::Cascade => tasks.retain(|t| t.parent_task_id != Some(id)),
            DeletePolicy::Orphan => {
                for t in tasks.iter_mut().filter(|t| t.parent_task_id == Some(id)) {
                    t.parent_task_id = None;
                }
            }
        }
        if affected > 0 {
            self.save_tasks(&tasks)?;
        }
        debug!(template = id, affected, ?policy, "removed recurring template");
        Ok(affected)
    }

    /// Adds a one-off task that no template owns.
    pub fn add_task(&mut self, title: String, due_date: NaiveDate, status: Bucket) -> Result<TaskInstance, StoreError> {
        let owner = self.require_owner()?;
        self.insert_instance(NewInstance {
            owner,
            parent_task_id: None,
            title,
            description: None,
            category: None,
            client_id: None,
            priority: Default::default(),
            due_date,
            status,
            time_block: Default::default(),
        })
    }

    /// Loads a single task instance by its id.
    pub fn task(&self, id: TaskId) -> Result<TaskInstance, StoreError> {
        self.load_tasks()?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    /// Moves a task to `done` and stamps `completed_at`.
    pub fn complete_task(&self, id: TaskId) -> Result<TaskInstance, StoreError> {
        let _lock = self.lock()?;
        let mut tasks = self.load_tasks()?;
        let t = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))?;
        t.status = Bucket::Done;
        t.completed_at = Some(Local::now());
        let updated = t.clone();
        self.save_tasks(&tasks)?;
        Ok(updated)
    }

    /// Removes a task instance.
    pub fn remove_task(&self, id: TaskId) -> Result<(), StoreError> {
        let _lock = self.lock()?;
        let mut tasks = self.load_tasks()?;
        let len_before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == len_before {
            return Err(StoreError::NotFound(id));
        }
        self.save_tasks(&tasks)
    }

    /// Deletes the tasks and templates database files.
    pub fn delete_database(&self) -> Result<(), StoreError> {
        let _lock = self.lock()?;
        for path in [self.tasks_path(), self.templates_path()] {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
            }
        }
        Ok(())
    }
}

impl TaskRepository for JsonTaskStore {
    fn current_user_id(&self) -> Option<OwnerId> {
        self.owner.clone()
    }

    fn list_active_recurring_templates(&self, owner: &str) -> Result<Vec<RecurringTemplate>, StoreError> {
        let mut templates = self.load_templates()?;
        templates.retain(|t| t.owner == owner && t.is_recurring && !t.is_paused);
        Ok(templates)
    }

    fn find_instance(&self, parent_id: TaskId, due_date: NaiveDate) -> Result<Option<TaskInstance>, StoreError> {
        Ok(self
            .load_tasks()?
            .into_iter()
            .find(|t| t.parent_task_id == Some(parent_id) && t.due_date == due_date))
    }

    fn insert_instance(&mut self, fields: NewInstance) -> Result<TaskInstance, StoreError> {
        let _lock = self.lock()?;
        let mut tasks = self.load_tasks()?;
        if let Some(parent_id) = fields.parent_task_id {
            let taken = tasks
                .iter()
                .any(|t| t.parent_task_id == Some(parent_id) && t.due_date == fields.due_date);
            if taken {
                return Err(StoreError::Conflict { parent_id, due_date: fields.due_date });
            }
        }
        let id = self.next_id()?;
        let instance = fields.into_instance(id, Local::now().to_rfc3339());
        tasks.push(instance.clone());
        self.save_tasks(&tasks)?;
        Ok(instance)
    }
}
