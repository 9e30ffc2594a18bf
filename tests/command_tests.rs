use cadence::commands::*;
use cadence::config::{Config, ENV_DATA_DIR, ENV_DELETE_POLICY, ENV_HORIZON_DAYS, ENV_MONTHLY_FALLBACK, ENV_OWNER};
use cadence::error::ConfigError;
use cadence::last_run::LastRunCache;
use cadence::models::{Bucket, Category, DeletePolicy, Priority};
use cadence::recurrence::MonthlyFallback;
use cadence::JsonTaskStore;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

// Use a mutex to ensure tests run serially since they modify environment variables
static TEST_MUTEX: Mutex<()> = Mutex::new(());

fn with_test_db<F>(test_name: &str, owner: Option<&str>, f: F)
where
    F: FnOnce(PathBuf),
{
    let _guard = TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

    let mut dir = env::temp_dir();
    dir.push(format!("cadence_test_{}_{}", test_name, std::process::id()));
    if dir.exists() {
        fs::remove_dir_all(&dir).unwrap();
    }

    env::set_var(ENV_DATA_DIR, dir.to_str().unwrap());
    match owner {
        Some(o) => env::set_var(ENV_OWNER, o),
        None => env::remove_var(ENV_OWNER),
    }
    for key in [ENV_HORIZON_DAYS, ENV_MONTHLY_FALLBACK, ENV_DELETE_POLICY] {
        env::remove_var(key);
    }

    f(dir.clone());

    if dir.exists() {
        fs::remove_dir_all(&dir).unwrap();
    }
    for key in [ENV_DATA_DIR, ENV_OWNER, ENV_HORIZON_DAYS, ENV_MONTHLY_FALLBACK, ENV_DELETE_POLICY] {
        env::remove_var(key);
    }
}

fn store(dir: &PathBuf) -> JsonTaskStore {
    JsonTaskStore::new(dir.clone(), Some("tester".into()))
}

#[test]
fn test_template_add() {
    with_test_db("template_add", Some("tester"), |dir| {
        let opts = TemplateOptions {
            description: Some("Sync with the team".into()),
            category: Some(Category::Client),
            priority: Some(Priority::Urgent),
            start: Some("2024-03-10 09:00".into()),
            end: Some("2024-03-10T09:15".into()),
            ..Default::default()
        };
        cmd_template_add("Standup".into(), "Weekly-Monday".into(), opts, true);

        let templates = store(&dir).load_templates().unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].title, "Standup");
        assert_eq!(templates[0].owner, "tester");
        assert_eq!(templates[0].recurrence_rule, "weekly-monday");
        assert_eq!(templates[0].category, Some(Category::Client));
        assert_eq!(templates[0].priority, Priority::Urgent);
        assert_eq!(templates[0].status, Bucket::Today);
        assert!(templates[0].time_block.start.is_some());
        assert!(templates[0].time_block.end.is_some());
    });
}

#[test]
fn test_template_add_rejects_bad_input() {
    with_test_db("template_bad", Some("tester"), |dir| {
        cmd_template_add("Nope".into(), "biweekly".into(), TemplateOptions::default(), true);
        let opts = TemplateOptions { start: Some("nine o'clock".into()), ..Default::default() };
        cmd_template_add("Nope".into(), "daily".into(), opts, true);

        assert!(store(&dir).load_templates().unwrap().is_empty());
    });
}

#[test]
fn test_run_creates_then_noops() {
    with_test_db("run", Some("tester"), |dir| {
        cmd_template_add("Standup".into(), "daily".into(), TemplateOptions::default(), true);

        assert_eq!(cmd_run(false, true), 1);
        assert_eq!(cmd_run(false, true), 0);

        let tasks = store(&dir).load_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, Bucket::Today);
        assert_eq!(tasks[0].due_date, chrono::Local::now().date_naive());
    });
}

#[test]
fn test_run_if_stale_consults_last_run() {
    with_test_db("if_stale", Some("tester"), |dir| {
        assert_eq!(cmd_run(true, true), 0);
        assert!(LastRunCache::new(&dir).last_run().is_some());

        // Added after today's run, so the stale check hides it...
        cmd_template_add("Standup".into(), "daily".into(), TemplateOptions::default(), true);
        assert_eq!(cmd_run(true, true), 0);
        // ...until the caller runs unconditionally.
        assert_eq!(cmd_run(false, true), 1);
    });
}

#[test]
fn test_clearing_last_run_does_not_duplicate() {
    with_test_db("clear_last_run", Some("tester"), |dir| {
        cmd_template_add("Standup".into(), "daily".into(), TemplateOptions::default(), true);
        assert_eq!(cmd_run(true, true), 1);

        LastRunCache::new(&dir).clear().unwrap();
        assert_eq!(cmd_run(true, true), 0);
        assert_eq!(store(&dir).load_tasks().unwrap().len(), 1);
    });
}

#[test]
fn test_run_without_owner() {
    with_test_db("no_owner", None, |dir| {
        cmd_template_add("Standup".into(), "daily".into(), TemplateOptions::default(), true);
        assert!(store(&dir).load_templates().unwrap().is_empty());

        assert_eq!(cmd_run(false, true), 0);
        assert!(LastRunCache::new(&dir).last_run().is_none());
    });
}

#[test]
fn test_paused_template_not_generated() {
    with_test_db("pause", Some("tester"), |dir| {
        cmd_template_add("Standup".into(), "daily".into(), TemplateOptions::default(), true);
        let id = store(&dir).load_templates().unwrap()[0].id;

        cmd_template_pause(id, true, true);
        assert_eq!(cmd_run(false, true), 0);

        cmd_template_pause(id, false, true);
        assert_eq!(cmd_run(false, true), 1);
    });
}

#[test]
fn test_template_edit() {
    with_test_db("template_edit", Some("tester"), |dir| {
        cmd_template_add("Standup".into(), "daily".into(), TemplateOptions::default(), true);
        let id = store(&dir).load_templates().unwrap()[0].id;

        let opts = TemplateOptions { bucket: Some(Bucket::ThisWeek), ..Default::default() };
        cmd_template_edit(id, Some("Retro".into()), Some("weekly-friday".into()), opts, true);

        let t = store(&dir).template(id).unwrap();
        assert_eq!(t.title, "Retro");
        assert_eq!(t.recurrence_rule, "weekly-friday");
        assert_eq!(t.status, Bucket::ThisWeek);
    });
}

#[test]
fn test_complete_task() {
    with_test_db("complete", Some("tester"), |dir| {
        cmd_add("Call the bank".into(), "2024-03-10".into(), None, true);
        let id = store(&dir).load_tasks().unwrap()[0].id;

        cmd_complete(id, true);

        let task = store(&dir).task(id).unwrap();
        assert!(task.is_done());
        assert!(task.completed_at.is_some());
    });
}

#[test]
fn test_add_with_invalid_date() {
    with_test_db("bad_date", Some("tester"), |dir| {
        cmd_add("Call the bank".into(), "10/03/2024".into(), None, true);
        assert!(store(&dir).load_tasks().unwrap().is_empty());
    });
}

#[test]
fn test_template_remove_orphans_by_default() {
    with_test_db("remove_orphan", Some("tester"), |dir| {
        cmd_template_add("Standup".into(), "daily".into(), TemplateOptions::default(), true);
        let id = store(&dir).load_templates().unwrap()[0].id;
        cmd_run(false, true);

        cmd_template_remove(id, false, true);

        assert!(store(&dir).load_templates().unwrap().is_empty());
        let tasks = store(&dir).load_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].parent_task_id, None);
    });
}

#[test]
fn test_template_remove_cascade() {
    with_test_db("remove_cascade", Some("tester"), |dir| {
        cmd_template_add("Standup".into(), "daily".into(), TemplateOptions::default(), true);
        let id = store(&dir).load_templates().unwrap()[0].id;
        cmd_run(false, true);

        cmd_template_remove(id, true, true);

        assert!(store(&dir).load_templates().unwrap().is_empty());
        assert!(store(&dir).load_tasks().unwrap().is_empty());
    });
}

#[test]
fn test_delete_policy_from_environment() {
    with_test_db("remove_env_policy", Some("tester"), |dir| {
        env::set_var(ENV_DELETE_POLICY, "cascade");
        cmd_template_add("Standup".into(), "daily".into(), TemplateOptions::default(), true);
        let id = store(&dir).load_templates().unwrap()[0].id;
        cmd_run(false, true);

        cmd_template_remove(id, false, true);

        assert!(store(&dir).load_tasks().unwrap().is_empty());
    });
}

#[test]
fn test_reset() {
    with_test_db("reset", Some("tester"), |dir| {
        cmd_template_add("Standup".into(), "daily".into(), TemplateOptions::default(), true);
        cmd_run(false, true);

        cmd_reset(true);

        assert!(store(&dir).load_templates().unwrap().is_empty());
        assert!(store(&dir).load_tasks().unwrap().is_empty());
        assert!(LastRunCache::new(&dir).last_run().is_none());
    });
}

#[test]
fn test_config_file_and_env_overrides() {
    with_test_db("config", None, |dir| {
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config.json"),
            r#"{ "owner": "from-file", "horizon_days": 7, "monthly_fallback": "skip" }"#,
        )
        .unwrap();

        let config = Config::load().unwrap();
        assert_eq!(config.data_dir, dir);
        assert_eq!(config.owner.as_deref(), Some("from-file"));
        assert_eq!(config.horizon_days, 7);
        assert_eq!(config.monthly_fallback, MonthlyFallback::Skip);
        assert_eq!(config.delete_policy, DeletePolicy::Orphan);

        env::set_var(ENV_OWNER, "from-env");
        env::set_var(ENV_HORIZON_DAYS, "21");
        env::set_var(ENV_MONTHLY_FALLBACK, "clamp");
        let config = Config::load().unwrap();
        assert_eq!(config.owner.as_deref(), Some("from-env"));
        assert_eq!(config.horizon_days, 21);
        assert_eq!(config.monthly_fallback, MonthlyFallback::Clamp);
        assert_eq!(config.engine_config().horizon_days, 21);
    });
}

#[test]
fn test_config_rejects_invalid_values() {
    with_test_db("config_invalid", Some("tester"), |_dir| {
        env::set_var(ENV_HORIZON_DAYS, "two weeks");
        assert!(matches!(Config::load(), Err(ConfigError::Invalid { .. })));

        env::set_var(ENV_HORIZON_DAYS, "-1");
        assert!(matches!(Config::load(), Err(ConfigError::Invalid { .. })));

        env::remove_var(ENV_HORIZON_DAYS);
        env::set_var(ENV_MONTHLY_FALLBACK, "round");
        assert!(matches!(Config::load(), Err(ConfigError::Invalid { .. })));
    });
}

#[test]
fn test_config_defaults() {
    with_test_db("config_defaults", None, |dir| {
        let config = Config::load().unwrap();
        assert_eq!(config.data_dir, dir);
        assert_eq!(config.owner, None);
        assert_eq!(config.horizon_days, 14);
        assert_eq!(config.monthly_fallback, MonthlyFallback::Clamp);
    });
}
