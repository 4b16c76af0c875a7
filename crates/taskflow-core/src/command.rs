use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use crate::category::Categories;
use crate::error::TaskError;
use crate::notify::{NotificationSink, Severity, TracingSink};
use crate::render::Frame;
use crate::session::{Session, SessionState};
use crate::store::TaskStore;
use crate::task::FieldEdit;
use crate::view::{CategoryFilter, StatusFilter, ViewCriteria};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "list", "categories", "category", "status", "select", "edit", "set", "save", "cancel",
        "close", "new", "add", "toggle", "delete", "export", "help", "quit",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// One user event, as typed into the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Categories,
    Category(CategoryFilter),
    Status(StatusFilter),
    Select(String),
    Edit,
    Set { field: String, value: String },
    Save,
    Cancel,
    Close,
    New,
    Add { title: String, mods: Vec<(String, String)> },
    Toggle(String),
    Delete(Option<String>),
    Export,
    Help,
    Quit,
}

impl Command {
    /// Parses one input line. Blank lines and `#` comments yield `None`.
    #[instrument]
    pub fn parse(line: &str) -> anyhow::Result<Option<Self>> {
        Self::from_words(&split_words(line)?)
    }

    /// Builds a command from words that are already split, e.g. argv.
    /// Quote characters inside a word are kept as typed.
    pub fn from_words(words: &[String]) -> anyhow::Result<Option<Self>> {
        let Some((head, args)) = words.split_first() else {
            return Ok(None);
        };
        if head.starts_with('#') {
            return Ok(None);
        }

        let lowered = head.to_ascii_lowercase();
        let known = known_command_names();
        let name = expand_command_abbrev(&lowered, &known)
            .ok_or_else(|| anyhow!("unknown or ambiguous command: {head}"))?;
        debug!(token = %head, command = name, "resolved command token");

        let command = match name {
            "list" => Command::List,
            "categories" => Command::Categories,
            "category" => Command::Category(CategoryFilter::from(one_arg(name, args)?)),
            "status" => Command::Status(one_arg(name, args)?.parse()?),
            "select" => Command::Select(one_arg(name, args)?.to_string()),
            "edit" => Command::Edit,
            "set" => {
                let (field, rest) = args
                    .split_first()
                    .ok_or_else(|| anyhow!("set requires a field and a value"))?;
                Command::Set {
                    field: field.clone(),
                    value: rest.join(" "),
                }
            }
            "save" => Command::Save,
            "cancel" => Command::Cancel,
            "close" => Command::Close,
            "new" => Command::New,
            "add" => {
                let (title, mods) = parse_title_and_mods(args);
                Command::Add { title, mods }
            }
            "toggle" => Command::Toggle(one_arg(name, args)?.to_string()),
            "delete" => Command::Delete(args.first().cloned()),
            "export" => Command::Export,
            "help" => Command::Help,
            "quit" => Command::Quit,
            other => return Err(anyhow!("unhandled command: {other}")),
        };
        Ok(Some(command))
    }
}

/// What the caller should do after a command ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// State may have changed; re-render.
    Updated,
    Help,
    Categories,
    Export(String),
    Quit,
}

/// Task store, edit session and filter selections for one running session.
#[derive(Debug)]
pub struct App<N = TracingSink> {
    pub store: TaskStore<N>,
    pub session: Session,
    pub criteria: ViewCriteria,
    pub categories: Categories,
    default_category: String,
}

impl<N: NotificationSink> App<N> {
    pub fn new(store: TaskStore<N>, categories: Categories, default_category: Option<&str>) -> Self {
        let default_category = categories.default_id(default_category);
        Self {
            store,
            session: Session::new(),
            criteria: ViewCriteria::default(),
            categories,
            default_category,
        }
    }

    pub fn frame(&self, today: NaiveDate) -> Frame<'_> {
        Frame {
            tasks: self.criteria.derive(self.store.tasks()),
            total: self.store.len(),
            session: self.session.state(),
            criteria: &self.criteria,
            categories: &self.categories,
            today,
        }
    }

    /// Runs `command`, reporting any failure through the notification sink.
    /// Failures never end the session.
    pub fn handle(&mut self, command: Command, now: DateTime<Utc>, today: NaiveDate) -> Outcome {
        match self.dispatch(command, now, today) {
            Ok(outcome) => outcome,
            Err(err) => {
                let already_reported = matches!(
                    err.downcast_ref::<TaskError>(),
                    Some(TaskError::Validation { .. } | TaskError::NotFound { .. })
                );
                if already_reported {
                    debug!(error = %err, "command rejected by store");
                } else {
                    warn!(error = %err, "command failed");
                    self.store.notify(&format!("{err:#}"), Severity::Error);
                }
                Outcome::Updated
            }
        }
    }

    #[instrument(skip(self, now))]
    pub fn dispatch(
        &mut self,
        command: Command,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> anyhow::Result<Outcome> {
        match command {
            Command::List => {}
            Command::Categories => return Ok(Outcome::Categories),
            Command::Category(filter) => self.select_category(filter)?,
            Command::Status(filter) => {
                info!(status = %filter, "status filter changed");
                self.criteria.status = filter;
            }
            Command::Select(token) => {
                let id = self.resolve_id(&token)?;
                let task = self.store.lookup(&id)?;
                self.session.select(task);
            }
            Command::Edit => self.session.enter_edit()?,
            Command::Set { field, value } => {
                let edit = FieldEdit::parse(&field, &value, today)?;
                let adding = matches!(self.session.state(), SessionState::Adding(_));
                let applied = if adding {
                    self.session.edit_new_field(edit)
                } else {
                    self.session.edit_field(edit)
                };
                if !applied {
                    return Err(anyhow!(
                        "nothing to edit while session is {}",
                        self.session.state().name()
                    ));
                }
            }
            Command::Save => {
                if matches!(self.session.state(), SessionState::Adding(_)) {
                    self.session.save_add(&mut self.store, now)?;
                } else {
                    self.session.save(&mut self.store)?;
                }
            }
            Command::Cancel => self.session.cancel(),
            Command::Close => self.session.close(),
            Command::New => {
                self.session
                    .start_add(today, &self.criteria.category, &self.default_category)?;
            }
            Command::Add { title, mods } => self.quick_add(title, &mods, now, today)?,
            Command::Toggle(token) => {
                let id = self.resolve_id(&token)?;
                let updated = self.store.cycle_status(&id)?;
                self.session.sync(&updated);
            }
            Command::Delete(None) => {
                self.session.delete(&mut self.store)?;
            }
            Command::Delete(Some(token)) => {
                let id = self.resolve_id(&token)?;
                self.store.delete_task(&id)?;
                self.session.forget(&id);
            }
            Command::Export => {
                let view = self.criteria.derive(self.store.tasks());
                let json = serde_json::to_string_pretty(&view)
                    .context("failed to serialize task view")?;
                return Ok(Outcome::Export(json));
            }
            Command::Help => return Ok(Outcome::Help),
            Command::Quit => return Ok(Outcome::Quit),
        }
        Ok(Outcome::Updated)
    }

    fn select_category(&mut self, filter: CategoryFilter) -> anyhow::Result<()> {
        let name = match &filter {
            CategoryFilter::All => "All Tasks".to_string(),
            CategoryFilter::Only(id) => self
                .categories
                .get(id)
                .map(|c| c.name.clone())
                .ok_or_else(|| anyhow!("unknown category: {id}"))?,
        };
        info!(category = %filter, "category filter changed");
        self.criteria.category = filter;
        self.store
            .notify(&format!("Category filtered: {name}"), Severity::Info);
        Ok(())
    }

    /// `add` in one line: open a draft, fill it, save it. A rejected draft
    /// is discarded rather than left open.
    fn quick_add(
        &mut self,
        title: String,
        mods: &[(String, String)],
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let mut edits = vec![FieldEdit::Title(title)];
        for (key, value) in mods {
            edits.push(FieldEdit::parse(key, value, today)?);
        }

        self.session
            .start_add(today, &self.criteria.category, &self.default_category)?;
        for edit in edits {
            self.session.edit_new_field(edit);
        }
        if let Err(err) = self.session.save_add(&mut self.store, now) {
            self.session.close();
            return Err(err.into());
        }
        Ok(())
    }

    /// Accepts a full id or an unambiguous prefix of one.
    pub fn resolve_id(&self, token: &str) -> anyhow::Result<String> {
        // an empty prefix would match every task
        if token.trim().is_empty() || self.store.get(token).is_some() {
            return Ok(token.to_string());
        }
        let mut matches = self
            .store
            .tasks()
            .iter()
            .filter(|t| t.id.starts_with(token));
        match (matches.next(), matches.next()) {
            (Some(task), None) => Ok(task.id.clone()),
            (Some(_), Some(_)) => Err(anyhow!("ambiguous task id: {token}")),
            // unknown ids go through to the store, which reports them
            (None, _) => Ok(token.to_string()),
        }
    }
}

fn one_arg<'a>(command: &str, args: &'a [String]) -> anyhow::Result<&'a str> {
    match args {
        [only] => Ok(only),
        [] => Err(anyhow!("{command} requires an argument")),
        _ => Err(anyhow!("{command} takes exactly one argument")),
    }
}

/// Splits `add` arguments into the title words and `key:value` modifiers.
fn parse_title_and_mods(args: &[String]) -> (String, Vec<(String, String)>) {
    let mut title = Vec::new();
    let mut mods = Vec::new();

    for arg in args {
        if let Some((key, value)) = arg.split_once(':')
            && is_modifier_key(key)
        {
            mods.push((key.to_string(), value.to_string()));
        } else {
            title.push(arg.as_str());
        }
    }

    (title.join(" "), mods)
}

fn is_modifier_key(key: &str) -> bool {
    matches!(
        key.to_ascii_lowercase().as_str(),
        "due" | "cat" | "category" | "pri" | "priority" | "desc" | "description" | "status"
    )
}

/// Whitespace splitting with double-quoted segments kept together.
fn split_words(line: &str) -> anyhow::Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_word = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                has_word = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_word {
                    words.push(std::mem::take(&mut current));
                    has_word = false;
                }
            }
            c => {
                current.push(c);
                has_word = true;
            }
        }
    }

    if in_quotes {
        return Err(anyhow!("unterminated quote in: {line}"));
    }
    if has_word {
        words.push(current);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::{App, Command, Outcome, split_words};
    use crate::category::Categories;
    use crate::notify::{RecordingSink, Severity};
    use crate::session::SessionState;
    use crate::store::TaskStore;
    use crate::task::{Priority, Status};
    use crate::view::{CategoryFilter, StatusFilter};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).expect("valid date")
    }

    fn app() -> App<RecordingSink> {
        App::new(
            TaskStore::new(RecordingSink::default()),
            Categories::default(),
            Some("1"),
        )
    }

    fn run(app: &mut App<RecordingSink>, line: &str) -> Outcome {
        let command = Command::parse(line).expect("parse").expect("command");
        app.handle(command, Utc::now(), today())
    }

    #[test]
    fn parses_abbreviations_and_quotes() {
        assert_eq!(Command::parse("tog 12").expect("parse"), Some(Command::Toggle("12".to_string())));
        assert_eq!(
            Command::parse("set title \"Buy  milk\"").expect("parse"),
            Some(Command::Set {
                field: "title".to_string(),
                value: "Buy  milk".to_string()
            })
        );
        assert_eq!(Command::parse("   ").expect("parse"), None);
        assert_eq!(Command::parse("# note").expect("parse"), None);
        // "s" could be status, select, set or save
        assert!(Command::parse("s").is_err());
    }

    #[test]
    fn split_words_keeps_empty_quoted_word() {
        assert_eq!(
            split_words("set title \"\"").expect("split"),
            vec!["set".to_string(), "title".to_string(), String::new()]
        );
        assert!(split_words("add \"open").is_err());
    }

    #[test]
    fn quick_add_applies_modifiers() {
        let mut app = app();
        run(&mut app, "add Pay rent due:tomorrow pri:h cat:2");

        let task = app.store.tasks().first().expect("task added").clone();
        assert_eq!(task.title, "Pay rent");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.category_id, "2");
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2024, 1, 11).expect("valid date"));
        assert_eq!(app.session.state(), &SessionState::Closed);
    }

    #[test]
    fn quick_add_with_no_title_is_discarded() {
        let mut app = app();
        run(&mut app, "add due:today");
        assert!(app.store.is_empty());
        assert_eq!(app.session.state(), &SessionState::Closed);
        let errors: Vec<_> = app
            .store
            .sink()
            .events()
            .iter()
            .filter(|n| n.severity == Severity::Error)
            .collect();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn new_draft_follows_category_filter() {
        let mut app = app();
        run(&mut app, "category 4");
        assert_eq!(app.criteria.category, CategoryFilter::Only("4".to_string()));
        assert_eq!(
            app.store.sink().last().map(|n| n.message.as_str()),
            Some("Category filtered: Learning")
        );

        run(&mut app, "new");
        run(&mut app, "set title Study");
        run(&mut app, "save");
        let task = app.store.tasks().first().expect("task added");
        assert_eq!(task.category_id, "4");
    }

    #[test]
    fn unknown_category_is_rejected() {
        let mut app = app();
        run(&mut app, "category 99");
        assert_eq!(app.criteria.category, CategoryFilter::All);
        assert_eq!(app.store.sink().last().map(|n| n.severity), Some(Severity::Error));
    }

    #[test]
    fn toggle_by_prefix_updates_viewed_task() {
        let mut app = app();
        run(&mut app, "add Walk");
        let id = app.store.tasks()[0].id.clone();
        run(&mut app, &format!("select {id}"));
        run(&mut app, &format!("toggle {}", &id[..8]));

        let SessionState::Viewing(task) = app.session.state() else {
            panic!("expected viewing state");
        };
        assert_eq!(task.status, Status::InProgress);
    }

    #[test]
    fn delete_by_id_closes_session_on_that_task() {
        let mut app = app();
        run(&mut app, "add Walk");
        let id = app.store.tasks()[0].id.clone();
        run(&mut app, &format!("select {id}"));
        run(&mut app, "edit");
        run(&mut app, &format!("delete {id}"));

        assert!(app.store.is_empty());
        assert_eq!(app.session.state(), &SessionState::Closed);
    }

    #[test]
    fn empty_id_never_matches_a_task() {
        let mut app = app();
        run(&mut app, "add Keep me");
        assert_eq!(
            Command::parse("delete \"\"").expect("parse"),
            Some(Command::Delete(Some(String::new())))
        );

        run(&mut app, "delete \"\"");
        run(&mut app, "toggle \"\"");
        run(&mut app, "select \"\"");

        assert_eq!(app.store.len(), 1);
        assert_eq!(app.store.tasks()[0].status, Status::NotStarted);
        assert_eq!(app.session.state(), &SessionState::Closed);
        let errors: Vec<_> = app
            .store
            .sink()
            .events()
            .iter()
            .filter(|n| n.severity == Severity::Error)
            .map(|n| n.message.as_str())
            .collect();
        assert_eq!(errors, ["Task not found"; 3]);
    }

    #[test]
    fn select_unknown_id_reports_not_found_once() {
        let mut app = app();
        run(&mut app, "select nope");

        assert_eq!(app.session.state(), &SessionState::Closed);
        let events = app.store.sink().events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "Task not found");
        assert_eq!(events[0].severity, Severity::Error);
    }

    #[test]
    fn argv_words_keep_literal_quotes() {
        let words: Vec<String> = ["add", "He", "said", "\"5\"", "screen", "5\""]
            .iter()
            .map(|w| w.to_string())
            .collect();
        let Some(Command::Add { title, mods }) = Command::from_words(&words).expect("parse") else {
            panic!("expected add");
        };
        assert_eq!(title, "He said \"5\" screen 5\"");
        assert!(mods.is_empty());
    }

    #[test]
    fn categories_command_is_distinct_from_category() {
        let mut app = app();
        assert_eq!(Command::parse("categories").expect("parse"), Some(Command::Categories));
        assert_eq!(
            Command::parse("category all").expect("parse"),
            Some(Command::Category(CategoryFilter::All))
        );
        assert_eq!(run(&mut app, "categories"), Outcome::Categories);
    }

    #[test]
    fn status_filter_and_export() {
        let mut app = app();
        run(&mut app, "add One");
        run(&mut app, "add Two");
        let id = app.store.tasks()[0].id.clone();
        run(&mut app, &format!("toggle {id}"));
        run(&mut app, "status in-progress");
        assert_eq!(app.criteria.status, StatusFilter::Only(Status::InProgress));

        let Outcome::Export(json) = run(&mut app, "export") else {
            panic!("expected export");
        };
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        let items = parsed.as_array().expect("array");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["title"], "Two");
        assert_eq!(items[0]["status"], "in-progress");
    }

    #[test]
    fn set_outside_a_draft_reports_error() {
        let mut app = app();
        assert_eq!(run(&mut app, "set title x"), Outcome::Updated);
        let last = app.store.sink().last().expect("notification");
        assert_eq!(last.severity, Severity::Error);
        assert!(last.message.contains("nothing to edit"));
    }

    #[test]
    fn quit_and_help_outcomes() {
        let mut app = app();
        assert_eq!(run(&mut app, "help"), Outcome::Help);
        assert_eq!(run(&mut app, "q"), Outcome::Quit);
    }
}
