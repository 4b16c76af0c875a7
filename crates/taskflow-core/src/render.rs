use std::io::{self, IsTerminal, Stdout, Write};

use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::category::Categories;
use crate::datetime::format_due_date;
use crate::session::SessionState;
use crate::task::{Status, Task, TaskDraft};
use crate::view::{CategoryFilter, ViewCriteria};

/// Everything a surface needs to draw one state of the session.
#[derive(Debug)]
pub struct Frame<'a> {
    pub tasks: Vec<Task>,
    pub total: usize,
    pub session: &'a SessionState,
    pub criteria: &'a ViewCriteria,
    pub categories: &'a Categories,
    pub today: NaiveDate,
}

/// Receives a fresh frame after every state change.
pub trait RenderSurface {
    fn render(&mut self, frame: &Frame<'_>) -> anyhow::Result<()>;
}

const SHORT_ID_LEN: usize = 8;

#[derive(Debug)]
pub struct Renderer<W = Stdout> {
    out: W,
    color: bool,
}

impl Renderer<Stdout> {
    pub fn new(color: bool) -> Self {
        let color = color && io::stdout().is_terminal();
        Self {
            out: io::stdout(),
            color,
        }
    }
}

impl<W: Write> Renderer<W> {
    pub fn with_writer(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    #[tracing::instrument(skip(self, frame))]
    pub fn print_task_table(&mut self, frame: &Frame<'_>) -> anyhow::Result<()> {
        let heading = frame.criteria.title(frame.categories);
        let heading = self.paint(&heading, "1");
        writeln!(
            self.out,
            "{}  (status: {}, {} of {} tasks)",
            heading,
            frame.criteria.status,
            frame.tasks.len(),
            frame.total
        )?;

        if frame.tasks.is_empty() {
            writeln!(self.out, "{}", frame.criteria.empty_message())?;
            return Ok(());
        }

        let headers = vec![
            "".to_string(),
            "ID".to_string(),
            "Title".to_string(),
            "Category".to_string(),
            "Priority".to_string(),
            "Due".to_string(),
        ];

        let mut rows = Vec::with_capacity(frame.tasks.len());
        for task in &frame.tasks {
            let due = format_due_date(task.due_date);
            let due = if task.due_date < frame.today && task.status != Status::Completed {
                self.paint(&due, "31")
            } else {
                due
            };

            let title = if task.status == Status::Completed {
                self.paint(&task.title, "2")
            } else {
                task.title.clone()
            };

            rows.push(vec![
                status_marker(task.status).to_string(),
                self.paint(short_id(&task.id), "33"),
                title,
                self.category_badge(frame.categories, &task.category_id),
                task.priority.label().to_string(),
                due,
            ]);
        }

        write_table(&mut self.out, headers, rows)
    }

    #[tracing::instrument(skip(self, frame))]
    pub fn print_session(&mut self, frame: &Frame<'_>) -> anyhow::Result<()> {
        match frame.session {
            SessionState::Closed => Ok(()),
            SessionState::Viewing(task) => {
                let label = self.paint("viewing", "36");
                writeln!(self.out)?;
                writeln!(self.out, "{label}")?;
                self.print_task_info(task, frame.categories)
            }
            SessionState::Editing { task, draft } => {
                let label = self.paint("editing", "35");
                writeln!(self.out)?;
                writeln!(self.out, "{label} {} (save / cancel)", short_id(&task.id))?;
                self.print_task_info(draft, frame.categories)
            }
            SessionState::Adding(draft) => {
                let label = self.paint("new task", "32");
                writeln!(self.out)?;
                writeln!(self.out, "{label} (save / cancel)")?;
                self.print_draft(draft, frame.categories)
            }
        }
    }

    fn print_task_info(&mut self, task: &Task, categories: &Categories) -> anyhow::Result<()> {
        writeln!(self.out, "id        {}", task.id)?;
        writeln!(self.out, "title     {}", task.title)?;
        writeln!(self.out, "status    {}", task.status.label())?;
        writeln!(self.out, "priority  {}", task.priority)?;
        let badge = self.category_badge(categories, &task.category_id);
        writeln!(self.out, "category  {badge}")?;
        writeln!(self.out, "due       {}", format_due_date(task.due_date))?;
        writeln!(self.out, "created   {}", task.created_at.format("%Y-%m-%d %H:%M"))?;
        if !task.description.is_empty() {
            writeln!(self.out, "desc      {}", task.description)?;
        }
        Ok(())
    }

    fn print_draft(&mut self, draft: &TaskDraft, categories: &Categories) -> anyhow::Result<()> {
        writeln!(self.out, "title     {}", draft.title)?;
        writeln!(self.out, "status    {}", draft.status.label())?;
        writeln!(self.out, "priority  {}", draft.priority)?;
        let badge = self.category_badge(categories, &draft.category_id);
        writeln!(self.out, "category  {badge}")?;
        writeln!(self.out, "due       {}", format_due_date(draft.due_date))?;
        if !draft.description.is_empty() {
            writeln!(self.out, "desc      {}", draft.description)?;
        }
        Ok(())
    }

    /// Category list with task counts; `*` marks the active filter.
    #[tracing::instrument(skip_all)]
    pub fn print_categories(
        &mut self,
        categories: &Categories,
        tasks: &[Task],
        selected: &CategoryFilter,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "".to_string(),
            "ID".to_string(),
            "Name".to_string(),
            "Tasks".to_string(),
        ];

        let mut rows = Vec::new();
        for category in categories.iter() {
            let active = selected.selected() == Some(category.id.as_str());
            let count = tasks.iter().filter(|t| t.category_id == category.id).count();
            rows.push(vec![
                if active { "*" } else { "" }.to_string(),
                category.id.clone(),
                self.category_badge(categories, &category.id),
                count.to_string(),
            ]);
        }

        write_table(&mut self.out, headers, rows)?;
        self.out.flush()?;
        Ok(())
    }

    pub fn print_help(&mut self) -> anyhow::Result<()> {
        const HELP: &str = "\
list                          show the filtered task list
categories                    list category ids and names
category <id|all>             filter by category
status <all|not-started|in-progress|completed>
select <id>                   open a task
edit                          edit the open task
set <field> <value>           title, description, status, priority, due, category
save | cancel | close         commit or discard the draft
new                           start a new task draft
add <title> [due:] [cat:] [pri:] [desc:]
toggle <id>                   not started -> in progress -> completed
delete [id]                   delete a task (the open one without id)
export                        print the current view as JSON
quit";
        writeln!(self.out, "{HELP}")?;
        Ok(())
    }

    pub fn print_raw(&mut self, text: &str) -> anyhow::Result<()> {
        writeln!(self.out, "{text}")?;
        Ok(())
    }

    /// Category name tinted with the category's own color.
    fn category_badge(&self, categories: &Categories, id: &str) -> String {
        let name = categories.name_for(id);
        match rgb_code(categories.color_for(id)) {
            Some(code) => self.paint(name, &code),
            None => name.to_string(),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

impl<W: Write> RenderSurface for Renderer<W> {
    fn render(&mut self, frame: &Frame<'_>) -> anyhow::Result<()> {
        self.print_task_table(frame)?;
        self.print_session(frame)?;
        self.out.flush()?;
        Ok(())
    }
}

fn status_marker(status: Status) -> &'static str {
    match status {
        Status::NotStarted => "[ ]",
        Status::InProgress => "[~]",
        Status::Completed => "[x]",
    }
}

/// `#rrggbb` as a 24-bit foreground SGR code.
fn rgb_code(hex: &str) -> Option<String> {
    let digits = hex.trim().strip_prefix('#')?;
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
    let (r, g, b) = (channel(0..2)?, channel(2..4)?, channel(4..6)?);
    Some(format!("38;2;{r};{g};{b}"))
}

fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
