use std::io::{BufRead, Write};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::command::{App, Command, Outcome};
use crate::datetime::local_today;
use crate::notify::{NotificationSink, Severity};
use crate::render::{RenderSurface, Renderer};

/// Feeds input lines to `app` in order, re-rendering after each command.
/// Returns the number of commands executed.
#[tracing::instrument(skip_all)]
pub fn run_lines<N, W, R>(
    app: &mut App<N>,
    renderer: &mut Renderer<W>,
    input: R,
    prompt: bool,
) -> anyhow::Result<usize>
where
    N: NotificationSink,
    W: Write,
    R: BufRead,
{
    let mut executed = 0_usize;
    renderer.render(&app.frame(local_today()))?;

    if prompt {
        show_prompt();
    }
    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        match Command::parse(&line) {
            Ok(Some(command)) => {
                executed += 1;
                if !run_one(app, renderer, command)? {
                    info!(executed, "quit requested");
                    return Ok(executed);
                }
            }
            Ok(None) => debug!(line = idx + 1, "skipping blank line"),
            Err(err) => {
                warn!(line = idx + 1, error = %err, "could not parse command");
                app.store.notify(&format!("{err:#}"), Severity::Error);
            }
        }
        if prompt {
            show_prompt();
        }
    }

    info!(executed, "input exhausted");
    Ok(executed)
}

/// Runs a single command; `false` means the session should end.
pub fn run_one<N, W>(
    app: &mut App<N>,
    renderer: &mut Renderer<W>,
    command: Command,
) -> anyhow::Result<bool>
where
    N: NotificationSink,
    W: Write,
{
    let today = local_today();
    match app.handle(command, Utc::now(), today) {
        Outcome::Updated => renderer.render(&app.frame(today))?,
        Outcome::Help => renderer.print_help()?,
        Outcome::Categories => renderer.print_categories(
            &app.categories,
            app.store.tasks(),
            &app.criteria.category,
        )?,
        Outcome::Export(json) => renderer.print_raw(&json)?,
        Outcome::Quit => return Ok(false),
    }
    Ok(true)
}

fn show_prompt() {
    let mut err = std::io::stderr().lock();
    let _ = write!(err, "taskflow> ");
    let _ = err.flush();
}
