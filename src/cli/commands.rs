use std::fmt::Write as _;
use std::io::{self, BufRead, Read, Write};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::app::{BlogApp, EditorOrigin, EditorSession};
use crate::blog::{draft_key, BlogError, Category, CategoryMap, Draft, DraftTarget, Outcome, Post};
use crate::journaling::{AutoSaveEvent, AutoSaveStatus};
use crate::storage::KeyValueStore;

const ADMIN_REQUIRED: &str = "Admin mode required; run `blogdesk login` first.";
/// How long the compose loop sleeps when no autosave is pending.
const IDLE_WAIT: Duration = Duration::from_secs(3600);

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Only print this category (musings, observations, thoughts)
    #[arg()]
    pub category: Option<Category>,
}

#[derive(Args, Debug, Clone)]
pub struct PostRef {
    pub category: Category,
    pub id: u64,
}

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    /// Admin password (prompted if omitted)
    #[arg()]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct NewArgs {
    pub category: Category,
    #[arg(long)]
    pub title: Option<String>,
    /// Post body. If omitted, read from stdin when piped.
    #[arg(long)]
    pub content: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    pub category: Category,
    pub id: u64,
    #[arg(long)]
    pub title: Option<String>,
    /// New body. If omitted, read from stdin when piped.
    #[arg(long)]
    pub content: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    pub category: Category,
    pub id: u64,
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteAllArgs {
    pub category: Category,
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DraftRef {
    pub category: Category,
    /// Post id; omit for the category's new-post draft
    #[arg(long)]
    pub id: Option<u64>,
}

impl DraftRef {
    fn target(&self) -> DraftTarget {
        DraftTarget::from_post_id(self.id)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum DraftCommand {
    /// Print a draft
    Show(DraftRef),
    /// Throw a draft away
    Discard(DraftRef),
    /// List every stored draft
    List,
}

#[derive(Args, Debug, Clone)]
pub struct DraftArgs {
    #[command(subcommand)]
    pub command: DraftCommand,
}

#[derive(Args, Debug, Clone)]
pub struct ComposeArgs {
    pub category: Category,
    /// Post id to edit; omit to write a new post
    #[arg(long)]
    pub id: Option<u64>,
}

pub fn list_posts<S: KeyValueStore + Clone>(app: &BlogApp<S>, args: ListArgs) -> Result<()> {
    print!("{}", format_posts(app.posts(), args.category));
    Ok(())
}

pub fn show_post<S: KeyValueStore + Clone>(app: &BlogApp<S>, args: PostRef) -> Result<()> {
    let Some(post) = app.post(args.category, args.id) else {
        bail!("no post #{} in {}", args.id, args.category);
    };
    print!("{}", format_post(post));
    Ok(())
}

pub fn login<S: KeyValueStore + Clone>(app: &mut BlogApp<S>, args: LoginArgs) -> Result<()> {
    if app.is_admin() {
        println!("Already in admin mode.");
        return Ok(());
    }
    let password = match args.password {
        Some(password) => password,
        None => prompt("Password")?,
    };
    if !app.login(&password)? {
        bail!("wrong password");
    }
    println!("Logged in. Posts can now be edited.");
    Ok(())
}

pub fn logout<S: KeyValueStore + Clone>(app: &mut BlogApp<S>) -> Result<()> {
    if !app.is_admin() {
        println!("Not in admin mode.");
        return Ok(());
    }
    let cleared = app.logout()?;
    println!("Logged out; {cleared} draft(s) discarded.");
    Ok(())
}

pub fn status<S: KeyValueStore + Clone>(app: &BlogApp<S>) -> Result<()> {
    print!("{}", format_status(app)?);
    Ok(())
}

pub fn new_post<S: KeyValueStore + Clone>(app: &mut BlogApp<S>, mut args: NewArgs) -> Result<()> {
    if args.content.is_none() {
        args.content = read_stdin()?;
    }
    let message = run_new(app, args)?;
    println!("{message}");
    Ok(())
}

pub fn edit_post<S: KeyValueStore + Clone>(app: &mut BlogApp<S>, mut args: EditArgs) -> Result<()> {
    if args.content.is_none() {
        args.content = read_stdin()?;
    }
    let message = run_edit(app, args)?;
    println!("{message}");
    Ok(())
}

pub fn delete_post<S: KeyValueStore + Clone>(
    app: &mut BlogApp<S>,
    args: DeleteArgs,
) -> Result<()> {
    if app.is_admin() && !args.yes {
        if let Some(post) = app.post(args.category, args.id) {
            let answer = prompt(&format!("Delete post #{} ({})? [y/N]", post.id, post.title))?;
            if !is_yes(&answer) {
                println!("Nothing deleted.");
                return Ok(());
            }
        }
    }
    let message = match app.delete(args.category, args.id)? {
        Outcome::Applied(post) => format!("Deleted post #{} ({}).", post.id, post.title),
        Outcome::Denied => ADMIN_REQUIRED.to_string(),
        Outcome::NotFound | Outcome::Empty => {
            format!("No post #{} in {}.", args.id, args.category)
        }
    };
    println!("{message}");
    Ok(())
}

pub fn delete_all<S: KeyValueStore + Clone>(
    app: &mut BlogApp<S>,
    args: DeleteAllArgs,
) -> Result<()> {
    let category = args.category;
    let count = app.posts().posts(category).len();
    if app.is_admin() && count > 0 && !args.yes {
        let answer = prompt(&format!(
            "Delete all {count} post(s) in {}? This cannot be undone [y/N]",
            category.label()
        ))?;
        if !is_yes(&answer) {
            println!("Nothing deleted.");
            return Ok(());
        }
    }
    println!("{}", delete_all_message(category, app.delete_all(category)?));
    Ok(())
}

pub fn handle_draft_command<S: KeyValueStore + Clone>(
    app: &mut BlogApp<S>,
    args: DraftArgs,
) -> Result<()> {
    match args.command {
        DraftCommand::Show(draft) => {
            match app.drafts().load(draft.category, draft.target())? {
                Some(found) => print!("{}", format_draft(&found)),
                None => println!("No draft for {}.", draft_key(draft.category, draft.target())),
            }
        }
        DraftCommand::Discard(draft) => {
            if !app.is_admin() {
                println!("{ADMIN_REQUIRED}");
                return Ok(());
            }
            app.drafts().clear(draft.category, draft.target())?;
            println!("Discarded {}.", draft_key(draft.category, draft.target()));
        }
        DraftCommand::List => {
            let drafts = app.drafts().list()?;
            if drafts.is_empty() {
                println!("No drafts.");
            }
            for draft in drafts {
                println!("{}", format_draft_line(&draft));
            }
        }
    }
    Ok(())
}

/// Interactive editor. Plain lines append to the body; `:title TEXT`,
/// `:clear`, `:w`, `:save`, `:discard` and `:q` control the session.
pub fn compose<S: KeyValueStore + Clone>(app: &mut BlogApp<S>, args: ComposeArgs) -> Result<()> {
    let Some(editor) = open_editor(app, args.category, args.id)? else {
        return Ok(());
    };
    let mut stdout = io::stdout();
    write!(stdout, "{}", format_editor_banner(&editor))?;
    stdout.flush()?;
    let lines = spawn_stdin_reader();
    run_compose(app, editor, &lines, &mut stdout)
}

fn open_editor<S: KeyValueStore + Clone>(
    app: &mut BlogApp<S>,
    category: Category,
    id: Option<u64>,
) -> Result<Option<EditorSession>> {
    if !app.is_admin() {
        println!("{ADMIN_REQUIRED}");
        return Ok(None);
    }
    let editor = match id {
        Some(id) => app.begin_edit(category, id)?.cloned(),
        None => app.begin_new(category)?.cloned(),
    };
    if editor.is_none() {
        bail!("no post #{} in {category}", id.unwrap_or_default());
    }
    Ok(editor)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ComposeInput {
    Append(String),
    Title(String),
    ClearContent,
    Write,
    Save,
    Discard,
    Quit,
}

pub(crate) fn parse_compose_line(line: &str) -> ComposeInput {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    if let Some(title) = trimmed.strip_prefix(":title ") {
        return ComposeInput::Title(title.trim().to_string());
    }
    match trimmed.trim() {
        ":clear" => ComposeInput::ClearContent,
        ":w" => ComposeInput::Write,
        ":save" | ":wq" => ComposeInput::Save,
        ":discard" => ComposeInput::Discard,
        ":q" => ComposeInput::Quit,
        _ => ComposeInput::Append(trimmed.to_string()),
    }
}

pub(crate) fn run_compose<S: KeyValueStore + Clone, W: Write>(
    app: &mut BlogApp<S>,
    editor: EditorSession,
    lines: &Receiver<io::Result<String>>,
    out: &mut W,
) -> Result<()> {
    let (category, target) = (editor.category, editor.target);
    let mut title = editor.title;
    let mut content = editor.content;
    loop {
        let wait = app.autosave_due_in().unwrap_or(IDLE_WAIT);
        let line = match lines.recv_timeout(wait) {
            Ok(line) => line.context("reading editor input")?,
            Err(RecvTimeoutError::Timeout) => {
                if let Some(notice) = app.tick().as_ref().and_then(autosave_notice) {
                    writeln!(out, "{notice}")?;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => {
                let kept = close_editor(app, category, target)?;
                writeln!(out, "{}", close_message(kept))?;
                return Ok(());
            }
        };
        match parse_compose_line(&line) {
            ComposeInput::Append(text) => {
                if !content.is_empty() {
                    content.push('\n');
                }
                content.push_str(&text);
                app.input(&title, &content);
            }
            ComposeInput::Title(text) => {
                title = text;
                app.input(&title, &content);
            }
            ComposeInput::ClearContent => {
                content.clear();
                app.input(&title, &content);
            }
            ComposeInput::Write => {
                if let Some(notice) = app.flush_draft().as_ref().and_then(autosave_notice) {
                    writeln!(out, "{notice}")?;
                }
                app.persist_now()?;
                writeln!(out, "Saved.")?;
            }
            ComposeInput::Save => match app.save() {
                Ok(outcome) => {
                    writeln!(out, "{}", save_message(&outcome))?;
                    return Ok(());
                }
                Err(BlogError::Validation(message)) => writeln!(out, "{message}")?,
                Err(err) => return Err(err.into()),
            },
            ComposeInput::Discard => {
                app.discard()?;
                writeln!(out, "Draft discarded.")?;
                return Ok(());
            }
            ComposeInput::Quit => {
                let kept = close_editor(app, category, target)?;
                writeln!(out, "{}", close_message(kept))?;
                return Ok(());
            }
        }
    }
}

/// Closes the form and reports whether its text now sits in a draft.
fn close_editor<S: KeyValueStore + Clone>(
    app: &mut BlogApp<S>,
    category: Category,
    target: DraftTarget,
) -> Result<bool> {
    match app.close() {
        Some(AutoSaveEvent::Staged { .. }) => Ok(true),
        Some(AutoSaveEvent::Error { message, .. }) => {
            tracing::warn!(%category, %target, %message, "draft not kept on close");
            Ok(false)
        }
        Some(AutoSaveEvent::Skipped { .. }) | None => {
            Ok(app.drafts().load(category, target)?.is_some())
        }
    }
}

fn close_message(kept: bool) -> &'static str {
    if kept {
        "Closed; unsaved text kept as a draft."
    } else {
        "Closed; nothing to keep."
    }
}

fn spawn_stdin_reader() -> Receiver<io::Result<String>> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn autosave_notice(event: &AutoSaveEvent) -> Option<String> {
    match event {
        AutoSaveEvent::Staged { .. } => Some("Draft saved.".to_string()),
        AutoSaveEvent::Skipped { .. } => None,
        AutoSaveEvent::Error { message, .. } => Some(format!("Autosave failed: {message}")),
    }
}

pub(crate) fn run_new<S: KeyValueStore + Clone>(app: &mut BlogApp<S>, args: NewArgs) -> Result<String> {
    let Some(editor) = app.begin_new(args.category)?.cloned() else {
        return Ok(ADMIN_REQUIRED.to_string());
    };
    apply_fields(app, editor, args.title, args.content)
}

pub(crate) fn run_edit<S: KeyValueStore + Clone>(
    app: &mut BlogApp<S>,
    args: EditArgs,
) -> Result<String> {
    if !app.is_admin() {
        return Ok(ADMIN_REQUIRED.to_string());
    }
    let Some(editor) = app.begin_edit(args.category, args.id)?.cloned() else {
        return Ok(format!("No post #{} in {}.", args.id, args.category));
    };
    apply_fields(app, editor, args.title, args.content)
}

/// Fills the open form with the given fields, falling back to what the form
/// was opened with, and saves. A rejected save keeps the text as a draft
/// when there is any.
fn apply_fields<S: KeyValueStore + Clone>(
    app: &mut BlogApp<S>,
    editor: EditorSession,
    title: Option<String>,
    content: Option<String>,
) -> Result<String> {
    let title = title.unwrap_or(editor.title);
    let content = content.unwrap_or(editor.content);
    app.input(&title, &content);
    match app.save() {
        Ok(outcome) => Ok(save_message(&outcome)),
        Err(BlogError::Validation(message)) => {
            if close_editor(app, editor.category, editor.target)? {
                bail!("{message}; the text was kept as a draft");
            }
            bail!("{message}");
        }
        Err(err) => Err(err.into()),
    }
}

fn save_message(outcome: &Outcome<Post>) -> String {
    match outcome {
        Outcome::Applied(post) => format!("Saved post #{} ({}).", post.id, post.title),
        Outcome::Denied => ADMIN_REQUIRED.to_string(),
        Outcome::NotFound | Outcome::Empty => "The post no longer exists.".to_string(),
    }
}

fn delete_all_message(category: Category, outcome: Outcome<usize>) -> String {
    match outcome {
        Outcome::Applied(count) => format!("Deleted {count} post(s) from {}.", category.label()),
        Outcome::Denied => ADMIN_REQUIRED.to_string(),
        Outcome::Empty | Outcome::NotFound => format!("{} has no posts.", category.label()),
    }
}

pub(crate) fn format_posts(posts: &CategoryMap, only: Option<Category>) -> String {
    let mut out = String::new();
    for (category, list) in posts.iter() {
        if only.is_some_and(|wanted| wanted != category) {
            continue;
        }
        let _ = writeln!(&mut out, "== {} ({}) ==", category.label(), list.len());
        if list.is_empty() {
            out.push_str("    (no posts)\n");
        }
        for post in list {
            out.push_str(&format_post(post));
        }
        out.push('\n');
    }
    out
}

fn format_post(post: &Post) -> String {
    let mut out = String::new();
    let _ = writeln!(&mut out, "#{}  {}  [{}]", post.id, post.title, post.date);
    for line in post.content.lines() {
        let _ = writeln!(&mut out, "    {line}");
    }
    out
}

fn format_draft(draft: &Draft) -> String {
    let mut out = String::new();
    let _ = writeln!(&mut out, "{}", format_draft_line(draft));
    let _ = writeln!(&mut out, "title: {}", draft.title);
    for line in draft.content.lines() {
        let _ = writeln!(&mut out, "    {line}");
    }
    out
}

fn format_draft_line(draft: &Draft) -> String {
    format!(
        "{}  \"{}\"  staged {}",
        draft_key(draft.category, draft.target()),
        draft.title,
        draft
            .staged_at()
            .map(format_timestamp)
            .unwrap_or_else(|| draft.timestamp.to_string())
    )
}

fn format_editor_banner(editor: &EditorSession) -> String {
    let mut out = String::new();
    let heading = match editor.target {
        DraftTarget::New => format!("New post in {}", editor.category.label()),
        DraftTarget::Post(id) => format!("Editing post #{id} in {}", editor.category.label()),
    };
    let _ = writeln!(&mut out, "{heading}");
    if let EditorOrigin::Draft { timestamp } = editor.origin {
        let _ = writeln!(&mut out, "Restored unsaved draft from {}.", format_millis(timestamp));
    }
    let _ = writeln!(&mut out, "title: {}", editor.title);
    for line in editor.content.lines() {
        let _ = writeln!(&mut out, "    {line}");
    }
    out.push_str("Type to append; :title TEXT, :clear, :w, :save, :discard, :q\n");
    out
}

fn format_status<S: KeyValueStore + Clone>(app: &BlogApp<S>) -> Result<String> {
    let mut out = String::new();
    let _ = writeln!(
        &mut out,
        "admin     {}",
        if app.is_admin() { "yes" } else { "no" }
    );
    for category in Category::all() {
        let _ = writeln!(
            &mut out,
            "{:<10}{} post(s)",
            category.to_string(),
            app.posts().posts(category).len()
        );
    }
    let autosave = match app.autosave_status() {
        AutoSaveStatus::Disabled => "disabled".to_string(),
        AutoSaveStatus::Idle { .. } | AutoSaveStatus::Pending { .. } => {
            format!("on, {} ms quiet period", app.config.auto_save.debounce_ms)
        }
        AutoSaveStatus::Error { message, .. } => format!("error: {message}"),
    };
    let _ = writeln!(&mut out, "autosave  {autosave}");
    let drafts = app.drafts().list()?;
    let _ = writeln!(&mut out, "drafts    {}", drafts.len());
    for draft in &drafts {
        let _ = writeln!(&mut out, "    {}", format_draft_line(draft));
    }
    Ok(out)
}

fn format_millis(millis: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
        .map(format_timestamp)
        .unwrap_or_else(|_| millis.to_string())
}

fn format_timestamp(dt: OffsetDateTime) -> String {
    dt.format(&Rfc3339)
        .unwrap_or_else(|_| dt.unix_timestamp().to_string())
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn prompt(label: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    if buf.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, AutoSaveConfig};
    use crate::storage::{self, MemoryStore};
    use std::sync::Arc;

    type TestResult<T = ()> = Result<T>;

    fn app_with(debounce_ms: u64) -> TestResult<BlogApp<MemoryStore>> {
        let config = AppConfig {
            auto_save: AutoSaveConfig {
                debounce_ms,
                enabled: true,
            },
            ..AppConfig::default()
        };
        let mut app = BlogApp::open(MemoryStore::new(), Arc::new(config))?;
        app.login("admin123")?;
        Ok(app)
    }

    fn feed(lines: &[&str]) -> Receiver<io::Result<String>> {
        let (tx, rx) = crossbeam_channel::unbounded();
        for line in lines {
            tx.send(Ok(line.to_string())).expect("receiver alive");
        }
        rx
    }

    #[test]
    fn only_an_explicit_yes_confirms() {
        assert!(is_yes("y"));
        assert!(is_yes(" YES\n"));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn quitting_with_autosave_disabled_still_keeps_the_draft() -> TestResult {
        let config = AppConfig {
            auto_save: AutoSaveConfig {
                debounce_ms: 1000,
                enabled: false,
            },
            ..AppConfig::default()
        };
        let mut app = BlogApp::open(MemoryStore::new(), Arc::new(config))?;
        app.login("admin123")?;
        let err = run_new(
            &mut app,
            NewArgs {
                category: Category::Musings,
                title: Some("Title only".into()),
                content: None,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("kept as a draft"));
        let draft = app
            .drafts()
            .load(Category::Musings, DraftTarget::New)?
            .expect("draft kept");
        assert_eq!(draft.title, "Title only");

        let editor = open_editor(&mut app, Category::Thoughts, None)?.expect("editor");
        let mut out = Vec::new();
        run_compose(&mut app, editor, &feed(&[":q"]), &mut out)?;
        assert!(String::from_utf8(out)?.contains("nothing to keep"));
        assert_eq!(app.drafts().load(Category::Thoughts, DraftTarget::New)?, None);
        Ok(())
    }

    #[test]
    fn compose_lines_parse_into_commands() {
        assert_eq!(
            parse_compose_line(":title  Hello "),
            ComposeInput::Title("Hello".into())
        );
        assert_eq!(parse_compose_line(":save"), ComposeInput::Save);
        assert_eq!(parse_compose_line(":wq"), ComposeInput::Save);
        assert_eq!(parse_compose_line(":w"), ComposeInput::Write);
        assert_eq!(parse_compose_line(":q\r"), ComposeInput::Quit);
        assert_eq!(
            parse_compose_line("  indented line"),
            ComposeInput::Append("  indented line".into())
        );
        assert_eq!(
            parse_compose_line(":unknown"),
            ComposeInput::Append(":unknown".into())
        );
    }

    #[test]
    fn compose_saves_a_new_post() -> TestResult {
        let mut app = app_with(1000)?;
        let editor = open_editor(&mut app, Category::Thoughts, None)?.expect("editor");
        let lines = feed(&[":title Late night", "first line", "second line", ":save"]);
        let mut out = Vec::new();

        run_compose(&mut app, editor, &lines, &mut out)?;

        let post = &app.posts().posts(Category::Thoughts)[0];
        assert_eq!(post.id, 7);
        assert_eq!(post.title, "Late night");
        assert_eq!(post.content, "first line\nsecond line");
        assert!(String::from_utf8(out)?.contains("Saved post #7"));
        assert!(app.drafts().list()?.is_empty());
        Ok(())
    }

    #[test]
    fn compose_rejects_empty_save_and_keeps_going() -> TestResult {
        let mut app = app_with(60_000)?;
        let editor = open_editor(&mut app, Category::Musings, None)?.expect("editor");
        let lines = feed(&[":title Only a title", ":save", ":q"]);
        let mut out = Vec::new();

        run_compose(&mut app, editor, &lines, &mut out)?;

        let output = String::from_utf8(out)?;
        assert!(output.contains("title and content cannot be empty"));
        assert!(output.contains("kept as a draft"));
        let draft = app
            .drafts()
            .load(Category::Musings, DraftTarget::New)?
            .expect("draft kept on quit");
        assert_eq!(draft.title, "Only a title");
        assert_eq!(app.posts().posts(Category::Musings).len(), 2);
        Ok(())
    }

    #[test]
    fn compose_autosaves_after_quiet_period() -> TestResult {
        let mut app = app_with(20)?;
        let editor = open_editor(&mut app, Category::Observations, Some(3))?.expect("editor");
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(Ok("appended".to_string())).expect("receiver alive");
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            drop(tx);
        });
        let mut out = Vec::new();

        run_compose(&mut app, editor, &rx, &mut out)?;
        handle.join().expect("sender thread");

        let output = String::from_utf8(out)?;
        assert!(output.contains("Draft saved."));
        let draft = app
            .drafts()
            .load(Category::Observations, DraftTarget::Post(3))?
            .expect("draft staged");
        assert!(draft.content.ends_with("\nappended"));
        Ok(())
    }

    #[test]
    fn compose_discard_drops_the_draft() -> TestResult {
        let mut app = app_with(0)?;
        app.drafts()
            .stage(Category::Musings, DraftTarget::Post(1), "old", "draft")?;
        let editor = open_editor(&mut app, Category::Musings, Some(1))?.expect("editor");
        assert!(format_editor_banner(&editor).contains("Restored unsaved draft"));
        let lines = feed(&["more", ":discard"]);

        run_compose(&mut app, editor, &lines, &mut Vec::new())?;

        assert_eq!(app.drafts().load(Category::Musings, DraftTarget::Post(1))?, None);
        assert_eq!(
            app.post(Category::Musings, 1).map(|p| p.title.as_str()),
            Some("关于慢生活的思考")
        );
        Ok(())
    }

    #[test]
    fn edit_falls_back_to_stored_fields() -> TestResult {
        let mut app = app_with(1000)?;
        let message = run_edit(
            &mut app,
            EditArgs {
                category: Category::Thoughts,
                id: 6,
                title: Some("Asking well".into()),
                content: None,
            },
        )?;
        assert_eq!(message, "Saved post #6 (Asking well).");
        let post = app.post(Category::Thoughts, 6).expect("post");
        assert!(post.content.starts_with("好的问题"));
        Ok(())
    }

    #[test]
    fn new_post_with_missing_body_is_kept_as_draft() -> TestResult {
        let mut app = app_with(1000)?;
        let err = run_new(
            &mut app,
            NewArgs {
                category: Category::Musings,
                title: Some("Title only".into()),
                content: None,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("kept as a draft"));
        let draft = app
            .drafts()
            .load(Category::Musings, DraftTarget::New)?
            .expect("draft");
        assert_eq!(draft.title, "Title only");

        let message = run_new(
            &mut app,
            NewArgs {
                category: Category::Musings,
                title: None,
                content: Some("Now with a body".into()),
            },
        )?;
        assert_eq!(message, "Saved post #3 (Title only).");
        Ok(())
    }

    #[test]
    fn commands_are_inert_without_admin() -> TestResult {
        let mut app = BlogApp::open(MemoryStore::new(), Arc::new(AppConfig::default()))?;
        let message = run_new(
            &mut app,
            NewArgs {
                category: Category::Musings,
                title: Some("t".into()),
                content: Some("c".into()),
            },
        )?;
        assert_eq!(message, ADMIN_REQUIRED);
        assert_eq!(app.posts().total(), 6);
        assert_eq!(
            delete_all_message(Category::Musings, app.delete_all(Category::Musings)?),
            ADMIN_REQUIRED
        );
        Ok(())
    }

    #[test]
    fn listing_groups_posts_by_category() -> TestResult {
        let app = app_with(1000)?;
        let all = format_posts(app.posts(), None);
        assert!(all.contains("== Musings (2) =="));
        assert!(all.contains("#6  提问的艺术  [2024-03-16]"));

        let only = format_posts(app.posts(), Some(Category::Observations));
        assert!(only.contains("== Observations (2) =="));
        assert!(!only.contains("Musings"));
        Ok(())
    }

    #[test]
    fn status_reports_admin_and_drafts() -> TestResult {
        let app = app_with(1000)?;
        app.drafts()
            .stage(Category::Thoughts, DraftTarget::New, "wip", "")?;
        let status = format_status(&app)?;
        assert!(status.contains("admin     yes"));
        assert!(status.contains("drafts    1"));
        assert!(status.contains("draft_thoughts_new  \"wip\""));
        Ok(())
    }

    #[test]
    fn sqlite_store_round_trips_a_session() -> TestResult {
        let (_temp, store) = storage::tests::init_store()?;
        {
            let mut app = BlogApp::open(store.clone(), Arc::new(AppConfig::default()))?;
            app.login("admin123")?;
            run_new(
                &mut app,
                NewArgs {
                    category: Category::Observations,
                    title: Some("Persisted".into()),
                    content: Some("to disk".into()),
                },
            )?;
        }
        let app = BlogApp::open(store, Arc::new(AppConfig::default()))?;
        assert!(app.is_admin());
        let post = app.post(Category::Observations, 5).expect("post persisted");
        assert_eq!(post.title, "Persisted");
        Ok(())
    }
}
