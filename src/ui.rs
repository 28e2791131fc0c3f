use crate::app::{apply_local, update, AppMsg, Effect, TICKS_PER_SECOND};
use crate::form::{FormModel, FormSession, InstanceIds, Values};
use crate::model::{validate_app_config, AppConfig};
use crate::theme::Theme;
use crate::widgets::form_view::FormView;
use crate::widgets::status_bar::draw_footer_combined;
use crate::widgets::Widget;
use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::prelude::*;
use ratatui::widgets::*;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub const CONFIG_FILE: &str = "chi-forms.yaml";
pub const CONFIG_ENV: &str = "CHI_FORMS_CONFIG";

pub struct AppState {
    pub(crate) config: AppConfig,
    /// Directory relative script and output paths resolve against.
    pub(crate) base_dir: PathBuf,
    pub(crate) form: FormView,
    pub(crate) theme: Theme,
    pub(crate) tick: u64,
    pub(crate) toast: Option<Toast>,
    pub(crate) quit: bool,
    pub(crate) submitted: Option<Values>,
    pub(crate) show_debug: bool,
    // Debug log (rendered in bottom debug pane)
    pub(crate) debug_log: VecDeque<String>,
}

impl AppState {
    pub(crate) fn new(config: AppConfig, base_dir: PathBuf) -> Result<Self> {
        let script = config.load_script(&base_dir)?;
        let mut ids = InstanceIds::new();
        let model = FormModel::with_values(config.values.clone());
        let session = FormSession::new(ids.allocate(), model, move |f| script.build(f));
        let theme = Theme::from_mode(config.theme);
        let form = FormView::new(config.title.clone(), session, theme.clone())
            .context("building form")?;
        Ok(Self {
            config,
            base_dir,
            form,
            theme,
            tick: 0,
            toast: None,
            quit: false,
            submitted: None,
            show_debug: false,
            debug_log: VecDeque::new(),
        })
    }

    pub fn dbg(&mut self, msg: impl Into<String>) {
        const MAX_LOG_LINES: usize = 200;
        if self.debug_log.len() >= MAX_LOG_LINES {
            self.debug_log.pop_front();
        }
        self.debug_log.push_back(msg.into());
    }

    pub fn show_toast(&mut self, text: impl Into<String>, level: ToastLevel, seconds: u64) {
        self.toast = Some(Toast {
            text: text.into(),
            level,
            expires_at_tick: self.tick + seconds * TICKS_PER_SECOND,
        });
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

pub struct Toast {
    pub text: String,
    pub level: ToastLevel,
    pub expires_at_tick: u64,
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}

fn write_output(path: &Path, values: &Values) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {dir:?}"))?;
    }
    let json = serde_json::to_string_pretty(values)?;
    fs::write(path, json).with_context(|| format!("writing {path:?}"))?;
    Ok(())
}

fn run_effects(state: &mut AppState, effects: Vec<Effect>) {
    for eff in apply_local(state, effects) {
        match eff {
            Effect::CopyToClipboard(text) => {
                // Copy to clipboard
                match arboard::Clipboard::new().and_then(|mut c| c.set_text(text)) {
                    Ok(()) => state.show_toast("Copied to clipboard!", ToastLevel::Success, 2),
                    Err(e) => {
                        tracing::warn!(error = %e, "clipboard copy failed");
                        state.show_toast(format!("Clipboard error: {e}"), ToastLevel::Error, 3);
                    }
                }
            }
            Effect::PasteFromClipboard => {
                match arboard::Clipboard::new().and_then(|mut c| c.get_text()) {
                    Ok(text) => {
                        let effs = update(state, AppMsg::Paste(text));
                        run_effects(state, effs);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "clipboard paste failed");
                        state.show_toast(format!("Clipboard error: {e}"), ToastLevel::Error, 3);
                    }
                }
            }
            Effect::Submitted(values) => {
                if let Some(path) = state.config.output_path(&state.base_dir) {
                    match write_output(&path, &values) {
                        Ok(()) => state.dbg(format!("wrote {}", path.display())),
                        Err(e) => {
                            tracing::error!(error = %e, "writing submitted record failed");
                            state.show_toast(format!("{e:#}"), ToastLevel::Error, 5);
                        }
                    }
                }
            }
            // handled by apply_local
            Effect::ShowToast { .. } | Effect::Quit => {}
        }
    }
}

pub fn run() -> Result<()> {
    let (cfg, base_dir) = load_config()?;
    validate_app_config(&cfg)
        .map_err(anyhow::Error::msg)
        .context("invalid config")?;
    let mut state = AppState::new(cfg, base_dir)?;
    tracing::info!(title = %state.config.title, "form loaded");

    // Headless smoke mode
    let headless = env_flag("CHI_FORMS_HEADLESS");
    let headless_ticks: u64 = std::env::var("CHI_FORMS_TICKS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(10);
    if headless {
        return run_headless(&mut state, headless_ticks, env_flag("CHI_FORMS_HEADLESS_SUBMIT"));
    }

    // Setup terminal (interactive)
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let res = event_loop(&mut terminal, &mut state);
    // Restore
    disable_raw_mode()?;
    execute!(std::io::stdout(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    res?;

    if let Some(values) = &state.submitted {
        println!("{}", serde_json::to_string_pretty(values)?);
    }
    Ok(())
}

fn event_loop<B: Backend>(terminal: &mut Terminal<B>, state: &mut AppState) -> Result<()> {
    let tick_rate = Duration::from_millis(1000 / TICKS_PER_SECOND);
    let mut last_tick = Instant::now();
    while !state.quit {
        terminal.draw(|f| ui(f, state))?;
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if key.code == KeyCode::F(12) {
                    state.show_debug = !state.show_debug;
                    continue;
                }
                let effects = update(state, AppMsg::Key(key));
                run_effects(state, effects);
            }
        }
        if last_tick.elapsed() >= tick_rate {
            let effects = update(state, AppMsg::Tick);
            run_effects(state, effects);
            last_tick = Instant::now();
        }
    }
    Ok(())
}

fn run_headless(state: &mut AppState, ticks: u64, submit: bool) -> Result<()> {
    let backend = ratatui::backend::TestBackend::new(80, 24);
    let mut terminal = Terminal::new(backend)?;
    let tick_rate = Duration::from_millis(1000 / TICKS_PER_SECOND);
    let mut submit_toast: Option<String> = None;
    for i in 0..ticks {
        if i == 0 && submit {
            let effects = state.form.submit();
            submit_toast = effects.iter().find_map(|e| match e {
                Effect::ShowToast { text, .. } => Some(text.clone()),
                _ => None,
            });
            run_effects(state, effects);
        }
        terminal.draw(|f| ui(f, state))?;
        let effects = update(state, AppMsg::Tick);
        run_effects(state, effects);
        std::thread::sleep(tick_rate);
    }
    let session = state.form.session();
    let pass = session.pass();
    let summary = serde_json::json!({
        "ok": true,
        "title": state.config.title,
        "page": pass.page,
        "phase": format!("{:?}", session.phase()),
        "variables": pass.variables.len(),
        "errors": pass.error_count(),
        "valid": session.is_valid(),
        "problems": session.problems(),
        "targets": state.form.rendered().targets.len(),
        "submit": submit_toast,
        "submitted": state.submitted,
        "values": session.values(),
    });
    println!("{summary}");
    Ok(())
}

/// Locate and parse the app config. Returns it with the directory relative
/// paths resolve against.
fn load_config() -> Result<(AppConfig, PathBuf)> {
    // 1) Explicit path: first argument, then CHI_FORMS_CONFIG
    let explicit = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .filter(|s| !s.is_empty());
    if let Some(path) = explicit {
        return read_config(&PathBuf::from(path));
    }

    // 2) Discover chi-forms.yaml from CWD and upwards
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let candidates = [cwd.join(CONFIG_FILE), cwd.join(".tui").join(CONFIG_FILE)];
    for p in &candidates {
        if p.exists() {
            return read_config(p);
        }
    }
    // Walk up ancestors looking for <ancestor>/.tui/chi-forms.yaml
    let mut cur = cwd.as_path();
    while let Some(parent) = cur.parent() {
        let p = parent.join(".tui").join(CONFIG_FILE);
        if p.exists() {
            return read_config(&p);
        }
        cur = parent;
    }
    // Last attempt: ~/.tui/chi-forms.yaml
    if let Some(home) = std::env::var("HOME")
        .ok()
        .or_else(|| std::env::var("USERPROFILE").ok())
        .map(PathBuf::from)
    {
        let p = home.join(".tui").join(CONFIG_FILE);
        if p.exists() {
            return read_config(&p);
        }
    }
    anyhow::bail!(
        "no {CONFIG_FILE} found; pass a config path or set {CONFIG_ENV}"
    )
}

fn read_config(path: &Path) -> Result<(AppConfig, PathBuf)> {
    let s = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
    let cfg: AppConfig =
        serde_yaml::from_str(&s).with_context(|| format!("parsing {path:?}"))?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((cfg, base_dir))
}

const HELP_TEXT: &str =
    "↑/↓ move  Enter select  ←/→ dropdown  PgUp/PgDn page  Ctrl+S submit  Ctrl+V paste  Ctrl+Y copy  F12 debug  Esc quit";

fn ui(f: &mut Frame, state: &mut AppState) {
    // Fill entire screen with theme background
    let screen = f.area();
    let bg = Block::default().style(state.theme.base_style());
    f.render_widget(bg, screen);

    let mut constraints = vec![Constraint::Min(0)];
    // Dedicated debug pane (fixed height)
    const DEBUG_H: u16 = 4;
    if state.show_debug {
        constraints.push(Constraint::Length(DEBUG_H));
    }
    constraints.push(Constraint::Length(1)); // Footer

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(screen);

    state.form.render(f, chunks[0], true, state.tick);
    if state.show_debug {
        draw_debug(f, chunks[1], state);
    }
    draw_footer_combined(f, chunks[chunks.len() - 1], state, HELP_TEXT);
}

fn draw_debug(f: &mut Frame, area: Rect, state: &AppState) {
    let b = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            "Debug",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        ));
    // Take last `area.height` lines
    let h = area.height as usize;
    let start = state.debug_log.len().saturating_sub(h);
    let lines: Vec<Line> = state
        .debug_log
        .iter()
        .skip(start)
        .map(|s| Line::raw(s.clone()))
        .collect();
    let p = Paragraph::new(lines)
        .style(Style::default().fg(Color::Gray))
        .block(b)
        .wrap(Wrap { trim: true });
    f.render_widget(p, area);
}

#[cfg(test)]
pub(crate) fn test_state_with(yaml: &str, values: Values) -> AppState {
    let config = AppConfig {
        form: Some(crate::script::FormScript::from_yaml(yaml).unwrap()),
        values,
        ..AppConfig::default()
    };
    AppState::new(config, PathBuf::from(".")).unwrap()
}

#[cfg(test)]
pub(crate) fn test_state(yaml: &str) -> AppState {
    test_state_with(yaml, Values::new())
}
