mod compose;
mod fetch;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use relative_path::RelativePath;
use spanmark_config::Config;
use spanmark_engine::{
    BundledImages, ChannelResolver, ClickId, ClickPayload, Renderer, ResolutionOutcome,
    SchemeKind, StyledDocument,
};
use std::{
    cell::RefCell,
    env,
    io::{Stdout, stdout},
    path::{Path, PathBuf},
    process,
    sync::{
        Arc,
        mpsc::{self, Receiver, Sender},
    },
    time::Duration,
};

use fetch::{Fetched, ImageSource, spawn_fetcher};

/// What activating a payload should do.
#[derive(Debug, PartialEq)]
enum Action {
    Open(PathBuf),
    External(String),
    Image(String),
}

fn action_for(payload: &ClickPayload, base_dir: &Path) -> Action {
    let value = payload.value.as_str();
    match payload.scheme {
        SchemeKind::Image => Action::Image(value.to_string()),
        SchemeKind::Link if value.contains("://") || value.starts_with("mailto:") => {
            Action::External(value.to_string())
        }
        SchemeKind::Link => {
            let target = value.split_once('#').map_or(value, |(path, _)| path);
            if target.is_empty() {
                Action::External(value.to_string())
            } else {
                Action::Open(RelativePath::new(target).to_logical_path(base_dir))
            }
        }
    }
}

struct App {
    config: Config,
    bundled: BundledImages,
    bundled_files: Vec<PathBuf>,
    path: PathBuf,
    document: StyledDocument,
    lines: Vec<Line<'static>>,
    selected: Option<ClickId>,
    scroll: u16,
    status: String,
    results_tx: Sender<Fetched>,
    results_rx: Receiver<Fetched>,
}

impl App {
    fn new(config: Config, path: PathBuf) -> Result<Self> {
        let (bundled, bundled_files) = config.bundled_table();
        let (results_tx, results_rx) = mpsc::channel();

        let mut app = Self {
            config,
            bundled,
            bundled_files,
            path: path.clone(),
            document: Renderer::default().render(""),
            lines: Vec::new(),
            selected: None,
            scroll: 0,
            status: String::new(),
            results_tx,
            results_rx,
        };
        app.load(path)?;
        Ok(app)
    }

    fn base_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Renders `path` and starts a fetch worker for its images. Results for
    /// the previous document still in flight are ignored as stale.
    fn load(&mut self, path: PathBuf) -> Result<()> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        self.path = path;

        let (resolver, requests) = ChannelResolver::new(self.bundled.clone());
        let timeout = Duration::from_secs(self.config.fetch_timeout_secs);
        spawn_fetcher(
            ImageSource::new(self.base_dir(), timeout),
            requests,
            self.results_tx.clone(),
        );

        let renderer = Renderer::new(self.config.theme.clone(), Arc::new(resolver));
        self.document = renderer.render(&content);
        log::info!(
            "Rendered {} ({} runs, {} pending images)",
            self.path.display(),
            self.document.runs().len(),
            self.document.pending_placeholders().len()
        );

        self.selected = None;
        self.scroll = 0;
        self.status = format!("Opened {}", self.path.display());
        self.recompose();
        Ok(())
    }

    fn recompose(&mut self) {
        self.lines = compose::compose(&self.document, self.selected);
    }

    fn poll_fetches(&mut self) {
        let fetched: Vec<Fetched> = self.results_rx.try_iter().collect();
        let mut changed = false;
        for result in fetched {
            match self
                .document
                .complete_image_resolution(&result.token, result.image)
            {
                ResolutionOutcome::Inserted(range) => {
                    log::debug!("Image {} placed at {range:?}", result.token);
                    changed = true;
                }
                outcome => log::debug!("Image {} not placed: {outcome:?}", result.token),
            }
        }
        if changed {
            self.recompose();
        }
    }

    /// Moves the selection to the next (or previous) clickable payload in
    /// reading order.
    fn cycle(&mut self, forward: bool) {
        let mut targets: Vec<(usize, ClickId)> = self
            .document
            .payloads()
            .values()
            .filter_map(|p| p.located_range.as_ref().map(|r| (r.start, p.click_id)))
            .collect();
        targets.sort();
        if targets.is_empty() {
            self.status = "Nothing to select".to_string();
            return;
        }

        let current = self
            .selected
            .and_then(|id| targets.iter().position(|(_, t)| *t == id));
        let next = match (current, forward) {
            (None, true) => 0,
            (None, false) => targets.len() - 1,
            (Some(i), true) => (i + 1) % targets.len(),
            (Some(i), false) => (i + targets.len() - 1) % targets.len(),
        };
        let (start, id) = targets[next];

        self.selected = Some(id);
        let line = self.document.text()[..start].matches('\n').count();
        self.scroll = u16::try_from(line.saturating_sub(2)).unwrap_or(u16::MAX);
        if let Some(payload) = self.document.payload(id) {
            self.status = format!("{:?}: {}", payload.scheme, payload.value);
        }
        self.recompose();
    }

    fn activate(&mut self) {
        let Some(offset) = self
            .selected
            .and_then(|id| self.document.payload(id))
            .and_then(|p| p.located_range.as_ref())
            .map(|r| r.start)
        else {
            self.status = "Nothing selected (Tab to select)".to_string();
            return;
        };

        let base_dir = self.base_dir();
        let action = RefCell::new(None);
        self.document
            .dispatch_interaction(offset, &|p: &ClickPayload| {
                action.replace(Some(action_for(p, &base_dir)));
            });

        match action.into_inner() {
            Some(Action::Open(path)) => {
                if let Err(e) = self.load(path) {
                    log::warn!("{e:#}");
                    self.status = format!("{e:#}");
                }
            }
            Some(Action::External(url)) => self.status = format!("External link: {url}"),
            Some(Action::Image(reference)) => {
                let file = self
                    .bundled
                    .get(&reference)
                    .and_then(|id| self.bundled_files.get(id.0 as usize));
                self.status = match file {
                    Some(file) => format!("Image: {reference} ({})", file.display()),
                    None => format!("Image: {reference}"),
                };
            }
            None => {}
        }
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let dump = args.iter().skip(1).any(|a| a == "--dump");
    let files: Vec<&String> = args.iter().skip(1).filter(|a| *a != "--dump").collect();

    // Interactive mode stays quiet unless RUST_LOG asks otherwise
    let level = if dump {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Off
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if files.len() > 1 {
        eprintln!("Usage: {} [--dump] [file.md]", args[0]);
        process::exit(1);
    }

    let config = match Config::load() {
        Ok(Some(config)) => config,
        Ok(None) => Config::default(),
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            process::exit(1);
        }
    };

    let Some(path) = files
        .first()
        .map(|file| PathBuf::from(file.as_str()))
        .or_else(|| config.documents_path.clone())
    else {
        eprintln!("Error: No document provided and no documents_path configured");
        eprintln!("Usage: {} [--dump] [file.md]", args[0]);
        eprintln!("Or set documents_path in {}", Config::config_path().display());
        process::exit(1);
    };

    if dump {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let (bundled, _) = config.bundled_table();
        let renderer = Renderer::new(config.theme.clone(), Arc::new(bundled));
        print!("{}", compose::dump(&renderer.render(&content)));
        return Ok(());
    }

    let mut app = App::new(config, path)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        app.poll_fetches();
        terminal.draw(|f| ui(f, app))?;

        if event::poll(Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            match key.code {
                KeyCode::Char('q') => return Ok(()),
                KeyCode::Down | KeyCode::Char('j') => app.scroll = app.scroll.saturating_add(1),
                KeyCode::Up | KeyCode::Char('k') => app.scroll = app.scroll.saturating_sub(1),
                KeyCode::Tab => app.cycle(true),
                KeyCode::BackTab => app.cycle(false),
                KeyCode::Enter => app.activate(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(f.area());

    let title = app
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let content = Paragraph::new(app.lines.clone())
        .block(Block::default().borders(Borders::ALL).title(title))
        .scroll((app.scroll, 0));
    f.render_widget(content, chunks[0]);

    let status = Paragraph::new(Line::from(Span::raw(app.status.clone())))
        .style(Style::default().bg(Color::Blue).fg(Color::White));
    f.render_widget(status, chunks[1]);

    let help_text = Line::from(vec![
        Span::raw("q: Quit | "),
        Span::raw("j/k: Scroll | "),
        Span::raw("Tab/Shift-Tab: Select link | "),
        Span::raw("Enter: Follow"),
    ]);
    f.render_widget(Paragraph::new(help_text), chunks[2]);
}
