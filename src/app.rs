//! App: terminal init, main loop, fixed-step ticks, key and mouse handling.

use crate::Args;
use crate::controls::{Action, key_to_action};
use crate::theme::Theme;
use crate::ui::{self, BoardView, Effects, Scene};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use match3tui::{BoardConfig, BoardSession, PointerEvent, TurnTimings};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Ticks run per loop iteration at most; beyond that the clock is resynced.
const MAX_CATCH_UP_TICKS: u32 = 5;

pub struct App {
    args: Args,
    config: BoardConfig,
    theme: Theme,
    session: BoardSession,
    effects: Effects,
    /// Board placement from the last frame, for mouse mapping.
    view: Option<BoardView>,
    /// Keyboard cursor cell (x, y).
    cursor: (usize, usize),
    paused: bool,
    fault: Option<String>,
    last_tick: Instant,
}

impl App {
    pub fn new(args: Args, config: BoardConfig, theme: Theme) -> Result<Self> {
        let session = BoardSession::new(&config, timings(&args))?;
        info!(
            width = config.width,
            height = config.height,
            seed = session.tiles().seed(),
            "board created"
        );
        Ok(Self {
            args,
            config,
            theme,
            session,
            effects: Effects::default(),
            view: None,
            cursor: (0, 0),
            paused: false,
            fault: None,
            last_tick: Instant::now(),
        })
    }

    fn restart(&mut self) -> Result<()> {
        self.session = BoardSession::new(&self.config, timings(&self.args))?;
        self.effects.clear();
        self.fault = None;
        self.paused = false;
        self.last_tick = Instant::now();
        info!(seed = self.session.tiles().seed(), "board restarted");
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{DisableMouseCapture, EnableMouseCapture},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        // Restore
        execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        disable_raw_mode()?;
        terminal.show_cursor()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let tick_interval = Duration::from_secs_f64(1.0 / self.args.tick_rate.max(1.0));
        let frame_duration = Duration::from_secs_f64(1.0 / self.args.frame_rate.max(1.0));
        self.last_tick = Instant::now();

        loop {
            let now = Instant::now();
            let events = self.session.drain_events();
            if !self.args.no_animation {
                self.effects.absorb(&events, &self.theme);
            }

            let scene = Scene {
                session: &self.session,
                theme: &self.theme,
                cursor: self.cursor,
                paused: self.paused,
                fault: self.fault.as_deref(),
            };
            let effects = &mut self.effects;
            let mut view = None;
            terminal.draw(|f| view = Some(ui::draw(f, &scene, effects, now)))?;
            self.view = view;

            let timeout = frame_duration.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    match event::read()? {
                        Event::Key(key) if key.kind == KeyEventKind::Press => {
                            if !self.apply_action(key_to_action(key))? {
                                return Ok(());
                            }
                        }
                        Event::Mouse(mouse) => self.handle_mouse(mouse),
                        _ => {}
                    }
                }
            }

            if self.paused {
                self.last_tick = Instant::now();
                continue;
            }
            let mut steps = 0;
            while self.last_tick.elapsed() >= tick_interval {
                if steps == MAX_CATCH_UP_TICKS {
                    self.last_tick = Instant::now();
                    break;
                }
                self.last_tick += tick_interval;
                self.step(tick_interval.as_secs_f32());
                steps += 1;
            }
        }
    }

    fn step(&mut self, dt: f32) {
        if let Err(err) = self.session.tick(dt) {
            error!(%err, state = self.session.state_name(), "turn aborted");
            self.fault = Some(err.to_string());
            self.paused = true;
        }
    }

    /// Returns `false` when the app should quit.
    fn apply_action(&mut self, action: Action) -> Result<bool> {
        let grid = self.session.tiles().grid();
        let (w, h) = (grid.width(), grid.height());
        match action {
            Action::Quit => return Ok(false),
            Action::Pause => self.paused = !self.paused,
            Action::Restart => self.restart()?,
            _ if self.paused => {}
            Action::CursorLeft => self.cursor.0 = self.cursor.0.saturating_sub(1),
            Action::CursorRight => self.cursor.0 = (self.cursor.0 + 1).min(w - 1),
            Action::CursorUp => self.cursor.1 = self.cursor.1.saturating_sub(1),
            Action::CursorDown => self.cursor.1 = (self.cursor.1 + 1).min(h - 1),
            Action::Select => {
                if let Some(cell) = grid.cell_at(self.cursor.0, self.cursor.1) {
                    let p = cell.position;
                    debug!(x = self.cursor.0, y = self.cursor.1, "keyboard select");
                    self.session.pointer(PointerEvent::Down(p));
                    self.session.pointer(PointerEvent::Up(p));
                }
            }
            Action::None => {}
        }
        Ok(true)
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let Some(view) = self.view else {
            return;
        };
        if self.paused {
            return;
        }
        let point = view.to_world(mouse.column, mouse.row);
        let event = match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(cell) = self.session.tiles().grid().nearest_cell_to(point) {
                    self.cursor = (cell.x, cell.y);
                }
                PointerEvent::Down(point)
            }
            MouseEventKind::Drag(MouseButton::Left) => PointerEvent::Drag(point),
            MouseEventKind::Up(MouseButton::Left) => PointerEvent::Up(point),
            _ => return,
        };
        self.session.pointer(event);
    }
}

fn timings(args: &Args) -> TurnTimings {
    if args.no_animation {
        TurnTimings::instant()
    } else {
        TurnTimings::default()
    }
}
