//! Layout and drawing: board, tiles, outlines, clear bursts, camera shake, sidebar, pause.

use crate::theme::{Theme, blend, shade};
use match3tui::BoardSession;
use match3tui::geom::Vec2;
use match3tui::grid::Grid;
use match3tui::tile::Tile;
use match3tui::tile_manager::BoardEvent;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style, Stylize};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Line as CanvasLine};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::collections::VecDeque;
use std::time::Instant;
use tachyonfx::{Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx};

/// Terminal cells per board pitch.
pub const CELL_W: u16 = 6;
pub const CELL_H: u16 = 3;
/// Tile footprint inside its cell block.
const TILE_W: i32 = 4;
const TILE_H: i32 = 2;

const SIDEBAR_WIDTH: u16 = 26;

/// Concurrent clear bursts; the oldest is dropped beyond this.
const MAX_BURSTS: usize = 20;
const CLEAR_FADE_MS: u32 = 350;

/// Shake frequency in Hz and world-intensity units per terminal column.
const SHAKE_HZ: f32 = 18.0;
const SHAKE_SCALE: f32 = 3.0;

/// Linear map between world space and the terminal board area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardView {
    pub board: Rect,
    origin: Vec2,
    pitch: f32,
}

impl BoardView {
    pub fn new(board: Rect, grid: &Grid) -> Self {
        Self {
            board,
            origin: grid.origin(),
            pitch: grid.pitch(),
        }
    }

    /// Top-left terminal cell of the block a tile at `p` occupies.
    fn to_screen(&self, p: Vec2) -> (i32, i32) {
        let fx = (p.x - self.origin.x) / self.pitch * f32::from(CELL_W);
        let fy = (self.origin.y - p.y) / self.pitch * f32::from(CELL_H);
        (
            i32::from(self.board.x) + fx.round() as i32,
            i32::from(self.board.y) + fy.round() as i32,
        )
    }

    /// World point under the centre of terminal cell (`column`, `row`).
    pub fn to_world(&self, column: u16, row: u16) -> Vec2 {
        let cx = f32::from(column) + 0.5 - f32::from(self.board.x) - f32::from(CELL_W) / 2.0;
        let cy = f32::from(row) + 0.5 - f32::from(self.board.y) - f32::from(CELL_H) / 2.0;
        Vec2::new(
            self.origin.x + cx / f32::from(CELL_W) * self.pitch,
            self.origin.y - cy / f32::from(CELL_H) * self.pitch,
        )
    }

    fn shifted(mut self, (dx, dy): (i16, i16)) -> Self {
        self.board.x = self.board.x.saturating_add_signed(dx);
        self.board.y = self.board.y.saturating_add_signed(dy);
        self
    }

    fn contains(&self, x: i32, y: i32) -> bool {
        let b = self.board;
        x >= i32::from(b.x)
            && y >= i32::from(b.y)
            && x < i32::from(b.x) + i32::from(b.width)
            && y < i32::from(b.y) + i32::from(b.height)
    }

    /// Terminal rect of a tile at `p`, clipped to the board.
    fn tile_rect(&self, p: Vec2) -> Option<Rect> {
        let (col, row) = self.to_screen(p);
        let x0 = (col + 1).max(i32::from(self.board.x));
        let y0 = row.max(i32::from(self.board.y));
        let x1 = (col + 1 + TILE_W).min(i32::from(self.board.right()));
        let y1 = (row + TILE_H).min(i32::from(self.board.bottom()));
        (x1 > x0 && y1 > y0).then(|| Rect {
            x: x0 as u16,
            y: y0 as u16,
            width: (x1 - x0) as u16,
            height: (y1 - y0) as u16,
        })
    }
}

struct Burst {
    position: Vec2,
    color: Color,
    effect: Effect,
}

#[derive(Debug, Clone, Copy)]
struct Shake {
    intensity: f32,
    duration: f32,
    elapsed: f32,
}

impl Shake {
    fn offset(&self) -> (i16, i16) {
        let decay = (1.0 - self.elapsed / self.duration).max(0.0);
        let phase = self.elapsed * SHAKE_HZ * std::f32::consts::TAU;
        let amp = self.intensity / SHAKE_SCALE * decay;
        ((phase.sin() * amp).round() as i16, (phase.cos() * amp / 2.0).round() as i16)
    }
}

/// Presentation-side effects fed by board events.
#[derive(Default)]
pub struct Effects {
    bursts: VecDeque<Burst>,
    shake: Option<Shake>,
    last_frame: Option<Instant>,
}

impl Effects {
    pub fn clear(&mut self) {
        self.bursts.clear();
        self.shake = None;
    }

    pub fn absorb(&mut self, events: &[BoardEvent], theme: &Theme) {
        for event in events {
            match *event {
                BoardEvent::TileCleared {
                    color,
                    bomb,
                    position,
                    ..
                } => {
                    if self.bursts.len() == MAX_BURSTS {
                        self.bursts.pop_front();
                    }
                    let effect =
                        fx::fade_to(theme.bg, theme.bg, (CLEAR_FADE_MS, Interpolation::QuadOut));
                    self.bursts.push_back(Burst {
                        position,
                        color: if bomb { theme.bomb } else { theme.tile_color(color) },
                        effect,
                    });
                }
                BoardEvent::CameraShake {
                    intensity,
                    duration,
                } => {
                    self.shake = Some(Shake {
                        intensity,
                        duration,
                        elapsed: 0.0,
                    });
                }
                BoardEvent::EntranceFade { .. }
                | BoardEvent::GravitySettled
                | BoardEvent::SwapDetected { .. } => {}
            }
        }
    }

    /// Advance timers; returns the frame delta.
    fn step(&mut self, now: Instant) -> std::time::Duration {
        let delta = self
            .last_frame
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or(std::time::Duration::ZERO);
        self.last_frame = Some(now);
        if let Some(shake) = self.shake.as_mut() {
            shake.elapsed += delta.as_secs_f32();
            if shake.elapsed >= shake.duration {
                self.shake = None;
            }
        }
        delta
    }

    fn shake_offset(&self) -> (i16, i16) {
        self.shake.map_or((0, 0), |s| s.offset())
    }
}

/// What the frame shows besides the session itself.
pub struct Scene<'a> {
    pub session: &'a BoardSession,
    pub theme: &'a Theme,
    /// Keyboard cursor cell.
    pub cursor: (usize, usize),
    pub paused: bool,
    pub fault: Option<&'a str>,
}

/// Draw the whole screen. Returns the unshaken board view for pointer mapping.
pub fn draw(frame: &mut Frame, scene: &Scene<'_>, effects: &mut Effects, now: Instant) -> BoardView {
    let grid = scene.session.tiles().grid();
    let board_w = grid.width() as u16 * CELL_W;
    let board_h = grid.height() as u16 * CELL_H;
    let (pw, ph) = (board_w + 2, board_h + 2);
    let total_w = pw + SIDEBAR_WIDTH;
    let area = frame.area();

    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(ph.max(22)),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert[1]);
    let (playfield_area, sidebar_area) = (inner[0], inner[1]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(scene.theme.grid).bg(scene.theme.bg))
        .title(Span::styled(" match3tui ", Style::default().fg(scene.theme.title)));
    let board_area = block.inner(playfield_area);
    block.render(playfield_area, frame.buffer_mut());
    let board = Rect {
        width: board_w.min(board_area.width),
        height: board_h.min(board_area.height),
        ..board_area
    };
    let view = BoardView::new(board, grid);

    let delta = effects.step(now);
    let shaken = view.shifted(effects.shake_offset());
    frame
        .buffer_mut()
        .set_style(board_area, Style::default().bg(scene.theme.bg));
    draw_outlines(frame, grid, shaken, scene.theme);
    for tile in scene.session.tiles().tiles() {
        draw_tile(frame, tile, shaken, scene.theme);
    }
    draw_bursts(frame, effects, shaken, delta);
    draw_cursors(frame, scene, shaken);

    draw_sidebar(frame, scene, sidebar_area);
    if scene.paused {
        draw_pause_overlay(frame, scene, area);
    }
    view
}

fn draw_outlines(frame: &mut Frame, grid: &Grid, view: BoardView, theme: &Theme) {
    let board = grid.compute_border_segments(|_| true);
    let pipe = if grid.has_pipe_path() {
        grid.compute_border_segments(|c| grid.is_pipe_path(c.id))
    } else {
        Vec::new()
    };
    let half = f64::from(grid.pitch()) / 2.0;
    let pitch = f64::from(grid.pitch());
    let (ox, oy) = (f64::from(grid.origin().x), f64::from(grid.origin().y));
    let canvas = Canvas::default()
        .marker(Marker::Braille)
        .x_bounds([ox - half, ox + (grid.width() as f64 - 0.5) * pitch])
        .y_bounds([oy - (grid.height() as f64 - 0.5) * pitch, oy + half])
        .paint(|ctx| {
            for (segments, color) in [(&board, theme.grid), (&pipe, theme.pipe)] {
                for s in segments {
                    ctx.draw(&CanvasLine::new(
                        f64::from(s.from.x),
                        f64::from(s.from.y),
                        f64::from(s.to.x),
                        f64::from(s.to.y),
                        color,
                    ));
                }
                ctx.layer();
            }
        });
    canvas.render(view.board, frame.buffer_mut());
}

fn draw_tile(frame: &mut Frame, tile: &Tile, view: BoardView, theme: &Theme) {
    let alpha = tile.alpha();
    if alpha <= 0.0 {
        return;
    }
    let Some(rect) = view.tile_rect(tile.position()) else {
        return;
    };
    let base = if tile.is_bomb() {
        theme.bomb
    } else {
        theme.tile_color(tile.color())
    };
    let top = blend(base, theme.bg, alpha);
    let bottom = blend(shade(base, 0.78), theme.bg, alpha);
    let buf = frame.buffer_mut();
    for y in rect.top()..rect.bottom() {
        for x in rect.left()..rect.right() {
            let bg = if y + 1 == rect.bottom() && rect.height > 1 {
                bottom
            } else {
                top
            };
            buf[(x, y)].set_symbol(" ").set_style(Style::default().bg(bg));
        }
    }
    if tile.is_bomb() {
        let (col, row) = view.to_screen(tile.position());
        let (gx, gy) = (col + 1 + TILE_W / 2 - 1, row);
        if view.contains(gx, gy) && view.contains(gx + 1, gy) {
            buf.set_string(
                gx as u16,
                gy as u16,
                "✹✹",
                Style::default().fg(shade(theme.bg, 0.6)).bg(top),
            );
        }
    }
}

fn draw_bursts(frame: &mut Frame, effects: &mut Effects, view: BoardView, delta: std::time::Duration) {
    let delta_ms = delta.as_millis().min(u128::from(u32::MAX)) as u32;
    let tfx_delta = TfxDuration::from_millis(delta_ms);
    for burst in &mut effects.bursts {
        let Some(rect) = view.tile_rect(burst.position) else {
            continue;
        };
        frame
            .buffer_mut()
            .set_style(rect, Style::default().bg(burst.color));
        frame.render_effect(&mut burst.effect, rect, tfx_delta);
    }
    effects.bursts.retain(|b| !b.effect.done());
}

fn draw_cursors(frame: &mut Frame, scene: &Scene<'_>, view: BoardView) {
    let grid = scene.session.tiles().grid();
    let buf = frame.buffer_mut();
    let bracket = Style::default().fg(scene.theme.main_fg).bg(scene.theme.bg);
    if let Some(cell) = grid.cell_at(scene.cursor.0, scene.cursor.1) {
        let (col, row) = view.to_screen(cell.position);
        for dy in 0..TILE_H {
            for (dx, glyph) in [(0, "▐"), (TILE_W + 1, "▌")] {
                if view.contains(col + dx, row + dy) {
                    buf.set_string((col + dx) as u16, (row + dy) as u16, glyph, bracket);
                }
            }
        }
    }
    // selection feedback, animated while a swap is being indicated
    if let Some(p) = scene.session.input().cursor_position() {
        let (col, row) = view.to_screen(p);
        let style = Style::default().fg(scene.theme.title).bg(scene.theme.bg);
        for dx in 1..=TILE_W {
            if view.contains(col + dx, row + TILE_H) {
                buf.set_string((col + dx) as u16, (row + TILE_H) as u16, "▀", style);
            }
        }
    }
}

fn draw_sidebar(frame: &mut Frame, scene: &Scene<'_>, area: Rect) {
    let theme = scene.theme;
    let session = scene.session;
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.grid).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // Stats
            Constraint::Length(1),
            Constraint::Length(4), // Colours
            Constraint::Length(1),
            Constraint::Length(4), // Turn
            Constraint::Length(1),
            Constraint::Min(0), // Keys
        ])
        .split(area);

    let stats_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let stats_inner = stats_block.inner(chunks[0]);
    stats_block.render(chunks[0], frame.buffer_mut());
    let chain = session.cascade();
    let stats = vec![
        Line::from(vec![
            Span::styled("Score: ", title_style),
            Span::styled(session.score().to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Swaps: ", title_style),
            Span::styled(session.swaps().to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Chain: ", title_style),
            Span::styled(
                if chain > 1 {
                    format!("x{chain}")
                } else {
                    "-".to_string()
                },
                fg_style,
            ),
        ]),
        Line::from(vec![
            Span::styled("Seed: ", title_style),
            Span::styled(session.tiles().seed().to_string(), Style::default().fg(theme.inactive_fg)),
        ]),
    ];
    Paragraph::new(stats).render(stats_inner, frame.buffer_mut());

    let colours_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let colours_inner = colours_block.inner(chunks[2]);
    colours_block.render(chunks[2], frame.buffer_mut());
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(colours_inner);
    Paragraph::new(Line::from(Span::styled("Colours", title_style)))
        .render(rows[0], frame.buffer_mut());
    draw_colour_strip(frame, theme, rows[1]);

    let turn_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let turn_inner = turn_block.inner(chunks[4]);
    turn_block.render(chunks[4], frame.buffer_mut());
    let hint = if let Some(fault) = scene.fault {
        Span::styled(fault.to_string(), Style::default().fg(Color::Red))
    } else if session.is_awaiting_input() {
        Span::styled("Your move", Style::default().fg(theme.title).bold())
    } else {
        Span::styled("Resolving...", Style::default().fg(theme.inactive_fg))
    };
    let turn = vec![
        Line::from(vec![
            Span::styled("State: ", title_style),
            Span::styled(session.state_name().to_string(), fg_style),
        ]),
        Line::from(hint),
    ];
    Paragraph::new(turn).render(turn_inner, frame.buffer_mut());

    let keys_style = Style::default().fg(theme.inactive_fg);
    let keys = vec![
        Line::from(Span::styled("Mouse  click / drag", keys_style)),
        Line::from(Span::styled("hjkl   move cursor", keys_style)),
        Line::from(Span::styled("Space  select", keys_style)),
        Line::from(Span::styled("P pause  R restart", keys_style)),
        Line::from(Span::styled("Q quit", keys_style)),
    ];
    Paragraph::new(keys).render(chunks[6], frame.buffer_mut());
}

/// One block per tile colour, then the bomb colour.
fn draw_colour_strip(frame: &mut Frame, theme: &Theme, area: Rect) {
    let colours = theme.tiles.iter().copied().chain([theme.bomb]);
    let block_w = (area.width / 6).max(1);
    for (i, c) in colours.enumerate() {
        let r = Rect {
            x: area.x + (i as u16) * block_w,
            y: area.y,
            width: block_w.saturating_sub(1).max(1),
            height: area.height.min(1),
        }
        .intersection(area);
        Paragraph::new("█").style(Style::default().fg(c).bg(c)).render(r, frame.buffer_mut());
    }
}

fn draw_pause_overlay(frame: &mut Frame, scene: &Scene<'_>, area: Rect) {
    let popup_w = 28u16;
    let popup_h = 5u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P: Resume    Q: Quit ",
            Style::default().fg(scene.theme.main_fg),
        )),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(scene.theme.grid).bg(scene.theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}

#[cfg(test)]
mod tests {
    use super::*;
    use match3tui::BoardConfig;

    fn view() -> BoardView {
        let grid = Grid::new(&BoardConfig::rectangle(4, 4)).unwrap();
        BoardView::new(Rect::new(10, 5, 4 * CELL_W, 4 * CELL_H), &grid)
    }

    #[test]
    fn test_click_in_a_cell_block_maps_to_that_cell() {
        let grid = Grid::new(&BoardConfig::rectangle(4, 4)).unwrap();
        let v = view();
        for cell in grid.cells() {
            let (col, row) = v.to_screen(cell.position);
            let world = v.to_world(col as u16 + 2, row as u16 + 1);
            assert_eq!(grid.nearest_cell_to(world).map(|c| c.id), Some(cell.id));
        }
    }

    #[test]
    fn test_tile_above_board_is_clipped() {
        let v = view();
        assert!(v.tile_rect(Vec2::new(0.0, 5.0)).is_none());
        let partly = v.tile_rect(Vec2::new(0.0, 0.12)).unwrap();
        assert_eq!(partly.y, 5);
        assert_eq!(partly.height, 1);
        assert_eq!(v.tile_rect(Vec2::ZERO), Some(Rect::new(11, 5, 4, 2)));
    }

    #[test]
    fn test_shake_decays_to_rest() {
        let shake = Shake {
            intensity: 6.0,
            duration: 0.2,
            elapsed: 0.2,
        };
        assert_eq!(shake.offset(), (0, 0));
    }

    #[test]
    fn test_burst_ring_is_bounded() {
        let theme = Theme::default();
        let mut effects = Effects::default();
        let events: Vec<BoardEvent> = (0..30)
            .map(|i| BoardEvent::TileCleared {
                tile: match3tui::TileId(i),
                color: match3tui::TileColor::Red,
                bomb: false,
                position: Vec2::ZERO,
            })
            .collect();
        effects.absorb(&events, &theme);
        assert_eq!(effects.bursts.len(), MAX_BURSTS);
    }
}
