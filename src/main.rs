//! match3tui — match-3 tile puzzle in the terminal.

mod app;
mod controls;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use match3tui::BoardConfig;
use match3tui::geom::Vec2;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        init_logging(path)?;
    }
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let config = args.board_config();
    config.validate().context("invalid board")?;
    let mut app = App::new(args, config, theme)?;
    app.run()?;
    Ok(())
}

/// Log to a file only; the terminal belongs to the UI.
fn init_logging(path: &std::path::Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("match3tui=info")),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    Ok(())
}

/// Match-3 tile puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "match3tui",
    version,
    about = "Match-3 tile puzzle in the terminal. Swap neighbouring tiles to line up three or more of a colour.",
    long_about = "match3tui is a match-3 puzzle played in the terminal.\n\n\
        Swap two neighbouring tiles to make a row or column of three or more of the same colour. \
        Matched tiles clear, the tiles above fall down and new tiles drop in through the pipes \
        at the top of each column. Bombs clear every tile of the colour they are swapped with.\n\n\
        CONTROLS:\n  Mouse       Click a tile, then click or drag towards a neighbour\n  \
        Arrows/hjkl Move the cursor   Enter/Space Select\n  \
        P           Pause             R           Restart     Q / Esc    Quit\n\n\
        Use --theme to load a btop-style theme (e.g. onedark.theme)."
)]
pub struct Args {
    /// Board width in cells.
    #[arg(long, default_value = "8", value_name = "COLS")]
    pub width: usize,

    /// Board height in cells.
    #[arg(long, default_value = "8", value_name = "ROWS")]
    pub height: usize,

    /// Gap between cells in world units (tiles are 0.6 wide).
    #[arg(long, default_value = "0.1", value_name = "UNITS")]
    pub spacing: f32,

    /// Cell ids (y * width + x) that are holes, comma separated.
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    pub holes: Vec<usize>,

    /// Reference cell id of each spawn pipe, comma separated. Defaults to the top row.
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    pub pipes: Vec<usize>,

    /// Cells outlined as the pipe path, comma separated.
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    pub pipe_path: Vec<usize>,

    /// Fixed RNG seed; a random one is used if not set.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Probability that a new tile is a bomb.
    #[arg(long, default_value = "0.02", value_name = "P")]
    pub bomb_chance: f32,

    /// Simulation ticks per second.
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub tick_rate: f64,

    /// Target render frames per second.
    #[arg(long, default_value = "30.0", value_name = "RATE")]
    pub frame_rate: f64,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Skip swap and clear animations.
    #[arg(long)]
    pub no_animation: bool,

    /// Write logs to this file (RUST_LOG selects the level).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    pub fn board_config(&self) -> BoardConfig {
        let mut config = BoardConfig::rectangle(self.width, self.height).with_holes(self.holes.clone());
        if !self.pipes.is_empty() {
            config.spawn_pipes.clone_from(&self.pipes);
        }
        config.spacing = self.spacing;
        config.origin = Vec2::ZERO;
        config.pipe_path.clone_from(&self.pipe_path);
        config.bomb_chance = self.bomb_chance;
        config.seed = self.seed;
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_lists_are_comma_separated() {
        let args = Args::parse_from([
            "match3tui", "--width", "4", "--height", "3", "--holes", "0,3", "--pipes", "4,1,2,7",
        ]);
        let config = args.board_config();
        assert_eq!(config.holes, vec![0, 3]);
        assert_eq!(config.spawn_pipes, vec![4, 1, 2, 7]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_pipes_on_top_row() {
        let args = Args::parse_from(["match3tui", "--seed", "9"]);
        let config = args.board_config();
        assert_eq!(config.spawn_pipes, (0..8).collect::<Vec<_>>());
        assert_eq!(config.seed, Some(9));
    }
}
