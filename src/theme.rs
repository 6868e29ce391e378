//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use match3tui::TileColor;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// One Dark palette and UI colours loaded from a theme file.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Tile colours in `TileColor::ALL` order: red, green, blue, yellow, magenta.
    pub tiles: [Color; 5],
    pub bomb: Color,
    /// Board background.
    pub bg: Color,
    /// Board outline.
    pub grid: Color,
    /// Pipe-path outline.
    pub pipe: Color,
    /// Text (score, swaps).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Hints and secondary text.
    pub inactive_fg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

impl Theme {
    /// Hardcoded One Dark defaults: exact hex values from onedark.theme.
    pub fn onedark_default() -> Self {
        Self {
            tiles: [
                rgb(0xE0_6C_75), // cpu_end / red
                rgb(0x98_C3_79), // mem_box / green
                rgb(0x61_AF_EF), // cpu_box / blue
                rgb(0xE5_C0_7B), // cpu_mid / yellow
                rgb(0xC6_78_DD), // net_box / magenta
            ],
            bomb: rgb(0x56_B6_C2),        // hi_fg / cyan
            bg: rgb(0x31_35_3F),          // meter_bg
            grid: rgb(0x3F_44_4F),        // div_line
            pipe: rgb(0x5C_63_70),        // inactive_fg
            main_fg: rgb(0xAB_B2_BF),     // main_fg
            title: rgb(0xE5_C0_7B),       // title
            inactive_fg: rgb(0x5C_63_70), // inactive_fg
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// Falls back to One Dark defaults if path is None or the file is missing.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let path = match path {
            Some(p) if p.exists() => p,
            _ => return Ok(Self::default_for_palette(palette)),
        };
        let s = std::fs::read_to_string(path)?;
        let map = parse_theme_file(&s);
        let mut theme = Self::from_map(&map);
        theme.apply_palette(palette);
        Ok(theme)
    }

    fn default_for_palette(palette: crate::Palette) -> Self {
        let mut t = Self::onedark_default();
        t.apply_palette(palette);
        t
    }

    /// Override tile colours for high-contrast or colorblind play.
    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => {
                self.tiles = [
                    rgb(0xFF_00_00),
                    rgb(0x00_FF_00),
                    rgb(0x00_88_FF),
                    rgb(0xFF_FF_00),
                    rgb(0xFF_00_FF),
                ];
                self.bomb = rgb(0xFF_FF_FF);
            }
            crate::Palette::Colorblind => {
                // Tol's bright scheme; red and green never sit next to each other
                self.tiles = [
                    rgb(0xCC_33_11),
                    rgb(0x00_99_88),
                    rgb(0x00_77_BB),
                    rgb(0xEE_77_33),
                    rgb(0xEE_33_77),
                ];
                self.bomb = rgb(0xBB_BB_BB);
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            map.get(key)
                .and_then(|v| parse_hex(v.trim_matches('"').trim_matches('\'').trim()).ok())
        };
        let d = Self::onedark_default();
        Self {
            tiles: [
                get("cpu_end").or_else(|| get("temp_end")).unwrap_or(d.tiles[0]),
                get("mem_box").or_else(|| get("cpu_start")).unwrap_or(d.tiles[1]),
                get("cpu_box").unwrap_or(d.tiles[2]),
                get("cpu_mid").or_else(|| get("title")).unwrap_or(d.tiles[3]),
                get("net_box").unwrap_or(d.tiles[4]),
            ],
            bomb: get("hi_fg").or_else(|| get("proc_misc")).unwrap_or(d.bomb),
            bg: get("meter_bg").unwrap_or(d.bg),
            grid: get("div_line").unwrap_or(d.grid),
            pipe: get("inactive_fg").unwrap_or(d.pipe),
            main_fg: get("main_fg").unwrap_or(d.main_fg),
            title: get("title").unwrap_or(d.title),
            inactive_fg: get("inactive_fg").unwrap_or(d.inactive_fg),
        }
    }

    #[inline]
    pub fn tile_color(&self, color: TileColor) -> Color {
        let index = TileColor::ALL.iter().position(|&c| c == color).unwrap_or(0);
        self.tiles[index]
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(eq) = rest.find('=') {
            let value = rest[eq + 1..]
                .trim()
                .trim_matches('"')
                .trim_matches('\'')
                .to_string();
            if !value.is_empty() {
                map.insert(key.to_string(), value);
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    let channel = |range: std::ops::Range<usize>| {
        s.get(range)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .ok_or_else(invalid)
    };
    let (r, g, b) = match s.len() {
        6 => (channel(0..2)?, channel(2..4)?, channel(4..6)?),
        3 => (channel(0..1)? * 17, channel(1..2)? * 17, channel(2..3)? * 17),
        _ => return Err(invalid()),
    };
    Ok(Color::Rgb(r, g, b))
}

/// Mix `color` toward `bg`; `alpha` 1.0 keeps the colour, 0.0 gives the background.
pub fn blend(color: Color, bg: Color, alpha: f32) -> Color {
    let (Color::Rgb(r, g, b), Color::Rgb(br, bgc, bb)) = (color, bg) else {
        return if alpha >= 0.5 { color } else { bg };
    };
    let a = alpha.clamp(0.0, 1.0);
    let mix = |c: u8, base: u8| (base as f32 + (c as f32 - base as f32) * a).round() as u8;
    Color::Rgb(mix(r, br), mix(g, bgc), mix(b, bb))
}

/// Scale an RGB colour's brightness.
pub fn shade(color: Color, factor: f32) -> Color {
    match color {
        Color::Rgb(r, g, b) => {
            let s = |c: u8| (c as f32 * factor).clamp(0.0, 255.0) as u8;
            Color::Rgb(s(r), s(g), s(b))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_6() {
        let c = parse_hex("#98C379").unwrap();
        assert!(matches!(c, Color::Rgb(0x98, 0xC3, 0x79)));
    }

    #[test]
    fn test_parse_hex_3() {
        let c = parse_hex("#FFF").unwrap();
        assert!(matches!(c, Color::Rgb(255, 255, 255)));
        assert!(parse_hex("#12345").is_err());
        assert!(parse_hex("#GG0000").is_err());
    }

    #[test]
    fn test_parse_theme_line() {
        let map = parse_theme_file(r##"theme[meter_bg]="#31353F""##);
        assert_eq!(map.get("meter_bg"), Some(&"#31353F".to_string()));
    }

    #[test]
    fn test_theme_keys_map_to_tile_colours() {
        let map = parse_theme_file(
            r##"
theme[cpu_end]="#FF0000"
theme[div_line]='#010203'
"##,
        );
        let theme = Theme::from_map(&map);
        assert_eq!(theme.tile_color(TileColor::Red), Color::Rgb(255, 0, 0));
        assert_eq!(theme.grid, Color::Rgb(1, 2, 3));
        assert_eq!(theme.bg, Theme::onedark_default().bg);
    }

    #[test]
    fn test_blend_endpoints() {
        let c = Color::Rgb(200, 100, 0);
        let bg = Color::Rgb(0, 0, 100);
        assert_eq!(blend(c, bg, 1.0), c);
        assert_eq!(blend(c, bg, 0.0), bg);
        assert_eq!(blend(c, bg, 0.5), Color::Rgb(100, 50, 50));
    }
}
