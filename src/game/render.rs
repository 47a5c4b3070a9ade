//! Render Adapter
//!
//! Games draw their full state into a [`Frame`] every tick: an ordered
//! draw-command list that a thin client replays onto a canvas. Frames are
//! plain serde data, so the host can ship them as JSON.

use std::fmt;
use serde::{Serialize, Deserialize, Serializer, Deserializer};
use serde::de::Error as _;
use crate::core::vec2::{Rect, Vec2};
use crate::game::phase::Phase;

// =============================================================================
// COLOR
// =============================================================================

/// RGB colour, serialised as `#rrggbb`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0x00, 0x00, 0x00);
    pub const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);
    pub const RED: Color = Color::rgb(0xef, 0x44, 0x44);
    pub const GREEN: Color = Color::rgb(0x22, 0xc5, 0x5e);
    pub const BLUE: Color = Color::rgb(0x3b, 0x82, 0xf6);
    pub const YELLOW: Color = Color::rgb(0xea, 0xb3, 0x08);
    pub const ORANGE: Color = Color::rgb(0xf9, 0x73, 0x16);
    pub const PURPLE: Color = Color::rgb(0xa8, 0x55, 0xf7);
    pub const GRAY: Color = Color::rgb(0x6b, 0x72, 0x80);
    pub const LIGHT_GRAY: Color = Color::rgb(0xe5, 0xe7, 0xeb);
    pub const SKY: Color = Color::rgb(0x87, 0xce, 0xeb);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` (leading `#` optional).
    pub fn from_hex(s: &str) -> Option<Color> {
        let digits = s.strip_prefix('#').unwrap_or(s);
        let bytes = hex::decode(digits).ok()?;
        match bytes.as_slice() {
            [r, g, b] => Some(Color::rgb(*r, *g, *b)),
            _ => None,
        }
    }

    /// `#rrggbb`
    pub fn to_hex(self) -> String {
        format!("#{}", hex::encode([self.r, self.g, self.b]))
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Color({})", self.to_hex())
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).ok_or_else(|| D::Error::custom(format!("invalid colour {s:?}")))
    }
}

// =============================================================================
// DRAW COMMANDS
// =============================================================================

/// Horizontal text anchor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// One drawing primitive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    /// Fill the whole frame
    Clear { color: Color },
    /// Filled rectangle
    FillRect { rect: Rect, color: Color },
    /// Rectangle outline
    StrokeRect { rect: Rect, color: Color, width: f32 },
    /// Filled circle centred on `center`
    FillCircle { center: Vec2, radius: f32, color: Color },
    /// Straight line
    Line { from: Vec2, to: Vec2, color: Color, width: f32 },
    /// Text anchored at `pos` (baseline)
    Text { pos: Vec2, text: String, size: f32, color: Color, align: TextAlign },
    /// Translucent banner over the whole frame
    Overlay { title: String, subtitle: Option<String> },
}

/// A full redraw of one game state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub width: f32,
    pub height: f32,
    pub commands: Vec<DrawCommand>,
}

impl Frame {
    /// Empty frame of the given canvas size.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            commands: Vec::with_capacity(64),
        }
    }

    pub fn clear(&mut self, color: Color) {
        self.commands.push(DrawCommand::Clear { color });
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.commands.push(DrawCommand::FillRect { rect, color });
    }

    pub fn stroke_rect(&mut self, rect: Rect, color: Color, width: f32) {
        self.commands.push(DrawCommand::StrokeRect { rect, color, width });
    }

    pub fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color) {
        self.commands.push(DrawCommand::FillCircle { center, radius, color });
    }

    pub fn line(&mut self, from: Vec2, to: Vec2, color: Color, width: f32) {
        self.commands.push(DrawCommand::Line { from, to, color, width });
    }

    pub fn text(&mut self, pos: Vec2, text: impl Into<String>, size: f32, color: Color, align: TextAlign) {
        self.commands.push(DrawCommand::Text {
            pos,
            text: text.into(),
            size,
            color,
            align,
        });
    }

    /// HUD line in the top-left corner.
    pub fn hud(&mut self, line: usize, text: impl Into<String>, color: Color) {
        let pos = Vec2::new(10.0, 24.0 + 24.0 * line as f32);
        self.text(pos, text, 20.0, color, TextAlign::Left);
    }

    pub fn overlay(&mut self, title: impl Into<String>, subtitle: Option<String>) {
        self.commands.push(DrawCommand::Overlay {
            title: title.into(),
            subtitle,
        });
    }

    /// Banner for every phase except Running.
    pub fn phase_banner(&mut self, phase: Phase, score: u32) {
        match phase {
            Phase::Running => {}
            Phase::Idle => self.overlay("Press start", None),
            Phase::Paused => self.overlay("Paused", None),
            Phase::Over => self.overlay("Game Over", Some(format!("Score: {score}"))),
            Phase::Won => self.overlay("You Win!", Some(format!("Score: {score}"))),
        }
    }

    /// Whether any command is an overlay banner.
    pub fn has_overlay(&self) -> bool {
        self.commands.iter().any(|c| matches!(c, DrawCommand::Overlay { .. }))
    }
}

// =============================================================================
// BOARD LAYOUT
// =============================================================================

/// Square-cell grid placed on the canvas, for board games.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLayout {
    pub origin: Vec2,
    pub cell: f32,
    pub rows: u8,
    pub cols: u8,
}

impl GridLayout {
    pub const fn new(origin: Vec2, cell: f32, rows: u8, cols: u8) -> Self {
        Self { origin, cell, rows, cols }
    }

    /// Canvas size needed for the grid plus its origin margin on both sides.
    pub fn canvas_size(&self) -> (f32, f32) {
        (
            self.origin.x * 2.0 + self.cell * self.cols as f32,
            self.origin.y * 2.0 + self.cell * self.rows as f32,
        )
    }

    pub fn cell_rect(&self, row: u8, col: u8) -> Rect {
        Rect::new(
            self.origin.x + col as f32 * self.cell,
            self.origin.y + row as f32 * self.cell,
            self.cell,
            self.cell,
        )
    }

    pub fn cell_center(&self, row: u8, col: u8) -> Vec2 {
        let r = self.cell_rect(row, col);
        Vec2::new(r.x + self.cell / 2.0, r.y + self.cell / 2.0)
    }

    /// Map a canvas point to the `(row, col)` beneath it.
    pub fn cell_at(&self, x: f32, y: f32) -> Option<(u8, u8)> {
        let col = ((x - self.origin.x) / self.cell).floor();
        let row = ((y - self.origin.y) / self.cell).floor();
        if col < 0.0 || row < 0.0 || col >= self.cols as f32 || row >= self.rows as f32 {
            return None;
        }
        Some((row as u8, col as u8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_hex() {
        assert_eq!(Color::rgb(0x12, 0xab, 0xff).to_hex(), "#12abff");
        assert_eq!(Color::from_hex("#ef4444"), Some(Color::RED));
        assert_eq!(Color::from_hex("ef4444"), Some(Color::RED));
        assert_eq!(Color::from_hex("#ef44"), None);
        assert_eq!(Color::from_hex("#zzzzzz"), None);
    }

    #[test]
    fn test_frame_json() {
        let mut frame = Frame::new(600.0, 300.0);
        frame.clear(Color::BLACK);
        frame.fill_rect(Rect::new(20.0, 120.0, 10.0, 60.0), Color::WHITE);

        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["commands"][0]["op"], "clear");
        assert_eq!(json["commands"][0]["color"], "#000000");
        assert_eq!(json["commands"][1]["rect"]["h"], 60.0);

        let back: Frame = serde_json::from_value(json).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn test_phase_banner() {
        let mut frame = Frame::new(100.0, 100.0);
        frame.phase_banner(Phase::Running, 0);
        assert!(!frame.has_overlay());

        frame.phase_banner(Phase::Won, 40);
        assert!(frame.has_overlay());
        assert!(matches!(
            frame.commands.last(),
            Some(DrawCommand::Overlay { title, subtitle: Some(s) }) if title == "You Win!" && s == "Score: 40"
        ));
    }

    #[test]
    fn test_grid_layout() {
        let grid = GridLayout::new(Vec2::new(10.0, 10.0), 50.0, 3, 3);
        assert_eq!(grid.canvas_size(), (170.0, 170.0));
        assert_eq!(grid.cell_rect(1, 2), Rect::new(110.0, 60.0, 50.0, 50.0));
        assert_eq!(grid.cell_at(115.0, 65.0), Some((1, 2)));
        assert_eq!(grid.cell_at(5.0, 65.0), None);
        assert_eq!(grid.cell_at(165.0, 65.0), None);
    }
}
