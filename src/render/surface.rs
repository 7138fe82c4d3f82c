//! Recorded 2D drawing commands.
//!
//! A [`Frame`] is the output of one paint: the same calls a canvas 2D context
//! would receive, in order, so a host can replay them or serialise them.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// RGB color with an alpha channel in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub alpha: f64,
}

impl Color {
    pub const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, alpha: 1.0 }
    }

    /// Parse `#rrggbb`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#')?;
        if hex.len() != 6 {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn with_alpha(self, alpha: f64) -> Self {
        Self { alpha, ..self }
    }

    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.alpha >= 1.0 {
            write!(f, "{}", self.hex())
        } else {
            write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.alpha)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Color),
    /// Vertical gradient from `from` at `start` to `to` at `end`.
    LinearGradient {
        start: Point,
        end: Point,
        from: Color,
        to: Color,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Center,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Wipe the whole surface.
    Clear,
    /// Device pixel ratio scale applied once per frame.
    Scale(f64),
    BeginPath,
    MoveTo(Point),
    LineTo(Point),
    BezierTo { c1: Point, c2: Point, to: Point },
    QuadTo { control: Point, to: Point },
    Arc { center: Point, radius: f64 },
    ClosePath,
    Stroke { color: Color, width: f64 },
    Fill(Paint),
    Save,
    Restore,
    Translate(Point),
    /// Radians, clockwise in screen space.
    Rotate(f64),
    Text {
        text: String,
        at: Point,
        font_px: f64,
        color: Color,
        align: TextAlign,
    },
}

/// One painted frame in CSS pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub css_width: f64,
    pub css_height: f64,
    pub device_pixel_ratio: f64,
    pub commands: Vec<DrawCommand>,
}

impl Frame {
    /// Starts with the clear and pixel-ratio scale every paint begins with.
    pub fn new(css_width: f64, css_height: f64, device_pixel_ratio: f64) -> Self {
        Self {
            css_width,
            css_height,
            device_pixel_ratio,
            commands: vec![DrawCommand::Scale(device_pixel_ratio), DrawCommand::Clear],
        }
    }

    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    pub fn extend<I: IntoIterator<Item = DrawCommand>>(&mut self, commands: I) {
        self.commands.extend(commands);
    }

    /// Backing-store size in device pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.css_width * self.device_pixel_ratio).round() as u32,
            (self.css_height * self.device_pixel_ratio).round() as u32,
        )
    }

    /// Only the initial scale and clear were recorded.
    pub fn is_blank(&self) -> bool {
        self.commands.len() <= 2
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn stroke_count(&self, color: Color) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Stroke { color: sc, .. } if *sc == color))
            .count()
    }
}
