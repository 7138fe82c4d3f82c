//! Plot-area layout and value-to-pixel mapping.

use crate::bundle::ValueRange;

use super::surface::Point;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Margins {
    /// Interactive chart.
    pub const FULL: Margins = Margins {
        top: 40.0,
        right: 20.0,
        bottom: 20.0,
        left: 20.0,
    };

    /// Snapshot previews.
    pub const COMPACT: Margins = Margins {
        top: 30.0,
        right: 16.0,
        bottom: 20.0,
        left: 20.0,
    };
}

impl Default for Margins {
    fn default() -> Self {
        Self::FULL
    }
}

/// Host-provided canvas bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
    pub device_pixel_ratio: f64,
}

impl CanvasSize {
    pub fn new(width: f64, height: f64, device_pixel_ratio: f64) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio,
        }
    }
}

/// The region inside the margins where series are plotted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotArea {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl PlotArea {
    pub fn new(size: CanvasSize, margins: Margins) -> Self {
        Self {
            left: margins.left,
            top: margins.top,
            width: size.width - margins.left - margins.right,
            height: size.height - margins.top - margins.bottom,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Bars spread evenly from the left to the right edge. A single bar sits
    /// on the left edge.
    pub fn x_for(&self, index: usize, count: usize) -> f64 {
        if count < 2 {
            return self.left;
        }
        self.left + self.width * index as f64 / (count - 1) as f64
    }

    /// Higher values map to smaller `y`.
    pub fn y_for(&self, value: f64, range: &ValueRange) -> f64 {
        self.top + self.height * (1.0 - range.normalize(value))
    }

    pub fn point(&self, index: usize, count: usize, value: f64, range: &ValueRange) -> Point {
        Point::new(self.x_for(index, count), self.y_for(value, range))
    }

    /// Horizontal pointer position as a fraction of the width, clamped to `[0, 1]`.
    pub fn x_fraction(&self, x: f64) -> f64 {
        if self.width <= 0.0 {
            return 0.0;
        }
        ((x - self.left) / self.width).clamp(0.0, 1.0)
    }
}
