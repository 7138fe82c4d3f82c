//! Chart renderer: turns a chart view into a recorded frame of draw commands.
//!
//! Rendering is a pure function of its inputs. The only output besides the
//! frame is the screen-space box of every annotation label, which the
//! interaction layer uses for hit-testing until the next paint.

pub mod geometry;
pub mod spline;
pub mod surface;
pub mod svg;

use tracing::trace;

use crate::annotation::{Annotation, BoundingBox, change_label, percent_change};
use crate::bundle::{IndicatorBundle, IndicatorData, ValueRange};
use crate::model::{IndicatorKind, PriceBar, SmoothedPoint};

pub use geometry::{CanvasSize, Margins, PlotArea};
pub use surface::{Color, DrawCommand, Frame, Paint, Point, TextAlign};

const PRICE_PADDING: f64 = 0.05;
const HIGHLIGHT_RADIUS: f64 = 4.0;
const BUBBLE_PADDING: f64 = 6.0;
const BUBBLE_HEIGHT: f64 = 18.0;
const BUBBLE_RADIUS: f64 = 4.0;

/// What the chart is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartStatus {
    #[default]
    Empty,
    Loading,
    Ready,
    Failed,
}

/// Colors, stroke widths and text metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub up: Color,
    pub down: Color,
    pub annotation: Color,
    pub muted_text: Color,
    pub price_width: f64,
    pub indicator_width: f64,
    pub annotation_width: f64,
    pub label_font_px: f64,
    /// Average glyph advance as a fraction of the font size.
    pub char_advance: f64,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            up: Color::rgb(0x10, 0xb9, 0x81),
            down: Color::rgb(0xef, 0x44, 0x44),
            annotation: Color::rgb(0x25, 0x63, 0xeb),
            muted_text: Color::rgb(0x6b, 0x72, 0x80),
            price_width: 2.0,
            indicator_width: 1.5,
            annotation_width: 3.0,
            label_font_px: 12.0,
            char_advance: 0.6,
        }
    }
}

impl Theme {
    pub fn indicator_color(&self, kind: IndicatorKind) -> Color {
        match kind {
            IndicatorKind::MovingAverage => Color::rgb(0x1f, 0x77, 0xb4),
            IndicatorKind::Rsi => Color::rgb(0x94, 0x67, 0xbd),
            IndicatorKind::Macd => Color::rgb(0x17, 0xbe, 0xcf),
            IndicatorKind::Bollinger => Color::rgb(0x9c, 0xa3, 0xaf),
            IndicatorKind::Stochastic => Color::rgb(0xff, 0x7f, 0x0e),
            IndicatorKind::Atr => Color::rgb(0xd6, 0x27, 0x28),
            IndicatorKind::Obv => Color::rgb(0x7f, 0x7f, 0x7f),
            IndicatorKind::Trendline => Color::rgb(0x1f, 0x2a, 0x44),
        }
    }

    /// Long leg of the moving-average pair.
    pub fn ma_long_color(&self) -> Color {
        Color::rgb(0x2c, 0xa0, 0x2c)
    }

    pub fn text_width(&self, text: &str, font_px: f64) -> f64 {
        text.chars().count() as f64 * font_px * self.char_advance
    }
}

/// Everything one paint reads.
#[derive(Debug, Clone, Copy)]
pub struct ChartView<'a> {
    pub status: ChartStatus,
    pub bars: &'a [PriceBar],
    pub smoothed: &'a [SmoothedPoint],
    pub bundle: &'a IndicatorBundle,
    pub annotations: &'a [Annotation],
    pub highlight: Option<Point>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    pub frame: Frame,
    /// Label box per annotation, index-aligned with `ChartView::annotations`.
    /// `None` where the annotation could not be placed.
    pub annotation_boxes: Vec<Option<BoundingBox>>,
}

/// Price axis: smoothed close range padded by 5% on both sides.
pub fn price_range(smoothed: &[SmoothedPoint]) -> Option<ValueRange> {
    ValueRange::from_values(smoothed.iter().map(|p| p.close)).map(|r| r.padded(PRICE_PADDING))
}

#[derive(Debug, Clone, Default)]
pub struct Renderer {
    margins: Margins,
    theme: Theme,
}

impl Renderer {
    pub fn new(margins: Margins, theme: Theme) -> Self {
        Self { margins, theme }
    }

    pub fn full() -> Self {
        Self::new(Margins::FULL, Theme::default())
    }

    pub fn compact() -> Self {
        Self::new(Margins::COMPACT, Theme::default())
    }

    pub fn margins(&self) -> Margins {
        self.margins
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn plot_area(&self, size: CanvasSize) -> PlotArea {
        PlotArea::new(size, self.margins)
    }

    pub fn render(&self, size: CanvasSize, view: &ChartView<'_>) -> RenderOutput {
        let mut frame = Frame::new(size.width, size.height, size.device_pixel_ratio);
        let mut annotation_boxes = vec![None; view.annotations.len()];

        match view.status {
            ChartStatus::Loading => {
                self.status_text(&mut frame, size, "Loading chart...", 16.0, self.theme.muted_text);
            }
            ChartStatus::Failed => {
                self.status_text(&mut frame, size, "Failed to load chart data.", 14.0, self.theme.down);
            }
            ChartStatus::Empty | ChartStatus::Ready => {
                if let Some(range) = price_range(view.smoothed) {
                    let area = self.plot_area(size);
                    self.draw_price(&mut frame, &area, &range, view);
                    self.draw_indicators(&mut frame, &area, &range, view);
                    annotation_boxes = self.draw_annotations(&mut frame, &area, &range, view);
                }
            }
        }

        trace!(commands = frame.commands.len(), "chart rendered");
        RenderOutput {
            frame,
            annotation_boxes,
        }
    }

    fn status_text(&self, frame: &mut Frame, size: CanvasSize, text: &str, font_px: f64, color: Color) {
        frame.push(DrawCommand::Text {
            text: text.to_string(),
            at: Point::new(size.width / 2.0, size.height / 2.0),
            font_px,
            color,
            align: TextAlign::Center,
        });
    }

    fn draw_price(&self, frame: &mut Frame, area: &PlotArea, range: &ValueRange, view: &ChartView<'_>) {
        let smoothed = view.smoothed;
        let n = smoothed.len();
        let points: Vec<Point> = smoothed
            .iter()
            .enumerate()
            .map(|(i, p)| area.point(i, n, p.close, range))
            .collect();

        let trend_up = match (smoothed.first(), smoothed.last()) {
            (Some(first), Some(last)) => last.close >= first.close,
            _ => true,
        };
        let color = if trend_up { self.theme.up } else { self.theme.down };

        let path = spline::spline_path(&points);
        frame.push(DrawCommand::BeginPath);
        frame.extend(path.iter().cloned());
        frame.push(DrawCommand::Stroke {
            color,
            width: self.theme.price_width,
        });

        frame.push(DrawCommand::BeginPath);
        frame.extend(path);
        frame.extend([
            DrawCommand::LineTo(Point::new(area.right(), area.bottom())),
            DrawCommand::LineTo(Point::new(area.left, area.bottom())),
            DrawCommand::ClosePath,
            DrawCommand::Fill(Paint::LinearGradient {
                start: Point::new(0.0, area.top),
                end: Point::new(0.0, area.bottom()),
                from: color.with_alpha(0.2),
                to: color.with_alpha(0.0),
            }),
        ]);

        if let Some(center) = view.highlight {
            frame.extend([
                DrawCommand::BeginPath,
                DrawCommand::Arc {
                    center,
                    radius: HIGHLIGHT_RADIUS,
                },
                DrawCommand::Fill(Paint::Solid(color)),
            ]);
        }
    }

    fn draw_indicators(
        &self,
        frame: &mut Frame,
        area: &PlotArea,
        price: &ValueRange,
        view: &ChartView<'_>,
    ) {
        if view.bundle.is_empty() {
            return;
        }
        let n = view.smoothed.len();
        frame.push(DrawCommand::Save);
        for (kind, entry) in view.bundle.iter() {
            let Some(own) = entry.range else {
                continue;
            };
            let scale = if kind.is_price_denominated() { *price } else { own };
            let color = self.theme.indicator_color(kind);
            let strokes: Vec<(&[Option<f64>], Color)> = match &entry.data {
                IndicatorData::Line(series) => vec![(series.as_slice(), color)],
                IndicatorData::MovingAverage { short, long } => {
                    vec![(short.as_slice(), color), (long.as_slice(), self.theme.ma_long_color())]
                }
                IndicatorData::Bands(bands) => {
                    vec![(bands.upper.as_slice(), color), (bands.lower.as_slice(), color)]
                }
            };

            for (series, color) in strokes {
                for run in spline::runs(series, |i, v| area.point(i, n, v, &scale)) {
                    frame.push(DrawCommand::BeginPath);
                    frame.extend(spline::spline_path(&run));
                    frame.push(DrawCommand::Stroke {
                        color,
                        width: self.theme.indicator_width,
                    });
                }
            }
        }
        frame.push(DrawCommand::Restore);
    }

    fn draw_annotations(
        &self,
        frame: &mut Frame,
        area: &PlotArea,
        price: &ValueRange,
        view: &ChartView<'_>,
    ) -> Vec<Option<BoundingBox>> {
        if view.annotations.is_empty() {
            return Vec::new();
        }
        let n = view.smoothed.len();
        let mut boxes = Vec::with_capacity(view.annotations.len());

        frame.push(DrawCommand::Save);
        for annotation in view.annotations {
            let Some((s, e)) = annotation.resolve(view.bars) else {
                boxes.push(None);
                continue;
            };
            let (Some(s_pt), Some(e_pt)) = (view.smoothed.get(s), view.smoothed.get(e)) else {
                boxes.push(None);
                continue;
            };
            let start = area.point(s, n, s_pt.close, price);
            let end = area.point(e, n, e_pt.close, price);
            frame.extend([
                DrawCommand::BeginPath,
                DrawCommand::MoveTo(start),
                DrawCommand::LineTo(end),
                DrawCommand::Stroke {
                    color: self.theme.annotation,
                    width: self.theme.annotation_width,
                },
            ]);

            let label = change_label(percent_change(view.bars[s].close, view.bars[e].close));
            let bubble_w = self.theme.text_width(&label, self.theme.label_font_px) + BUBBLE_PADDING * 2.0;
            let mid = Point::new((start.x + end.x) / 2.0, (start.y + end.y) / 2.0);
            let angle = (end.y - start.y).atan2(end.x - start.x);

            frame.extend([
                DrawCommand::Save,
                DrawCommand::Translate(mid),
                DrawCommand::Rotate(angle),
                DrawCommand::BeginPath,
            ]);
            frame.extend(rounded_rect(bubble_w, BUBBLE_HEIGHT, BUBBLE_RADIUS));
            frame.extend([
                DrawCommand::ClosePath,
                DrawCommand::Fill(Paint::Solid(self.theme.annotation)),
                DrawCommand::Text {
                    text: label,
                    at: Point::new(0.0, 0.0),
                    font_px: self.theme.label_font_px,
                    color: Color::WHITE,
                    align: TextAlign::Center,
                },
                DrawCommand::Restore,
            ]);

            boxes.push(Some(BoundingBox::of_rotated_rect(mid.x, mid.y, bubble_w, BUBBLE_HEIGHT, angle)));
        }
        frame.push(DrawCommand::Restore);
        boxes
    }
}

/// Rounded rectangle centered on the origin.
fn rounded_rect(width: f64, height: f64, radius: f64) -> Vec<DrawCommand> {
    let (w2, h2) = (width / 2.0, height / 2.0);
    let p = Point::new;
    vec![
        DrawCommand::MoveTo(p(-w2 + radius, -h2)),
        DrawCommand::LineTo(p(w2 - radius, -h2)),
        DrawCommand::QuadTo { control: p(w2, -h2), to: p(w2, -h2 + radius) },
        DrawCommand::LineTo(p(w2, h2 - radius)),
        DrawCommand::QuadTo { control: p(w2, h2), to: p(w2 - radius, h2) },
        DrawCommand::LineTo(p(-w2 + radius, h2)),
        DrawCommand::QuadTo { control: p(-w2, h2), to: p(-w2, h2 - radius) },
        DrawCommand::LineTo(p(-w2, -h2 + radius)),
        DrawCommand::QuadTo { control: p(-w2, -h2), to: p(-w2 + radius, -h2) },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::IndicatorSuite;
    use crate::indicator::test_bars::bars_from_closes;
    use crate::model::ActiveIndicators;
    use crate::smoothing::smooth_closes;

    const SIZE: CanvasSize = CanvasSize {
        width: 760.0,
        height: 400.0,
        device_pixel_ratio: 1.0,
    };

    struct Fixture {
        bars: Vec<PriceBar>,
        smoothed: Vec<SmoothedPoint>,
        bundle: IndicatorBundle,
    }

    impl Fixture {
        fn new(closes: &[f64], kinds: &[IndicatorKind]) -> Self {
            let bars = bars_from_closes(closes);
            let smoothed = smooth_closes(&bars, 1);
            let active: ActiveIndicators = kinds.iter().copied().collect();
            let bundle = IndicatorBundle::compute(&bars, &active, &IndicatorSuite::default());
            Self {
                bars,
                smoothed,
                bundle,
            }
        }

        fn view<'a>(&'a self, annotations: &'a [Annotation]) -> ChartView<'a> {
            ChartView {
                status: ChartStatus::Ready,
                bars: &self.bars,
                smoothed: &self.smoothed,
                bundle: &self.bundle,
                annotations,
                highlight: None,
            }
        }
    }

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn no_data_renders_blank_frame() {
        let fixture = Fixture::new(&[], &[]);
        let output = Renderer::full().render(SIZE, &fixture.view(&[]));
        assert!(output.frame.is_blank());
        assert!(output.annotation_boxes.is_empty());
    }

    #[test]
    fn status_frames_show_messages() {
        let fixture = Fixture::new(&rising(5), &[]);
        let mut view = fixture.view(&[]);

        view.status = ChartStatus::Loading;
        let loading = Renderer::full().render(SIZE, &view).frame;
        assert_eq!(loading.texts().collect::<Vec<_>>(), vec!["Loading chart..."]);

        view.status = ChartStatus::Failed;
        let failed = Renderer::full().render(SIZE, &view).frame;
        assert_eq!(failed.texts().collect::<Vec<_>>(), vec!["Failed to load chart data."]);
    }

    #[test]
    fn rendering_is_idempotent() {
        let fixture = Fixture::new(&rising(60), &[IndicatorKind::MovingAverage, IndicatorKind::Rsi]);
        let annotations = [Annotation::new(fixture.bars[3].date, fixture.bars[40].date)];
        let renderer = Renderer::full();
        let first = renderer.render(SIZE, &fixture.view(&annotations));
        let second = renderer.render(SIZE, &fixture.view(&annotations));
        assert_eq!(first, second);
    }

    #[test]
    fn direction_picks_line_color() {
        let theme = Theme::default();
        let up = Fixture::new(&[1.0, 2.0, 3.0], &[]);
        let frame = Renderer::full().render(SIZE, &up.view(&[])).frame;
        assert_eq!(frame.stroke_count(theme.up), 1);

        let down = Fixture::new(&[3.0, 2.0, 1.0], &[]);
        let frame = Renderer::full().render(SIZE, &down.view(&[])).frame;
        assert_eq!(frame.stroke_count(theme.down), 1);
        assert_eq!(frame.stroke_count(theme.up), 0);
    }

    #[test]
    fn degenerate_indicator_is_skipped() {
        let theme = Theme::default();
        let fixture = Fixture::new(&rising(10), &[IndicatorKind::Macd, IndicatorKind::Obv]);
        let frame = Renderer::full().render(SIZE, &fixture.view(&[])).frame;
        assert_eq!(frame.stroke_count(theme.indicator_color(IndicatorKind::Macd)), 0);
        assert_eq!(frame.stroke_count(theme.indicator_color(IndicatorKind::Obv)), 1);
    }

    #[test]
    fn composite_indicators_draw_each_leg() {
        let theme = Theme::default();
        let fixture = Fixture::new(&rising(60), &[IndicatorKind::MovingAverage, IndicatorKind::Bollinger]);
        let frame = Renderer::full().render(SIZE, &fixture.view(&[])).frame;
        assert_eq!(frame.stroke_count(theme.indicator_color(IndicatorKind::MovingAverage)), 1);
        assert_eq!(frame.stroke_count(theme.ma_long_color()), 1);
        // upper and lower only
        assert_eq!(frame.stroke_count(theme.indicator_color(IndicatorKind::Bollinger)), 2);
    }

    #[test]
    fn annotation_label_and_box() {
        let mut closes = vec![100.0; 11];
        closes[10] = 110.0;
        let fixture = Fixture::new(&closes, &[]);
        let annotations = [Annotation::new(fixture.bars[0].date, fixture.bars[10].date)];
        let output = Renderer::full().render(SIZE, &fixture.view(&annotations));
        assert!(output.frame.texts().any(|t| t == "+10.00%"));
        assert_eq!(output.annotation_boxes.len(), 1);

        let area = Renderer::full().plot_area(SIZE);
        let range = price_range(&fixture.smoothed).unwrap();
        let mid_x = (area.x_for(0, 11) + area.x_for(10, 11)) / 2.0;
        let mid_y = (area.y_for(100.0, &range) + area.y_for(110.0, &range)) / 2.0;
        assert!(output.annotation_boxes[0].unwrap().contains(mid_x, mid_y));
    }

    #[test]
    fn unplaceable_annotation_keeps_box_indices_aligned() {
        let mut closes = vec![100.0; 11];
        closes[10] = 110.0;
        let fixture = Fixture::new(&closes, &[]);
        let annotations = [
            Annotation::new(fixture.bars[0].date, fixture.bars[10].date),
            Annotation::new(fixture.bars[2].date, fixture.bars[8].date),
        ];
        // smoothed series shorter than the bars: the first annotation ends past it
        let short = &fixture.smoothed[..9];
        let view = ChartView {
            smoothed: short,
            ..fixture.view(&annotations)
        };
        let output = Renderer::full().render(SIZE, &view);
        assert_eq!(output.annotation_boxes.len(), 2);
        assert!(output.annotation_boxes[0].is_none());
        assert!(output.annotation_boxes[1].is_some());
    }

    #[test]
    fn annotations_without_price_data_have_no_boxes() {
        let fixture = Fixture::new(&rising(5), &[]);
        let annotations = [Annotation::new(fixture.bars[0].date, fixture.bars[4].date)];
        let view = ChartView {
            smoothed: &[],
            ..fixture.view(&annotations)
        };
        let output = Renderer::full().render(SIZE, &view);
        assert_eq!(output.annotation_boxes, vec![None]);
    }

    #[test]
    fn highlight_draws_marker() {
        let fixture = Fixture::new(&rising(5), &[]);
        let mut view = fixture.view(&[]);
        view.highlight = Some(Point::new(100.0, 100.0));
        let frame = Renderer::full().render(SIZE, &view).frame;
        assert!(frame.commands.iter().any(|c| matches!(
            c,
            DrawCommand::Arc { radius, .. } if *radius == HIGHLIGHT_RADIUS
        )));
    }

    #[test]
    fn compact_layout_uses_smaller_margins() {
        let area = Renderer::compact().plot_area(SIZE);
        assert_eq!(area.top, 30.0);
        assert_eq!(area.width, 760.0 - 16.0 - 20.0);
    }
}
