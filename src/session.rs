//! One open chart: its data, computed indicators, annotations and pointer
//! state, with a generation guard so only the latest load is applied.

use error_stack::Report;
use tracing::{debug, info, warn};

use crate::annotation::{Annotation, BoundingBox};
use crate::bundle::{IndicatorBundle, IndicatorSuite};
use crate::error::SourceError;
use crate::interaction::{Authoring, AuthoringState, HoverInfo, PointerAction, hover};
use crate::model::{ActiveIndicators, IndicatorKind, PriceBar, SmoothedPoint, Timeframe};
use crate::render::{CanvasSize, ChartStatus, ChartView, Frame, Point, RenderOutput, Renderer, price_range};
use crate::smoothing::{default_window, smooth_closes};
use crate::source::BarSource;

/// Issued by [`ChartSession::begin_load`]; only the newest ticket applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub timeframe: Timeframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied { bars: usize },
    /// A newer load was issued after this one.
    Stale,
    /// The source failed or returned nothing; prior data is kept.
    Failed,
}

pub struct ChartSession {
    symbol: String,
    timeframe: Option<Timeframe>,
    bars: Vec<PriceBar>,
    smoothed: Vec<SmoothedPoint>,
    suite: IndicatorSuite,
    active: ActiveIndicators,
    bundle: IndicatorBundle,
    annotations: Vec<Annotation>,
    annotation_boxes: Vec<Option<BoundingBox>>,
    authoring: Authoring,
    hover: Option<HoverInfo>,
    generation: u64,
    status: ChartStatus,
    size: CanvasSize,
    renderer: Renderer,
    frame: Frame,
}

impl ChartSession {
    pub fn new(symbol: impl Into<String>, size: CanvasSize, suite: IndicatorSuite) -> Self {
        Self::with_renderer(symbol, size, suite, Renderer::full())
    }

    pub fn with_renderer(
        symbol: impl Into<String>,
        size: CanvasSize,
        suite: IndicatorSuite,
        renderer: Renderer,
    ) -> Self {
        let mut session = Self {
            symbol: symbol.into().to_uppercase(),
            timeframe: None,
            bars: Vec::new(),
            smoothed: Vec::new(),
            suite,
            active: ActiveIndicators::new(),
            bundle: IndicatorBundle::default(),
            annotations: Vec::new(),
            annotation_boxes: Vec::new(),
            authoring: Authoring::default(),
            hover: None,
            generation: 0,
            status: ChartStatus::Empty,
            size,
            renderer,
            frame: Frame::new(size.width, size.height, size.device_pixel_ratio),
        };
        session.redraw();
        session
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Option<Timeframe> {
        self.timeframe
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn smoothed(&self) -> &[SmoothedPoint] {
        &self.smoothed
    }

    pub fn suite(&self) -> &IndicatorSuite {
        &self.suite
    }

    pub fn active(&self) -> &ActiveIndicators {
        &self.active
    }

    pub fn bundle(&self) -> &IndicatorBundle {
        &self.bundle
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn annotation_boxes(&self) -> &[Option<BoundingBox>] {
        &self.annotation_boxes
    }

    pub fn authoring_state(&self) -> AuthoringState {
        self.authoring.state()
    }

    pub fn hover(&self) -> Option<&HoverInfo> {
        self.hover.as_ref()
    }

    pub fn status(&self) -> ChartStatus {
        self.status
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn size(&self) -> CanvasSize {
        self.size
    }

    /// The last painted frame.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn latest_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    pub fn trend_relative_index(&self) -> Option<f64> {
        self.bundle.trend_relative_index(self.latest_close()?)
    }

    /// Start loading `timeframe`; any earlier ticket becomes stale.
    pub fn begin_load(&mut self, timeframe: Timeframe) -> LoadTicket {
        self.generation += 1;
        self.timeframe = Some(timeframe);
        self.status = ChartStatus::Loading;
        self.hover = None;
        info!(symbol = %self.symbol, timeframe = %timeframe, generation = self.generation, "chart load issued");
        self.redraw();
        LoadTicket {
            generation: self.generation,
            timeframe,
        }
    }

    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<PriceBar>, Report<SourceError>>,
    ) -> LoadOutcome {
        if ticket.generation != self.generation {
            warn!(
                symbol = %self.symbol,
                timeframe = %ticket.timeframe,
                ticket = ticket.generation,
                current = self.generation,
                "discarding stale chart load"
            );
            return LoadOutcome::Stale;
        }

        let bars = match result {
            Ok(bars) if !bars.is_empty() => bars,
            Ok(_) => {
                warn!(symbol = %self.symbol, timeframe = %ticket.timeframe, "chart load returned no bars");
                self.fail();
                return LoadOutcome::Failed;
            }
            Err(report) => {
                warn!(symbol = %self.symbol, timeframe = %ticket.timeframe, error = ?report, "chart load failed");
                self.fail();
                return LoadOutcome::Failed;
            }
        };

        let count = bars.len();
        self.smoothed = smooth_closes(&bars, default_window(count));
        self.bars = bars;
        self.bundle = IndicatorBundle::compute(&self.bars, &self.active, &self.suite);
        self.annotations.clear();
        self.authoring.reset();
        self.hover = None;
        self.status = ChartStatus::Ready;
        info!(symbol = %self.symbol, timeframe = %ticket.timeframe, bars = count, "chart load applied");
        self.redraw();
        LoadOutcome::Applied { bars: count }
    }

    /// Issue a load and apply it.
    pub async fn load(&mut self, source: &dyn BarSource, timeframe: Timeframe) -> LoadOutcome {
        let ticket = self.begin_load(timeframe);
        let result = source.fetch_bars(&self.symbol, timeframe).await;
        self.complete_load(ticket, result)
    }

    fn fail(&mut self) {
        self.status = ChartStatus::Failed;
        self.redraw();
    }

    /// Returns `true` when `kind` is now active.
    pub fn toggle_indicator(&mut self, kind: IndicatorKind) -> bool {
        let on = self.active.toggle(kind);
        debug!(indicator = %kind, active = on, "indicator toggled");
        self.recompute();
        on
    }

    pub fn set_active(&mut self, active: ActiveIndicators) {
        self.active = active;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.bundle = IndicatorBundle::compute(&self.bars, &self.active, &self.suite);
        self.redraw();
    }

    pub fn add_annotation(&mut self, annotation: Annotation) {
        info!(start = %annotation.start, end = %annotation.end, "annotation added");
        self.annotations.push(annotation);
        self.redraw();
    }

    pub fn toggle_points_mode(&mut self) -> bool {
        self.authoring.toggle_points_mode()
    }

    pub fn pointer_move(&mut self, pointer: Point) -> Option<&HoverInfo> {
        if self.status != ChartStatus::Ready {
            return None;
        }
        let range = price_range(&self.smoothed)?;
        let area = self.renderer.plot_area(self.size);
        self.hover = hover(&area, self.size, &self.smoothed, &range, pointer);
        self.redraw();
        self.hover.as_ref()
    }

    pub fn pointer_leave(&mut self) {
        self.hover = None;
        self.redraw();
    }

    pub fn pointer_down(&mut self, pointer: Point) -> PointerAction {
        let area = self.renderer.plot_area(self.size);
        let action = self
            .authoring
            .pointer_down(pointer, &self.annotation_boxes, &area, &self.bars);
        match action {
            PointerAction::Remove(index) if index < self.annotations.len() => {
                let removed = self.annotations.remove(index);
                info!(start = %removed.start, end = %removed.end, "annotation removed");
                self.redraw();
            }
            PointerAction::Create(annotation) => self.add_annotation(annotation),
            _ => {}
        }
        action
    }

    /// Returns `true` when the size changed and the chart was repainted.
    pub fn resize(&mut self, size: CanvasSize) -> bool {
        if size == self.size {
            return false;
        }
        debug!(width = size.width, height = size.height, dpr = size.device_pixel_ratio, "chart resized");
        self.size = size;
        self.redraw();
        true
    }

    /// Paint without touching session state.
    pub fn render(&self) -> RenderOutput {
        let view = ChartView {
            status: self.status,
            bars: &self.bars,
            smoothed: &self.smoothed,
            bundle: &self.bundle,
            annotations: &self.annotations,
            highlight: self.hover.as_ref().map(|h| h.highlight),
        };
        self.renderer.render(self.size, &view)
    }

    /// Paint and keep the frame and label boxes for hit-testing.
    pub fn redraw(&mut self) -> &Frame {
        let output = self.render();
        self.annotation_boxes = output.annotation_boxes;
        self.frame = output.frame;
        &self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::test_bars::bars_from_closes;

    const SIZE: CanvasSize = CanvasSize {
        width: 760.0,
        height: 400.0,
        device_pixel_ratio: 1.0,
    };

    fn session() -> ChartSession {
        ChartSession::new("aapl", SIZE, IndicatorSuite::default())
    }

    fn rising(n: usize) -> Vec<PriceBar> {
        bars_from_closes(&(0..n).map(|i| 100.0 + i as f64).collect::<Vec<_>>())
    }

    fn failure() -> Report<SourceError> {
        Report::new(SourceError::Request {
            provider: "test".into(),
        })
    }

    #[test]
    fn applied_load_computes_everything() {
        let mut s = session();
        s.toggle_indicator(IndicatorKind::Rsi);
        let ticket = s.begin_load(Timeframe::OneMonth);
        assert_eq!(s.status(), ChartStatus::Loading);
        assert_eq!(s.complete_load(ticket, Ok(rising(30))), LoadOutcome::Applied { bars: 30 });
        assert_eq!(s.symbol(), "AAPL");
        assert_eq!(s.status(), ChartStatus::Ready);
        assert_eq!(s.smoothed().len(), 30);
        assert!(s.bundle().get(IndicatorKind::Rsi).is_some());
        assert!(!s.frame().is_blank());
    }

    #[test]
    fn stale_load_is_discarded() {
        let mut s = session();
        let first = s.begin_load(Timeframe::OneMonth);
        let second = s.begin_load(Timeframe::OneYear);
        assert_eq!(s.complete_load(second, Ok(rising(20))), LoadOutcome::Applied { bars: 20 });
        assert_eq!(s.complete_load(first, Ok(rising(5))), LoadOutcome::Stale);
        assert_eq!(s.bars().len(), 20);
        assert_eq!(s.timeframe(), Some(Timeframe::OneYear));
    }

    #[test]
    fn failure_keeps_prior_data() {
        let mut s = session();
        let t = s.begin_load(Timeframe::OneMonth);
        s.complete_load(t, Ok(rising(20)));

        let t = s.begin_load(Timeframe::OneYear);
        assert_eq!(s.complete_load(t, Err(failure())), LoadOutcome::Failed);
        assert_eq!(s.status(), ChartStatus::Failed);
        assert_eq!(s.bars().len(), 20);
        assert!(s.frame().texts().any(|t| t == "Failed to load chart data."));

        let t = s.begin_load(Timeframe::OneYear);
        assert_eq!(s.complete_load(t, Ok(Vec::new())), LoadOutcome::Failed);
    }

    #[test]
    fn new_data_clears_annotations_and_pending() {
        let mut s = session();
        let t = s.begin_load(Timeframe::OneMonth);
        s.complete_load(t, Ok(rising(20)));
        let bars = s.bars().to_vec();
        s.add_annotation(Annotation::new(bars[0].date, bars[10].date));
        s.toggle_points_mode();
        s.pointer_down(Point::new(400.0, 300.0));
        assert!(matches!(s.authoring_state(), AuthoringState::PendingStart(_)));

        let t = s.begin_load(Timeframe::ThreeMonths);
        s.complete_load(t, Ok(rising(40)));
        assert!(s.annotations().is_empty());
        assert!(s.annotation_boxes().is_empty());
        assert_eq!(s.authoring_state(), AuthoringState::Idle);
    }

    #[test]
    fn toggle_recomputes_bundle() {
        let mut s = session();
        let t = s.begin_load(Timeframe::OneMonth);
        s.complete_load(t, Ok(rising(60)));
        assert!(s.toggle_indicator(IndicatorKind::MovingAverage));
        assert!(s.bundle().get(IndicatorKind::MovingAverage).is_some());
        assert!(!s.toggle_indicator(IndicatorKind::MovingAverage));
        assert!(s.bundle().is_empty());
    }

    #[test]
    fn clicking_a_label_removes_annotation() {
        let mut s = session();
        let t = s.begin_load(Timeframe::OneMonth);
        s.complete_load(t, Ok(rising(20)));
        let bars = s.bars().to_vec();
        s.add_annotation(Annotation::new(bars[2].date, bars[15].date));
        let bbox = s.annotation_boxes()[0].unwrap();
        let center = Point::new((bbox.min_x + bbox.max_x) / 2.0, (bbox.min_y + bbox.max_y) / 2.0);

        assert_eq!(s.pointer_down(center), PointerAction::Remove(0));
        assert!(s.annotations().is_empty());
        assert!(s.annotation_boxes().is_empty());
    }

    #[test]
    fn points_mode_authoring_creates_annotation() {
        let mut s = session();
        let t = s.begin_load(Timeframe::OneMonth);
        s.complete_load(t, Ok(rising(20)));
        s.toggle_points_mode();
        s.pointer_down(Point::new(20.0, 300.0));
        let action = s.pointer_down(Point::new(740.0, 300.0));
        assert!(matches!(action, PointerAction::Create(_)));
        assert_eq!(s.annotations().len(), 1);
        assert_eq!(s.annotation_boxes().len(), 1);
    }

    #[test]
    fn hover_sets_and_clears_highlight() {
        let mut s = session();
        assert!(s.pointer_move(Point::new(100.0, 100.0)).is_none());

        let t = s.begin_load(Timeframe::OneMonth);
        s.complete_load(t, Ok(rising(20)));
        assert!(s.pointer_move(Point::new(380.0, 100.0)).is_some());
        assert!(s.render().frame.commands.iter().any(|c| matches!(c, crate::render::DrawCommand::Arc { .. })));
        s.pointer_leave();
        assert!(s.hover().is_none());
    }

    #[test]
    fn resize_repaints_only_on_change() {
        let mut s = session();
        assert!(!s.resize(SIZE));
        assert!(s.resize(CanvasSize::new(500.0, 300.0, 2.0)));
        assert_eq!(s.frame().pixel_size(), (1000, 600));
    }

    #[test]
    fn redraw_is_stable() {
        let mut s = session();
        s.toggle_indicator(IndicatorKind::Bollinger);
        let t = s.begin_load(Timeframe::OneMonth);
        s.complete_load(t, Ok(rising(40)));
        let first = s.redraw().clone();
        let second = s.redraw().clone();
        assert_eq!(first, second);
    }

    struct FixedSource(Vec<PriceBar>);

    impl BarSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }

        fn fetch_bars(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
        ) -> futures::future::BoxFuture<'_, Result<Vec<PriceBar>, Report<SourceError>>> {
            let bars = self.0.clone();
            Box::pin(async move { Ok(bars) })
        }
    }

    #[tokio::test]
    async fn load_through_source() {
        let mut s = session();
        let outcome = s.load(&FixedSource(rising(12)), Timeframe::OneWeek).await;
        assert_eq!(outcome, LoadOutcome::Applied { bars: 12 });
        assert_eq!(s.generation(), 1);
    }
}
