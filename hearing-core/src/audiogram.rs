//! # Audiogram Rendering Model
//!
//! Turns a [`ResultsSnapshot`] into a [`Chart`]: a flat list of lines,
//! polylines, markers and labels in logical pixels. The GUI paints the list;
//! nothing here depends on a drawing backend, so identical inputs always give
//! an identical `Chart`.
//!
//! ## Mapping
//! - X is categorical: test frequencies are evenly spaced in sequence order,
//!   `x = left + width * index / (count - 1)`.
//! - Y is linear and inverted (worse hearing plots lower),
//!   `y = top + height * (dB - min_db) / (max_db - min_db)`.
//!
//! Coordinates are logical pixels. Device pixel density is applied by the
//! backend that rasterizes the chart and never enters the mapping.

use std::f32::consts::FRAC_PI_4;
use tracing::warn;

use crate::Ear;
use crate::config::ScreeningConfig;
use crate::error::{Result, ScreeningError};
use crate::results::{ResultsSnapshot, ThresholdRecord};

/// Space reserved around the plot for labels and the legend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Padding {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Default for Padding {
    fn default() -> Self {
        Self {
            top: 60.0,
            right: 40.0,
            bottom: 80.0,
            left: 60.0,
        }
    }
}

/// An RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const LEFT_EAR_COLOR: Rgb = Rgb(0x41, 0x69, 0xE1);
pub const RIGHT_EAR_COLOR: Rgb = Rgb(0xE1, 0x41, 0x69);
pub const AXIS_COLOR: Rgb = Rgb(0xE0, 0xE0, 0xE0);
pub const GRID_COLOR: Rgb = Rgb(0x33, 0x33, 0x33);

const MARKER_RADIUS: f32 = 5.0;
const LABEL_SIZE: f32 = 14.0;
const TICK_LENGTH: f32 = 5.0;
const SERIES_WIDTH: f32 = 2.0;

/// Series colour for an ear.
pub fn ear_color(ear: Ear) -> Rgb {
    match ear {
        Ear::Left => LEFT_EAR_COLOR,
        Ear::Right => RIGHT_EAR_COLOR,
    }
}

/// Drawing surface size in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    pub width: f32,
    pub height: f32,
}

impl Surface {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// A logical-pixel position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// One drawing primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Line {
        from: Point,
        to: Point,
        color: Rgb,
        width: f32,
    },
    Polyline {
        points: Vec<Point>,
        color: Rgb,
        width: f32,
    },
    /// Filled circle.
    Marker {
        center: Point,
        radius: f32,
        color: Rgb,
    },
    /// Text anchored at its baseline. `rotation` is in radians, clockwise
    /// positive, around `position`.
    Label {
        position: Point,
        text: String,
        color: Rgb,
        size: f32,
        align: Align,
        rotation: f32,
    },
}

/// The rendered audiogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub surface: Surface,
    pub shapes: Vec<Shape>,
    /// Points dropped because their frequency is not on the axis.
    pub skipped: Vec<(Ear, u32)>,
}

/// Plot rectangle and the frequency / level scales mapped onto it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotArea {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    config: ScreeningConfig,
}

impl PlotArea {
    pub fn new(surface: &Surface, padding: &Padding, config: &ScreeningConfig) -> Self {
        Self {
            left: padding.left,
            top: padding.top,
            width: surface.width - (padding.left + padding.right),
            height: surface.height - (padding.top + padding.bottom),
            config: config.clone(),
        }
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    /// X of the `index`-th test frequency.
    pub fn x_for_index(&self, index: usize) -> f32 {
        let span = (self.config.frequencies.len().max(2) - 1) as f32;
        self.left + self.width * (index as f32 / span)
    }

    /// X of a frequency, or `UnknownFrequency` if it is not on the axis.
    pub fn x_for_frequency(&self, frequency: u32) -> Result<f32> {
        self.config
            .frequency_index(frequency)
            .map(|index| self.x_for_index(index))
            .ok_or(ScreeningError::UnknownFrequency(frequency))
    }

    /// Fraction of the plot height from the top at which `db` is drawn.
    ///
    /// Levels outside the configured range map outside `[0, 1]`.
    pub fn db_fraction(&self, db: i32) -> f32 {
        let min_db = f64::from(self.config.min_db);
        let max_db = f64::from(self.config.max_db);
        ((f64::from(db) - min_db) / (max_db - min_db)) as f32
    }

    pub fn y_for_db(&self, db: i32) -> f32 {
        self.top + self.height * self.db_fraction(db)
    }

    /// Position of a record, or `UnknownFrequency`.
    pub fn point_for(&self, record: &ThresholdRecord) -> Result<Point> {
        Ok(Point::new(self.x_for_frequency(record.frequency)?, self.y_for_db(record.db)))
    }
}

/// Renders an audiogram with the default padding.
///
/// # Arguments
/// * `results` - Thresholds to plot, in any order
/// * `config` - Supplies the frequency axis and the dB range
/// * `surface` - Logical drawing size
pub fn render(results: &ResultsSnapshot, config: &ScreeningConfig, surface: Surface) -> Chart {
    render_with_padding(results, config, surface, Padding::default())
}

pub fn render_with_padding(
    results: &ResultsSnapshot,
    config: &ScreeningConfig,
    surface: Surface,
    padding: Padding,
) -> Chart {
    let plot = PlotArea::new(&surface, &padding, config);
    let mut chart = Chart {
        surface,
        shapes: Vec::new(),
        skipped: Vec::new(),
    };

    draw_axes(&mut chart, &plot, config);
    for ear in Ear::ALL {
        let records = results.records(ear);
        if !records.is_empty() {
            plot_ear(&mut chart, &plot, ear, records);
        }
    }
    draw_legend(&mut chart, &padding);

    chart
}

fn draw_axes(chart: &mut Chart, plot: &PlotArea, config: &ScreeningConfig) {
    let levels = config.grid_levels();

    // Grid
    for index in 0..config.frequencies.len() {
        let x = plot.x_for_index(index);
        let (from, to) = (Point::new(x, plot.top), Point::new(x, plot.bottom()));
        chart.shapes.push(line(from, to, GRID_COLOR, 1.0));
    }
    for &db in &levels {
        let y = plot.y_for_db(db);
        let (from, to) = (Point::new(plot.left, y), Point::new(plot.right(), y));
        chart.shapes.push(line(from, to, GRID_COLOR, 1.0));
    }

    // Main axes
    chart.shapes.push(line(
        Point::new(plot.left, plot.top),
        Point::new(plot.left, plot.bottom()),
        AXIS_COLOR,
        2.0,
    ));
    chart.shapes.push(line(
        Point::new(plot.left, plot.bottom()),
        Point::new(plot.right(), plot.bottom()),
        AXIS_COLOR,
        2.0,
    ));

    // Frequency ticks and labels
    for (index, frequency) in config.frequencies.iter().enumerate() {
        let x = plot.x_for_index(index);
        chart.shapes.push(line(
            Point::new(x, plot.bottom()),
            Point::new(x, plot.bottom() + TICK_LENGTH),
            AXIS_COLOR,
            2.0,
        ));
        chart.shapes.push(label(
            Point::new(x, plot.bottom() + 25.0),
            format!("{} Hz", frequency),
            Align::Center,
            -FRAC_PI_4,
        ));
    }

    // Level ticks and labels
    for &db in &levels {
        let y = plot.y_for_db(db);
        chart.shapes.push(line(
            Point::new(plot.left - TICK_LENGTH, y),
            Point::new(plot.left, y),
            AXIS_COLOR,
            2.0,
        ));
        chart.shapes.push(label(
            Point::new(plot.left - 10.0, y + 4.0),
            format!("{} dB", db),
            Align::Right,
            0.0,
        ));
    }
}

/// Plots one ear: connecting line, then a marker and level label per point.
fn plot_ear(chart: &mut Chart, plot: &PlotArea, ear: Ear, records: &[ThresholdRecord]) {
    let color = ear_color(ear);

    let mut sorted = records.to_vec();
    sorted.sort_by_key(|r| r.frequency);

    let mut points = Vec::with_capacity(sorted.len());
    for record in &sorted {
        match plot.point_for(record) {
            Ok(point) => points.push((point, record.db)),
            Err(e) => {
                warn!(%ear, db = record.db, "Skipping point: {}", e);
                chart.skipped.push((ear, record.frequency));
            }
        }
    }

    if points.len() >= 2 {
        chart.shapes.push(Shape::Polyline {
            points: points.iter().map(|(p, _)| *p).collect(),
            color,
            width: SERIES_WIDTH,
        });
    }

    for (point, db) in points {
        chart.shapes.push(Shape::Marker {
            center: point,
            radius: MARKER_RADIUS,
            color,
        });
        chart.shapes.push(label(
            Point::new(point.x, point.y - 15.0),
            format!("{}dB", db),
            Align::Center,
            0.0,
        ));
    }
}

fn draw_legend(chart: &mut Chart, padding: &Padding) {
    let legend_y = padding.top - 30.0;
    for (ear, offset) in [(Ear::Left, 10.0), (Ear::Right, 120.0)] {
        chart.shapes.push(Shape::Marker {
            center: Point::new(padding.left + offset, legend_y),
            radius: MARKER_RADIUS,
            color: ear_color(ear),
        });
        chart.shapes.push(label(
            Point::new(padding.left + offset + 15.0, legend_y + 4.0),
            ear.display_name().to_string(),
            Align::Left,
            0.0,
        ));
    }
}

fn line(from: Point, to: Point, color: Rgb, width: f32) -> Shape {
    Shape::Line { from, to, color, width }
}

fn label(position: Point, text: String, align: Align, rotation: f32) -> Shape {
    Shape::Label {
        position,
        text,
        color: AXIS_COLOR,
        size: LABEL_SIZE,
        align,
        rotation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::ResultsStore;

    fn surface() -> Surface {
        Surface::new(600.0, 440.0)
    }

    fn plot() -> PlotArea {
        PlotArea::new(&surface(), &Padding::default(), &ScreeningConfig::default())
    }

    fn markers(chart: &Chart, color: Rgb) -> Vec<Point> {
        chart
            .shapes
            .iter()
            .filter_map(|s| match s {
                Shape::Marker {
                    center,
                    radius,
                    color: c,
                } if *c == color && *radius == MARKER_RADIUS => Some(*center),
                _ => None,
            })
            .filter(|p| p.y > Padding::default().top - 30.0 + 1.0)
            .collect()
    }

    #[test]
    fn plot_area_excludes_padding() {
        let plot = plot();
        assert_eq!((plot.left, plot.top), (60.0, 60.0));
        assert_eq!((plot.width, plot.height), (500.0, 300.0));
    }

    #[test]
    fn frequencies_are_evenly_spaced_by_index() {
        let plot = plot();
        assert_eq!(plot.x_for_frequency(250).unwrap(), 60.0);
        assert_eq!(plot.x_for_frequency(1000).unwrap(), 260.0);
        assert_eq!(plot.x_for_frequency(8000).unwrap(), 560.0);
    }

    #[test]
    fn level_axis_is_inverted_and_linear() {
        let plot = plot();
        assert!((plot.db_fraction(20) - 0.30).abs() < 1e-6);
        assert_eq!(plot.y_for_db(-10), 60.0);
        assert_eq!(plot.y_for_db(90), 360.0);
        assert!(plot.y_for_db(60) > plot.y_for_db(10));
    }

    #[test]
    fn unknown_frequency_is_reported() {
        assert!(matches!(
            plot().x_for_frequency(3000),
            Err(ScreeningError::UnknownFrequency(3000))
        ));
    }

    #[test]
    fn grid_has_a_line_per_frequency_and_per_ten_db() {
        let chart = render(&ResultsSnapshot::default(), &ScreeningConfig::default(), surface());
        let grid_lines = chart
            .shapes
            .iter()
            .filter(|s| matches!(s, Shape::Line { color, .. } if *color == GRID_COLOR))
            .count();
        assert_eq!(grid_lines, 6 + 11);
    }

    #[test]
    fn series_are_sorted_by_frequency() {
        let mut store = ResultsStore::new();
        store.record(Ear::Left, 4000, 50);
        store.record(Ear::Left, 250, 10);
        store.record(Ear::Left, 1000, 30);

        let chart = render(&store.snapshot(), &ScreeningConfig::default(), surface());
        let polyline = chart
            .shapes
            .iter()
            .find_map(|s| match s {
                Shape::Polyline { points, color, .. } if *color == LEFT_EAR_COLOR => {
                    Some(points.clone())
                }
                _ => None,
            })
            .unwrap();

        let xs: Vec<f32> = polyline.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![60.0, 260.0, 460.0]);
    }

    #[test]
    fn unknown_frequencies_are_skipped_not_fatal() {
        let mut store = ResultsStore::new();
        store.record(Ear::Right, 250, 20);
        store.record(Ear::Right, 3000, 40);
        store.record(Ear::Right, 500, 25);

        let chart = render(&store.snapshot(), &ScreeningConfig::default(), surface());

        assert_eq!(chart.skipped, vec![(Ear::Right, 3000)]);
        assert_eq!(markers(&chart, RIGHT_EAR_COLOR).len(), 2);
    }

    #[test]
    fn each_point_gets_a_level_label() {
        let mut store = ResultsStore::new();
        store.record(Ear::Left, 1000, 20);

        let chart = render(&store.snapshot(), &ScreeningConfig::default(), surface());
        let point = markers(&chart, LEFT_EAR_COLOR)[0];
        assert_eq!(point, Point::new(260.0, 150.0));

        let has_label = chart.shapes.iter().any(|s| {
            matches!(s, Shape::Label { text, position, .. }
                if text == "20dB" && *position == Point::new(260.0, 135.0))
        });
        assert!(has_label);
        // A single point draws no connecting line.
        assert!(!chart.shapes.iter().any(|s| matches!(s, Shape::Polyline { .. })));
    }

    #[test]
    fn legend_names_both_ears() {
        let chart = render(&ResultsSnapshot::default(), &ScreeningConfig::default(), surface());
        let texts: Vec<&str> = chart
            .shapes
            .iter()
            .filter_map(|s| match s {
                Shape::Label { text, align: Align::Left, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["Left Ear", "Right Ear"]);
    }

    #[test]
    fn extreme_levels_map_off_the_plot_without_overflow() {
        let plot = plot();
        assert!(plot.db_fraction(i32::MAX) > 1.0);
        assert!(plot.db_fraction(i32::MIN) < 0.0);

        let mut store = ResultsStore::new();
        store.record(Ear::Left, 1000, i32::MAX);
        store.record(Ear::Left, 2000, i32::MIN);
        let chart = render(&store.snapshot(), &ScreeningConfig::default(), surface());

        let points = markers(&chart, LEFT_EAR_COLOR);
        assert_eq!(points.len(), 1);
        assert!(points[0].y > 360.0);
        assert!(chart.skipped.is_empty());
    }

    #[test]
    fn frequency_axis_follows_configured_order() {
        let config = ScreeningConfig {
            frequencies: vec![1000, 250, 4000],
            ..ScreeningConfig::default()
        };
        let plot = PlotArea::new(&surface(), &Padding::default(), &config);

        assert_eq!(plot.x_for_frequency(1000).unwrap(), 60.0);
        assert_eq!(plot.x_for_frequency(250).unwrap(), 310.0);
        assert_eq!(plot.x_for_frequency(4000).unwrap(), 560.0);
        assert!(plot.x_for_frequency(8000).is_err());
    }

    #[test]
    fn rendering_is_deterministic() {
        let mut store = ResultsStore::new();
        store.record(Ear::Left, 2000, 35);
        store.record(Ear::Right, 250, 60);
        store.record(Ear::Right, 8000, 90);
        let snapshot = store.snapshot();
        let config = ScreeningConfig::default();

        assert_eq!(render(&snapshot, &config, surface()), render(&snapshot, &config, surface()));
    }
}
