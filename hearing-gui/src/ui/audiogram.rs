//! # Audiogram Widget
//!
//! Canvas that paints the display list produced by
//! `hearing_core::audiogram::render`. All layout decisions live in the core
//! crate; this widget only maps shapes onto an Iced frame.

use hearing_core::ScreeningConfig;
use hearing_core::audiogram::{self, Align, Rgb, Shape, Surface};
use hearing_core::results::ResultsSnapshot;
use iced::alignment::{Horizontal, Vertical};
use iced::widget::canvas::{self, Geometry, Path, Stroke, Text};
use iced::widget::container;
use iced::{Color, Element, Length, Point, Rectangle, Renderer, Theme, Vector, mouse};

pub struct Audiogram {
    results: ResultsSnapshot,
    config: ScreeningConfig,
}

impl Audiogram {
    pub fn new(results: ResultsSnapshot, config: ScreeningConfig) -> Self {
        Self { results, config }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(canvas::Canvas::new(self).width(Length::Fill).height(Length::Fill)).into()
    }
}

impl<Message> canvas::Program<Message> for Audiogram {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        if !bounds.width.is_finite() || !bounds.height.is_finite() {
            return vec![frame.into_geometry()];
        }

        let surface = Surface::new(bounds.width, bounds.height);
        let chart = audiogram::render(&self.results, &self.config, surface);

        for shape in &chart.shapes {
            match shape {
                Shape::Line { from, to, color, width } => {
                    frame.stroke(
                        &Path::line(to_point(*from), to_point(*to)),
                        Stroke::default().with_width(*width).with_color(to_color(*color)),
                    );
                }
                Shape::Polyline { points, color, width } => {
                    let path = Path::new(|builder| {
                        if let Some((first, rest)) = points.split_first() {
                            builder.move_to(to_point(*first));
                            for point in rest {
                                builder.line_to(to_point(*point));
                            }
                        }
                    });
                    frame.stroke(
                        &path,
                        Stroke::default().with_width(*width).with_color(to_color(*color)),
                    );
                }
                Shape::Marker { center, radius, color } => {
                    frame.fill(&Path::circle(to_point(*center), *radius), to_color(*color));
                }
                Shape::Label {
                    position,
                    text,
                    color,
                    size,
                    align,
                    rotation,
                } => {
                    let label = Text {
                        content: text.clone(),
                        position: Point::ORIGIN,
                        color: to_color(*color),
                        size: (*size).into(),
                        horizontal_alignment: to_horizontal(*align),
                        vertical_alignment: Vertical::Bottom,
                        ..Text::default()
                    };

                    if *rotation == 0.0 {
                        frame.fill_text(Text {
                            position: to_point(*position),
                            ..label
                        });
                    } else {
                        frame.with_save(|frame| {
                            frame.translate(Vector::new(position.x, position.y));
                            frame.rotate(*rotation);
                            frame.fill_text(label);
                        });
                    }
                }
            }
        }

        vec![frame.into_geometry()]
    }
}

fn to_point(point: audiogram::Point) -> Point {
    Point::new(point.x, point.y)
}

fn to_color(rgb: Rgb) -> Color {
    Color::from_rgb8(rgb.0, rgb.1, rgb.2)
}

fn to_horizontal(align: Align) -> Horizontal {
    match align {
        Align::Left => Horizontal::Left,
        Align::Center => Horizontal::Center,
        Align::Right => Horizontal::Right,
    }
}
