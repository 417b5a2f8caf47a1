//! # Screens
//!
//! Layout for each step of the screening: welcome, calibration, the test
//! itself and the results.

use hearing_core::engine::Trial;
use hearing_core::results::{ResultsSnapshot, ThresholdRecord};
use hearing_core::{Ear, ScreeningConfig};
use iced::widget::{Column, Space, button, column, container, progress_bar, row, text};
use iced::{Alignment, Color, Element, Length};

use super::audiogram::Audiogram;
use crate::Message;

const NOTICE_COLOR: Color = Color {
    r: 1.0,
    g: 0.6,
    b: 0.3,
    a: 1.0,
};

pub fn welcome(notice: Option<&str>) -> Element<'_, Message> {
    let content = column![
        text("Hearing Screening").size(32),
        text("This test checks how well you hear tones at different pitches in each ear.").size(16),
        text("Use headphones and find a quiet room before you begin.").size(16),
        Space::with_height(20),
        action_button("Begin", Message::OpenCalibration),
    ]
    .push_maybe(notice_line(notice))
    .spacing(10)
    .align_x(Alignment::Center);

    centered(content)
}

/// # Arguments
/// * `playing` - The calibration tone has started
/// * `ready` - The tone has played long enough for the test to start
pub fn calibration(playing: bool, ready: bool, notice: Option<&str>) -> Element<'_, Message> {
    let mut content = column![
        text("Calibration").size(28),
        text("Play the calibration tone and set your volume to a comfortable level.").size(16),
        Space::with_height(10),
        action_button("Play calibration tone", Message::PlayCalibration),
    ]
    .spacing(10)
    .align_x(Alignment::Center);

    if playing {
        content = content
            .push(text("Adjust your system volume until the tone is soft but clear.").size(16));
    }
    if ready {
        content = content.push(action_button("Start test", Message::StartTest));
    }

    centered(content.push_maybe(notice_line(notice)))
}

pub fn listening_test<'a>(
    trial: Option<&'a Trial>,
    progress: f32,
    notice: Option<&'a str>,
) -> Element<'a, Message> {
    let instruction = match trial {
        Some(trial) => format!(
            "Click the button when you hear the tone in your {} ear ({}Hz at {}dB)",
            trial.ear.as_str(),
            trial.frequency,
            trial.db
        ),
        None => "Preparing the first tone...".to_string(),
    };

    let content = column![
        text("Listening Test").size(28),
        progress_bar(0.0..=1.0, progress).height(10),
        Space::with_height(20),
        text(instruction).size(18),
        Space::with_height(20),
        row![
            action_button("I heard it", Message::Heard),
            action_button("Not heard", Message::NotHeard),
        ]
        .spacing(20),
    ]
    .push_maybe(notice_line(notice))
    .spacing(10)
    .max_width(640.0)
    .align_x(Alignment::Center);

    centered(content)
}

pub fn results<'a>(
    snapshot: &'a ResultsSnapshot,
    config: &ScreeningConfig,
    notice: Option<&'a str>,
) -> Element<'a, Message> {
    let chart = container(Audiogram::new(snapshot.clone(), config.clone()).view())
        .width(Length::Fill)
        .height(Length::Fixed(420.0));

    let tables = row![
        threshold_table(Ear::Left, snapshot.records(Ear::Left)),
        threshold_table(Ear::Right, snapshot.records(Ear::Right)),
    ]
    .spacing(40);

    let content = column![
        text("Your Results").size(28),
        chart,
        tables,
        row![
            action_button("Download results", Message::DownloadResults),
            action_button("Restart", Message::Restart),
        ]
        .spacing(20),
    ]
    .push_maybe(notice_line(notice))
    .spacing(15)
    .padding(20)
    .align_x(Alignment::Center);

    container(content).width(Length::Fill).height(Length::Fill).into()
}

/// One row per recorded frequency: frequency, threshold and status.
fn threshold_table(ear: Ear, records: &[ThresholdRecord]) -> Element<'_, Message> {
    let header = row![
        text("Frequency").size(14).width(Length::Fixed(100.0)),
        text("Level").size(14).width(Length::Fixed(70.0)),
        text("Status").size(14).width(Length::Fixed(180.0)),
    ];

    let rows = records.iter().map(|record| {
        row![
            text(format!("{} Hz", record.frequency)).size(14).width(Length::Fixed(100.0)),
            text(format!("{} dB", record.db)).size(14).width(Length::Fixed(70.0)),
            text(record.status.label()).size(14).width(Length::Fixed(180.0)),
        ]
        .into()
    });

    column![text(ear.display_name()).size(18), header]
        .extend(rows)
        .push_maybe(records.is_empty().then(|| text("No thresholds recorded").size(14)))
        .spacing(4)
        .into()
}

fn action_button(label: &str, message: Message) -> Element<'_, Message> {
    button(text(label).size(18)).padding([12, 20]).on_press(message).into()
}

fn notice_line(notice: Option<&str>) -> Option<Element<'_, Message>> {
    notice.map(|message| text(message).size(14).color(NOTICE_COLOR).into())
}

fn centered<'a>(content: Column<'a, Message>) -> Element<'a, Message> {
    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .padding(20)
        .into()
}
