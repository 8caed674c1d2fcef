//! # Main Display Module
//!
//! This module contains the main display components and layout logic
//! for the tuner: error banners, the six string controls, the duration menu
//! and the status line.

use iced::widget::{button, column, container, pick_list, row, text, tooltip, Space};
use iced::{Alignment, Background, Border, Color, Element, Length};
use tuner_core::{StringDefinition, GUITAR_STRINGS};

use crate::settings::DURATION_CHOICES;
use crate::{AppDisplayData, Message};

/// Highlight of a string while its tone is playing.
const PLAYING_COLOR: Color = Color { r: 0.2, g: 0.8, b: 0.4, a: 1.0 };
/// Resting background of a string control.
const IDLE_COLOR: Color = Color { r: 0.25, g: 0.25, b: 0.28, a: 1.0 };
/// Outline of the string Enter/Space will replay.
const FOCUS_COLOR: Color = Color { r: 1.0, g: 0.84, b: 0.0, a: 1.0 };
const ERROR_COLOR: Color = Color { r: 0.95, g: 0.35, b: 0.35, a: 1.0 };

/// Creates the complete main application view
pub fn create_main_view(data: &AppDisplayData) -> Element<'static, Message> {
    let title = text(crate::settings::APP_TITLE).size(28);

    let strings = GUITAR_STRINGS.iter().fold(column![].spacing(8), |col, def| {
        col.push(make_string_button(
            def,
            data.playing == Some(def.id),
            data.focused == Some(def.id),
        ))
    });

    let duration_row = row![
        text("Duration:").size(16),
        pick_list(DURATION_CHOICES, Some(data.duration), Message::DurationSelected),
    ]
    .spacing(10)
    .align_y(Alignment::Center);

    let status = text(data.status.clone()).size(16);

    let content = column![
        title,
        Space::with_height(10),
        create_error_panel(&data.errors),
        strings,
        Space::with_height(10),
        duration_row,
        status,
    ]
    .spacing(10)
    .padding(20)
    .max_width(560);

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .into()
}

/// Error banners stacked above the strings, one per reported error.
fn create_error_panel(errors: &[String]) -> Element<'static, Message> {
    errors
        .iter()
        .fold(column![].spacing(6), |col, message| {
            col.push(text(message.clone()).size(14).color(ERROR_COLOR))
        })
        .into()
}

/// One clickable string, labelled with its name and note.
fn make_string_button(
    def: &StringDefinition,
    playing: bool,
    focused: bool,
) -> Element<'static, Message> {
    let label = format!("String: {} - Note: {}", def.name, def.note);
    let background = if playing { PLAYING_COLOR } else { IDLE_COLOR };
    let border = if focused {
        Border { color: FOCUS_COLOR, width: 2.0, radius: 4.0.into() }
    } else {
        Border { color: Color::TRANSPARENT, width: 0.0, radius: 4.0.into() }
    };

    let control = button(text(label).size(16).width(Length::Fill))
        .width(Length::Fill)
        .padding([10, 16])
        .on_press(Message::StringActivated(def.id))
        .style(move |_theme, _status| button::Style {
            background: Some(Background::Color(background)),
            text_color: Color::WHITE,
            border,
            ..button::Style::default()
        });

    tooltip(
        control,
        container(text(def.aria_label()).size(12)).padding(6),
        tooltip::Position::Right,
    )
    .into()
}
