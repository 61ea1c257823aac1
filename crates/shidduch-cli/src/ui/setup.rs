//! Setup and backend-error screens.

use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::{
  app::{App, SetupFocus},
  client::BackendInitError,
};

fn field_style(focused: bool) -> Style {
  if focused {
    Style::default().fg(Color::Cyan)
  } else {
    Style::default().fg(Color::DarkGray)
  }
}

pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let setup = &app.setup;
  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(4), // intro
      Constraint::Min(6),    // config
      Constraint::Length(3), // assistant key
      Constraint::Length(2), // error / progress
      Constraint::Length(1), // hints
    ])
    .split(area);

  let intro = vec![
    Line::from(Span::styled(
      "Connect to the family directory",
      Style::default().add_modifier(Modifier::BOLD),
    )),
    Line::from(
      "Paste the backend configuration object (apiKey, projectId and optionally databaseURL). \
       Unquoted keys and single quotes are fine.",
    ),
  ];
  f.render_widget(Paragraph::new(intro).wrap(Wrap { trim: true }), rows[0]);

  let config_focused = setup.focus == SetupFocus::Config;
  let cursor = if config_focused { "_" } else { "" };
  f.render_widget(
    Paragraph::new(format!("{}{cursor}", setup.config_text))
      .wrap(Wrap { trim: false })
      .block(
        Block::default()
          .title(" Configuration ")
          .borders(Borders::ALL)
          .border_style(field_style(config_focused)),
      ),
    rows[1],
  );

  let key_focused = setup.focus == SetupFocus::AssistantKey;
  let masked = "*".repeat(setup.assistant_key.chars().count());
  let cursor = if key_focused { "_" } else { "" };
  f.render_widget(
    Paragraph::new(format!("{masked}{cursor}")).block(
      Block::default()
        .title(" Gemini API key (optional) ")
        .borders(Borders::ALL)
        .border_style(field_style(key_focused)),
    ),
    rows[2],
  );

  let status = if setup.connecting {
    Span::styled("Connecting…", Style::default().fg(Color::Yellow))
  } else if let Some(error) = &setup.error {
    Span::styled(error.clone(), Style::default().fg(Color::Red))
  } else {
    Span::raw("")
  };
  f.render_widget(Paragraph::new(Line::from(status)).wrap(Wrap { trim: true }), rows[3]);

  f.render_widget(
    Paragraph::new("Tab switch field  Enter new line  Ctrl-S save & connect  Ctrl-U clear  Esc quit")
      .style(Style::default().fg(Color::DarkGray)),
    rows[4],
  );
}

pub fn draw_backend_error(f: &mut Frame, area: Rect, err: &BackendInitError) {
  let (title, advice) = match err {
    BackendInitError::AuthDisabled => (
      "Anonymous sign-in is disabled",
      "The backend does not allow anonymous sign-in for this project. Enable it on the \
       server (anonymous_auth = true) or check the projectId, then retry.",
    ),
    BackendInitError::InvalidKey => (
      "The API key was rejected",
      "The apiKey in the saved configuration does not match the backend. Reset and paste \
       the configuration again.",
    ),
    BackendInitError::InitFailed(_) => (
      "Could not reach the backend",
      "Check the databaseURL in the configuration and that the server is running.",
    ),
    BackendInitError::General(_) => (
      "Sign-in failed",
      "The backend refused the connection. Retry, or reset the configuration.",
    ),
  };

  let lines = vec![
    Line::from(Span::styled(
      title,
      Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    )),
    Line::from(""),
    Line::from(advice),
    Line::from(""),
    Line::from(Span::styled(err.to_string(), Style::default().fg(Color::DarkGray))),
    Line::from(""),
    Line::from(Span::styled(
      "[Enter] retry   [r] reset configuration   [q] quit",
      Style::default().fg(Color::Cyan),
    )),
  ];

  let block = Block::default()
    .title(" Connection problem ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Red));
  f.render_widget(
    Paragraph::new(lines).wrap(Wrap { trim: true }).block(block),
    area,
  );
}
