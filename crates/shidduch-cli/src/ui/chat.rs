//! Assistant chat with the running draft beside it.

use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph, Wrap},
};
use serde_json::Value;
use shidduch_core::assistant::ProfileDraft;

use crate::app::App;

pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let cols = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
    .split(area);
  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([Constraint::Min(0), Constraint::Length(3)])
    .split(cols[0]);

  draw_messages(f, rows[0], app);
  draw_input(f, rows[1], app);
  draw_preview(f, cols[1], app.chat.preview());
}

fn draw_messages(f: &mut Frame, area: Rect, app: &App) {
  let block = Block::default()
    .title(format!(" Assistant · {} ", app.assistant_model()))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);

  let mut lines: Vec<Line> = Vec::new();
  for message in app.chat.messages() {
    let (who, color) = if message.is_user() {
      ("you", Color::Cyan)
    } else {
      ("assistant", Color::Magenta)
    };
    lines.push(Line::from(Span::styled(
      who,
      Style::default().fg(color).add_modifier(Modifier::BOLD),
    )));
    lines.extend(message.text().lines().map(|l| Line::from(l.to_string())));
    lines.push(Line::from(""));
  }
  if app.chat.is_pending() {
    lines.push(Line::from(Span::styled(
      "assistant is typing…",
      Style::default().fg(Color::DarkGray),
    )));
  }

  // Keep the newest message in view.
  let width = usize::from(inner.width.max(1));
  let rendered: usize = lines
    .iter()
    .map(|l| l.width().div_ceil(width).max(1))
    .sum();
  let scroll = rendered.saturating_sub(usize::from(inner.height));

  f.render_widget(
    Paragraph::new(lines)
      .wrap(Wrap { trim: false })
      .scroll((u16::try_from(scroll).unwrap_or(u16::MAX), 0)),
    inner,
  );
}

fn draw_input(f: &mut Frame, area: Rect, app: &App) {
  let (title, text) = if app.has_assistant_key() {
    (" Message ", format!("{}_", app.chat_input))
  } else {
    (
      " Gemini API key ",
      format!("{}_", "*".repeat(app.chat_input.chars().count())),
    )
  };
  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Cyan));
  f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_preview(f: &mut Frame, area: Rect, draft: Option<&ProfileDraft>) {
  let block = Block::default()
    .title(" Draft · Ctrl-A to use ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let fields = match draft.map(serde_json::to_value) {
    Some(Ok(Value::Object(fields))) => fields,
    _ => {
      f.render_widget(
        Paragraph::new("Nothing extracted yet.")
          .style(Style::default().fg(Color::DarkGray))
          .block(block),
        area,
      );
      return;
    }
  };

  let lines: Vec<Line> = fields
    .into_iter()
    .map(|(key, value)| {
      let value = match value {
        Value::String(s) => s,
        other => other.to_string(),
      };
      Line::from(vec![
        Span::styled(format!("{key}: "), Style::default().fg(Color::Cyan)),
        Span::raw(value),
      ])
    })
    .collect();

  f.render_widget(
    Paragraph::new(lines).wrap(Wrap { trim: false }).block(block),
    area,
  );
}
