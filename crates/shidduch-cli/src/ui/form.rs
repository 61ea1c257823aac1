//! Add / edit form.

use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use shidduch_core::form::FormField;
use strum::IntoEnumIterator;

use crate::app::App;

pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([Constraint::Min(0), Constraint::Length(6)])
    .split(area);

  let title = if app.form.is_editing() {
    format!(" Editing {} ", app.form.value(FormField::FirstName))
  } else {
    " New profile ".to_string()
  };
  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let items: Vec<ListItem> = FormField::iter()
    .map(|field| {
      let selected = field == app.form_field;
      let mut spans = vec![
        Span::styled(
          format!("{:<24}", field.label()),
          Style::default().fg(Color::Cyan),
        ),
        Span::raw(field_text(app, field, selected)),
      ];
      if selected && !field.options().is_empty() {
        spans.push(Span::styled("  ←→", Style::default().fg(Color::DarkGray)));
      }
      ListItem::new(Line::from(spans))
    })
    .collect();

  let mut state = ListState::default();
  state.select(FormField::iter().position(|field| field == app.form_field));

  f.render_stateful_widget(
    List::new(items).block(block).highlight_style(
      Style::default()
        .bg(Color::Blue)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD),
    ),
    rows[0],
    &mut state,
  );

  draw_field_preview(f, rows[1], app);
}

fn field_text(app: &App, field: FormField, selected: bool) -> String {
  match field {
    FormField::Image => {
      let attached = app.form.value(field);
      match (selected, attached.is_empty()) {
        (true, _) => format!("path: {}_", app.image_path),
        (false, true) => "none".into(),
        (false, false) => attached,
      }
    }
    FormField::Gender => app.form.value(field),
    _ if selected => format!("{}_", app.form.value(field)),
    _ => app.form.value(field),
  }
}

/// The selected field in full, wrapped, for long free-text answers.
fn draw_field_preview(f: &mut Frame, area: Rect, app: &App) {
  let field = app.form_field;
  let block = Block::default()
    .title(format!(" {} ", field.label()))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let text = match field {
    FormField::Image => {
      let state = if app.form.image.is_some() {
        app.form.value(field)
      } else {
        "no photo".to_string()
      };
      format!("{state}. Type or paste a file path and press Enter to attach; Backspace on an empty path removes the photo.")
    }
    FormField::Gender => "Space or ←→ switches.".to_string(),
    _ => app.form.value(field),
  };

  f.render_widget(
    Paragraph::new(text).wrap(Wrap { trim: false }).block(block),
    area,
  );
}
