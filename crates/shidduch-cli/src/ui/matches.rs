//! Match view: ranked candidates for one target profile.

use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};
use shidduch_core::{
  matching::{DEFAULT_MAX_AGE, DEFAULT_MIN_AGE},
  profile::Profile,
};

use super::directory::{draw_detail, gender_icon};
use crate::app::App;

pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let Some(target) = app.match_target_profile() else {
    let block = Block::default()
      .title(" Matches ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::DarkGray));
    f.render_widget(
      Paragraph::new("Select a profile in the directory and press m.")
        .style(Style::default().fg(Color::DarkGray))
        .block(block),
      area,
    );
    return;
  };

  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([Constraint::Length(3), Constraint::Min(0)])
    .split(area);
  draw_target(f, rows[0], app, target);

  let cols = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
    .split(rows[1]);

  let matches = app.matches();
  let block = Block::default()
    .title(format!(" Candidates ({}) · {} rules ", matches.len(), app.match_rules))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  if matches.is_empty() {
    f.render_widget(
      Paragraph::new("No suitable candidates yet.")
        .style(Style::default().fg(Color::DarkGray))
        .block(block),
      cols[0],
    );
    draw_detail(f, cols[1], " Candidate ", None);
    return;
  }

  let items: Vec<ListItem> = matches
    .iter()
    .map(|m| {
      let r = &m.profile.record;
      ListItem::new(Line::from(vec![
        Span::styled(format!("{:>3}% ", m.score), score_style(m.score)),
        Span::styled(gender_icon(r.gender), Style::default().fg(Color::Cyan)),
        Span::raw(format!("{}, {}", r.full_name(), r.age)),
        Span::styled(
          format!("  {}", r.religious_level),
          Style::default().fg(Color::DarkGray),
        ),
      ]))
    })
    .collect();

  let mut state = ListState::default();
  state.select(Some(app.match_cursor));
  f.render_stateful_widget(
    List::new(items).block(block).highlight_style(
      Style::default()
        .bg(Color::Blue)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD),
    ),
    cols[0],
    &mut state,
  );

  let selected = matches.get(app.match_cursor).map(|m| &m.profile);
  draw_detail(f, cols[1], " Candidate ", selected);
}

fn score_style(score: u32) -> Style {
  let color = match score {
    80.. => Color::Green,
    60..80 => Color::Yellow,
    _ => Color::Gray,
  };
  Style::default().fg(color).add_modifier(Modifier::BOLD)
}

fn draw_target(f: &mut Frame, area: Rect, app: &App, target: &Profile) {
  let r = &target.record;
  let wants = r.looking_for.clone().unwrap_or_default();
  let min = if wants.min_age == 0 { DEFAULT_MIN_AGE } else { wants.min_age };
  let max = if wants.max_age == 0 { DEFAULT_MAX_AGE } else { wants.max_age };

  let mut spans = vec![
    Span::styled(gender_icon(r.gender), Style::default().fg(Color::Cyan)),
    Span::styled(
      format!("{}, {}", r.full_name(), r.age),
      Style::default().add_modifier(Modifier::BOLD),
    ),
    Span::raw(format!("   looking for {min}–{max}")),
  ];
  if !wants.religious_level.is_empty() {
    spans.push(Span::raw(format!(", {}", wants.religious_level)));
  }

  let block = Block::default()
    .title(format!(" Matching for {} ", r.first_name))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(if app.directory.is_loading() {
      Color::Yellow
    } else {
      Color::DarkGray
    }));
  f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}
