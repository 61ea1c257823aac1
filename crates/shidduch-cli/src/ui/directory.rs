//! Directory view: profile list on the left, the selected profile on the
//! right.

use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use shidduch_core::{
  directory::GenderFilter,
  form::{FormField, ProfileForm},
  profile::{Gender, Profile},
};
use strum::IntoEnumIterator;

use crate::app::App;

pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let cols = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
    .split(area);

  draw_list(f, cols[0], app);
  draw_detail(f, cols[1], " Profile ", app.cursor_profile());
}

pub(crate) fn gender_icon(gender: Gender) -> &'static str {
  match gender {
    Gender::Male => "♂ ",
    Gender::Female => "♀ ",
  }
}

fn draw_list(f: &mut Frame, area: Rect, app: &App) {
  let filtered = app.visible_profiles();
  let total = app.directory.profiles().len();

  let gender = match app.filter.gender {
    GenderFilter::All => String::new(),
    GenderFilter::Only(g) => format!(" · {g}"),
  };
  let title = if filtered.len() == total {
    format!(" Profiles ({total}){gender} ")
  } else {
    format!(" Profiles ({}/{total}){gender} ", filtered.len())
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let mut inner_area = block.inner(area);
  f.render_widget(block, area);

  // Search bar on the last line while searching or filtered.
  if (app.search_active || !app.filter.search.is_empty()) && inner_area.height > 2 {
    let filter_area = Rect {
      y: inner_area.y + inner_area.height - 1,
      height: 1,
      ..inner_area
    };
    inner_area.height -= 1;

    let cursor = if app.search_active { "_" } else { "" };
    f.render_widget(
      Paragraph::new(format!("/{}{cursor}", app.filter.search))
        .style(Style::default().fg(Color::Yellow)),
      filter_area,
    );
  }

  if filtered.is_empty() {
    let text = if app.directory.is_loading() {
      "Loading profiles…"
    } else if total == 0 {
      "No profiles yet. Press n to add one."
    } else {
      "Nothing matches the filter."
    };
    f.render_widget(
      Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
      inner_area,
    );
    return;
  }

  let items: Vec<ListItem> = filtered
    .iter()
    .map(|p| {
      let r = &p.record;
      let age = if r.age > 0 { format!(", {}", r.age) } else { String::new() };
      ListItem::new(Line::from(vec![
        Span::styled(gender_icon(r.gender), Style::default().fg(Color::Cyan)),
        Span::raw(format!("{}{age}", r.full_name())),
        Span::styled(
          format!("  {}", r.living_today),
          Style::default().fg(Color::DarkGray),
        ),
      ]))
    })
    .collect();

  let mut state = ListState::default();
  state.select(Some(app.list_cursor));

  f.render_stateful_widget(
    List::new(items).highlight_style(
      Style::default()
        .bg(Color::Blue)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD),
    ),
    inner_area,
    &mut state,
  );
}

/// One `label  value` line per filled-in field.
pub(crate) fn profile_lines(profile: &Profile) -> Vec<Line<'static>> {
  let form = ProfileForm::from_profile(profile);
  FormField::iter()
    .filter(|field| *field != FormField::Image)
    .filter_map(|field| {
      let value = form.value(field);
      (!value.trim().is_empty()).then(|| {
        Line::from(vec![
          Span::styled(
            format!("{:<24}", field.label()),
            Style::default()
              .fg(Color::Cyan)
              .add_modifier(Modifier::BOLD),
          ),
          Span::raw(value),
        ])
      })
    })
    .chain(profile.record.image.as_ref().map(|_| {
      Line::from(Span::styled(
        "photo attached",
        Style::default().fg(Color::DarkGray),
      ))
    }))
    .collect()
}

pub(crate) fn draw_detail(f: &mut Frame, area: Rect, title: &str, profile: Option<&Profile>) {
  let title = profile
    .map(|p| format!(" {} ", p.record.full_name()))
    .unwrap_or_else(|| title.to_string());
  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);

  let Some(profile) = profile else {
    f.render_widget(
      Paragraph::new("Select a profile.").style(Style::default().fg(Color::DarkGray)),
      inner,
    );
    return;
  };

  f.render_widget(
    Paragraph::new(profile_lines(profile)).wrap(Wrap { trim: false }),
    inner,
  );
}
