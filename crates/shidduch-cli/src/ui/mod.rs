//! TUI rendering for every screen and pane.

pub mod chat;
pub mod directory;
pub mod form;
pub mod matches;
pub mod setup;

use chrono::Local;
use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use strum::IntoEnumIterator;

use crate::app::{App, Confirm, Screen, View};

// ─── Root draw ────────────────────────────────────────────────────────────────

/// Main draw function called each frame.
pub fn draw(f: &mut Frame, app: &App) {
  let area = f.area();

  match &app.screen {
    Screen::Setup => setup::draw(f, area, app),
    Screen::BackendError(err) => setup::draw_backend_error(f, area, err),
    Screen::Main => {
      // Vertical stack: header, body, status bar.
      let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
          Constraint::Length(1), // header
          Constraint::Min(0),    // body
          Constraint::Length(1), // status bar
        ])
        .split(area);

      draw_header(f, rows[0], app);
      match app.view {
        View::Directory => directory::draw(f, rows[1], app),
        View::Form => form::draw(f, rows[1], app),
        View::Matches => matches::draw(f, rows[1], app),
        View::Chat => chat::draw(f, rows[1], app),
      }
      draw_status(f, rows[2], app);
    }
  }

  if let Some(confirm) = &app.confirm {
    draw_popup(f, area, " Confirm ", &confirm_text(app, confirm), Color::Yellow);
  }
  if let Some(notice) = &app.notice {
    draw_popup(f, area, " Notice ", notice, Color::Red);
  }
}

// ─── Header ───────────────────────────────────────────────────────────────────

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
  let mut spans = vec![Span::styled(
    " shidduch ",
    Style::default()
      .fg(Color::White)
      .add_modifier(Modifier::BOLD),
  )];
  for (i, view) in View::iter().enumerate() {
    let style = if view == app.view {
      Style::default().fg(Color::Black).bg(Color::Cyan)
    } else {
      Style::default().fg(Color::Gray)
    };
    spans.push(Span::styled(format!(" {} {} ", i + 1, view.title()), style));
  }

  let sync = if !app.is_syncing() {
    "offline  ".to_string()
  } else if app.directory.is_loading() {
    "syncing…  ".to_string()
  } else {
    app
      .directory
      .version()
      .map(|v| format!("rev {v}  "))
      .unwrap_or_default()
  };
  let date = Local::now().format("%Y-%m-%d").to_string();
  let right = Span::styled(
    format!("{sync}{date} "),
    Style::default().fg(Color::DarkGray),
  );

  // Simple left-right header: pad the middle.
  let left_width: usize = spans.iter().map(|s| s.content.chars().count()).sum();
  let pad = usize::from(area.width)
    .saturating_sub(left_width)
    .saturating_sub(right.content.chars().count());
  spans.push(Span::raw(" ".repeat(pad)));
  spans.push(right);

  let block = Block::default().style(Style::default().bg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(Paragraph::new(Line::from(spans)), inner);
}

// ─── Status bar ───────────────────────────────────────────────────────────────

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
  let (mode_label, hints) = match app.view {
    View::Directory if app.search_active => ("SEARCH", "Type to filter  Esc clear  Enter done"),
    View::Directory => (
      "DIRECTORY",
      "↑↓/jk move  / search  g gender  n new  e edit  d delete  m matches  q quit",
    ),
    View::Form => (
      "PROFILE",
      "↑↓ field  ←→ options  Enter next  Ctrl-S save  Ctrl-X clear  Esc back",
    ),
    View::Matches => ("MATCHES", "↑↓/jk move  r rules  e edit  Esc back  q quit"),
    View::Chat if !app.has_assistant_key() => ("ASSISTANT", "Paste a Gemini API key and press Enter"),
    View::Chat => (
      "ASSISTANT",
      "Enter send  Ctrl-A use draft  Ctrl-L start over  Ctrl-K new key  Esc back",
    ),
  };

  let status = if app.status_msg.is_empty() {
    format!("{hints}  Tab views  Ctrl-R reset")
  } else {
    app.status_msg.clone()
  };

  let mode_span = Span::styled(
    format!(" {mode_label} "),
    Style::default()
      .fg(Color::Black)
      .bg(Color::Cyan)
      .add_modifier(Modifier::BOLD),
  );
  let hint_span = Span::styled(
    format!("  {status}"),
    Style::default().fg(Color::DarkGray),
  );

  let line = Line::from(vec![mode_span, hint_span]);
  f.render_widget(
    Paragraph::new(line).style(Style::default().bg(Color::Black)),
    area,
  );
}

// ─── Popups ───────────────────────────────────────────────────────────────────

fn confirm_text(app: &App, confirm: &Confirm) -> String {
  match confirm {
    Confirm::Delete(id) => {
      let name = app
        .directory
        .get(id)
        .map(|p| p.record.full_name())
        .unwrap_or_else(|| id.to_string());
      format!("Delete {name} for everyone?\n\n[y] yes   any other key cancels")
    }
    Confirm::ResetConfig => "Reset the backend connection? The configuration will have to be \
                             pasted again.\n\n[y] yes   any other key cancels"
      .to_string(),
  }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
  let width = width.min(area.width);
  let height = height.min(area.height);
  Rect {
    x: area.x + (area.width - width) / 2,
    y: area.y + (area.height - height) / 2,
    width,
    height,
  }
}

fn draw_popup(f: &mut Frame, area: Rect, title: &str, text: &str, color: Color) {
  let rect = centered(area, 64, 8);
  f.render_widget(Clear, rect);
  let block = Block::default()
    .title(title.to_string())
    .borders(Borders::ALL)
    .border_style(Style::default().fg(color));
  f.render_widget(
    Paragraph::new(text.to_string())
      .wrap(Wrap { trim: false })
      .block(block),
    rect,
  );
}

#[cfg(test)]
mod tests {
  use ratatui::{Terminal, backend::TestBackend};
  use shidduch_core::{
    profile::{Gender, Profile, ProfileId, ProfileRecord},
    store::Snapshot,
  };
  use tokio::sync::mpsc;

  use super::*;
  use crate::{
    app::Settings,
    client::BackendInitError,
    credentials::CredentialStore,
  };

  fn render(app: &App) -> String {
    let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
    terminal.draw(|f| draw(f, app)).unwrap();
    terminal
      .backend()
      .buffer()
      .content()
      .iter()
      .map(|cell| cell.symbol())
      .collect()
  }

  #[test]
  fn every_screen_and_view_renders() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, _rx) = mpsc::unbounded_channel();
    let settings = Settings {
      app_id:             "FamilyShidduchDB".into(),
      model:              "gemini-2.0-flash".into(),
      assistant_endpoint: None,
    };
    let mut app = App::new(settings, CredentialStore::new(dir.path()), tx).unwrap();
    assert!(render(&app).contains("Configuration"));

    app.screen = Screen::BackendError(BackendInitError::AuthDisabled);
    assert!(render(&app).contains("Anonymous sign-in is disabled"));

    app.screen = Screen::Main;
    let profile = |id: &str, name: &str, gender| Profile {
      id:     ProfileId::new(id),
      record: ProfileRecord {
        first_name: name.into(),
        gender,
        age: 27,
        ..Default::default()
      },
    };
    app.directory.apply_snapshot(Snapshot {
      version:  1,
      profiles: vec![profile("a", "Avi", Gender::Male), profile("b", "Bracha", Gender::Female)],
    });
    app.match_target = Some(ProfileId::new("b"));

    for view in View::iter() {
      app.view = view;
      let screen = render(&app);
      assert!(screen.contains(view.title()), "{view:?} header missing");
    }

    app.view = View::Chat;
    assert!(render(&app).contains("Assistant · gemini-2.0-flash"));

    app.view = View::Directory;
    assert!(render(&app).contains("Avi"));

    app.confirm = Some(Confirm::Delete(ProfileId::new("a")));
    assert!(render(&app).contains("Delete Avi"));
    app.confirm = None;
    app.notice = Some("Saving failed".into());
    assert!(render(&app).contains("Saving failed"));
  }
}
