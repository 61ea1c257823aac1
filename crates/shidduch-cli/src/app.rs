//! Application state machine and event dispatcher.
//!
//! All state lives on the event loop. Network calls are spawned onto tokio
//! and report back as [`AppEvent`]s.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use shidduch_assistant::{AssistantError, GeminiClient};
use shidduch_core::{
  assistant::{AssistantReply, Conversation},
  credentials::{BackendConfig, parse_backend_config},
  directory::{Directory, DirectoryFilter},
  form::{FormField, ProfileForm, Submission},
  matching::{MatchRules, ScoredMatch},
  profile::{Profile, ProfileId, image_data_uri},
  store::Snapshot,
};
use strum::IntoEnumIterator;
use tokio::sync::mpsc::UnboundedSender;

use crate::{
  client::{BackendClient, BackendInitError},
  credentials::CredentialStore,
  sync::{self, SyncFailure, SyncHandle},
};

// ─── Screen / View ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
  /// No usable backend configuration yet, or a sign-in in flight.
  Setup,
  /// Sign-in failed. Offers a retry or a configuration reset.
  BackendError(BackendInitError),
  /// Signed in; one of the [`View`]s is showing.
  Main,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter)]
pub enum View {
  Directory,
  Form,
  Matches,
  Chat,
}

impl View {
  pub fn title(self) -> &'static str {
    match self {
      Self::Directory => "Directory",
      Self::Form => "Profile",
      Self::Matches => "Matches",
      Self::Chat => "Assistant",
    }
  }

  fn from_index(i: usize) -> Option<Self> { Self::iter().nth(i) }

  fn step(self, forward: bool) -> Self {
    let len = Self::iter().count();
    let i = Self::iter().position(|v| v == self).unwrap_or(0);
    let next = if forward { (i + 1) % len } else { (i + len - 1) % len };
    Self::from_index(next).unwrap_or(self)
  }
}

// ─── Events ───────────────────────────────────────────────────────────────────

/// Results of background work, delivered to the event loop.
pub enum AppEvent {
  Connected(Result<BackendClient, BackendInitError>),
  /// `generation` identifies the subscription that produced the event.
  Snapshot {
    generation: u64,
    snapshot:   Snapshot,
  },
  SubscriptionFailed {
    generation: u64,
    failure:    SyncFailure,
  },
  Saved(Result<Profile, String>),
  Deleted {
    id:     ProfileId,
    result: Result<(), String>,
  },
  AssistantReplied(Result<AssistantReply, AssistantFailure>),
}

/// Why an assistant turn failed, in a form the chat view can show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantFailure {
  pub summary:      String,
  pub detail:       String,
  pub key_rejected: bool,
}

impl From<&AssistantError> for AssistantFailure {
  fn from(e: &AssistantError) -> Self {
    Self {
      summary:      e.summary(),
      detail:       e.to_string(),
      key_rejected: e.is_key_rejected(),
    }
  }
}

/// An action waiting for a yes/no answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirm {
  Delete(ProfileId),
  ResetConfig,
}

// ─── Setup screen state ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetupFocus {
  #[default]
  Config,
  AssistantKey,
}

#[derive(Debug, Default)]
pub struct SetupState {
  /// Pasted configuration blob, possibly multi-line.
  pub config_text:   String,
  pub assistant_key: String,
  pub focus:         SetupFocus,
  pub error:         Option<String>,
  /// A sign-in is in flight.
  pub connecting:    bool,
}

impl SetupState {
  fn focused_mut(&mut self) -> &mut String {
    match self.focus {
      SetupFocus::Config => &mut self.config_text,
      SetupFocus::AssistantKey => &mut self.assistant_key,
    }
  }
}

/// Runtime settings resolved from flags, environment and `settings.toml`.
#[derive(Debug, Clone)]
pub struct Settings {
  pub app_id:             String,
  pub model:              String,
  pub assistant_endpoint: Option<String>,
}

// ─── App ──────────────────────────────────────────────────────────────────────

/// Top-level application state.
pub struct App {
  pub screen:   Screen,
  pub view:     View,
  pub settings: Settings,

  credentials:     CredentialStore,
  events:          UnboundedSender<AppEvent>,
  backend:         Option<BackendClient>,
  sync:            Option<SyncHandle>,
  /// Bumped whenever a subscription starts or is torn down.
  sync_generation: u64,
  assistant:       GeminiClient,

  pub setup: SetupState,

  /// Live copy of the profile collection.
  pub directory:     Directory,
  pub filter:        DirectoryFilter,
  /// Whether the user is typing into the search box.
  pub search_active: bool,
  /// Cursor within the *filtered* list.
  pub list_cursor:   usize,

  pub form:       ProfileForm,
  pub form_field: FormField,
  /// File path being typed for the photo field.
  pub image_path: String,

  pub match_target: Option<ProfileId>,
  pub match_rules:  MatchRules,
  pub match_cursor: usize,

  pub chat:       Conversation,
  pub chat_input: String,

  pub confirm: Option<Confirm>,
  /// Blocking message; the next key dismisses it.
  pub notice:  Option<String>,
  /// One-line status message shown in the status bar.
  pub status_msg: String,
}

impl App {
  pub fn new(
    settings: Settings,
    credentials: CredentialStore,
    events: UnboundedSender<AppEvent>,
  ) -> anyhow::Result<Self> {
    tracing::debug!(dir = %credentials.dir().display(), "credential store");
    let assistant = build_assistant(&settings, credentials.load_assistant_key())?;
    Ok(Self {
      screen: Screen::Setup,
      view: View::Directory,
      settings,
      credentials,
      events,
      backend: None,
      sync: None,
      sync_generation: 0,
      assistant,
      setup: SetupState::default(),
      directory: Directory::new(),
      filter: DirectoryFilter::default(),
      search_active: false,
      list_cursor: 0,
      form: ProfileForm::default(),
      form_field: FormField::FirstName,
      image_path: String::new(),
      match_target: None,
      match_rules: MatchRules::default(),
      match_cursor: 0,
      chat: Conversation::new(),
      chat_input: String::new(),
      confirm: None,
      notice: None,
      status_msg: String::new(),
    })
  }

  /// Connect with the saved configuration, if there is one.
  pub fn start(&mut self) {
    match self.credentials.load_backend() {
      Some(config) => self.connect(config),
      None => self.screen = Screen::Setup,
    }
  }

  pub fn has_assistant_key(&self) -> bool { self.assistant.has_api_key() }

  pub fn assistant_model(&self) -> &str { self.assistant.model() }

  /// Whether the live subscription is still running.
  pub fn is_syncing(&self) -> bool { self.sync.is_some() }

  // ── Connection ────────────────────────────────────────────────────────────

  fn connect(&mut self, config: BackendConfig) {
    self.screen = Screen::Setup;
    self.setup.connecting = true;
    self.setup.error = None;

    let events = self.events.clone();
    let app_id = self.settings.app_id.clone();
    tokio::spawn(async move {
      let result = BackendClient::connect(config, &app_id).await;
      let _ = events.send(AppEvent::Connected(result));
    });
  }

  fn submit_setup(&mut self) {
    let config = match parse_backend_config(&self.setup.config_text) {
      Ok(config) => config,
      Err(e) => {
        self.setup.error = Some(e.to_string());
        return;
      }
    };

    let key = self.setup.assistant_key.trim().to_string();
    if !key.is_empty()
      && let Err(e) = self.replace_assistant_key(&key)
    {
      self.setup.error = Some(format!("{e:#}"));
      return;
    }

    if let Err(e) = self.credentials.save_backend(&config) {
      self.setup.error = Some(format!("{e:#}"));
      return;
    }
    self.connect(config);
  }

  /// Forget the backend configuration and go back to the setup screen.
  fn reset_config(&mut self) {
    if let Err(e) = self.credentials.clear_backend() {
      tracing::warn!("could not remove saved configuration: {e:#}");
    }
    self.sync = None;
    self.sync_generation += 1;
    self.backend = None;
    self.directory.clear();
    self.match_target = None;
    self.list_cursor = 0;
    self.setup = SetupState::default();
    self.screen = Screen::Setup;
    self.view = View::Directory;
    self.status_msg = "Configuration cleared".into();
  }

  // ── Background events ─────────────────────────────────────────────────────

  pub fn handle_event(&mut self, event: AppEvent) {
    match event {
      AppEvent::Connected(Ok(client)) => {
        self.setup.connecting = false;
        self.directory.clear();
        self.directory.start_subscription();
        self.sync_generation += 1;
        self.sync = Some(sync::spawn(
          client.clone(),
          self.events.clone(),
          self.sync_generation,
        ));
        self.status_msg = format!("Connected to {} as {}", client.collection(), client.uid());
        self.backend = Some(client);
        self.screen = Screen::Main;
      }
      AppEvent::Connected(Err(e)) => {
        tracing::warn!(error = %e, "backend initialisation failed");
        self.setup.connecting = false;
        self.screen = Screen::BackendError(e);
      }
      AppEvent::Snapshot { generation, .. } | AppEvent::SubscriptionFailed { generation, .. }
        if generation != self.sync_generation =>
      {
        tracing::debug!(generation, current = self.sync_generation, "dropping stale sync event");
      }
      AppEvent::Snapshot { snapshot, .. } => {
        self.directory.apply_snapshot(snapshot);
        self.clamp_cursors();
      }
      AppEvent::SubscriptionFailed { failure, .. } => {
        if failure.permission_denied {
          tracing::warn!(
            "permission denied while syncing profiles; check the server's api key and that \
             the collection is readable"
          );
        } else {
          tracing::warn!(error = %failure.message, "profile subscription ended");
        }
        self.directory.subscription_failed();
        self.sync = None;
      }
      AppEvent::Saved(result) => {
        self.directory.end_write();
        match result {
          Ok(profile) => {
            self.status_msg = format!("Saved {}", profile.record.full_name());
            self.form.reset();
            self.image_path.clear();
            self.form_field = FormField::FirstName;
            self.view = View::Directory;
          }
          Err(e) => self.fail(format!("Saving failed: {e}")),
        }
      }
      AppEvent::Deleted { id, result } => {
        self.directory.end_write();
        match result {
          Ok(()) => {
            if self.match_target.as_ref() == Some(&id) {
              self.match_target = None;
            }
            if self.form.editing_id() == Some(&id) {
              self.form.reset();
              self.image_path.clear();
            }
            self.status_msg = "Profile deleted".into();
          }
          Err(e) => self.fail(format!("Deleting failed: {e}")),
        }
      }
      AppEvent::AssistantReplied(Ok(reply)) => self.chat.record_reply(reply),
      AppEvent::AssistantReplied(Err(failure)) => {
        tracing::warn!(error = %failure.detail, "assistant request failed");
        self.chat.record_failure(&failure.summary);
        self.status_msg = if failure.key_rejected {
          format!("Assistant: {}. Ctrl-K to enter a new key", failure.summary)
        } else {
          format!("Assistant: {}", failure.summary)
        };
      }
    }
  }

  fn fail(&mut self, message: String) {
    self.status_msg = message.clone();
    self.notice = Some(message);
  }

  fn clamp_cursors(&mut self) {
    let visible = self.visible_profiles().len();
    self.list_cursor = self.list_cursor.min(visible.saturating_sub(1));
    let matches = self.matches().len();
    self.match_cursor = self.match_cursor.min(matches.saturating_sub(1));
  }

  // ── Derived views ─────────────────────────────────────────────────────────

  pub fn visible_profiles(&self) -> Vec<&Profile> { self.directory.filtered(&self.filter) }

  /// The profile under the list cursor in the filtered view, if any.
  pub fn cursor_profile(&self) -> Option<&Profile> {
    self.visible_profiles().get(self.list_cursor).copied()
  }

  pub fn match_target_profile(&self) -> Option<&Profile> {
    self.match_target.as_ref().and_then(|id| self.directory.get(id))
  }

  pub fn matches(&self) -> Vec<ScoredMatch> {
    self
      .match_target
      .as_ref()
      .map(|id| self.directory.matches_for(id, self.match_rules))
      .unwrap_or_default()
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub fn handle_key(&mut self, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      return false;
    }
    self.status_msg.clear();

    if self.notice.take().is_some() {
      return true;
    }

    if let Some(confirm) = self.confirm.take() {
      if matches!(key.code, KeyCode::Char('y' | 'Y') | KeyCode::Enter) {
        self.confirmed(confirm);
      } else {
        self.status_msg = "Cancelled".into();
      }
      return true;
    }

    match self.screen {
      Screen::Setup => self.handle_setup_key(key),
      Screen::BackendError(_) => self.handle_backend_error_key(key),
      Screen::Main => self.handle_main_key(key),
    }
  }

  /// Bracketed paste: goes to whichever text input has focus.
  pub fn handle_paste(&mut self, text: &str) {
    let text = text.replace('\r', "");
    match (&self.screen, self.view) {
      (Screen::Setup, _) if !self.setup.connecting => self.setup.focused_mut().push_str(&text),
      (Screen::Main, View::Directory) if self.search_active => {
        self.filter.search.push_str(text.trim());
        self.list_cursor = 0;
      }
      (Screen::Main, View::Form) => match self.form_field {
        FormField::Image => self.image_path.push_str(text.trim()),
        FormField::Gender => {}
        field => text.chars().for_each(|c| self.form.push_char(field, c)),
      },
      (Screen::Main, View::Chat) => self.chat_input.push_str(&text),
      _ => {}
    }
  }

  fn confirmed(&mut self, confirm: Confirm) {
    match confirm {
      Confirm::Delete(id) => self.delete_profile(id),
      Confirm::ResetConfig => self.reset_config(),
    }
  }

  fn handle_setup_key(&mut self, key: KeyEvent) -> bool {
    if self.setup.connecting {
      return true;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
      KeyCode::Esc => return false,
      KeyCode::Char('s') if ctrl => self.submit_setup(),
      KeyCode::Char('u') if ctrl => self.setup.focused_mut().clear(),
      KeyCode::Tab | KeyCode::BackTab => {
        self.setup.focus = match self.setup.focus {
          SetupFocus::Config => SetupFocus::AssistantKey,
          SetupFocus::AssistantKey => SetupFocus::Config,
        };
      }
      KeyCode::Enter => match self.setup.focus {
        SetupFocus::Config => self.setup.config_text.push('\n'),
        SetupFocus::AssistantKey => self.submit_setup(),
      },
      KeyCode::Backspace => {
        self.setup.focused_mut().pop();
      }
      KeyCode::Char(c) if !ctrl => self.setup.focused_mut().push(c),
      _ => {}
    }
    true
  }

  fn handle_backend_error_key(&mut self, key: KeyEvent) -> bool {
    match key.code {
      KeyCode::Char('q') | KeyCode::Esc => return false,
      KeyCode::Char('r') => self.confirm = Some(Confirm::ResetConfig),
      KeyCode::Enter => match self.credentials.load_backend() {
        Some(config) => self.connect(config),
        None => self.screen = Screen::Setup,
      },
      _ => {}
    }
    true
  }

  fn handle_main_key(&mut self, key: KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
      KeyCode::Tab => self.view = self.view.step(true),
      KeyCode::BackTab => self.view = self.view.step(false),
      KeyCode::F(n) if (1..=4).contains(&n) => self.switch_view(usize::from(n - 1)),
      KeyCode::Char('r') if ctrl => self.confirm = Some(Confirm::ResetConfig),
      _ => {
        return match self.view {
          View::Directory => self.handle_directory_key(key),
          View::Form => self.handle_form_key(key),
          View::Matches => self.handle_matches_key(key),
          View::Chat => self.handle_chat_key(key),
        };
      }
    }
    true
  }

  fn switch_view(&mut self, index: usize) {
    if let Some(view) = View::from_index(index) {
      self.view = view;
    }
  }

  // ── Directory ─────────────────────────────────────────────────────────────

  fn handle_directory_key(&mut self, key: KeyEvent) -> bool {
    if self.search_active {
      match key.code {
        KeyCode::Esc => {
          self.search_active = false;
          self.filter.search.clear();
        }
        KeyCode::Enter => self.search_active = false,
        KeyCode::Backspace => {
          self.filter.search.pop();
        }
        KeyCode::Char(c) => self.filter.search.push(c),
        _ => return true,
      }
      self.list_cursor = 0;
      return true;
    }

    match key.code {
      KeyCode::Char('q') => return false,

      KeyCode::Down | KeyCode::Char('j') => {
        if self.list_cursor + 1 < self.visible_profiles().len() {
          self.list_cursor += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => self.list_cursor = self.list_cursor.saturating_sub(1),

      KeyCode::Char('/') => {
        self.search_active = true;
        self.list_cursor = 0;
      }
      KeyCode::Char('g') => {
        self.filter.gender = self.filter.gender.next();
        self.list_cursor = 0;
      }

      KeyCode::Char('n') => self.start_editing(ProfileForm::default()),
      KeyCode::Enter | KeyCode::Char('e') => {
        if let Some(form) = self.cursor_profile().map(ProfileForm::from_profile) {
          self.start_editing(form);
        }
      }
      KeyCode::Char('d') => {
        if let Some(id) = self.cursor_profile().map(|p| p.id.clone()) {
          self.confirm = Some(Confirm::Delete(id));
        }
      }
      KeyCode::Char('m') => {
        if let Some(id) = self.cursor_profile().map(|p| p.id.clone()) {
          self.match_target = Some(id);
          self.match_cursor = 0;
          self.view = View::Matches;
        }
      }

      KeyCode::Char(c @ '1'..='4') => self.switch_view(c as usize - '1' as usize),
      _ => {}
    }
    true
  }

  fn start_editing(&mut self, form: ProfileForm) {
    self.status_msg = if form.is_editing() {
      format!("Editing {}", form.value(FormField::FirstName))
    } else {
      "New profile".into()
    };
    self.form = form;
    self.form_field = FormField::FirstName;
    self.image_path.clear();
    self.view = View::Form;
  }

  fn delete_profile(&mut self, id: ProfileId) {
    let Some(client) = self.backend.clone() else {
      self.fail("Not connected to the backend".into());
      return;
    };
    self.directory.begin_write();
    self.status_msg = "Deleting…".into();

    let events = self.events.clone();
    tokio::spawn(async move {
      let result = client.delete(&id).await.map_err(|e| format!("{e:#}"));
      let _ = events.send(AppEvent::Deleted { id, result });
    });
  }

  // ── Form ──────────────────────────────────────────────────────────────────

  fn handle_form_key(&mut self, key: KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let field = self.form_field;
    match key.code {
      KeyCode::Esc => self.view = View::Directory,
      KeyCode::Up => self.form_field = step_field(field, false),
      KeyCode::Down => self.form_field = step_field(field, true),

      KeyCode::Char('s') if ctrl => self.submit_form(),
      KeyCode::Char('x') if ctrl => {
        self.form.reset();
        self.image_path.clear();
        self.status_msg = "Form cleared".into();
      }
      KeyCode::Left | KeyCode::Right if field == FormField::Gender => {
        self.form.push_char(field, ' ');
      }
      KeyCode::Left => {
        self.form.cycle_option(field, false);
      }
      KeyCode::Right => {
        self.form.cycle_option(field, true);
      }

      KeyCode::Enter if field == FormField::Image => self.load_image(),
      KeyCode::Enter => self.form_field = step_field(field, true),
      KeyCode::Backspace if field == FormField::Image => {
        if self.image_path.pop().is_none() {
          self.form.set_image(None);
        }
      }
      KeyCode::Backspace => self.form.pop_char(field),
      KeyCode::Char(c) if !ctrl => {
        if field == FormField::Image {
          self.image_path.push(c);
        } else {
          self.form.push_char(field, c);
        }
      }
      _ => {}
    }
    true
  }

  fn load_image(&mut self) {
    let path = PathBuf::from(self.image_path.trim());
    if path.as_os_str().is_empty() {
      return;
    }
    match read_image(&path) {
      Ok(uri) => {
        self.form.set_image(Some(uri));
        self.image_path.clear();
        self.status_msg = "Photo attached".into();
      }
      Err(e) => self.fail(format!("{e:#}")),
    }
  }

  fn submit_form(&mut self) {
    let submission = match self.form.submission(Utc::now().timestamp_millis()) {
      Ok(submission) => submission,
      Err(e) => {
        self.fail(e.to_string());
        return;
      }
    };
    let Some(client) = self.backend.clone() else {
      self.fail("Not connected to the backend".into());
      return;
    };
    self.directory.begin_write();
    self.status_msg = "Saving…".into();

    let events = self.events.clone();
    tokio::spawn(async move {
      let result = match submission {
        Submission::Create(record) => client.create(&record).await,
        Submission::Update(id, record) => client.update(&id, &record).await,
      };
      let _ = events.send(AppEvent::Saved(result.map_err(|e| format!("{e:#}"))));
    });
  }

  // ── Matches ───────────────────────────────────────────────────────────────

  fn handle_matches_key(&mut self, key: KeyEvent) -> bool {
    match key.code {
      KeyCode::Char('q') => return false,
      KeyCode::Esc | KeyCode::Char('h') => self.view = View::Directory,
      KeyCode::Down | KeyCode::Char('j') => {
        if self.match_cursor + 1 < self.matches().len() {
          self.match_cursor += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => self.match_cursor = self.match_cursor.saturating_sub(1),
      KeyCode::Char('r') => {
        self.match_rules = match self.match_rules {
          MatchRules::Classic => MatchRules::Assistant,
          MatchRules::Assistant => MatchRules::Classic,
        };
        self.match_cursor = 0;
      }
      KeyCode::Enter | KeyCode::Char('e') => {
        let selected = self.matches().into_iter().nth(self.match_cursor);
        if let Some(m) = selected {
          self.start_editing(ProfileForm::from_profile(&m.profile));
        }
      }
      KeyCode::Char(c @ '1'..='4') => self.switch_view(c as usize - '1' as usize),
      _ => {}
    }
    true
  }

  // ── Assistant chat ────────────────────────────────────────────────────────

  fn handle_chat_key(&mut self, key: KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
      KeyCode::Esc => self.view = View::Directory,
      KeyCode::Enter if !self.assistant.has_api_key() => self.save_chat_key(),
      KeyCode::Enter => self.send_chat(),
      KeyCode::Char('a') if ctrl => self.approve_draft(),
      KeyCode::Char('k') if ctrl && !self.chat.is_pending() => self.forget_assistant_key(),
      KeyCode::Char('l') if ctrl && !self.chat.is_pending() => {
        self.chat.reset();
        self.chat_input.clear();
      }
      KeyCode::Backspace => {
        self.chat_input.pop();
      }
      KeyCode::Char(c) if !ctrl => self.chat_input.push(c),
      _ => {}
    }
    true
  }

  fn replace_assistant_key(&mut self, key: &str) -> anyhow::Result<()> {
    self.credentials.save_assistant_key(key)?;
    self.assistant = build_assistant(&self.settings, Some(key.to_string()))?;
    Ok(())
  }

  /// Drop the stored key so the chat input asks for a new one.
  fn forget_assistant_key(&mut self) {
    let result = self
      .credentials
      .clear_assistant_key()
      .and_then(|()| build_assistant(&self.settings, None));
    match result {
      Ok(assistant) => {
        self.assistant = assistant;
        self.chat_input.clear();
        self.status_msg = "Paste a new Gemini API key and press Enter".into();
      }
      Err(e) => self.fail(format!("{e:#}")),
    }
  }

  fn save_chat_key(&mut self) {
    let key = self.chat_input.trim().to_string();
    if key.is_empty() {
      return;
    }
    match self.replace_assistant_key(&key) {
      Ok(()) => {
        self.chat_input.clear();
        self.status_msg = "Assistant key saved".into();
      }
      Err(e) => self.fail(format!("{e:#}")),
    }
  }

  fn send_chat(&mut self) {
    let text = self.chat_input.trim().to_string();
    let Some(history) = self.chat.begin_turn(&text) else {
      return;
    };
    self.chat_input.clear();

    let assistant = self.assistant.clone();
    let events = self.events.clone();
    tokio::spawn(async move {
      let result = assistant
        .reply(&history, &text)
        .await
        .map_err(|e| AssistantFailure::from(&e));
      let _ = events.send(AppEvent::AssistantReplied(result));
    });
  }

  fn approve_draft(&mut self) {
    match self.chat.approve() {
      Some(draft) => {
        self.form.apply_draft(&draft);
        self.form_field = FormField::FirstName;
        self.view = View::Form;
        self.status_msg = "Draft copied into the form; review it and save with Ctrl-S".into();
      }
      None => self.status_msg = "The assistant has not produced a draft yet".into(),
    }
  }
}

fn build_assistant(settings: &Settings, key: Option<String>) -> anyhow::Result<GeminiClient> {
  let mut client = GeminiClient::new(key)
    .context("building assistant client")?
    .with_model(settings.model.clone());
  if let Some(endpoint) = &settings.assistant_endpoint {
    client = client.with_endpoint(endpoint.clone());
  }
  Ok(client)
}

fn step_field(field: FormField, forward: bool) -> FormField {
  let fields: Vec<FormField> = FormField::iter().collect();
  let len = fields.len();
  let i = fields.iter().position(|f| *f == field).unwrap_or(0);
  let next = if forward { (i + 1) % len } else { (i + len - 1) % len };
  fields[next]
}

fn read_image(path: &Path) -> anyhow::Result<String> {
  let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
  let name = path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default();
  Ok(image_data_uri(&bytes, &name)?)
}

#[cfg(test)]
mod tests {
  use shidduch_core::{
    assistant::{APOLOGY, ChatMessage, ProfileDraft},
    profile::{Gender, ProfileRecord},
  };
  use tokio::sync::mpsc::{self, UnboundedReceiver};

  use super::*;

  fn make_app() -> (tempfile::TempDir, App, UnboundedReceiver<AppEvent>) {
    let dir = tempfile::tempdir().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let settings = Settings {
      app_id:             "FamilyShidduchDB".into(),
      model:              "gemini-2.0-flash".into(),
      assistant_endpoint: None,
    };
    let app = App::new(settings, CredentialStore::new(dir.path()), tx).unwrap();
    (dir, app, rx)
  }

  fn main_app() -> (tempfile::TempDir, App, UnboundedReceiver<AppEvent>) {
    let (dir, mut app, rx) = make_app();
    app.screen = Screen::Main;
    (dir, app, rx)
  }

  fn key(code: KeyCode) -> KeyEvent { KeyEvent::new(code, KeyModifiers::NONE) }

  fn ctrl(c: char) -> KeyEvent { KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL) }

  fn profile(id: &str, name: &str, gender: Gender, created_at: i64) -> Profile {
    Profile {
      id:     ProfileId::new(id),
      record: ProfileRecord {
        first_name: name.into(),
        gender,
        age: 25,
        created_at: Some(created_at),
        ..Default::default()
      },
    }
  }

  fn load(app: &mut App, profiles: Vec<Profile>) {
    app.handle_event(AppEvent::Snapshot {
      generation: app.sync_generation,
      snapshot:   Snapshot { version: 1, profiles },
    });
  }

  // ── Views ─────────────────────────────────────────────────────────────────

  #[test]
  fn tab_and_number_keys_switch_views() {
    let (_dir, mut app, _rx) = main_app();
    assert!(app.handle_key(key(KeyCode::Tab)));
    assert_eq!(app.view, View::Form);
    app.handle_key(key(KeyCode::BackTab));
    assert_eq!(app.view, View::Directory);
    app.handle_key(key(KeyCode::Char('3')));
    assert_eq!(app.view, View::Matches);
    app.handle_key(key(KeyCode::F(4)));
    assert_eq!(app.view, View::Chat);
    app.handle_key(key(KeyCode::BackTab));
    app.handle_key(key(KeyCode::BackTab));
    app.handle_key(key(KeyCode::BackTab));
    app.handle_key(key(KeyCode::BackTab));
    assert_eq!(app.view, View::Chat);
  }

  #[test]
  fn q_quits_from_the_directory_but_types_in_the_form() {
    let (_dir, mut app, _rx) = main_app();
    app.view = View::Form;
    assert!(app.handle_key(key(KeyCode::Char('q'))));
    assert_eq!(app.form.first_name, "q");

    app.view = View::Directory;
    assert!(!app.handle_key(key(KeyCode::Char('q'))));
  }

  // ── Setup ─────────────────────────────────────────────────────────────────

  #[test]
  fn setup_reports_parse_errors_and_stays_put() {
    let (_dir, mut app, _rx) = make_app();
    app.handle_paste("const firebaseConfig = {apiKey: 'k'};");
    app.handle_key(ctrl('s'));

    assert_eq!(app.screen, Screen::Setup);
    assert!(!app.setup.connecting);
    assert!(app.setup.error.as_deref().unwrap().contains("projectId"));
  }

  #[test]
  fn setup_enter_adds_a_newline_to_the_config() {
    let (_dir, mut app, _rx) = make_app();
    app.handle_key(key(KeyCode::Char('{')));
    app.handle_key(key(KeyCode::Enter));
    assert_eq!(app.setup.config_text, "{\n");

    app.handle_key(key(KeyCode::Tab));
    app.handle_key(key(KeyCode::Char('x')));
    assert_eq!(app.setup.assistant_key, "x");
  }

  #[tokio::test]
  async fn valid_setup_saves_and_starts_connecting() {
    let (dir, mut app, _rx) = make_app();
    app.handle_paste(r#"{"apiKey":"k","projectId":"p","databaseURL":"http://127.0.0.1:9"}"#);
    app.handle_key(key(KeyCode::Tab));
    app.handle_paste("gemini-key");
    app.handle_key(ctrl('s'));

    assert!(app.setup.connecting);
    assert!(app.setup.error.is_none());
    assert!(app.has_assistant_key());
    let store = CredentialStore::new(dir.path());
    assert_eq!(store.load_backend().unwrap().project_id, "p");
    assert_eq!(store.load_assistant_key().as_deref(), Some("gemini-key"));
  }

  #[test]
  fn failed_sign_in_shows_the_error_screen_and_reset_needs_confirmation() {
    let (dir, mut app, _rx) = make_app();
    let store = CredentialStore::new(dir.path());
    store
      .save_backend(&parse_backend_config(r#"{"apiKey":"k","projectId":"p"}"#).unwrap())
      .unwrap();

    app.handle_event(AppEvent::Connected(Err(BackendInitError::InvalidKey)));
    assert_eq!(app.screen, Screen::BackendError(BackendInitError::InvalidKey));

    app.handle_key(key(KeyCode::Char('r')));
    assert_eq!(app.confirm, Some(Confirm::ResetConfig));
    app.handle_key(key(KeyCode::Char('n')));
    assert!(store.load_backend().is_some());

    app.handle_key(key(KeyCode::Char('r')));
    app.handle_key(key(KeyCode::Char('y')));
    assert_eq!(app.screen, Screen::Setup);
    assert!(store.load_backend().is_none());
  }

  // ── Directory ─────────────────────────────────────────────────────────────

  #[test]
  fn snapshot_fills_the_directory_newest_first() {
    let (_dir, mut app, _rx) = main_app();
    app.directory.start_subscription();
    assert!(app.directory.is_loading());

    load(&mut app, vec![
      profile("a", "Avi", Gender::Male, 1),
      profile("b", "Bracha", Gender::Female, 2),
    ]);
    assert!(!app.directory.is_loading());
    assert_eq!(app.cursor_profile().unwrap().id.as_str(), "b");
  }

  #[test]
  fn cursor_is_clamped_when_the_list_shrinks() {
    let (_dir, mut app, _rx) = main_app();
    load(&mut app, vec![
      profile("a", "Avi", Gender::Male, 1),
      profile("b", "Bracha", Gender::Female, 2),
    ]);
    app.handle_key(key(KeyCode::Down));
    assert_eq!(app.list_cursor, 1);

    load(&mut app, vec![profile("a", "Avi", Gender::Male, 1)]);
    assert_eq!(app.list_cursor, 0);
  }

  #[test]
  fn search_and_gender_filter_narrow_the_list() {
    let (_dir, mut app, _rx) = main_app();
    load(&mut app, vec![
      profile("a", "Avi", Gender::Male, 1),
      profile("b", "Bracha", Gender::Female, 2),
    ]);

    app.handle_key(key(KeyCode::Char('/')));
    app.handle_key(key(KeyCode::Char('A')));
    app.handle_key(key(KeyCode::Enter));
    assert_eq!(app.visible_profiles().len(), 1);

    app.handle_key(key(KeyCode::Char('/')));
    app.handle_key(key(KeyCode::Esc));
    assert_eq!(app.visible_profiles().len(), 2);

    app.handle_key(key(KeyCode::Char('g')));
    app.handle_key(key(KeyCode::Char('g')));
    let visible = app.visible_profiles();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].record.first_name, "Bracha");
  }

  #[test]
  fn subscription_failure_only_clears_loading() {
    let (_dir, mut app, _rx) = main_app();
    app.directory.start_subscription();
    app.handle_event(AppEvent::SubscriptionFailed {
      generation: app.sync_generation,
      failure:    SyncFailure {
        message:           "403".into(),
        permission_denied: true,
      },
    });
    assert!(!app.directory.is_loading());
    assert!(app.notice.is_none());
  }

  #[test]
  fn events_from_a_torn_down_subscription_are_dropped() {
    let (_dir, mut app, _rx) = main_app();
    let old = app.sync_generation;
    load(&mut app, vec![profile("a", "Avi", Gender::Male, 1)]);

    app.handle_key(ctrl('r'));
    app.handle_key(key(KeyCode::Char('y')));
    assert_eq!(app.screen, Screen::Setup);
    assert!(app.directory.profiles().is_empty());

    app.handle_event(AppEvent::Snapshot {
      generation: old,
      snapshot:   Snapshot {
        version:  2,
        profiles: vec![profile("b", "Bracha", Gender::Female, 2)],
      },
    });
    assert!(app.directory.profiles().is_empty());

    app.directory.start_subscription();
    app.handle_event(AppEvent::SubscriptionFailed {
      generation: old,
      failure:    SyncFailure {
        message:           "late".into(),
        permission_denied: false,
      },
    });
    assert!(app.directory.is_loading());
  }

  #[test]
  fn m_opens_matches_for_the_selected_profile() {
    let (_dir, mut app, _rx) = main_app();
    load(&mut app, vec![
      profile("a", "Avi", Gender::Male, 1),
      profile("b", "Bracha", Gender::Female, 2),
    ]);
    app.handle_key(key(KeyCode::Char('m')));

    assert_eq!(app.view, View::Matches);
    assert_eq!(app.match_target_profile().unwrap().id.as_str(), "b");
    let matches = app.matches();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].profile.id.as_str(), "a");

    let classic = matches[0].score;
    app.handle_key(key(KeyCode::Char('r')));
    assert_eq!(app.match_rules, MatchRules::Assistant);
    assert_ne!(app.matches()[0].score, 0);
    assert!(classic > 0);
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  #[test]
  fn delete_asks_first_and_can_be_cancelled() {
    let (_dir, mut app, _rx) = main_app();
    load(&mut app, vec![profile("a", "Avi", Gender::Male, 1)]);

    app.handle_key(key(KeyCode::Char('d')));
    assert_eq!(app.confirm, Some(Confirm::Delete(ProfileId::new("a"))));
    app.handle_key(key(KeyCode::Esc));
    assert!(app.confirm.is_none());
    assert_eq!(app.status_msg, "Cancelled");
  }

  #[test]
  fn confirmed_delete_without_a_backend_is_reported() {
    let (_dir, mut app, _rx) = main_app();
    load(&mut app, vec![profile("a", "Avi", Gender::Male, 1)]);

    app.handle_key(key(KeyCode::Char('d')));
    app.handle_key(key(KeyCode::Char('y')));
    assert!(app.notice.is_some());
    assert!(!app.directory.is_loading());
  }

  #[test]
  fn successful_delete_clears_match_target_and_edited_form() {
    let (_dir, mut app, _rx) = main_app();
    let avi = profile("a", "Avi", Gender::Male, 1);
    load(&mut app, vec![avi.clone(), profile("b", "Bracha", Gender::Female, 2)]);
    app.match_target = Some(avi.id.clone());
    app.form = ProfileForm::from_profile(&avi);

    app.directory.begin_write();
    app.handle_event(AppEvent::Deleted { id: ProfileId::new("b"), result: Ok(()) });
    assert_eq!(app.match_target, Some(avi.id.clone()));
    assert!(app.form.is_editing());

    app.directory.begin_write();
    app.handle_event(AppEvent::Deleted { id: avi.id.clone(), result: Ok(()) });
    assert!(app.match_target.is_none());
    assert!(!app.form.is_editing());
    assert!(app.form.first_name.is_empty());
    assert!(!app.directory.is_loading());
  }

  #[test]
  fn failed_save_keeps_the_form_and_blocks_with_a_notice() {
    let (_dir, mut app, _rx) = main_app();
    app.view = View::Form;
    app.form.first_name = "Dina".into();

    app.directory.begin_write();
    app.handle_event(AppEvent::Saved(Err("POST → 500".into())));
    assert_eq!(app.form.first_name, "Dina");
    assert_eq!(app.view, View::Form);
    assert!(app.notice.as_deref().unwrap().contains("500"));

    // Any key dismisses the notice without reaching the form.
    app.handle_key(key(KeyCode::Char('x')));
    assert!(app.notice.is_none());
    assert_eq!(app.form.first_name, "Dina");
  }

  #[test]
  fn successful_save_resets_the_form_and_returns_to_the_directory() {
    let (_dir, mut app, _rx) = main_app();
    app.view = View::Form;
    app.form.first_name = "Dina".into();

    app.handle_event(AppEvent::Saved(Ok(profile("n", "Dina", Gender::Female, 3))));
    assert_eq!(app.form, ProfileForm::default());
    assert_eq!(app.view, View::Directory);
    assert_eq!(app.status_msg, "Saved Dina");
  }

  #[test]
  fn invalid_numbers_are_caught_before_saving() {
    let (_dir, mut app, _rx) = main_app();
    app.view = View::Form;
    app.form.age = "twenty".into();
    app.handle_key(ctrl('s'));
    assert!(app.notice.as_deref().unwrap().contains("age"));
    assert!(!app.directory.is_loading());
  }

  // ── Form ──────────────────────────────────────────────────────────────────

  #[test]
  fn form_fields_are_navigated_and_edited() {
    let (_dir, mut app, _rx) = main_app();
    app.handle_key(key(KeyCode::Char('n')));
    assert_eq!(app.view, View::Form);

    app.handle_key(key(KeyCode::Char('R')));
    app.handle_key(key(KeyCode::Down));
    app.handle_key(key(KeyCode::Down));
    assert_eq!(app.form_field, FormField::Gender);
    app.handle_key(key(KeyCode::Right));
    assert_eq!(app.form.gender, Gender::Female);

    app.handle_key(key(KeyCode::Up));
    app.handle_key(key(KeyCode::Up));
    app.handle_key(key(KeyCode::Up));
    assert_eq!(app.form_field, FormField::Image);
    assert_eq!(app.form.first_name, "R");
  }

  #[test]
  fn education_fields_cycle_through_options() {
    let (_dir, mut app, _rx) = main_app();
    app.view = View::Form;
    app.form_field = FormField::HighSchool;
    app.handle_key(key(KeyCode::Right));
    assert_eq!(app.form.high_school, "אולפנה");
    app.handle_key(key(KeyCode::Left));
    app.handle_key(key(KeyCode::Left));
    assert_eq!(app.form.high_school, "תיכון");
  }

  #[test]
  fn photos_load_from_a_path_and_oversized_files_are_refused() {
    let (dir, mut app, _rx) = main_app();
    let small = dir.path().join("face.png");
    std::fs::write(&small, [0x89, b'P', b'N', b'G']).unwrap();
    let big = dir.path().join("huge.jpg");
    std::fs::write(&big, vec![0u8; 150_001]).unwrap();

    app.view = View::Form;
    app.form_field = FormField::Image;
    app.handle_paste(small.to_str().unwrap());
    app.handle_key(key(KeyCode::Enter));
    assert!(app.form.image.as_deref().unwrap().starts_with("data:image/png;base64,"));
    assert!(app.image_path.is_empty());

    app.handle_paste(big.to_str().unwrap());
    app.handle_key(key(KeyCode::Enter));
    assert!(app.notice.as_deref().unwrap().contains("150000"));
    assert!(app.form.image.as_deref().unwrap().starts_with("data:image/png"));

    app.notice = None;
    app.image_path.clear();
    app.handle_key(key(KeyCode::Backspace));
    assert!(app.form.image.is_none());
  }

  // ── Chat ──────────────────────────────────────────────────────────────────

  #[test]
  fn without_a_key_chat_input_is_saved_as_the_key() {
    let (dir, mut app, _rx) = main_app();
    app.view = View::Chat;
    assert!(!app.has_assistant_key());

    app.handle_paste("AIza-test");
    app.handle_key(key(KeyCode::Enter));
    assert!(app.has_assistant_key());
    assert!(app.chat_input.is_empty());
    assert_eq!(
      CredentialStore::new(dir.path()).load_assistant_key().as_deref(),
      Some("AIza-test")
    );
  }

  fn failure(e: AssistantError) -> AppEvent { AppEvent::AssistantReplied(Err((&e).into())) }

  #[test]
  fn assistant_failure_explains_itself() {
    let (_dir, mut app, _rx) = main_app();
    app.chat.begin_turn("hello").unwrap();
    app.handle_event(failure(AssistantError::Status { status: 503, body: "busy".into() }));

    assert!(!app.chat.is_pending());
    let Some(ChatMessage::Assistant(text)) = app.chat.messages().last() else {
      panic!("expected an assistant message");
    };
    assert!(text.starts_with(APOLOGY));
    assert!(text.contains("503"));
    assert!(app.status_msg.contains("503"));
    assert!(!app.status_msg.contains("Ctrl-K"));
  }

  #[test]
  fn rejected_key_can_be_replaced_from_the_chat() {
    let (dir, mut app, _rx) = main_app();
    app.view = View::Chat;
    app.handle_paste("AIza-old");
    app.handle_key(key(KeyCode::Enter));
    assert!(app.has_assistant_key());

    app.chat.begin_turn("hello").unwrap();
    app.handle_event(failure(AssistantError::Status {
      status: 403,
      body:   "API key not valid".into(),
    }));
    let Some(ChatMessage::Assistant(text)) = app.chat.messages().last() else {
      panic!("expected an assistant message");
    };
    assert!(text.contains("key was rejected"));
    assert!(app.status_msg.contains("Ctrl-K"));

    app.handle_key(ctrl('k'));
    assert!(!app.has_assistant_key());
    assert!(CredentialStore::new(dir.path()).load_assistant_key().is_none());

    app.handle_paste("AIza-new");
    app.handle_key(key(KeyCode::Enter));
    assert!(app.has_assistant_key());
    assert_eq!(
      CredentialStore::new(dir.path()).load_assistant_key().as_deref(),
      Some("AIza-new")
    );
  }

  #[test]
  fn status_message_lasts_until_the_next_key() {
    let (_dir, mut app, _rx) = main_app();
    app.handle_event(AppEvent::Saved(Ok(profile("n", "Dina", Gender::Female, 3))));
    assert_eq!(app.status_msg, "Saved Dina");

    app.handle_key(key(KeyCode::Down));
    assert!(app.status_msg.is_empty());
  }

  #[test]
  fn approving_a_draft_fills_the_form() {
    let (_dir, mut app, _rx) = main_app();
    app.view = View::Chat;
    app.handle_key(ctrl('a'));
    assert_eq!(app.view, View::Chat);

    app.chat.begin_turn("Yael, 26").unwrap();
    app.handle_event(AppEvent::AssistantReplied(Ok(AssistantReply {
      text:  "נעים מאוד".into(),
      draft: Some(ProfileDraft {
        first_name: Some("Yael".into()),
        age: Some(26),
        ..Default::default()
      }),
    })));

    app.handle_key(ctrl('a'));
    assert_eq!(app.view, View::Form);
    assert_eq!(app.form.first_name, "Yael");
    assert_eq!(app.form.age, "26");
  }
}
