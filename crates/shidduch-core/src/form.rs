//! The editable profile draft behind the add/edit view.
//!
//! The form keeps every field as the text the user typed. Numbers are only
//! coerced, and match-preference defaults only applied, when the form is
//! turned into a [`ProfileRecord`] for saving.

use crate::{
  Error, Result,
  assistant::ProfileDraft,
  profile::{Gender, MatchPreference, Profile, ProfileId, ProfileRecord},
};

/// Suggested values for the high-school field.
pub const HIGH_SCHOOL_OPTIONS: [&str; 4] = ["אולפנה", "ישיבה תיכונית", "תיכון", "סמינר"];

/// Suggested values for the post-high-school field.
pub const POST_HIGH_SCHOOL_OPTIONS: [&str; 8] = [
  "הסדר",
  "מכינה",
  "גיוס",
  "לימודים גבוהים",
  "מדרשה",
  "שירות לאומי",
  "ישיבה גבוהה",
  "כולל",
];

/// How far the default partner age range reaches either side of the
/// profile's own age.
const DEFAULT_AGE_SPREAD: u32 = 5;

// ─── Fields ──────────────────────────────────────────────────────────────────

/// Every editable field, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
pub enum FormField {
  FirstName,
  LastName,
  Gender,
  Age,
  Height,
  Appearance,
  ReligiousLevel,
  LifeStage,
  CurrentOccupation,
  PastOccupations,
  HighSchool,
  PostHighSchool,
  Origin,
  LivingToday,
  AboutMe,
  CharacterTraits,
  Interests,
  Motto,
  LookingForText,
  LookingForMinAge,
  LookingForMaxAge,
  LookingForReligiousLevel,
  ContactName,
  Image,
}

impl FormField {
  pub fn label(self) -> &'static str {
    match self {
      Self::FirstName => "First name",
      Self::LastName => "Last name",
      Self::Gender => "Gender",
      Self::Age => "Age",
      Self::Height => "Height (cm)",
      Self::Appearance => "Appearance",
      Self::ReligiousLevel => "Religious level",
      Self::LifeStage => "Life stage",
      Self::CurrentOccupation => "Occupation",
      Self::PastOccupations => "Past occupations",
      Self::HighSchool => "High school",
      Self::PostHighSchool => "After high school",
      Self::Origin => "Origin",
      Self::LivingToday => "Lives in",
      Self::AboutMe => "About",
      Self::CharacterTraits => "Character",
      Self::Interests => "Interests",
      Self::Motto => "Motto",
      Self::LookingForText => "Looking for",
      Self::LookingForMinAge => "Partner min age",
      Self::LookingForMaxAge => "Partner max age",
      Self::LookingForReligiousLevel => "Partner religious level",
      Self::ContactName => "Contact",
      Self::Image => "Photo",
    }
  }

  /// Suggested values the user can cycle through, if any.
  pub fn options(self) -> &'static [&'static str] {
    match self {
      Self::HighSchool => &HIGH_SCHOOL_OPTIONS,
      Self::PostHighSchool => &POST_HIGH_SCHOOL_OPTIONS,
      _ => &[],
    }
  }
}

// ─── Form ────────────────────────────────────────────────────────────────────

/// The outcome of submitting the form: which store call to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
  Create(ProfileRecord),
  Update(ProfileId, ProfileRecord),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileForm {
  pub first_name:                  String,
  pub last_name:                   String,
  pub gender:                      Gender,
  pub age:                         String,
  pub height:                      String,
  pub appearance:                  String,
  pub religious_level:             String,
  pub life_stage:                  String,
  pub current_occupation:          String,
  pub past_occupations:            String,
  pub high_school:                 String,
  pub post_high_school:            String,
  pub origin:                      String,
  pub living_today:                String,
  pub about_me:                    String,
  pub character_traits:            String,
  pub interests:                   String,
  pub motto:                       String,
  pub looking_for_text:            String,
  pub looking_for_min_age:         String,
  pub looking_for_max_age:         String,
  pub looking_for_religious_level: String,
  pub contact_name:                String,
  pub image:                       Option<String>,
  /// Set in edit mode: the profile the form will update.
  editing_id:                      Option<ProfileId>,
  /// Creation time of the edited profile, carried through the update.
  created_at:                      Option<i64>,
}

fn blank_if_zero(n: u32) -> String {
  if n == 0 { String::new() } else { n.to_string() }
}

fn parse_number(field: &'static str, text: &str) -> Result<u32> {
  let trimmed = text.trim();
  if trimmed.is_empty() {
    return Ok(0);
  }
  trimmed.parse().map_err(|_| Error::InvalidNumber {
    field,
    value: text.to_string(),
  })
}

impl ProfileForm {
  /// Seed the form from an existing profile (edit mode).
  pub fn from_profile(profile: &Profile) -> Self {
    let r = &profile.record;
    let pref = r.looking_for.clone().unwrap_or_default();
    Self {
      first_name:                  r.first_name.clone(),
      last_name:                   r.last_name.clone(),
      gender:                      r.gender,
      age:                         blank_if_zero(r.age),
      height:                      blank_if_zero(r.height),
      appearance:                  r.appearance.clone(),
      religious_level:             r.religious_level.clone(),
      life_stage:                  r.life_stage.clone(),
      current_occupation:          r.current_occupation.clone(),
      past_occupations:            r.past_occupations.clone(),
      high_school:                 r.high_school.clone(),
      post_high_school:            r.post_high_school.clone(),
      origin:                      r.origin.clone(),
      living_today:                r.living_today.clone(),
      about_me:                    r.about_me.clone(),
      character_traits:            r.character_traits.clone(),
      interests:                   r.interests.clone(),
      motto:                       r.motto.clone(),
      looking_for_text:            r.looking_for_text.clone(),
      looking_for_min_age:         blank_if_zero(pref.min_age),
      looking_for_max_age:         blank_if_zero(pref.max_age),
      looking_for_religious_level: pref.religious_level,
      contact_name:                r.contact_name.clone(),
      image:                       r.image.clone(),
      editing_id:                  Some(profile.id.clone()),
      created_at:                  r.created_at,
    }
  }

  pub fn editing_id(&self) -> Option<&ProfileId> { self.editing_id.as_ref() }

  pub fn is_editing(&self) -> bool { self.editing_id.is_some() }

  /// Back to a blank new-profile form.
  pub fn reset(&mut self) { *self = Self::default(); }

  // ── Field access ──────────────────────────────────────────────────────

  fn text(&self, field: FormField) -> Option<&String> {
    Some(match field {
      FormField::FirstName => &self.first_name,
      FormField::LastName => &self.last_name,
      FormField::Age => &self.age,
      FormField::Height => &self.height,
      FormField::Appearance => &self.appearance,
      FormField::ReligiousLevel => &self.religious_level,
      FormField::LifeStage => &self.life_stage,
      FormField::CurrentOccupation => &self.current_occupation,
      FormField::PastOccupations => &self.past_occupations,
      FormField::HighSchool => &self.high_school,
      FormField::PostHighSchool => &self.post_high_school,
      FormField::Origin => &self.origin,
      FormField::LivingToday => &self.living_today,
      FormField::AboutMe => &self.about_me,
      FormField::CharacterTraits => &self.character_traits,
      FormField::Interests => &self.interests,
      FormField::Motto => &self.motto,
      FormField::LookingForText => &self.looking_for_text,
      FormField::LookingForMinAge => &self.looking_for_min_age,
      FormField::LookingForMaxAge => &self.looking_for_max_age,
      FormField::LookingForReligiousLevel => &self.looking_for_religious_level,
      FormField::ContactName => &self.contact_name,
      FormField::Gender | FormField::Image => return None,
    })
  }

  fn text_mut(&mut self, field: FormField) -> Option<&mut String> {
    Some(match field {
      FormField::FirstName => &mut self.first_name,
      FormField::LastName => &mut self.last_name,
      FormField::Age => &mut self.age,
      FormField::Height => &mut self.height,
      FormField::Appearance => &mut self.appearance,
      FormField::ReligiousLevel => &mut self.religious_level,
      FormField::LifeStage => &mut self.life_stage,
      FormField::CurrentOccupation => &mut self.current_occupation,
      FormField::PastOccupations => &mut self.past_occupations,
      FormField::HighSchool => &mut self.high_school,
      FormField::PostHighSchool => &mut self.post_high_school,
      FormField::Origin => &mut self.origin,
      FormField::LivingToday => &mut self.living_today,
      FormField::AboutMe => &mut self.about_me,
      FormField::CharacterTraits => &mut self.character_traits,
      FormField::Interests => &mut self.interests,
      FormField::Motto => &mut self.motto,
      FormField::LookingForText => &mut self.looking_for_text,
      FormField::LookingForMinAge => &mut self.looking_for_min_age,
      FormField::LookingForMaxAge => &mut self.looking_for_max_age,
      FormField::LookingForReligiousLevel => &mut self.looking_for_religious_level,
      FormField::ContactName => &mut self.contact_name,
      FormField::Gender | FormField::Image => return None,
    })
  }

  /// Display text for `field`.
  pub fn value(&self, field: FormField) -> String {
    match field {
      FormField::Gender => self.gender.to_string(),
      FormField::Image => match &self.image {
        Some(uri) => format!("attached ({} bytes)", uri.len()),
        None => String::new(),
      },
      other => self.text(other).cloned().unwrap_or_default(),
    }
  }

  pub fn push_char(&mut self, field: FormField, c: char) {
    match field {
      FormField::Gender if c == ' ' => self.gender = self.gender.toggled(),
      _ => {
        if let Some(text) = self.text_mut(field) {
          text.push(c);
        }
      }
    }
  }

  pub fn pop_char(&mut self, field: FormField) {
    match field {
      FormField::Image => self.image = None,
      _ => {
        if let Some(text) = self.text_mut(field) {
          text.pop();
        }
      }
    }
  }

  pub fn set(&mut self, field: FormField, value: impl Into<String>) {
    if let Some(text) = self.text_mut(field) {
      *text = value.into();
    }
  }

  /// Step through the field's suggested options. Returns `false` if the
  /// field has none.
  pub fn cycle_option(&mut self, field: FormField, forward: bool) -> bool {
    let options = field.options();
    if options.is_empty() {
      return false;
    }
    let current = self.value(field);
    let len = options.len();
    let next = match options.iter().position(|o| *o == current) {
      Some(i) if forward => (i + 1) % len,
      Some(i) => (i + len - 1) % len,
      None if forward => 0,
      None => len - 1,
    };
    self.set(field, options[next]);
    true
  }

  pub fn set_image(&mut self, data_uri: Option<String>) { self.image = data_uri; }

  /// Copy every value present in an approved assistant draft into the form.
  pub fn apply_draft(&mut self, draft: &ProfileDraft) {
    let text = |slot: &mut String, value: &Option<String>| {
      if let Some(v) = value {
        *slot = v.clone();
      }
    };
    let number = |slot: &mut String, value: Option<u32>| {
      if let Some(v) = value {
        *slot = v.to_string();
      }
    };

    text(&mut self.first_name, &draft.first_name);
    text(&mut self.last_name, &draft.last_name);
    if let Some(g) = draft.gender {
      self.gender = g;
    }
    number(&mut self.age, draft.age);
    number(&mut self.height, draft.height);
    text(&mut self.appearance, &draft.appearance);
    text(&mut self.religious_level, &draft.religious_level);
    text(&mut self.life_stage, &draft.life_stage);
    text(&mut self.current_occupation, &draft.current_occupation);
    text(&mut self.past_occupations, &draft.past_occupations);
    text(&mut self.high_school, &draft.high_school);
    text(&mut self.post_high_school, &draft.post_high_school);
    text(&mut self.origin, &draft.origin);
    text(&mut self.living_today, &draft.living_today);
    text(&mut self.about_me, &draft.about_me);
    text(&mut self.character_traits, &draft.character_traits);
    text(&mut self.interests, &draft.interests);
    text(&mut self.motto, &draft.motto);
    text(&mut self.looking_for_text, &draft.looking_for_text);
    number(&mut self.looking_for_min_age, draft.looking_for_min_age);
    number(&mut self.looking_for_max_age, draft.looking_for_max_age);
    text(
      &mut self.looking_for_religious_level,
      &draft.looking_for_religious_level,
    );
    text(&mut self.contact_name, &draft.contact_name);
  }

  // ── Normalisation ─────────────────────────────────────────────────────

  /// Build the record to persist, stamped at `now_ms`.
  ///
  /// Age and height are coerced to numbers (blank means 0). Unset partner
  /// ages default to five years either side of the profile's age, and an
  /// unset partner religious level defaults to the profile's own.
  pub fn to_record(&self, now_ms: i64) -> Result<ProfileRecord> {
    let age = parse_number("age", &self.age)?;
    let height = parse_number("height", &self.height)?;
    let min_age = parse_number("partner min age", &self.looking_for_min_age)?;
    let max_age = parse_number("partner max age", &self.looking_for_max_age)?;

    let looking_for = MatchPreference {
      min_age:         if min_age == 0 {
        age.saturating_sub(DEFAULT_AGE_SPREAD)
      } else {
        min_age
      },
      max_age:         if max_age == 0 {
        age.saturating_add(DEFAULT_AGE_SPREAD)
      } else {
        max_age
      },
      religious_level: if self.looking_for_religious_level.is_empty() {
        self.religious_level.clone()
      } else {
        self.looking_for_religious_level.clone()
      },
    };

    Ok(ProfileRecord {
      first_name: self.first_name.clone(),
      last_name: self.last_name.clone(),
      gender: self.gender,
      age,
      height,
      appearance: self.appearance.clone(),
      religious_level: self.religious_level.clone(),
      current_occupation: self.current_occupation.clone(),
      past_occupations: self.past_occupations.clone(),
      life_stage: self.life_stage.clone(),
      origin: self.origin.clone(),
      living_today: self.living_today.clone(),
      high_school: self.high_school.clone(),
      post_high_school: self.post_high_school.clone(),
      about_me: self.about_me.clone(),
      looking_for_text: self.looking_for_text.clone(),
      interests: self.interests.clone(),
      character_traits: self.character_traits.clone(),
      motto: self.motto.clone(),
      contact_name: self.contact_name.clone(),
      image: self.image.clone(),
      looking_for: Some(looking_for),
      created_at: if self.is_editing() {
        self.created_at
      } else {
        Some(now_ms)
      },
      updated_at: Some(now_ms),
    })
  }

  /// Route the form to a create or an update, depending on edit mode.
  pub fn submission(&self, now_ms: i64) -> Result<Submission> {
    let record = self.to_record(now_ms)?;
    Ok(match &self.editing_id {
      Some(id) => Submission::Update(id.clone(), record),
      None => Submission::Create(record),
    })
  }
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator as _;

  use super::*;

  fn filled() -> ProfileForm {
    ProfileForm {
      first_name: "Moshe".into(),
      last_name: "Levi".into(),
      age: "28".into(),
      height: " 178 ".into(),
      religious_level: "dati".into(),
      ..Default::default()
    }
  }

  #[test]
  fn new_profile_gets_default_preferences() {
    let record = filled().to_record(1_000).unwrap();
    assert_eq!(record.age, 28);
    assert_eq!(record.height, 178);
    let pref = record.looking_for.unwrap();
    assert_eq!(pref.min_age, 23);
    assert_eq!(pref.max_age, 33);
    assert_eq!(pref.religious_level, "dati");
    assert_eq!(record.created_at, Some(1_000));
    assert_eq!(record.updated_at, Some(1_000));
  }

  #[test]
  fn explicit_preferences_are_kept() {
    let mut form = filled();
    form.looking_for_min_age = "21".into();
    form.looking_for_max_age = "26".into();
    form.looking_for_religious_level = "haredi".into();
    let pref = form.to_record(0).unwrap().looking_for.unwrap();
    assert_eq!((pref.min_age, pref.max_age), (21, 26));
    assert_eq!(pref.religious_level, "haredi");
  }

  #[test]
  fn young_age_saturates_min_preference() {
    let mut form = filled();
    form.age = "3".into();
    let pref = form.to_record(0).unwrap().looking_for.unwrap();
    assert_eq!(pref.min_age, 0);
    assert_eq!(pref.max_age, 8);
  }

  #[test]
  fn blank_numbers_become_zero_and_junk_is_rejected() {
    let mut form = ProfileForm::default();
    let record = form.to_record(0).unwrap();
    assert_eq!((record.age, record.height), (0, 0));

    form.height = "tall".into();
    let err = form.to_record(0).unwrap_err();
    assert!(matches!(err, Error::InvalidNumber { field: "height", .. }));
  }

  #[test]
  fn new_form_submits_a_create() {
    let submission = filled().submission(7).unwrap();
    assert!(matches!(submission, Submission::Create(_)));
  }

  #[test]
  fn edit_mode_flattens_preferences_and_keeps_identity() {
    let original = Profile {
      id:     ProfileId::new("p-1"),
      record: ProfileRecord {
        first_name: "Tamar".into(),
        gender: Gender::Female,
        age: 24,
        looking_for: Some(MatchPreference {
          min_age:         0,
          max_age:         30,
          religious_level: "dati".into(),
        }),
        created_at: Some(100),
        updated_at: Some(100),
        ..Default::default()
      },
    };

    let mut form = ProfileForm::from_profile(&original);
    assert!(form.is_editing());
    assert_eq!(form.looking_for_min_age, "");
    assert_eq!(form.looking_for_max_age, "30");
    assert_eq!(form.looking_for_religious_level, "dati");

    form.set(FormField::Motto, "Onwards");
    let Submission::Update(id, record) = form.submission(500).unwrap() else {
      panic!("expected an update");
    };
    assert_eq!(id, original.id);
    assert_eq!(record.created_at, Some(100));
    assert_eq!(record.updated_at, Some(500));
    assert_eq!(record.motto, "Onwards");
    assert_eq!(record.first_name, "Tamar");
    assert_eq!(record.looking_for.unwrap().min_age, 19);
  }

  #[test]
  fn editing_a_record_without_creation_time_leaves_it_unset() {
    let legacy = Profile {
      id:     ProfileId::new("old"),
      record: ProfileRecord {
        first_name: "Dina".into(),
        gender: Gender::Female,
        age: 31,
        created_at: None,
        ..Default::default()
      },
    };

    let form = ProfileForm::from_profile(&legacy);
    let Submission::Update(_, record) = form.submission(1_700_000_000_000).unwrap() else {
      panic!("expected an update");
    };
    assert_eq!(record.created_at, None);
    assert_eq!(record.updated_at, Some(1_700_000_000_000));

    let Submission::Create(record) = ProfileForm::default().submission(42).unwrap() else {
      panic!("expected a create");
    };
    assert_eq!(record.created_at, Some(42));
  }

  #[test]
  fn reset_leaves_edit_mode() {
    let mut form = ProfileForm::from_profile(&Profile {
      id:     ProfileId::new("x"),
      record: ProfileRecord::default(),
    });
    form.reset();
    assert!(!form.is_editing());
    assert_eq!(form, ProfileForm::default());
  }

  #[test]
  fn typing_edits_text_fields_and_space_toggles_gender() {
    let mut form = ProfileForm::default();
    for c in "Dan".chars() {
      form.push_char(FormField::FirstName, c);
    }
    form.pop_char(FormField::FirstName);
    assert_eq!(form.value(FormField::FirstName), "Da");

    form.push_char(FormField::Gender, ' ');
    assert_eq!(form.gender, Gender::Female);
    form.push_char(FormField::Gender, 'x');
    assert_eq!(form.gender, Gender::Female);
  }

  #[test]
  fn education_fields_cycle_through_options() {
    let mut form = ProfileForm::default();
    assert!(form.cycle_option(FormField::HighSchool, true));
    assert_eq!(form.high_school, HIGH_SCHOOL_OPTIONS[0]);
    assert!(form.cycle_option(FormField::HighSchool, false));
    assert_eq!(form.high_school, HIGH_SCHOOL_OPTIONS[3]);
    assert!(!form.cycle_option(FormField::Motto, true));
  }

  #[test]
  fn every_field_has_a_label() {
    assert!(FormField::iter().all(|f| !f.label().is_empty()));
  }

  #[test]
  fn approved_draft_overwrites_only_present_fields() {
    let mut form = filled();
    let draft = ProfileDraft {
      age: Some(31),
      gender: Some(Gender::Female),
      origin: Some("Safed".into()),
      ..Default::default()
    };
    form.apply_draft(&draft);
    assert_eq!(form.age, "31");
    assert_eq!(form.gender, Gender::Female);
    assert_eq!(form.origin, "Safed");
    assert_eq!(form.first_name, "Moshe");
  }
}
