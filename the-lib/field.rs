use std::{
  borrow::Borrow,
  fmt,
  str::FromStr,
};

use serde::{
  Deserialize,
  Serialize,
};
use thiserror::Error;

use crate::page::ElementId;

/// Stable name of an editor field, taken from the bound element's
/// `data-field` attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl From<&str> for FieldId {
  fn from(value: &str) -> Self {
    Self::new(value)
  }
}

impl From<String> for FieldId {
  fn from(value: String) -> Self {
    Self(value)
  }
}

impl Borrow<str> for FieldId {
  fn borrow(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for FieldId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LanguageMode {
  Json,
  SourceCode,
  #[default]
  Plain,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown language mode `{0}`")]
pub struct UnknownLanguage(pub String);

impl LanguageMode {
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Json => "json",
      Self::SourceCode => "source-code",
      Self::Plain => "plain",
    }
  }

  /// Interpret a `data-lang` attribute. A missing or empty attribute means
  /// plain text.
  pub fn from_attribute(value: Option<&str>) -> Result<Self, UnknownLanguage> {
    match value.map(str::trim) {
      None | Some("") => Ok(Self::Plain),
      Some(name) => name.parse(),
    }
  }
}

impl FromStr for LanguageMode {
  type Err = UnknownLanguage;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "json" => Ok(Self::Json),
      "elixir" | "source-code" | "source" => Ok(Self::SourceCode),
      "plain" | "text" => Ok(Self::Plain),
      _ => Err(UnknownLanguage(s.to_string())),
    }
  }
}

impl fmt::Display for LanguageMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThemeMode {
  #[default]
  Light,
  Dark,
}

impl ThemeMode {
  pub const fn from_dark(dark: bool) -> Self {
    if dark { Self::Dark } else { Self::Light }
  }

  pub const fn is_dark(self) -> bool {
    matches!(self, Self::Dark)
  }
}

impl fmt::Display for ThemeMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Light => "light",
      Self::Dark => "dark",
    })
  }
}

/// One editor instance's binding to the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundField {
  pub field_id: FieldId,
  pub language: LanguageMode,
  /// Theme the live surface was built with.
  pub theme:    ThemeMode,
  /// Hidden form control mirroring the surface text.
  pub mirror:   ElementId,
}

/// Text pushed by the server for one field (`update_editor` event).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRemoteUpdate {
  pub field: FieldId,
  pub value: String,
}

impl PendingRemoteUpdate {
  pub fn new(field: impl Into<FieldId>, value: impl Into<String>) -> Self {
    Self {
      field: field.into(),
      value: value.into(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn language_from_attribute() {
    assert_eq!(LanguageMode::from_attribute(None), Ok(LanguageMode::Plain));
    assert_eq!(LanguageMode::from_attribute(Some(" ")), Ok(LanguageMode::Plain));
    assert_eq!(LanguageMode::from_attribute(Some("json")), Ok(LanguageMode::Json));
    assert_eq!(
      LanguageMode::from_attribute(Some("elixir")),
      Ok(LanguageMode::SourceCode)
    );
    assert_eq!(
      LanguageMode::from_attribute(Some("cobol")),
      Err(UnknownLanguage("cobol".into()))
    );
  }

  #[test]
  fn remote_update_payload() {
    let update: PendingRemoteUpdate =
      serde_json::from_str(r#"{"field":"script","value":"IO.puts 1"}"#).unwrap();
    assert_eq!(update, PendingRemoteUpdate::new("script", "IO.puts 1"));
  }
}
