//! Editor adapter seam.
//!
//! The embedded editing component is a black box reached only through
//! [`EditorAdapter`]. The editor hook owns the surfaces an adapter creates;
//! the adapter reports content changes through the [`ChangeListener`] it was
//! given at construction.

use std::rc::Rc;

use thiserror::Error;

use crate::{
  field::{
    LanguageMode,
    ThemeMode,
  },
  page::ElementId,
};

/// Replace the characters in `from..to` with `insert`. Offsets are in chars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
  pub from:   usize,
  pub to:     usize,
  pub insert: String,
}

impl Change {
  pub fn is_noop(&self) -> bool {
    self.from == self.to && self.insert.is_empty()
  }
}

/// A batch of changes applied to a surface, along with the text they
/// produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
  changes: Vec<Change>,
  text:    String,
}

impl ChangeSet {
  pub fn new(changes: Vec<Change>, text: impl Into<String>) -> Self {
    Self {
      changes,
      text: text.into(),
    }
  }

  /// Replace a whole document of `old_len` chars with `text`.
  pub fn replace_all(old_len: usize, text: impl Into<String>) -> Self {
    let text = text.into();
    Self {
      changes: vec![Change {
        from:   0,
        to:     old_len,
        insert: text.clone(),
      }],
      text,
    }
  }

  pub fn changes(&self) -> &[Change] {
    &self.changes
  }

  /// Document text after the changes.
  pub fn text(&self) -> &str {
    &self.text
  }

  /// Whether any change touched the document content. Selection-only
  /// updates produce change sets where this is false.
  pub fn doc_changed(&self) -> bool {
    self.changes.iter().any(|change| !change.is_noop())
  }
}

pub type ChangeListener = Rc<dyn Fn(&ChangeSet)>;

/// Construction parameters for a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceSpec {
  /// Element the surface mounts into.
  pub parent:   ElementId,
  pub text:     String,
  pub language: LanguageMode,
  pub theme:    ThemeMode,
}

/// Presentation applied to a surface's outer element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceStyle {
  pub border:        String,
  pub border_radius: String,
  pub font_size:     String,
  pub font_family:   String,
  pub min_height:    String,
  pub border_color:  String,
}

impl SurfaceStyle {
  /// CSS property/value pairs.
  pub fn properties(&self) -> [(&'static str, &str); 6] {
    [
      ("border", &self.border),
      ("border-radius", &self.border_radius),
      ("font-size", &self.font_size),
      ("font-family", &self.font_family),
      ("min-height", &self.min_height),
      ("border-color", &self.border_color),
    ]
  }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
  #[error("language mode `{0}` is not supported by this editor")]
  UnsupportedLanguage(LanguageMode),
  #[error("surface parent {0} is not on the page")]
  MissingParent(ElementId),
}

pub trait EditorAdapter {
  type Surface;

  /// Build a surface showing `spec.text`. Construction itself must not call
  /// `on_change`; every later content change, user or programmatic, must.
  fn create_surface(
    &self,
    spec: SurfaceSpec,
    on_change: ChangeListener,
  ) -> Result<Self::Surface, SurfaceError>;

  /// Replace the whole document with `text`.
  fn replace_text(&self, surface: &Self::Surface, text: &str);

  fn current_text(&self, surface: &Self::Surface) -> String;

  /// Tear the surface down. It must not call its listener afterwards.
  fn destroy_surface(&self, surface: Self::Surface);

  fn apply_style(&self, surface: &Self::Surface, style: &SurfaceStyle);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn doc_changed_ignores_empty_changes() {
    let cs = ChangeSet::new(
      vec![Change {
        from:   3,
        to:     3,
        insert: String::new(),
      }],
      "abc",
    );
    assert!(!cs.doc_changed());
    assert!(!ChangeSet::new(Vec::new(), "abc").doc_changed());
    assert!(ChangeSet::replace_all(3, "abd").doc_changed());
  }
}
