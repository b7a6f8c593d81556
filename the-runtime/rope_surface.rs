//! Reference editor adapter backed by a [`Rope`].
//!
//! Each surface mounts a `div` under its parent element and renders its text
//! as that element's content. Edits go through [`RopeSurface::insert`],
//! [`RopeSurface::delete`] and [`RopeSurface::select`], which report to the
//! change listener exactly like a real editing component would.

use std::{
  cell::RefCell,
  ops::Range,
  rc::Rc,
};

use ropey::Rope;
use the_hooks_lib::{
  field::{
    LanguageMode,
    ThemeMode,
  },
  page::{
    ElementId,
    Page,
  },
  surface::{
    Change,
    ChangeListener,
    ChangeSet,
    EditorAdapter,
    SurfaceError,
    SurfaceSpec,
    SurfaceStyle,
  },
};

const SURFACE_TAG: &str = "div";
const SURFACE_CLASS: &str = "hook-editor";

#[derive(Clone)]
pub struct RopeSurface {
  doc: Rc<RefCell<RopeDoc>>,
}

struct RopeDoc {
  page:      Page,
  parent:    ElementId,
  element:   ElementId,
  text:      Rope,
  language:  LanguageMode,
  theme:     ThemeMode,
  selection: Range<usize>,
  listener:  Option<ChangeListener>,
}

impl RopeSurface {
  pub fn text(&self) -> String {
    self.doc.borrow().text.to_string()
  }

  pub fn len_chars(&self) -> usize {
    self.doc.borrow().text.len_chars()
  }

  pub fn parent(&self) -> ElementId {
    self.doc.borrow().parent
  }

  pub fn element(&self) -> ElementId {
    self.doc.borrow().element
  }

  pub fn language(&self) -> LanguageMode {
    self.doc.borrow().language
  }

  pub fn theme(&self) -> ThemeMode {
    self.doc.borrow().theme
  }

  pub fn selection(&self) -> Range<usize> {
    self.doc.borrow().selection.clone()
  }

  pub fn is_destroyed(&self) -> bool {
    self.doc.borrow().listener.is_none()
  }

  /// Insert `text` at char offset `at`, clamped to the document end.
  pub fn insert(&self, at: usize, text: &str) {
    let at = at.min(self.len_chars());
    self.apply(vec![Change {
      from:   at,
      to:     at,
      insert: text.to_string(),
    }]);
  }

  /// Insert at the end of the document.
  pub fn append(&self, text: &str) {
    self.insert(self.len_chars(), text);
  }

  /// Delete the chars in `range`, clamped to the document.
  pub fn delete(&self, range: Range<usize>) {
    let len = self.len_chars();
    let from = range.start.min(len);
    let to = range.end.clamp(from, len);
    self.apply(vec![Change {
      from,
      to,
      insert: String::new(),
    }]);
  }

  /// Move the selection. Reported to the listener as a change set that does
  /// not touch the document.
  pub fn select(&self, range: Range<usize>) {
    let (listener, changes) = {
      let mut doc = self.doc.borrow_mut();
      let len = doc.text.len_chars();
      doc.selection = range.start.min(len)..range.end.min(len);
      (doc.listener.clone(), ChangeSet::new(Vec::new(), doc.text.to_string()))
    };
    if let Some(listener) = listener {
      listener(&changes);
    }
  }

  fn apply(&self, changes: Vec<Change>) {
    let (listener, changes) = {
      let mut doc = self.doc.borrow_mut();
      if doc.listener.is_none() {
        tracing::debug!("edit on a destroyed surface ignored");
        return;
      }
      for change in &changes {
        doc.text.remove(change.from..change.to);
        doc.text.insert(change.from, &change.insert);
      }
      let end = doc.text.len_chars();
      doc.selection = end..end;
      let text = doc.text.to_string();
      if let Err(err) = doc.page.set_content(doc.element, &text) {
        tracing::warn!(%err, "failed to render editor surface");
      }
      (doc.listener.clone(), ChangeSet::new(changes, text))
    };
    if let Some(listener) = listener {
      listener(&changes);
    }
  }
}

/// Editor adapter that builds [`RopeSurface`]s on a [`Page`].
pub struct RopeAdapter {
  page:        Page,
  unsupported: Vec<LanguageMode>,
  surfaces:    RefCell<Vec<RopeSurface>>,
}

impl RopeAdapter {
  pub fn new(page: Page) -> Self {
    Self {
      page,
      unsupported: Vec::new(),
      surfaces: RefCell::new(Vec::new()),
    }
  }

  /// Refuse to build surfaces for `languages`, as an editor without the
  /// matching grammar would.
  pub fn without_languages(mut self, languages: impl IntoIterator<Item = LanguageMode>) -> Self {
    self.unsupported.extend(languages);
    self
  }

  /// The live surface mounted under `parent`, if any.
  pub fn surface_for(&self, parent: ElementId) -> Option<RopeSurface> {
    self
      .surfaces
      .borrow()
      .iter()
      .find(|surface| surface.parent() == parent)
      .cloned()
  }

  pub fn live_surfaces(&self) -> usize {
    self.surfaces.borrow().len()
  }
}

impl EditorAdapter for RopeAdapter {
  type Surface = RopeSurface;

  fn create_surface(
    &self,
    spec: SurfaceSpec,
    on_change: ChangeListener,
  ) -> Result<RopeSurface, SurfaceError> {
    if self.unsupported.contains(&spec.language) {
      return Err(SurfaceError::UnsupportedLanguage(spec.language));
    }
    if !self.page.contains(spec.parent) {
      return Err(SurfaceError::MissingParent(spec.parent));
    }

    let element = self
      .page
      .create_element_with(spec.parent, SURFACE_TAG, &[
        ("class", SURFACE_CLASS),
        ("data-lang", spec.language.as_str()),
        ("data-theme", if spec.theme.is_dark() { "dark" } else { "light" }),
      ])
      .map_err(|_| SurfaceError::MissingParent(spec.parent))?;
    if let Err(err) = self.page.set_content(element, &spec.text) {
      tracing::warn!(%err, "failed to render editor surface");
    }

    let text = Rope::from_str(&spec.text);
    let end = text.len_chars();
    let surface = RopeSurface {
      doc: Rc::new(RefCell::new(RopeDoc {
        page: self.page.clone(),
        parent: spec.parent,
        element,
        text,
        language: spec.language,
        theme: spec.theme,
        selection: end..end,
        listener: Some(on_change),
      })),
    };
    self.surfaces.borrow_mut().push(surface.clone());
    tracing::trace!(%element, language = %spec.language, theme = %spec.theme, "rope surface created");
    Ok(surface)
  }

  fn replace_text(&self, surface: &RopeSurface, text: &str) {
    let len = surface.len_chars();
    surface.apply(vec![Change {
      from:   0,
      to:     len,
      insert: text.to_string(),
    }]);
  }

  fn current_text(&self, surface: &RopeSurface) -> String {
    surface.text()
  }

  fn destroy_surface(&self, surface: RopeSurface) {
    self
      .surfaces
      .borrow_mut()
      .retain(|live| !Rc::ptr_eq(&live.doc, &surface.doc));
    let element = {
      let mut doc = surface.doc.borrow_mut();
      doc.listener = None;
      doc.element
    };
    if let Err(err) = self.page.remove_element(element) {
      tracing::debug!(%err, "editor surface element already gone");
    }
  }

  fn apply_style(&self, surface: &RopeSurface, style: &SurfaceStyle) {
    let element = surface.element();
    for (property, value) in style.properties() {
      if let Err(err) = self.page.set_style(element, property, value) {
        tracing::warn!(%element, %err, "failed to style editor surface");
        return;
      }
    }
  }
}
