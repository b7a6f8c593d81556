//! Editor hook: keeps an embedded editing surface, its hidden mirror form
//! control and server-pushed updates in sync.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized -> Active -> (Reconstructing -> Active)* -> Destroyed
//! ```
//!
//! - Local edits flow out through the mirror only: the change listener writes
//!   the mirror value and dispatches an input notification, and the host's
//!   normal form binding carries it to the server.
//! - Pushed updates flow in through a [`KeyedChannel`] keyed by field id and
//!   are applied only when they differ from the surface text. That equality
//!   check is what stops an echoed value from bouncing back.
//! - An ambient theme change rebuilds the surface around the same text. The
//!   mirror is not touched because the content does not change.

use std::{
  cell::RefCell,
  fmt,
  rc::{
    Rc,
    Weak,
  },
};

use serde::{
  Deserialize,
  Serialize,
};
use the_hooks_event::{
  KeyedChannel,
  Signal,
  Subscription,
};

use crate::{
  field::{
    BoundField,
    FieldId,
    LanguageMode,
    PendingRemoteUpdate,
    ThemeMode,
  },
  page::{
    ElementId,
    Page,
  },
  surface::{
    ChangeListener,
    ChangeSet,
    EditorAdapter,
    SurfaceSpec,
    SurfaceStyle,
  },
};

/// Configuration for editor hooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct EditorConfig {
  /// Tag of the mirror form control inside the bound element.
  pub mirror_tag:         String,
  /// Field that gets the compact minimum height.
  pub compact_field:      String,
  pub compact_min_height: String,
  pub min_height:         String,
  pub border:             String,
  pub border_radius:      String,
  pub font_size:          String,
  pub font_family:        String,
  pub dark_border_color:  String,
  pub light_border_color: String,
}

impl Default for EditorConfig {
  fn default() -> Self {
    Self {
      mirror_tag:         "textarea".into(),
      compact_field:      "params".into(),
      compact_min_height: "2rem".into(),
      min_height:         "8rem".into(),
      border:             "1px solid".into(),
      border_radius:      "0.375rem".into(),
      font_size:          "0.875rem".into(),
      font_family:        "ui-monospace, SFMono-Regular, \"SF Mono\", Consolas, \"Liberation \
                           Mono\", Menlo, monospace"
        .into(),
      dark_border_color:  "rgb(55 65 81)".into(),
      light_border_color: "rgb(209 213 219)".into(),
    }
  }
}

impl EditorConfig {
  pub fn style_for(&self, field: &FieldId, theme: ThemeMode) -> SurfaceStyle {
    let min_height = if field.as_str() == self.compact_field {
      &self.compact_min_height
    } else {
      &self.min_height
    };
    let border_color = if theme.is_dark() {
      &self.dark_border_color
    } else {
      &self.light_border_color
    };
    SurfaceStyle {
      border:        self.border.clone(),
      border_radius: self.border_radius.clone(),
      font_size:     self.font_size.clone(),
      font_family:   self.font_family.clone(),
      min_height:    min_height.clone(),
      border_color:  border_color.clone(),
    }
  }
}

/// Everything an editor hook needs from its surroundings.
pub struct EditorContext<A> {
  pub adapter: Rc<A>,
  pub page:    Page,
  pub theme:   Signal<ThemeMode>,
  pub updates: KeyedChannel<FieldId, PendingRemoteUpdate>,
  pub config:  Rc<EditorConfig>,
}

impl<A> Clone for EditorContext<A> {
  fn clone(&self) -> Self {
    Self {
      adapter: Rc::clone(&self.adapter),
      page:    self.page.clone(),
      theme:   self.theme.clone(),
      updates: self.updates.clone(),
      config:  Rc::clone(&self.config),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookState {
  Uninitialized,
  Active,
  Reconstructing,
  Destroyed,
}

pub struct EditorHook<A: EditorAdapter> {
  inner:      Rc<RefCell<Inner<A>>>,
  theme_sub:  Subscription,
  update_sub: Subscription,
}

struct Inner<A: EditorAdapter> {
  cx:             EditorContext<A>,
  element:        ElementId,
  state:          HookState,
  field:          Option<BoundField>,
  surface:        Option<A::Surface>,
  surfaces_built: u64,
  /// Text to rebuild from when the last build left no surface.
  pending_text:   Option<String>,
}

impl<A> EditorHook<A>
where
  A: EditorAdapter + 'static,
  A::Surface: 'static,
{
  /// Bind an editor to `element`.
  ///
  /// The element must contain the mirror control. Without one the hook is
  /// returned `Uninitialized`, with no surface and no subscriptions.
  pub fn attach(cx: &EditorContext<A>, element: ElementId) -> Self {
    let inner = Rc::new(RefCell::new(Inner {
      cx: cx.clone(),
      element,
      state: HookState::Uninitialized,
      field: None,
      surface: None,
      surfaces_built: 0,
      pending_text: None,
    }));

    let page = &cx.page;
    let mirror_tag = cx.config.mirror_tag.as_str();
    let Some(mirror) = page.query(element, |el| el.tag() == mirror_tag) else {
      tracing::warn!(%element, mirror_tag, "editor element has no mirror control");
      return Self {
        inner,
        theme_sub: Subscription::inactive(),
        update_sub: Subscription::inactive(),
      };
    };

    let field_id = FieldId::from(page.attribute(element, "data-field").unwrap_or_default());
    let language = LanguageMode::from_attribute(page.attribute(element, "data-lang").as_deref())
      .unwrap_or_else(|err| {
        tracing::warn!(field = %field_id, %err, "falling back to plain text");
        LanguageMode::Plain
      });
    let text = page.value(mirror).unwrap_or_default();
    let theme = cx.theme.get();

    if let Err(err) = page.set_style(mirror, "display", "none") {
      tracing::warn!(field = %field_id, %err, "failed to hide mirror control");
    }

    {
      let mut inner = inner.borrow_mut();
      inner.field = Some(BoundField {
        field_id: field_id.clone(),
        language,
        theme,
        mirror,
      });
      if inner.build_surface(text) {
        inner.state = HookState::Active;
      }
    }

    let weak = Rc::downgrade(&inner);
    let theme_sub = cx.theme.subscribe(move |theme: &ThemeMode| {
      if let Some(inner) = weak.upgrade() {
        Inner::on_theme_change(&inner, *theme);
      }
    });

    let weak: Weak<RefCell<Inner<A>>> = Rc::downgrade(&inner);
    let update_sub = cx
      .updates
      .subscribe(field_id.clone(), move |update: &PendingRemoteUpdate| {
        if let Some(inner) = weak.upgrade() {
          Inner::on_remote_update(&inner, update);
        }
      });

    tracing::debug!(field = %field_id, %language, %theme, "editor hook attached");
    Self {
      inner,
      theme_sub,
      update_sub,
    }
  }

  /// Apply a pushed update. Updates for other fields and updates that match
  /// the current text are ignored.
  pub fn on_remote_update(&self, update: &PendingRemoteUpdate) {
    Inner::on_remote_update(&self.inner, update);
  }

  /// React to an ambient theme change.
  pub fn on_theme_change(&self, theme: ThemeMode) {
    Inner::on_theme_change(&self.inner, theme);
  }

  /// Drop both subscriptions and destroy the surface. Idempotent.
  ///
  /// Called from inside one of the hook's own callbacks, only the
  /// subscriptions go; the surface is destroyed when the hook is dropped.
  pub fn detach(&self) {
    self.theme_sub.cancel();
    self.update_sub.cancel();
    let Ok(mut inner) = self.inner.try_borrow_mut() else {
      tracing::warn!("editor hook detached from inside its own callback");
      return;
    };
    if inner.state == HookState::Destroyed {
      return;
    }
    inner.teardown();
    tracing::debug!(
      field = %inner.field.as_ref().map(|f| f.field_id.as_str()).unwrap_or_default(),
      "editor hook detached"
    );
  }

  pub fn state(&self) -> HookState {
    self.inner.borrow().state
  }

  pub fn element(&self) -> ElementId {
    self.inner.borrow().element
  }

  pub fn field(&self) -> Option<BoundField> {
    self.inner.borrow().field.clone()
  }

  /// Text of the live surface, if there is one.
  pub fn current_text(&self) -> Option<String> {
    let inner = self.inner.borrow();
    inner
      .surface
      .as_ref()
      .map(|surface| inner.cx.adapter.current_text(surface))
  }

  /// Run `f` against the live surface, if there is one.
  pub fn with_surface<R>(&self, f: impl FnOnce(&A::Surface) -> R) -> Option<R> {
    self.inner.borrow().surface.as_ref().map(f)
  }

  /// Number of surfaces constructed over the hook's lifetime.
  pub fn surfaces_built(&self) -> u64 {
    self.inner.borrow().surfaces_built
  }

  pub fn is_subscribed(&self) -> bool {
    self.theme_sub.is_active() || self.update_sub.is_active()
  }
}

impl<A: EditorAdapter> Inner<A> {
  fn teardown(&mut self) {
    self.pending_text = None;
    if let Some(surface) = self.surface.take() {
      self.cx.adapter.destroy_surface(surface);
    }
    self.state = HookState::Destroyed;
  }

  /// Build a surface for the bound field, falling back to plain text when the
  /// adapter rejects the field's language. Returns whether a surface exists.
  fn build_surface(&mut self, text: String) -> bool {
    let Some(field) = self.field.as_mut() else {
      return false;
    };
    let listener = local_edit_listener(self.cx.page.clone(), field.mirror);
    let spec = SurfaceSpec {
      parent: self.element,
      text,
      language: field.language,
      theme: field.theme,
    };

    let surface = match self.cx.adapter.create_surface(spec.clone(), Rc::clone(&listener)) {
      Ok(surface) => surface,
      Err(err) if spec.language != LanguageMode::Plain => {
        tracing::warn!(field = %field.field_id, %err, "falling back to plain text");
        field.language = LanguageMode::Plain;
        let plain = SurfaceSpec {
          language: LanguageMode::Plain,
          ..spec.clone()
        };
        match self.cx.adapter.create_surface(plain, listener) {
          Ok(surface) => surface,
          Err(err) => {
            tracing::error!(field = %field.field_id, %err, "failed to build editor surface");
            self.pending_text = Some(spec.text);
            return false;
          },
        }
      },
      Err(err) => {
        tracing::error!(field = %field.field_id, %err, "failed to build editor surface");
        self.pending_text = Some(spec.text);
        return false;
      },
    };

    let style = self.cx.config.style_for(&field.field_id, field.theme);
    self.cx.adapter.apply_style(&surface, &style);
    self.surface = Some(surface);
    self.pending_text = None;
    self.surfaces_built += 1;
    true
  }

  fn on_remote_update(this: &Rc<RefCell<Self>>, update: &PendingRemoteUpdate) {
    let Ok(inner) = this.try_borrow() else {
      tracing::error!(field = %update.field, "remote update re-entered the editor hook");
      return;
    };
    if inner.state != HookState::Active {
      return;
    }
    let (Some(field), Some(surface)) = (inner.field.as_ref(), inner.surface.as_ref()) else {
      return;
    };
    if update.field != field.field_id {
      return;
    }

    let adapter = &inner.cx.adapter;
    if adapter.current_text(surface) == update.value {
      tracing::trace!(field = %field.field_id, "remote update matches surface, skipping");
      return;
    }
    // The adapter reports this replacement through the change listener,
    // which is what brings the mirror up to date.
    adapter.replace_text(surface, &update.value);
    tracing::debug!(field = %field.field_id, "applied remote update");
  }

  fn on_theme_change(this: &Rc<RefCell<Self>>, theme: ThemeMode) {
    let Ok(mut inner) = this.try_borrow_mut() else {
      tracing::error!("theme change re-entered the editor hook");
      return;
    };
    if inner.state == HookState::Destroyed {
      return;
    }
    let Some(field) = inner.field.as_ref() else {
      return;
    };
    if field.theme == theme && inner.surface.is_some() {
      return;
    }
    inner.reconstruct(theme);
  }

  fn reconstruct(&mut self, theme: ThemeMode) {
    if self.field.is_none() {
      return;
    }
    self.state = HookState::Reconstructing;

    let text = match self.surface.take() {
      Some(surface) => {
        let text = self.cx.adapter.current_text(&surface);
        self.cx.adapter.destroy_surface(surface);
        text
      },
      // A previous build failed and kept the text it was given.
      None => self.pending_text.take().unwrap_or_default(),
    };

    if let Some(field) = self.field.as_mut() {
      field.theme = theme;
    }
    self.state = if self.build_surface(text) {
      HookState::Active
    } else {
      HookState::Uninitialized
    };
    tracing::debug!(%theme, state = ?self.state, "editor surface rebuilt");
  }
}

/// Forward content changes to the mirror control.
fn local_edit_listener(page: Page, mirror: ElementId) -> ChangeListener {
  Rc::new(move |changes: &ChangeSet| on_local_edit(&page, mirror, changes))
}

fn on_local_edit(page: &Page, mirror: ElementId, changes: &ChangeSet) {
  if !changes.doc_changed() {
    return;
  }
  let result = page
    .set_value(mirror, changes.text())
    .and_then(|()| page.dispatch_input(mirror));
  if let Err(err) = result {
    tracing::warn!(%mirror, %err, "failed to sync mirror control");
  }
}

impl<A: EditorAdapter> Drop for EditorHook<A> {
  fn drop(&mut self) {
    if let Ok(mut inner) = self.inner.try_borrow_mut() {
      inner.teardown();
    }
  }
}

impl<A: EditorAdapter> fmt::Debug for EditorHook<A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let inner = self.inner.borrow();
    f.debug_struct("EditorHook")
      .field("element", &inner.element)
      .field("state", &inner.state)
      .field("field", &inner.field)
      .field("surfaces_built", &inner.surfaces_built)
      .finish()
  }
}
