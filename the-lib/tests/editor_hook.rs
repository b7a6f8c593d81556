use std::{
  cell::{
    Cell,
    RefCell,
  },
  rc::Rc,
};

use the_hooks_event::{
  KeyedChannel,
  Signal,
};
use the_hooks_lib::{
  editor_hook::{
    EditorConfig,
    EditorContext,
    EditorHook,
    HookState,
  },
  field::{
    FieldId,
    LanguageMode,
    PendingRemoteUpdate,
    ThemeMode,
  },
  page::{
    ElementId,
    Page,
    PageEvent,
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

struct FakeDoc {
  text:      String,
  language:  LanguageMode,
  theme:     ThemeMode,
  listener:  Option<ChangeListener>,
  style:     Option<SurfaceStyle>,
  destroyed: bool,
}

#[derive(Clone)]
struct FakeSurface {
  doc: Rc<RefCell<FakeDoc>>,
}

impl FakeSurface {
  /// Simulate the user typing at the end of the document.
  fn type_text(&self, typed: &str) {
    let (listener, changes) = {
      let mut doc = self.doc.borrow_mut();
      if doc.destroyed {
        return;
      }
      let end = doc.text.chars().count();
      doc.text.push_str(typed);
      let changes = ChangeSet::new(
        vec![Change {
          from:   end,
          to:     end,
          insert: typed.to_string(),
        }],
        doc.text.clone(),
      );
      (doc.listener.clone(), changes)
    };
    if let Some(listener) = listener {
      listener(&changes);
    }
  }

  /// Simulate a cursor move: a transaction that does not touch content.
  fn move_cursor(&self) {
    let (listener, text) = {
      let doc = self.doc.borrow();
      (doc.listener.clone(), doc.text.clone())
    };
    if let Some(listener) = listener {
      listener(&ChangeSet::new(Vec::new(), text));
    }
  }

  fn theme(&self) -> ThemeMode {
    self.doc.borrow().theme
  }

  fn language(&self) -> LanguageMode {
    self.doc.borrow().language
  }

  fn style(&self) -> Option<SurfaceStyle> {
    self.doc.borrow().style.clone()
  }

  fn is_destroyed(&self) -> bool {
    self.doc.borrow().destroyed
  }
}

#[derive(Default)]
struct FakeAdapter {
  unsupported: Vec<LanguageMode>,
  fail_all:    Cell<bool>,
  surfaces:    RefCell<Vec<FakeSurface>>,
  replaces:    Cell<usize>,
  /// Runs inside `replace_text`, before the change is reported.
  on_replace:  RefCell<Option<Box<dyn Fn()>>>,
}

impl FakeAdapter {
  fn created(&self) -> usize {
    self.surfaces.borrow().len()
  }

  fn live(&self) -> usize {
    self
      .surfaces
      .borrow()
      .iter()
      .filter(|surface| !surface.is_destroyed())
      .count()
  }
}

impl EditorAdapter for FakeAdapter {
  type Surface = FakeSurface;

  fn create_surface(
    &self,
    spec: SurfaceSpec,
    on_change: ChangeListener,
  ) -> Result<FakeSurface, SurfaceError> {
    if self.fail_all.get() || self.unsupported.contains(&spec.language) {
      return Err(SurfaceError::UnsupportedLanguage(spec.language));
    }
    let surface = FakeSurface {
      doc: Rc::new(RefCell::new(FakeDoc {
        text:      spec.text,
        language:  spec.language,
        theme:     spec.theme,
        listener:  Some(on_change),
        style:     None,
        destroyed: false,
      })),
    };
    self.surfaces.borrow_mut().push(surface.clone());
    Ok(surface)
  }

  fn replace_text(&self, surface: &FakeSurface, text: &str) {
    self.replaces.set(self.replaces.get() + 1);
    if let Some(on_replace) = self.on_replace.borrow().as_ref() {
      on_replace();
    }
    let (listener, changes) = {
      let mut doc = surface.doc.borrow_mut();
      let old_len = doc.text.chars().count();
      doc.text = text.to_string();
      (doc.listener.clone(), ChangeSet::replace_all(old_len, text))
    };
    if let Some(listener) = listener {
      listener(&changes);
    }
  }

  fn current_text(&self, surface: &FakeSurface) -> String {
    surface.doc.borrow().text.clone()
  }

  fn destroy_surface(&self, surface: FakeSurface) {
    let mut doc = surface.doc.borrow_mut();
    doc.destroyed = true;
    doc.listener = None;
  }

  fn apply_style(&self, surface: &FakeSurface, style: &SurfaceStyle) {
    surface.doc.borrow_mut().style = Some(style.clone());
  }
}

struct Fixture {
  cx: EditorContext<FakeAdapter>,
}

impl Fixture {
  fn new() -> Self {
    Self::with_adapter(FakeAdapter::default())
  }

  fn with_adapter(adapter: FakeAdapter) -> Self {
    Self {
      cx: EditorContext {
        adapter: Rc::new(adapter),
        page:    Page::new(),
        theme:   Signal::new(ThemeMode::Light),
        updates: KeyedChannel::new(),
        config:  Rc::new(EditorConfig::default()),
      },
    }
  }

  /// Add an editor element with a mirror textarea, returning both.
  fn editor_element(&self, field: &str, lang: &str, text: &str) -> (ElementId, ElementId) {
    let page = &self.cx.page;
    let el = page
      .create_element_with(page.document_element(), "div", &[
        ("phx-hook", "CodeEditor"),
        ("data-field", field),
        ("data-lang", lang),
      ])
      .unwrap();
    let mirror = page
      .create_element_with(el, "textarea", &[("name", field)])
      .unwrap();
    page.set_value(mirror, text).unwrap();
    (el, mirror)
  }

  fn attach(&self, field: &str, lang: &str, text: &str) -> (EditorHook<FakeAdapter>, ElementId) {
    let (el, mirror) = self.editor_element(field, lang, text);
    (EditorHook::attach(&self.cx, el), mirror)
  }

  fn push(&self, field: &str, value: &str) -> usize {
    let update = PendingRemoteUpdate::new(field, value);
    self.cx.updates.publish(&update.field, &update)
  }

  fn surface(hook: &EditorHook<FakeAdapter>) -> FakeSurface {
    hook.with_surface(Clone::clone).expect("hook has a live surface")
  }
}

#[test]
fn attach_builds_surface_from_mirror() {
  let fx = Fixture::new();
  let (hook, mirror) = fx.attach("script", "elixir", "IO.puts(1)");

  assert_eq!(hook.state(), HookState::Active);
  assert_eq!(hook.current_text().as_deref(), Some("IO.puts(1)"));
  assert_eq!(fx.cx.page.style(mirror, "display").as_deref(), Some("none"));
  assert!(hook.is_subscribed());

  let field = hook.field().unwrap();
  assert_eq!(field.field_id, FieldId::from("script"));
  assert_eq!(field.language, LanguageMode::SourceCode);
  assert_eq!(field.mirror, mirror);

  let style = Fixture::surface(&hook).style().unwrap();
  assert_eq!(style.min_height, "8rem");
  assert_eq!(style.border_color, "rgb(209 213 219)");
  // Attaching is not an edit.
  assert!(fx.cx.page.take_events().is_empty());
}

#[test]
fn local_edit_reaches_mirror_and_notifies() {
  let fx = Fixture::new();
  let (hook, mirror) = fx.attach("json", "json", "{");

  Fixture::surface(&hook).type_text("}");

  assert_eq!(hook.current_text().as_deref(), Some("{}"));
  assert_eq!(fx.cx.page.value(mirror).as_deref(), Some("{}"));
  assert_eq!(fx.cx.page.take_events(), vec![PageEvent::Input {
    element: mirror,
    value:   "{}".into(),
  }]);
}

#[test]
fn selection_only_change_does_not_touch_mirror() {
  let fx = Fixture::new();
  let (hook, mirror) = fx.attach("json", "json", "{}");
  fx.cx.page.set_value(mirror, "stale").unwrap();

  Fixture::surface(&hook).move_cursor();

  assert_eq!(fx.cx.page.value(mirror).as_deref(), Some("stale"));
  assert!(fx.cx.page.take_events().is_empty());
}

#[test]
fn remote_update_equal_to_current_text_is_a_no_op() {
  let fx = Fixture::new();
  let (hook, mirror) = fx.attach("script", "elixir", "same");
  fx.cx.page.set_value(mirror, "mirror-sentinel").unwrap();

  assert_eq!(fx.push("script", "same"), 1);

  assert_eq!(fx.cx.adapter.replaces.get(), 0);
  assert_eq!(hook.current_text().as_deref(), Some("same"));
  assert_eq!(fx.cx.page.value(mirror).as_deref(), Some("mirror-sentinel"));
  assert!(fx.cx.page.take_events().is_empty());
}

#[test]
fn remote_update_replaces_text_and_syncs_mirror() {
  let fx = Fixture::new();
  let (hook, mirror) = fx.attach("script", "elixir", "old");

  fx.push("script", "new");

  assert_eq!(fx.cx.adapter.replaces.get(), 1);
  assert_eq!(hook.current_text().as_deref(), Some("new"));
  assert_eq!(fx.cx.page.value(mirror).as_deref(), Some("new"));

  // Pushing the same value again is now an echo.
  fx.cx.page.take_events();
  fx.push("script", "new");
  assert_eq!(fx.cx.adapter.replaces.get(), 1);
  assert!(fx.cx.page.take_events().is_empty());
}

#[test]
fn remote_update_for_other_field_is_ignored() {
  let fx = Fixture::new();
  let (a, mirror_a) = fx.attach("a", "plain", "alpha");
  let (b, mirror_b) = fx.attach("b", "plain", "beta");

  assert_eq!(fx.push("a", "ALPHA"), 1);
  // Calling the hook directly with a foreign update is ignored as well.
  b.on_remote_update(&PendingRemoteUpdate::new("a", "nope"));

  assert_eq!(a.current_text().as_deref(), Some("ALPHA"));
  assert_eq!(fx.cx.page.value(mirror_a).as_deref(), Some("ALPHA"));
  assert_eq!(b.current_text().as_deref(), Some("beta"));
  assert_eq!(fx.cx.page.value(mirror_b).as_deref(), Some("beta"));
  assert_eq!(fx.push("nobody", "x"), 0);
}

#[test]
fn theme_change_rebuilds_surface_and_keeps_text() {
  let fx = Fixture::new();
  let (hook, mirror) = fx.attach("params", "json", "{\"a\":1}");
  let first = Fixture::surface(&hook);
  first.type_text(" ");
  fx.cx.page.take_events();
  let mirror_before = fx.cx.page.value(mirror);

  assert!(fx.cx.theme.set(ThemeMode::Dark));

  let second = Fixture::surface(&hook);
  assert!(first.is_destroyed());
  assert_eq!(fx.cx.adapter.live(), 1);
  assert_eq!(hook.surfaces_built(), 2);
  assert_eq!(hook.state(), HookState::Active);
  assert_eq!(second.theme(), ThemeMode::Dark);
  assert_eq!(hook.current_text().as_deref(), Some("{\"a\":1} "));
  assert_eq!(fx.cx.page.value(mirror), mirror_before);
  assert!(fx.cx.page.take_events().is_empty());

  let style = second.style().unwrap();
  assert_eq!(style.min_height, "2rem");
  assert_eq!(style.border_color, "rgb(55 65 81)");

  // Edits on the new surface still reach the mirror.
  second.type_text("!");
  assert_eq!(fx.cx.page.value(mirror).as_deref(), Some("{\"a\":1} !"));
}

#[test]
fn same_theme_does_not_rebuild() {
  let fx = Fixture::new();
  let (hook, _) = fx.attach("script", "plain", "x");

  hook.on_theme_change(ThemeMode::Light);
  assert!(!fx.cx.theme.set(ThemeMode::Light));

  assert_eq!(hook.surfaces_built(), 1);
}

#[test]
fn one_theme_signal_drives_every_editor() {
  let fx = Fixture::new();
  let (a, _) = fx.attach("a", "plain", "1");
  let (b, _) = fx.attach("b", "json", "2");

  fx.cx.theme.set(ThemeMode::Dark);

  assert_eq!(Fixture::surface(&a).theme(), ThemeMode::Dark);
  assert_eq!(Fixture::surface(&b).theme(), ThemeMode::Dark);
  assert_eq!(fx.cx.adapter.live(), 2);
  assert_eq!(fx.cx.adapter.created(), 4);
}

#[test]
fn unknown_language_falls_back_to_plain() {
  let fx = Fixture::new();
  let (hook, _) = fx.attach("script", "cobol", "MOVE 1 TO X");

  assert_eq!(hook.state(), HookState::Active);
  assert_eq!(Fixture::surface(&hook).language(), LanguageMode::Plain);
}

#[test]
fn unsupported_language_falls_back_to_plain() {
  let fx = Fixture::with_adapter(FakeAdapter {
    unsupported: vec![LanguageMode::SourceCode],
    ..FakeAdapter::default()
  });
  let (hook, _) = fx.attach("script", "elixir", "x");

  assert_eq!(hook.state(), HookState::Active);
  assert_eq!(hook.field().unwrap().language, LanguageMode::Plain);
  assert_eq!(Fixture::surface(&hook).language(), LanguageMode::Plain);

  fx.cx.theme.set(ThemeMode::Dark);
  assert_eq!(Fixture::surface(&hook).language(), LanguageMode::Plain);
  assert_eq!(hook.current_text().as_deref(), Some("x"));
}

#[test]
fn failed_construction_recovers_on_next_theme_change() {
  let fx = Fixture::new();
  fx.cx.adapter.fail_all.set(true);
  let (hook, mirror) = fx.attach("script", "json", "kept");

  assert_eq!(hook.state(), HookState::Uninitialized);
  assert_eq!(hook.current_text(), None);
  assert_eq!(fx.push("script", "ignored"), 1);
  // The rebuild uses the text read at attach, not whatever the mirror holds.
  fx.cx.page.set_value(mirror, "written later").unwrap();

  fx.cx.adapter.fail_all.set(false);
  fx.cx.theme.set(ThemeMode::Dark);

  assert_eq!(hook.state(), HookState::Active);
  assert_eq!(hook.current_text().as_deref(), Some("kept"));
}

#[test]
fn missing_mirror_leaves_hook_inert() {
  let fx = Fixture::new();
  let page = &fx.cx.page;
  let el = page
    .create_element_with(page.document_element(), "div", &[("data-field", "x")])
    .unwrap();

  let hook = EditorHook::attach(&fx.cx, el);

  assert_eq!(hook.state(), HookState::Uninitialized);
  assert!(!hook.is_subscribed());
  assert_eq!(fx.cx.adapter.created(), 0);
  hook.detach();
  assert_eq!(hook.state(), HookState::Destroyed);
}

#[test]
fn detach_twice_leaves_nothing_behind() {
  let fx = Fixture::new();
  let (hook, mirror) = fx.attach("script", "plain", "text");
  let surface = Fixture::surface(&hook);

  hook.detach();
  hook.detach();

  assert_eq!(hook.state(), HookState::Destroyed);
  assert!(!hook.is_subscribed());
  assert!(surface.is_destroyed());
  assert_eq!(fx.cx.adapter.live(), 0);
  assert_eq!(fx.cx.theme.subscriber_count(), 0);
  assert_eq!(fx.cx.updates.key_count(), 0);

  assert_eq!(fx.push("script", "late"), 0);
  fx.cx.theme.set(ThemeMode::Dark);
  surface.type_text("late");
  assert_eq!(fx.cx.adapter.created(), 1);
  assert_eq!(fx.cx.page.value(mirror).as_deref(), Some("text"));
}

#[test]
fn detach_from_inside_a_callback_still_unsubscribes() {
  let fx = Fixture::new();
  let (hook, _) = fx.attach("script", "plain", "old");
  let hook = Rc::new(hook);
  let weak = Rc::downgrade(&hook);
  *fx.cx.adapter.on_replace.borrow_mut() = Some(Box::new(move || {
    if let Some(hook) = weak.upgrade() {
      hook.detach();
    }
  }));

  assert_eq!(fx.push("script", "new"), 1);

  assert!(!hook.is_subscribed());
  assert_eq!(fx.cx.theme.subscriber_count(), 0);
  assert_eq!(fx.cx.updates.key_count(), 0);
  assert_eq!(fx.push("script", "newer"), 0);
  fx.cx.theme.set(ThemeMode::Dark);
  assert_eq!(fx.cx.adapter.created(), 1);

  drop(hook);
  assert_eq!(fx.cx.adapter.live(), 0);
}

#[test]
fn dropping_the_hook_destroys_its_surface() {
  let fx = Fixture::new();
  let (hook, _) = fx.attach("script", "plain", "text");
  drop(hook);

  assert_eq!(fx.cx.adapter.live(), 0);
  assert_eq!(fx.cx.theme.subscriber_count(), 0);
}

quickcheck::quickcheck! {
  fn typed_text_round_trips_through_mirror(typed: String) -> bool {
    let fx = Fixture::new();
    let (hook, mirror) = fx.attach("script", "plain", "");
    Fixture::surface(&hook).type_text(&typed);

    let text = hook.current_text().unwrap_or_default();
    text == typed && fx.cx.page.value(mirror).as_deref() == Some(typed.as_str())
  }

  fn reconstruction_preserves_content(initial: String, typed: String) -> bool {
    let fx = Fixture::new();
    let (hook, _) = fx.attach("script", "json", &initial);
    Fixture::surface(&hook).type_text(&typed);
    let before = hook.current_text();

    fx.cx.theme.set(ThemeMode::Dark);
    let after_dark = hook.current_text();
    fx.cx.theme.set(ThemeMode::Light);

    before == after_dark && before == hook.current_text() && fx.cx.adapter.live() == 1
  }
}
