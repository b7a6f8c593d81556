//! Hook host.
//!
//! Mounts hooks onto elements by their `phx-hook` attribute and routes page
//! lifecycle, server events, window events and keydowns to them. Events the
//! hooks push toward the server collect in an [`Outbox`] for the transport to
//! drain.

use std::{
  cell::RefCell,
  collections::BTreeMap,
  fmt,
  rc::Rc,
};

use serde::{
  Deserialize,
  Serialize,
};
use serde_json::Value;
use the_hooks_event::{
  Channel,
  KeyedChannel,
  Signal,
};
use the_hooks_lib::{
  chart::{
    ChartConfig,
    ChartContext,
    ChartHook,
    ChartRenderer,
  },
  editor_hook::{
    EditorConfig,
    EditorContext,
    EditorHook,
  },
  field::{
    FieldId,
    PendingRemoteUpdate,
    ThemeMode,
  },
  page::{
    ElementId,
    Page,
    PageError,
    PageEvent,
  },
  surface::EditorAdapter,
};

use crate::{
  keys::{
    CurrentRunHook,
    KeyEvent,
    PlanModalHook,
  },
  settings::{
    SettingsConfig,
    SettingsStorageHook,
  },
  storage::Storage,
  theme::{
    ThemeConfig,
    ThemeIndicator,
  },
};

/// Attribute naming the hook bound to an element.
pub const HOOK_ATTRIBUTE: &str = "phx-hook";
/// Server event carrying a [`PendingRemoteUpdate`].
pub const UPDATE_EDITOR_EVENT: &str = "update_editor";

pub const CODE_EDITOR: &str = "CodeEditor";
pub const SPARKLINE: &str = "Sparkline";
pub const SETTINGS_STORAGE: &str = "SettingsStorage";
pub const PLAN_MODAL: &str = "PlanModal";
pub const CURRENT_RUN: &str = "CurrentRun";

/// A mounted hook. Mounting happens in the factory the hook was registered
/// with; the host calls these for the rest of the element's life.
pub trait Hook {
  /// The server re-rendered the bound element.
  fn updated(&mut self) {}

  /// The bound element left the page. Must release every subscription.
  fn destroyed(&mut self);
}

pub type HookFactory = Box<dyn Fn(&HookContext, ElementId) -> Box<dyn Hook>>;

/// An event pushed from a hook to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushedEvent {
  pub name:    String,
  pub payload: Value,
}

#[derive(Debug, Clone, Default)]
pub struct Outbox {
  events: Rc<RefCell<Vec<PushedEvent>>>,
}

impl Outbox {
  pub fn push(&self, name: impl Into<String>, payload: Value) {
    let name = name.into();
    tracing::trace!(%name, "event pushed");
    self.events.borrow_mut().push(PushedEvent { name, payload });
  }

  pub fn take(&self) -> Vec<PushedEvent> {
    std::mem::take(&mut *self.events.borrow_mut())
  }

  pub fn len(&self) -> usize {
    self.events.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.events.borrow().is_empty()
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostConfig {
  pub editor:   EditorConfig,
  pub chart:    ChartConfig,
  pub settings: SettingsConfig,
  pub theme:    ThemeConfig,
}

/// Shared state handed to every hook factory.
#[derive(Clone)]
pub struct HookContext {
  pub page:            Page,
  pub theme:           Signal<ThemeMode>,
  pub updates:         KeyedChannel<FieldId, PendingRemoteUpdate>,
  /// Server events by name.
  pub server_events:   KeyedChannel<String, Value>,
  /// Window events by name, carrying their detail.
  pub window_events:   KeyedChannel<String, Value>,
  pub keydown:         Channel<KeyEvent>,
  pub outbox:          Outbox,
  pub storage:         Rc<dyn Storage>,
  pub editor_config:   Rc<EditorConfig>,
  pub chart_config:    Rc<ChartConfig>,
  pub settings_config: Rc<SettingsConfig>,
}

impl HookContext {
  pub fn editor_context<A>(&self, adapter: Rc<A>) -> EditorContext<A> {
    EditorContext {
      adapter,
      page: self.page.clone(),
      theme: self.theme.clone(),
      updates: self.updates.clone(),
      config: Rc::clone(&self.editor_config),
    }
  }

  pub fn chart_context<R>(&self, renderer: Rc<R>) -> ChartContext<R> {
    ChartContext {
      renderer,
      page: self.page.clone(),
      config: Rc::clone(&self.chart_config),
    }
  }
}

impl<A> Hook for EditorHook<A>
where
  A: EditorAdapter + 'static,
  A::Surface: 'static,
{
  fn destroyed(&mut self) {
    self.detach();
  }
}

impl<R> Hook for ChartHook<R>
where
  R: ChartRenderer + 'static,
  R::Root: 'static,
{
  fn destroyed(&mut self) {
    self.detach();
  }
}

struct MountedHook {
  name: String,
  hook: Box<dyn Hook>,
}

pub struct HookHost {
  cx:        HookContext,
  indicator: ThemeIndicator,
  factories: BTreeMap<String, HookFactory>,
  mounted:   BTreeMap<ElementId, MountedHook>,
}

impl HookHost {
  /// A host with no hooks registered. The ambient theme is read from the
  /// page immediately and tracked from then on.
  pub fn new(page: Page, storage: Rc<dyn Storage>, config: HostConfig) -> Self {
    let HostConfig {
      editor,
      chart,
      settings,
      theme: theme_config,
    } = config;
    let theme = Signal::new(ThemeMode::default());
    let indicator = ThemeIndicator::attach(&page, &theme, &theme_config);
    Self {
      cx: HookContext {
        page,
        theme,
        updates: KeyedChannel::new(),
        server_events: KeyedChannel::new(),
        window_events: KeyedChannel::new(),
        keydown: Channel::new(),
        outbox: Outbox::default(),
        storage,
        editor_config: Rc::new(editor),
        chart_config: Rc::new(chart),
        settings_config: Rc::new(settings),
      },
      indicator,
      factories: BTreeMap::new(),
      mounted: BTreeMap::new(),
    }
  }

  pub fn register(
    &mut self,
    name: impl Into<String>,
    factory: impl Fn(&HookContext, ElementId) -> Box<dyn Hook> + 'static,
  ) {
    let name = name.into();
    if self.factories.insert(name.clone(), Box::new(factory)).is_some() {
      tracing::debug!(%name, "hook factory replaced");
    }
  }

  pub fn register_editor<A>(&mut self, name: impl Into<String>, adapter: Rc<A>)
  where
    A: EditorAdapter + 'static,
    A::Surface: 'static,
  {
    self.register(name, move |cx, element| {
      let cx = cx.editor_context(Rc::clone(&adapter));
      Box::new(EditorHook::attach(&cx, element))
    });
  }

  pub fn register_chart<R>(&mut self, name: impl Into<String>, renderer: Rc<R>)
  where
    R: ChartRenderer + 'static,
    R::Root: 'static,
  {
    self.register(name, move |cx, element| {
      let cx = cx.chart_context(Rc::clone(&renderer));
      Box::new(ChartHook::attach(&cx, element))
    });
  }

  /// Register the page's standard hooks under their usual names.
  pub fn register_defaults<A, R>(&mut self, adapter: Rc<A>, renderer: Rc<R>)
  where
    A: EditorAdapter + 'static,
    A::Surface: 'static,
    R: ChartRenderer + 'static,
    R::Root: 'static,
  {
    self.register_editor(CODE_EDITOR, adapter);
    self.register_chart(SPARKLINE, renderer);
    self.register(SETTINGS_STORAGE, |cx, _| {
      Box::new(SettingsStorageHook::mount(cx))
    });
    self.register(PLAN_MODAL, |cx, _| Box::new(PlanModalHook::mount(cx)));
    self.register(CURRENT_RUN, |cx, element| {
      Box::new(CurrentRunHook::mount(cx, element))
    });
  }

  pub fn context(&self) -> &HookContext {
    &self.cx
  }

  pub fn page(&self) -> &Page {
    &self.cx.page
  }

  pub fn theme(&self) -> ThemeMode {
    self.cx.theme.get()
  }

  /// Mount every element on the page whose hook is registered. Returns how
  /// many hooks were mounted.
  pub fn mount_all(&mut self) -> usize {
    let page = &self.cx.page;
    let candidates = page.query_all(page.document_element(), |el| {
      el.attribute(HOOK_ATTRIBUTE).is_some()
    });
    candidates
      .into_iter()
      .filter(|element| self.mount(*element))
      .count()
  }

  /// Mount the hook named by `element`'s `phx-hook`. Returns false when the
  /// element is already mounted, names no hook or names an unknown one.
  pub fn mount(&mut self, element: ElementId) -> bool {
    if self.mounted.contains_key(&element) {
      return false;
    }
    let Some(name) = self.cx.page.attribute(element, HOOK_ATTRIBUTE) else {
      return false;
    };
    let Some(factory) = self.factories.get(&name) else {
      tracing::warn!(%element, hook = %name, "unknown hook");
      return false;
    };

    let hook = factory(&self.cx, element);
    tracing::debug!(%element, hook = %name, "hook mounted");
    self.mounted.insert(element, MountedHook { name, hook });
    true
  }

  pub fn update(&mut self, element: ElementId) -> bool {
    match self.mounted.get_mut(&element) {
      Some(mounted) => {
        mounted.hook.updated();
        true
      },
      None => false,
    }
  }

  /// Run `element`'s destroyed callback. A no-op for elements that were
  /// never mounted.
  pub fn destroy(&mut self, element: ElementId) -> bool {
    let Some(mut mounted) = self.mounted.remove(&element) else {
      return false;
    };
    mounted.hook.destroyed();
    tracing::debug!(%element, hook = %mounted.name, "hook destroyed");
    true
  }

  pub fn destroy_all(&mut self) {
    let elements: Vec<ElementId> = self.mounted.keys().copied().collect();
    for element in elements {
      self.destroy(element);
    }
  }

  /// Remove `element` and its subtree from the page, destroying every hook
  /// mounted inside it first. Fails without touching any hook when the page
  /// would refuse the removal.
  pub fn remove_element(&mut self, element: ElementId) -> Result<(), PageError> {
    let page = &self.cx.page;
    if element == page.document_element() {
      return Err(PageError::RemoveDocumentElement);
    }
    if !page.contains(element) {
      return Err(PageError::MissingElement(element));
    }
    let mut doomed = self.cx.page.query_all(element, |_| true);
    doomed.push(element);
    for id in doomed {
      self.destroy(id);
    }
    self.cx.page.remove_element(element)
  }

  pub fn is_mounted(&self, element: ElementId) -> bool {
    self.mounted.contains_key(&element)
  }

  pub fn hook_name(&self, element: ElementId) -> Option<&str> {
    self.mounted.get(&element).map(|mounted| mounted.name.as_str())
  }

  pub fn mounted(&self) -> impl Iterator<Item = (ElementId, &str)> {
    self
      .mounted
      .iter()
      .map(|(element, mounted)| (*element, mounted.name.as_str()))
  }

  /// Deliver a server event. `update_editor` payloads are routed to the
  /// editor bound to their field; a malformed payload is logged and dropped.
  /// Returns how many handlers ran.
  pub fn handle_server_event(&self, name: &str, payload: &Value) -> usize {
    let mut delivered = self.cx.server_events.publish(name, payload);
    if name == UPDATE_EDITOR_EVENT {
      match serde_json::from_value::<PendingRemoteUpdate>(payload.clone()) {
        Ok(update) => delivered += self.cx.updates.publish(&update.field, &update),
        Err(err) => tracing::warn!(%err, %payload, "malformed editor update dropped"),
      }
    }
    delivered
  }

  pub fn dispatch_window_event(&self, name: &str, detail: &Value) -> usize {
    self.cx.window_events.publish(name, detail)
  }

  /// Returns whether a handler prevented the key's default action.
  pub fn dispatch_keydown(&self, event: &KeyEvent) -> bool {
    self.cx.keydown.publish(event);
    event.default_prevented()
  }

  pub fn take_pushed_events(&self) -> Vec<PushedEvent> {
    self.cx.outbox.take()
  }

  pub fn take_page_events(&self) -> Vec<PageEvent> {
    self.cx.page.take_events()
  }

  /// Deliver pending attribute mutations (theme changes, chart data).
  pub fn flush(&self) -> usize {
    self.cx.page.flush()
  }
}

impl Drop for HookHost {
  fn drop(&mut self) {
    self.destroy_all();
    self.indicator.detach();
  }
}

impl fmt::Debug for HookHost {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("HookHost")
      .field("hooks", &self.factories.keys().collect::<Vec<_>>())
      .field("mounted", &self.mounted.len())
      .field("theme", &self.cx.theme.get())
      .finish()
  }
}
