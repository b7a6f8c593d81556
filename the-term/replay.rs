//! Runs a [`Scenario`] against an in-memory page and reports the outcome.

use std::{
  collections::BTreeMap,
  rc::Rc,
};

use eyre::{
  OptionExt,
  Result,
  WrapErr,
  bail,
};
use serde::Serialize;
use the_hooks_config::Config;
use the_hooks_lib::{
  field::ThemeMode,
  page::{
    ElementId,
    Page,
    PageEvent,
  },
};
use the_hooks_runtime::{
  FileStorage,
  HookHost,
  KeyEvent,
  MemoryStorage,
  PushedEvent,
  RopeAdapter,
  SparklineRenderer,
  Storage,
  host::{
    CODE_EDITOR,
    HOOK_ATTRIBUTE,
    SPARKLINE,
  },
};

use crate::scenario::{
  ElementSpec,
  Scenario,
  Step,
};

#[derive(Debug, Serialize)]
pub struct Report {
  pub theme:       ThemeMode,
  pub editors:     Vec<EditorReport>,
  pub charts:      Vec<ChartReport>,
  pub pushed:      Vec<PushedEvent>,
  pub page_events: Vec<PageEventReport>,
  /// In-memory storage contents. Absent when storage is a file.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub storage:     Option<BTreeMap<String, String>>,
}

#[derive(Debug, Serialize)]
pub struct EditorReport {
  pub element:  String,
  pub field:    Option<String>,
  pub language: Option<String>,
  pub mounted:  bool,
  pub text:     Option<String>,
  pub mirror:   Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChartReport {
  pub element:  String,
  pub points:   Option<String>,
  pub polyline: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PageEventReport {
  Input { element: String, value: String },
  Click { element: String },
}

enum ReplayStorage {
  Memory(Rc<MemoryStorage>),
  File(Rc<FileStorage>),
}

impl ReplayStorage {
  fn open(config: &Config) -> Result<Self> {
    Ok(match &config.storage.path {
      Some(path) => {
        let storage = FileStorage::open(path)
          .wrap_err_with(|| format!("failed to open storage at {}", path.display()))?;
        Self::File(Rc::new(storage))
      },
      None => Self::Memory(Rc::new(MemoryStorage::new())),
    })
  }

  fn shared(&self) -> Rc<dyn Storage> {
    match self {
      Self::Memory(storage) => Rc::clone(storage) as Rc<dyn Storage>,
      Self::File(storage) => Rc::clone(storage) as Rc<dyn Storage>,
    }
  }

  fn snapshot(&self) -> Option<BTreeMap<String, String>> {
    match self {
      Self::Memory(storage) => Some(storage.snapshot()),
      Self::File(_) => None,
    }
  }
}

struct Replay {
  host:        HookHost,
  adapter:     Rc<RopeAdapter>,
  storage:     ReplayStorage,
  dark_class:  String,
  page_events: Vec<PageEvent>,
}

pub fn run(scenario: &Scenario, config: &Config) -> Result<Report> {
  let page = Page::new();
  build_page(&page, scenario, &config.theme.dark_class)?;

  let storage = ReplayStorage::open(config)?;
  for (key, value) in &scenario.storage {
    storage
      .shared()
      .set_item(key, value)
      .wrap_err_with(|| format!("failed to seed storage key {key}"))?;
  }

  let adapter = Rc::new(RopeAdapter::new(page.clone()));
  let renderer = Rc::new(SparklineRenderer::new(
    page.clone(),
    config.sparkline.clone(),
  ));
  let mut host = HookHost::new(page, storage.shared(), config.host_config());
  host.register_defaults(Rc::clone(&adapter), renderer);

  let mut replay = Replay {
    host,
    adapter,
    storage,
    dark_class: config.theme.dark_class.clone(),
    page_events: Vec::new(),
  };
  for (index, step) in scenario.steps.iter().enumerate() {
    tracing::debug!(index, ?step, "replaying step");
    replay
      .step(step)
      .wrap_err_with(|| format!("step {} failed", index + 1))?;
  }
  Ok(replay.report())
}

fn build_page(page: &Page, scenario: &Scenario, dark_class: &str) -> Result<()> {
  let root = page.document_element();
  if scenario.dark {
    page.set_class(root, dark_class, true)?;
  }
  for spec in &scenario.elements {
    build_element(page, spec)?;
  }
  // Markup is in place before any hook runs.
  page.flush();
  Ok(())
}

fn build_element(page: &Page, spec: &ElementSpec) -> Result<ElementId> {
  let parent = match &spec.parent {
    Some(id) => {
      page
        .get_element_by_id(id)
        .ok_or_eyre(format!("parent #{id} is not on the page"))?
    },
    None => page.document_element(),
  };
  let mut attributes: Vec<(&str, &str)> = spec
    .attributes
    .iter()
    .map(|(name, value)| (name.as_str(), value.as_str()))
    .collect();
  if let Some(id) = &spec.id {
    attributes.push(("id", id.as_str()));
  }
  let element = page.create_element_with(parent, &spec.tag, &attributes)?;
  if let Some(value) = &spec.value {
    page.set_value(element, value)?;
  }
  Ok(element)
}

impl Replay {
  fn page(&self) -> &Page {
    self.host.page()
  }

  fn target(&self, id: &str) -> Result<ElementId> {
    self
      .page()
      .get_element_by_id(id)
      .ok_or_eyre(format!("no element #{id}"))
  }

  fn step(&mut self, step: &Step) -> Result<()> {
    match step {
      Step::Mount { target: None } => {
        let mounted = self.host.mount_all();
        tracing::info!(mounted, "mounted hooks");
      },
      Step::Mount { target: Some(id) } => {
        let element = self.target(id)?;
        if !self.host.mount(element) {
          tracing::warn!(%id, "element was not mounted");
        }
      },
      Step::Type { field, text, at } => {
        let editor = self.editor_for(field)?;
        let surface = self
          .adapter
          .surface_for(editor)
          .ok_or_eyre(format!("editor for `{field}` has no surface"))?;
        match at {
          Some(at) => surface.insert(*at, text),
          None => surface.append(text),
        }
      },
      Step::Push { event, payload } => {
        let handled = self.host.handle_server_event(event, payload);
        tracing::debug!(%event, handled, "server event delivered");
      },
      Step::Theme { dark } => {
        let root = self.page().document_element();
        self.page().set_class(root, &self.dark_class, *dark)?;
      },
      Step::SetAttribute {
        target,
        name,
        value,
      } => {
        let element = self.target(target)?;
        match value {
          Some(value) => self.page().set_attribute(element, name, value)?,
          None => self.page().remove_attribute(element, name)?,
        }
      },
      Step::Key { key, shift } => {
        let mut event = KeyEvent::new(key.as_str());
        if *shift {
          event = event.with_shift();
        }
        let prevented = self.host.dispatch_keydown(&event);
        tracing::debug!(%key, prevented, "keydown delivered");
      },
      Step::Window { event, detail } => {
        self.host.dispatch_window_event(event, detail);
      },
      Step::Destroy { target } => {
        let element = self.target(target)?;
        self.host.remove_element(element)?;
      },
    }
    self.host.flush();
    self.page_events.extend(self.host.take_page_events());
    Ok(())
  }

  fn editor_for(&self, field: &str) -> Result<ElementId> {
    let page = self.page();
    let editors = page.query_all(page.document_element(), |el| {
      el.attribute(HOOK_ATTRIBUTE) == Some(CODE_EDITOR) && el.attribute("data-field") == Some(field)
    });
    match editors.as_slice() {
      [editor] => Ok(*editor),
      [] => bail!("no editor for field `{field}`"),
      _ => bail!("more than one editor for field `{field}`"),
    }
  }

  fn label(&self, element: ElementId) -> String {
    self
      .page()
      .attribute(element, "id")
      .map_or_else(|| element.to_string(), |id| format!("#{id}"))
  }

  fn report(mut self) -> Report {
    let page = self.page().clone();
    let root = page.document_element();

    let editors = page
      .query_all(root, |el| el.attribute(HOOK_ATTRIBUTE) == Some(CODE_EDITOR))
      .into_iter()
      .map(|element| {
        let mirror = page.query(element, |el| el.tag() == "textarea");
        EditorReport {
          element:  self.label(element),
          field:    page.attribute(element, "data-field"),
          language: page.attribute(element, "data-lang"),
          mounted:  self.host.is_mounted(element),
          text:     self.adapter.surface_for(element).map(|surface| surface.text()),
          mirror:   mirror.and_then(|mirror| page.value(mirror)),
        }
      })
      .collect();

    let charts = page
      .query_all(root, |el| el.attribute(HOOK_ATTRIBUTE) == Some(SPARKLINE))
      .into_iter()
      .map(|element| {
        let polyline = page
          .query(element, |el| el.tag() == "polyline")
          .and_then(|line| page.attribute(line, "points"));
        ChartReport {
          element: self.label(element),
          points: page.attribute(element, "data-points"),
          polyline,
        }
      })
      .collect();

    let page_events = std::mem::take(&mut self.page_events)
      .into_iter()
      .map(|event| {
        match event {
          PageEvent::Input { element, value } => {
            PageEventReport::Input {
              element: self.label(element),
              value,
            }
          },
          PageEvent::Click { element } => {
            PageEventReport::Click {
              element: self.label(element),
            }
          },
        }
      })
      .collect();

    Report {
      theme: self.host.theme(),
      editors,
      charts,
      pushed: self.host.take_pushed_events(),
      page_events,
      storage: self.storage.snapshot(),
    }
  }
}
