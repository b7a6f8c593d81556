//! Chart hook: renders an inline chart from a points attribute and re-renders
//! whenever that attribute changes.
//!
//! The renderer root is created lazily on the first render and reused for
//! every later one, so updates happen in place on the same mount element.
//! When root creation fails the hook stays bound and retries on the next
//! mutation.

use std::{
  cell::RefCell,
  fmt,
  rc::Rc,
};

use serde::{
  Deserialize,
  Serialize,
};
use thiserror::Error;

use crate::{
  page::{
    ElementId,
    Page,
  },
  points::parse_points,
  watch::AttributeWatcher,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChartError {
  #[error("chart mount {0} is not on the page")]
  MissingMount(ElementId),
  #[error("chart renderer rejected mount {mount}: {reason}")]
  Rejected { mount: ElementId, reason: String },
}

pub trait ChartRenderer {
  type Root;

  fn create_root(&self, page: &Page, mount: ElementId) -> Result<Self::Root, ChartError>;

  /// Render `points` into `root`, replacing what was there.
  fn render(&self, root: &Self::Root, points: &[f64]);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ChartConfig {
  pub points_attribute: String,
}

impl Default for ChartConfig {
  fn default() -> Self {
    Self {
      points_attribute: "data-points".into(),
    }
  }
}

pub struct ChartContext<R> {
  pub renderer: Rc<R>,
  pub page:     Page,
  pub config:   Rc<ChartConfig>,
}

impl<R> Clone for ChartContext<R> {
  fn clone(&self) -> Self {
    Self {
      renderer: Rc::clone(&self.renderer),
      page:     self.page.clone(),
      config:   Rc::clone(&self.config),
    }
  }
}

pub struct ChartHook<R: ChartRenderer> {
  inner:   Rc<RefCell<ChartInner<R>>>,
  watcher: AttributeWatcher,
}

struct ChartInner<R: ChartRenderer> {
  cx:      ChartContext<R>,
  element: ElementId,
  root:    Option<R::Root>,
  points:  Vec<f64>,
  renders: u64,
}

impl<R> ChartHook<R>
where
  R: ChartRenderer + 'static,
  R::Root: 'static,
{
  pub fn attach(cx: &ChartContext<R>, element: ElementId) -> Self {
    let inner = Rc::new(RefCell::new(ChartInner {
      cx: cx.clone(),
      element,
      root: None,
      points: Vec::new(),
      renders: 0,
    }));

    let attribute = cx.config.points_attribute.as_str();
    let raw = cx.page.attribute(element, attribute);
    inner.borrow_mut().render(raw.as_deref());

    let weak = Rc::downgrade(&inner);
    let watcher = AttributeWatcher::observe(&cx.page, element, attribute, move |raw| {
      let Some(inner) = weak.upgrade() else {
        return;
      };
      let Ok(mut inner) = inner.try_borrow_mut() else {
        tracing::error!("chart re-render re-entered the chart hook");
        return;
      };
      inner.render(raw);
    });

    tracing::debug!(%element, "chart hook attached");
    Self { inner, watcher }
  }

  /// Stop observing the points attribute. Idempotent. Tearing down the
  /// rendered chart is left to the renderer.
  pub fn detach(&self) {
    if self.watcher.is_observing() {
      self.watcher.unobserve();
      tracing::debug!(element = %self.watcher.element(), "chart hook detached");
    }
  }

  pub fn is_observing(&self) -> bool {
    self.watcher.is_observing()
  }

  pub fn element(&self) -> ElementId {
    self.inner.borrow().element
  }

  /// The sequence most recently handed to the renderer (or parsed, if the
  /// root could not be created).
  pub fn points(&self) -> Vec<f64> {
    self.inner.borrow().points.clone()
  }

  pub fn render_count(&self) -> u64 {
    self.inner.borrow().renders
  }

  pub fn has_root(&self) -> bool {
    self.inner.borrow().root.is_some()
  }
}

impl<R: ChartRenderer> ChartInner<R> {
  fn render(&mut self, raw: Option<&str>) {
    let parsed = parse_points(raw.unwrap_or_default());
    if parsed.rejected > 0 {
      tracing::debug!(
        element = %self.element,
        rejected = parsed.rejected,
        "excluded malformed chart points"
      );
    }
    self.points = parsed.values;

    if self.root.is_none() {
      match self.cx.renderer.create_root(&self.cx.page, self.element) {
        Ok(root) => self.root = Some(root),
        Err(err) => {
          tracing::warn!(element = %self.element, %err, "failed to create chart root");
          return;
        },
      }
    }
    if let Some(root) = &self.root {
      self.cx.renderer.render(root, &self.points);
      self.renders += 1;
    }
  }
}

impl<R: ChartRenderer> fmt::Debug for ChartHook<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let inner = self.inner.borrow();
    f.debug_struct("ChartHook")
      .field("element", &inner.element)
      .field("points", &inner.points)
      .field("renders", &inner.renders)
      .field("observing", &self.watcher.is_observing())
      .finish()
  }
}
