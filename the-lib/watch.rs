//! Attribute watcher.
//!
//! [`AttributeWatcher`] reports external mutation of one attribute on one
//! element. It wraps the page's mutation observation, so the delivery rules
//! from [`crate::page`] apply: callbacks may be coalesced, but each one sees
//! the attribute's value at invocation time.

use std::{
  cell::Cell,
  fmt,
  rc::Rc,
};

use crate::page::{
  AttributeChange,
  ElementId,
  ObserverId,
  Page,
};

pub struct AttributeWatcher {
  page:      Page,
  element:   ElementId,
  attribute: String,
  observer:  Cell<Option<ObserverId>>,
}

impl AttributeWatcher {
  /// Start watching `attribute` on `element`. `callback` receives the
  /// attribute's current value, `None` once it is removed.
  pub fn observe(
    page: &Page,
    element: ElementId,
    attribute: &str,
    callback: impl Fn(Option<&str>) + 'static,
  ) -> Self {
    let observer = page.observe_attribute(
      element,
      attribute,
      Rc::new(move |change: &AttributeChange| callback(change.value.as_deref())),
    );
    tracing::trace!(%element, attribute, "attribute watcher registered");
    Self {
      page: page.clone(),
      element,
      attribute: attribute.to_string(),
      observer: Cell::new(Some(observer)),
    }
  }

  /// Stop future callbacks. Safe to call any number of times.
  pub fn unobserve(&self) {
    if let Some(observer) = self.observer.take() {
      self.page.unobserve(observer);
      tracing::trace!(element = %self.element, attribute = %self.attribute, "attribute watcher removed");
    }
  }

  pub fn is_observing(&self) -> bool {
    self.observer.get().is_some()
  }

  pub fn element(&self) -> ElementId {
    self.element
  }

  pub fn attribute(&self) -> &str {
    &self.attribute
  }
}

impl Drop for AttributeWatcher {
  fn drop(&mut self) {
    self.unobserve();
  }
}

impl fmt::Debug for AttributeWatcher {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AttributeWatcher")
      .field("element", &self.element)
      .field("attribute", &self.attribute)
      .field("observing", &self.is_observing())
      .finish()
  }
}
