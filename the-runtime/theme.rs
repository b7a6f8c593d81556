//! Ambient theme indicator.
//!
//! The page signals dark mode with a class on the document element. The
//! indicator watches that element's `class` attribute and feeds the result
//! into the shared theme [`Signal`], which editor hooks subscribe to.

use serde::{
  Deserialize,
  Serialize,
};
use the_hooks_event::Signal;
use the_hooks_lib::{
  field::ThemeMode,
  page::Page,
  watch::AttributeWatcher,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ThemeConfig {
  /// Class on the document element that selects the dark theme.
  pub dark_class: String,
}

impl Default for ThemeConfig {
  fn default() -> Self {
    Self {
      dark_class: "dark".into(),
    }
  }
}

pub fn theme_from_classes(classes: Option<&str>, dark_class: &str) -> ThemeMode {
  let dark = classes.is_some_and(|classes| {
    classes
      .split_ascii_whitespace()
      .any(|class| class == dark_class)
  });
  ThemeMode::from_dark(dark)
}

pub struct ThemeIndicator {
  watcher: AttributeWatcher,
}

impl ThemeIndicator {
  /// Seed `theme` from the document element and keep it current.
  pub fn attach(page: &Page, theme: &Signal<ThemeMode>, config: &ThemeConfig) -> Self {
    let root = page.document_element();
    let dark_class = config.dark_class.clone();

    theme.set(theme_from_classes(
      page.attribute(root, "class").as_deref(),
      &dark_class,
    ));

    let signal = theme.clone();
    let watcher = AttributeWatcher::observe(page, root, "class", move |classes| {
      let next = theme_from_classes(classes, &dark_class);
      if signal.set(next) {
        tracing::debug!(theme = %next, "ambient theme changed");
      }
    });
    Self { watcher }
  }

  pub fn detach(&self) {
    self.watcher.unobserve();
  }

  pub fn is_observing(&self) -> bool {
    self.watcher.is_observing()
  }
}
