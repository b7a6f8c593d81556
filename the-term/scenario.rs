//! Replay scenarios: page markup, seeded storage and a list of steps.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Scenario {
  /// Start with the dark class on the document element.
  pub dark:    bool,
  /// Storage contents before the first step, keys as stored.
  pub storage: BTreeMap<String, String>,
  #[serde(rename = "element")]
  pub elements: Vec<ElementSpec>,
  #[serde(rename = "step")]
  pub steps:   Vec<Step>,
}

/// One element of the initial page, appended in order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ElementSpec {
  #[serde(default = "default_tag")]
  pub tag:        String,
  /// DOM id, also how steps refer to the element.
  pub id:         Option<String>,
  /// DOM id of the parent. Defaults to the document element.
  pub parent:     Option<String>,
  #[serde(default)]
  pub attributes: BTreeMap<String, String>,
  /// Form value.
  pub value:      Option<String>,
}

fn default_tag() -> String {
  "div".into()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Step {
  /// Mount one element's hook, or every hook on the page.
  Mount {
    target: Option<String>,
  },
  /// Type into the editor bound to `field`, at the end unless `at` is set.
  Type {
    field: String,
    text:  String,
    at:    Option<usize>,
  },
  /// Deliver a server event.
  Push {
    event:   String,
    #[serde(default)]
    payload: Value,
  },
  Theme {
    dark: bool,
  },
  SetAttribute {
    target: String,
    name:   String,
    value:  Option<String>,
  },
  Key {
    key:   String,
    #[serde(default)]
    shift: bool,
  },
  Window {
    event:  String,
    #[serde(default)]
    detail: Value,
  },
  /// Remove an element, destroying the hooks inside it.
  Destroy {
    target: String,
  },
}
