//! Settings relay: restores form settings from storage on mount and saves
//! them when the server asks.

use std::rc::Rc;

use serde::{
  Deserialize,
  Serialize,
};
use serde_json::{
  Map,
  Value,
};
use the_hooks_event::Subscription;

use crate::{
  host::{
    Hook,
    HookContext,
  },
  storage::Storage,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SettingsConfig {
  /// Prepended to every key in storage.
  pub prefix:       String,
  /// Keys restored on mount, in order.
  pub keys:         Vec<String>,
  /// Keys restored as booleans (`"true"` is true, anything else false).
  pub boolean_keys: Vec<String>,
  /// Event pushed to the server with the restored settings.
  pub load_event:   String,
  /// Window event whose detail object is written to storage.
  pub save_event:   String,
}

impl Default for SettingsConfig {
  fn default() -> Self {
    let keys = [
      "name",
      "host",
      "port",
      "protocol",
      "script",
      "params",
      "desired_size",
      "rampup_secs",
      "sustain_secs",
      "rampdown_secs",
      "json",
      "advanced",
    ];
    Self {
      prefix:       "sg_".into(),
      keys:         keys.into_iter().map(String::from).collect(),
      boolean_keys: vec!["advanced".into()],
      load_event:   "load_settings".into(),
      save_event:   "phx:save_settings".into(),
    }
  }
}

impl SettingsConfig {
  fn storage_key(&self, key: &str) -> String {
    format!("{}{key}", self.prefix)
  }
}

pub struct SettingsStorageHook {
  save: Subscription,
}

impl SettingsStorageHook {
  pub fn mount(cx: &HookContext) -> Self {
    let config = Rc::clone(&cx.settings_config);
    let settings = load_settings(cx.storage.as_ref(), &config);
    tracing::debug!(keys = settings.len(), "restored settings");
    cx.outbox.push(config.load_event.clone(), Value::Object(settings));

    let storage = Rc::clone(&cx.storage);
    let save = cx.window_events.subscribe(
      config.save_event.clone(),
      move |detail: &Value| save_settings(storage.as_ref(), &config, detail),
    );
    Self { save }
  }
}

impl Hook for SettingsStorageHook {
  fn destroyed(&mut self) {
    self.save.cancel();
  }
}

/// Read every configured key. Missing keys (and keys storage failed to
/// read) come back as `null`, boolean keys as `false`.
pub fn load_settings(storage: &dyn Storage, config: &SettingsConfig) -> Map<String, Value> {
  config
    .keys
    .iter()
    .map(|key| {
      let stored = storage
        .get_item(&config.storage_key(key))
        .unwrap_or_else(|err| {
          tracing::warn!(key, %err, "failed to read setting");
          None
        });
      let value = if config.boolean_keys.contains(key) {
        Value::Bool(stored.as_deref() == Some("true"))
      } else {
        stored.map_or(Value::Null, Value::String)
      };
      (key.clone(), value)
    })
    .collect()
}

/// Write each entry of `detail` under the prefixed key. Strings are stored
/// verbatim, anything else as its JSON text.
pub fn save_settings(storage: &dyn Storage, config: &SettingsConfig, detail: &Value) {
  let Some(entries) = detail.as_object() else {
    tracing::warn!(%detail, "save settings detail is not an object");
    return;
  };
  for (key, value) in entries {
    let text = match value {
      Value::String(text) => text.clone(),
      other => other.to_string(),
    };
    if let Err(err) = storage.set_item(&config.storage_key(key), &text) {
      tracing::warn!(key, %err, "failed to save setting");
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::storage::MemoryStorage;

  #[test]
  fn load_uses_prefix_and_booleans() {
    let storage = MemoryStorage::new();
    storage.set_item("sg_host", "example.com").unwrap();
    storage.set_item("sg_advanced", "true").unwrap();
    storage.set_item("host", "unprefixed").unwrap();

    let settings = load_settings(&storage, &SettingsConfig::default());

    assert_eq!(settings.len(), 12);
    assert_eq!(settings["host"], json!("example.com"));
    assert_eq!(settings["port"], Value::Null);
    assert_eq!(settings["advanced"], json!(true));
  }

  #[test]
  fn advanced_defaults_to_false() {
    let storage = MemoryStorage::new();
    storage.set_item("sg_advanced", "yes").unwrap();
    let settings = load_settings(&storage, &SettingsConfig::default());
    assert_eq!(settings["advanced"], json!(false));
  }

  #[test]
  fn save_stringifies_non_strings() {
    let storage = MemoryStorage::new();
    let config = SettingsConfig::default();

    save_settings(
      &storage,
      &config,
      &json!({"host": "h", "port": 4000, "advanced": true, "json": null}),
    );

    let saved = storage.snapshot();
    assert_eq!(saved["sg_host"], "h");
    assert_eq!(saved["sg_port"], "4000");
    assert_eq!(saved["sg_advanced"], "true");
    assert_eq!(saved["sg_json"], "null");
  }

  #[test]
  fn save_ignores_non_object_detail() {
    let storage = MemoryStorage::new();
    save_settings(&storage, &SettingsConfig::default(), &json!(["host"]));
    assert!(storage.is_empty());
  }
}
