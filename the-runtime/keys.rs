//! Keyboard relays: the plan modal and the current-run panel.
//!
//! Both listen to window-level keydown events for as long as they are
//! mounted and turn Enter/Escape into clicks or pushed events.

use std::cell::Cell;

use serde::{
  Deserialize,
  Serialize,
};
use serde_json::json;
use the_hooks_event::Subscription;
use the_hooks_lib::page::{
  Element,
  ElementId,
  Page,
};

use crate::host::{
  Hook,
  HookContext,
  Outbox,
};

const PLAN_MODAL_ID: &str = "plan-modal";
const HIDE_PLAN_MODAL: &str = "hide_plan_modal";
const ABORT_RUN: &str = "abort_run";
const SHOW_PLAN_MODAL: &str = "show_plan_modal";

/// A window-level keydown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
  pub key:   String,
  #[serde(default)]
  pub shift: bool,
  #[serde(skip)]
  default_prevented: Cell<bool>,
}

impl KeyEvent {
  pub fn new(key: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      ..Self::default()
    }
  }

  pub fn with_shift(mut self) -> Self {
    self.shift = true;
    self
  }

  pub fn prevent_default(&self) {
    self.default_prevented.set(true);
  }

  pub fn default_prevented(&self) -> bool {
    self.default_prevented.get()
  }

  fn is_plain(&self, key: &str) -> bool {
    !self.shift && self.key == key
  }
}

fn is_button_for(el: &Element, action: &str) -> bool {
  el.tag() == "button" && el.attribute("phx-click") == Some(action)
}

/// Escape closes the plan modal; Enter submits its form.
pub struct PlanModalHook {
  keydown: Subscription,
}

impl PlanModalHook {
  pub fn mount(cx: &HookContext) -> Self {
    let page = cx.page.clone();
    let outbox = cx.outbox.clone();
    let keydown = cx
      .keydown
      .subscribe(move |event: &KeyEvent| on_plan_modal_key(&page, &outbox, event));
    Self { keydown }
  }
}

fn on_plan_modal_key(page: &Page, outbox: &Outbox, event: &KeyEvent) {
  if event.is_plain("Escape") {
    outbox.push(HIDE_PLAN_MODAL, json!({}));
    return;
  }
  if !event.is_plain("Enter") {
    return;
  }

  let Some(modal) = page.get_element_by_id(PLAN_MODAL_ID) else {
    tracing::debug!("enter pressed without a plan modal on the page");
    return;
  };
  let Some(form) = page.query(modal, |el| el.tag() == "form") else {
    return;
  };
  event.prevent_default();
  match page.query(form, |el| el.attribute("type") == Some("submit")) {
    Some(submit) => {
      if let Err(err) = page.click(submit) {
        tracing::warn!(%err, "failed to submit plan form");
      }
    },
    None => tracing::warn!(%form, "plan form has no submit control"),
  }
}

impl Hook for PlanModalHook {
  fn destroyed(&mut self) {
    self.keydown.cancel();
  }
}

/// Enter aborts the current run, or opens the plan modal when nothing is
/// running.
pub struct CurrentRunHook {
  keydown: Subscription,
}

impl CurrentRunHook {
  pub fn mount(cx: &HookContext, element: ElementId) -> Self {
    let page = cx.page.clone();
    let keydown = cx
      .keydown
      .subscribe(move |event: &KeyEvent| on_current_run_key(&page, element, event));
    Self { keydown }
  }
}

fn on_current_run_key(page: &Page, element: ElementId, event: &KeyEvent) {
  if !event.is_plain("Enter") {
    return;
  }
  let target = page
    .query(element, |el| is_button_for(el, ABORT_RUN))
    .or_else(|| page.query(element, |el| is_button_for(el, SHOW_PLAN_MODAL)));
  let Some(target) = target else {
    return;
  };
  event.prevent_default();
  if let Err(err) = page.click(target) {
    tracing::warn!(%err, "failed to click run control");
  }
}

impl Hook for CurrentRunHook {
  fn destroyed(&mut self) {
    self.keydown.cancel();
  }
}
