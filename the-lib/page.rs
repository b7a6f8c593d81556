//! In-memory page model.
//!
//! A [`Page`] is the element tree hooks are bound to: tags, attributes, form
//! values, inline style properties and rendered content. It stands in for the
//! browser document so every hook runs (and is tested) without one.
//!
//! # Mutation delivery
//!
//! Attribute writes that change a value queue an [`AttributeMutation`]. Queued
//! records are delivered by [`Page::flush`], which mirrors how a platform
//! mutation observer batches records until the current task finishes:
//!
//! - each observer runs at most once per delivery round, no matter how many
//!   matching records were queued;
//! - the observer receives the attribute value current at invocation time,
//!   never a stale intermediate;
//! - an observer removed during a round does not run for the rest of it.
//!
//! Input and click notifications are queued as [`PageEvent`]s for the host to
//! drain with [`Page::take_events`].

use std::{
  cell::RefCell,
  collections::{
    BTreeMap,
    BTreeSet,
    VecDeque,
  },
  fmt,
  num::NonZeroUsize,
  rc::Rc,
};

use thiserror::Error;

/// Upper bound on delivery rounds per [`Page::flush`]. Observers that keep
/// writing the attributes they observe would otherwise never settle.
const MAX_FLUSH_ROUNDS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(NonZeroUsize);

impl ElementId {
  pub const fn new(id: NonZeroUsize) -> Self {
    Self(id)
  }

  pub const fn get(self) -> NonZeroUsize {
    self.0
  }
}

impl fmt::Display for ElementId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PageError {
  #[error("element {0} is not on the page")]
  MissingElement(ElementId),
  #[error("the document element cannot be removed")]
  RemoveDocumentElement,
}

pub type Result<T> = std::result::Result<T, PageError>;

/// Notification queued for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
  /// A form control announced a new value (an `input` event).
  Input { element: ElementId, value: String },
  /// An element was clicked programmatically.
  Click { element: ElementId },
}

/// A queued attribute change record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMutation {
  pub element:   ElementId,
  pub name:      String,
  pub old_value: Option<String>,
}

/// What an observer sees when it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeChange {
  pub element: ElementId,
  pub name:    String,
  pub value:   Option<String>,
}

pub type ObserverCallback = Rc<dyn Fn(&AttributeChange)>;

#[derive(Debug, Clone, Default)]
pub struct Element {
  tag:        String,
  attributes: BTreeMap<String, String>,
  value:      String,
  style:      BTreeMap<String, String>,
  content:    String,
  parent:     Option<ElementId>,
  children:   Vec<ElementId>,
}

impl Element {
  pub fn tag(&self) -> &str {
    &self.tag
  }

  pub fn attribute(&self, name: &str) -> Option<&str> {
    self.attributes.get(name).map(String::as_str)
  }

  pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .attributes
      .iter()
      .map(|(name, value)| (name.as_str(), value.as_str()))
  }

  pub fn has_class(&self, class: &str) -> bool {
    self
      .attribute("class")
      .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
  }

  pub fn value(&self) -> &str {
    &self.value
  }

  pub fn style(&self, property: &str) -> Option<&str> {
    self.style.get(property).map(String::as_str)
  }

  pub fn content(&self) -> &str {
    &self.content
  }

  pub fn parent(&self) -> Option<ElementId> {
    self.parent
  }

  pub fn children(&self) -> &[ElementId] {
    &self.children
  }
}

struct Observer {
  element:   ElementId,
  attribute: String,
  callback:  ObserverCallback,
}

struct PageState {
  next_element:  usize,
  next_observer: u64,
  root:          ElementId,
  elements:      BTreeMap<ElementId, Element>,
  observers:     BTreeMap<ObserverId, Observer>,
  pending:       Vec<AttributeMutation>,
  events:        VecDeque<PageEvent>,
}

impl PageState {
  fn element(&self, id: ElementId) -> Result<&Element> {
    self.elements.get(&id).ok_or(PageError::MissingElement(id))
  }

  fn element_mut(&mut self, id: ElementId) -> Result<&mut Element> {
    self.elements.get_mut(&id).ok_or(PageError::MissingElement(id))
  }

  fn alloc(&mut self, element: Element) -> ElementId {
    self.next_element += 1;
    let id = ElementId(NonZeroUsize::new(self.next_element).unwrap_or(NonZeroUsize::MIN));
    self.elements.insert(id, element);
    id
  }

  fn descendants(&self, root: ElementId) -> Vec<ElementId> {
    let mut out = Vec::new();
    let mut stack: Vec<ElementId> = self
      .elements
      .get(&root)
      .map(|el| el.children.iter().rev().copied().collect())
      .unwrap_or_default();
    while let Some(id) = stack.pop() {
      out.push(id);
      if let Some(el) = self.elements.get(&id) {
        stack.extend(el.children.iter().rev().copied());
      }
    }
    out
  }
}

/// Shared handle to a page. Clones refer to the same page.
#[derive(Clone)]
pub struct Page {
  state: Rc<RefCell<PageState>>,
}

impl Default for Page {
  fn default() -> Self {
    Self::new()
  }
}

impl Page {
  /// Create an empty page holding only the document element (`html`).
  pub fn new() -> Self {
    let mut state = PageState {
      next_element:  0,
      next_observer: 0,
      root:          ElementId(NonZeroUsize::MIN),
      elements:      BTreeMap::new(),
      observers:     BTreeMap::new(),
      pending:       Vec::new(),
      events:        VecDeque::new(),
    };
    state.root = state.alloc(Element {
      tag: "html".into(),
      ..Element::default()
    });
    Self {
      state: Rc::new(RefCell::new(state)),
    }
  }

  pub fn document_element(&self) -> ElementId {
    self.state.borrow().root
  }

  pub fn create_element(&self, parent: ElementId, tag: &str) -> Result<ElementId> {
    self.create_element_with(parent, tag, &[])
  }

  /// Create an element with initial attributes.
  ///
  /// Initial attributes are part of the markup, so they do not queue
  /// mutation records.
  pub fn create_element_with(
    &self,
    parent: ElementId,
    tag: &str,
    attributes: &[(&str, &str)],
  ) -> Result<ElementId> {
    let mut state = self.state.borrow_mut();
    state.element(parent)?;
    let id = state.alloc(Element {
      tag: tag.to_ascii_lowercase(),
      attributes: attributes
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect(),
      parent: Some(parent),
      ..Element::default()
    });
    state.element_mut(parent)?.children.push(id);
    Ok(id)
  }

  /// Remove an element and its subtree.
  pub fn remove_element(&self, id: ElementId) -> Result<()> {
    let mut state = self.state.borrow_mut();
    if id == state.root {
      return Err(PageError::RemoveDocumentElement);
    }
    let parent = state.element(id)?.parent;
    let mut doomed = state.descendants(id);
    doomed.push(id);
    for gone in &doomed {
      state.elements.remove(gone);
    }
    if let Some(parent) = parent
      && let Ok(parent) = state.element_mut(parent)
    {
      parent.children.retain(|child| *child != id);
    }
    state.pending.retain(|record| !doomed.contains(&record.element));
    Ok(())
  }

  pub fn contains(&self, id: ElementId) -> bool {
    self.state.borrow().elements.contains_key(&id)
  }

  /// Run `f` against an element, if it exists.
  pub fn with_element<R>(&self, id: ElementId, f: impl FnOnce(&Element) -> R) -> Option<R> {
    self.state.borrow().elements.get(&id).map(f)
  }

  pub fn tag(&self, id: ElementId) -> Option<String> {
    self.with_element(id, |el| el.tag.clone())
  }

  pub fn attribute(&self, id: ElementId, name: &str) -> Option<String> {
    self
      .with_element(id, |el| el.attribute(name).map(str::to_owned))
      .flatten()
  }

  pub fn set_attribute(&self, id: ElementId, name: &str, value: &str) -> Result<()> {
    let mut state = self.state.borrow_mut();
    let element = state.element_mut(id)?;
    let old_value = element.attributes.insert(name.to_string(), value.to_string());
    if old_value.as_deref() != Some(value) {
      state.pending.push(AttributeMutation {
        element: id,
        name: name.to_string(),
        old_value,
      });
    }
    Ok(())
  }

  pub fn remove_attribute(&self, id: ElementId, name: &str) -> Result<()> {
    let mut state = self.state.borrow_mut();
    let element = state.element_mut(id)?;
    if let Some(old_value) = element.attributes.remove(name) {
      state.pending.push(AttributeMutation {
        element: id,
        name: name.to_string(),
        old_value: Some(old_value),
      });
    }
    Ok(())
  }

  pub fn has_class(&self, id: ElementId, class: &str) -> bool {
    self.with_element(id, |el| el.has_class(class)).unwrap_or(false)
  }

  /// Add or remove one class, leaving the others in place.
  pub fn set_class(&self, id: ElementId, class: &str, enabled: bool) -> Result<()> {
    let current = self.attribute(id, "class").unwrap_or_default();
    let mut classes: Vec<&str> = current
      .split_ascii_whitespace()
      .filter(|c| *c != class)
      .collect();
    if enabled {
      classes.push(class);
    }
    self.set_attribute(id, "class", &classes.join(" "))
  }

  pub fn value(&self, id: ElementId) -> Option<String> {
    self.with_element(id, |el| el.value.clone())
  }

  /// Assign a form value. Like assigning `.value` in a browser, this does not
  /// notify anyone; see [`Page::dispatch_input`].
  pub fn set_value(&self, id: ElementId, value: &str) -> Result<()> {
    let mut state = self.state.borrow_mut();
    let element = state.element_mut(id)?;
    element.value.clear();
    element.value.push_str(value);
    Ok(())
  }

  /// Queue an input notification carrying the element's current value.
  pub fn dispatch_input(&self, id: ElementId) -> Result<()> {
    let mut state = self.state.borrow_mut();
    let value = state.element(id)?.value.clone();
    state.events.push_back(PageEvent::Input { element: id, value });
    Ok(())
  }

  pub fn click(&self, id: ElementId) -> Result<()> {
    let mut state = self.state.borrow_mut();
    state.element(id)?;
    state.events.push_back(PageEvent::Click { element: id });
    Ok(())
  }

  pub fn take_events(&self) -> Vec<PageEvent> {
    self.state.borrow_mut().events.drain(..).collect()
  }

  pub fn style(&self, id: ElementId, property: &str) -> Option<String> {
    self
      .with_element(id, |el| el.style(property).map(str::to_owned))
      .flatten()
  }

  pub fn set_style(&self, id: ElementId, property: &str, value: &str) -> Result<()> {
    let mut state = self.state.borrow_mut();
    state
      .element_mut(id)?
      .style
      .insert(property.to_string(), value.to_string());
    Ok(())
  }

  pub fn content(&self, id: ElementId) -> Option<String> {
    self.with_element(id, |el| el.content.clone())
  }

  pub fn set_content(&self, id: ElementId, content: &str) -> Result<()> {
    let mut state = self.state.borrow_mut();
    let element = state.element_mut(id)?;
    element.content.clear();
    element.content.push_str(content);
    Ok(())
  }

  pub fn children(&self, id: ElementId) -> Vec<ElementId> {
    self
      .with_element(id, |el| el.children.clone())
      .unwrap_or_default()
  }

  /// First descendant of `root` (document order, `root` excluded) matching
  /// `predicate`.
  pub fn query(&self, root: ElementId, predicate: impl Fn(&Element) -> bool) -> Option<ElementId> {
    let state = self.state.borrow();
    state
      .descendants(root)
      .into_iter()
      .find(|id| state.elements.get(id).is_some_and(&predicate))
  }

  /// Every descendant of `root` matching `predicate`, in document order.
  pub fn query_all(&self, root: ElementId, predicate: impl Fn(&Element) -> bool) -> Vec<ElementId> {
    let state = self.state.borrow();
    state
      .descendants(root)
      .into_iter()
      .filter(|id| state.elements.get(id).is_some_and(&predicate))
      .collect()
  }

  /// Element whose `id` attribute equals `dom_id`.
  pub fn get_element_by_id(&self, dom_id: &str) -> Option<ElementId> {
    let root = self.document_element();
    if self.attribute(root, "id").as_deref() == Some(dom_id) {
      return Some(root);
    }
    self.query(root, |el| el.attribute("id") == Some(dom_id))
  }

  /// Register an observer for one attribute of one element. Delivery happens
  /// in [`Page::flush`].
  pub fn observe_attribute(
    &self,
    element: ElementId,
    attribute: &str,
    callback: ObserverCallback,
  ) -> ObserverId {
    let mut state = self.state.borrow_mut();
    let id = ObserverId(state.next_observer);
    state.next_observer += 1;
    state.observers.insert(id, Observer {
      element,
      attribute: attribute.to_string(),
      callback,
    });
    id
  }

  /// Returns whether the observer was still registered.
  pub fn unobserve(&self, id: ObserverId) -> bool {
    self.state.borrow_mut().observers.remove(&id).is_some()
  }

  pub fn observer_count(&self) -> usize {
    self.state.borrow().observers.len()
  }

  pub fn pending_mutations(&self) -> usize {
    self.state.borrow().pending.len()
  }

  /// Deliver queued attribute mutations, returning how many observer
  /// callbacks ran.
  ///
  /// Observers may write attributes while they run; the resulting records
  /// are delivered in a following round of the same flush.
  pub fn flush(&self) -> usize {
    let mut delivered = 0;
    for round in 0..MAX_FLUSH_ROUNDS {
      let records = std::mem::take(&mut self.state.borrow_mut().pending);
      if records.is_empty() {
        return delivered;
      }
      tracing::trace!(round, records = records.len(), "delivering attribute mutations");

      let targets: BTreeSet<ObserverId> = {
        let state = self.state.borrow();
        state
          .observers
          .iter()
          .filter(|(_, observer)| {
            records
              .iter()
              .any(|r| r.element == observer.element && r.name == observer.attribute)
          })
          .map(|(id, _)| *id)
          .collect()
      };

      for id in targets {
        let change = {
          let state = self.state.borrow();
          let Some(observer) = state.observers.get(&id) else {
            continue;
          };
          if !state.elements.contains_key(&observer.element) {
            continue;
          }
          let value = state
            .elements
            .get(&observer.element)
            .and_then(|el| el.attribute(&observer.attribute).map(str::to_owned));
          (
            Rc::clone(&observer.callback),
            AttributeChange {
              element: observer.element,
              name: observer.attribute.clone(),
              value,
            },
          )
        };
        let (callback, change) = change;
        callback(&change);
        delivered += 1;
      }
    }

    let dropped = std::mem::take(&mut self.state.borrow_mut().pending).len();
    tracing::warn!(
      dropped,
      "attribute observers did not settle after {MAX_FLUSH_ROUNDS} rounds"
    );
    delivered
  }
}

impl fmt::Debug for Page {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.borrow();
    f.debug_struct("Page")
      .field("elements", &state.elements.len())
      .field("observers", &state.observers.len())
      .field("pending", &state.pending.len())
      .field("events", &state.events.len())
      .finish()
  }
}
