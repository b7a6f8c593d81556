use std::{
  cell::RefCell,
  rc::{
    Rc,
    Weak,
  },
};

use crate::Subscription;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SubscriberId(u64);

/// Ordered list of callbacks, shared between a publisher and the
/// cancellation closures of its subscriptions.
pub(crate) struct SubscriberList<F: ?Sized> {
  next_id: u64,
  entries: Vec<(SubscriberId, Rc<F>)>,
}

impl<F: ?Sized> Default for SubscriberList<F> {
  fn default() -> Self {
    Self {
      next_id: 0,
      entries: Vec::new(),
    }
  }
}

impl<F: ?Sized> SubscriberList<F> {
  pub(crate) fn insert(&mut self, callback: Rc<F>) -> SubscriberId {
    let id = SubscriberId(self.next_id);
    self.next_id += 1;
    self.entries.push((id, callback));
    id
  }

  pub(crate) fn remove(&mut self, id: SubscriberId) -> bool {
    let before = self.entries.len();
    self.entries.retain(|(entry, _)| *entry != id);
    before != self.entries.len()
  }

  pub(crate) fn contains(&self, id: SubscriberId) -> bool {
    self.entries.iter().any(|(entry, _)| *entry == id)
  }

  pub(crate) fn len(&self) -> usize {
    self.entries.len()
  }

  pub(crate) fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub(crate) fn snapshot(&self) -> Vec<(SubscriberId, Rc<F>)> {
    self.entries.clone()
  }
}

pub(crate) type SharedList<F> = Rc<RefCell<SubscriberList<F>>>;

pub(crate) fn subscribe<F: ?Sized + 'static>(list: &SharedList<F>, callback: Rc<F>) -> Subscription {
  let id = list.borrow_mut().insert(callback);
  let weak: Weak<RefCell<SubscriberList<F>>> = Rc::downgrade(list);
  Subscription::new(move || {
    if let Some(list) = weak.upgrade() {
      list.borrow_mut().remove(id);
    }
  })
}

/// Invoke every subscriber registered when the publish started, skipping the
/// ones cancelled by an earlier subscriber of the same publish. Returns the
/// number of callbacks that ran.
pub(crate) fn publish<F: ?Sized>(list: &SharedList<F>, mut invoke: impl FnMut(&F)) -> usize {
  let snapshot = list.borrow().snapshot();
  let mut delivered = 0;
  for (id, callback) in snapshot {
    if !list.borrow().contains(id) {
      continue;
    }
    invoke(&callback);
    delivered += 1;
  }
  delivered
}
