use std::{
  cell::RefCell,
  fmt,
};

/// Handle for a registered callback.
///
/// [`Subscription::cancel`] unregisters the callback synchronously: once it
/// returns, the callback will not run again, even if a publish is currently
/// iterating over its subscribers. Cancelling twice is a no-op, and dropping
/// the handle cancels it.
#[must_use = "dropping a Subscription cancels it"]
pub struct Subscription {
  cancel: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
  pub fn new(cancel: impl FnOnce() + 'static) -> Self {
    Self {
      cancel: RefCell::new(Some(Box::new(cancel))),
    }
  }

  /// A subscription that is already inactive.
  pub fn inactive() -> Self {
    Self {
      cancel: RefCell::new(None),
    }
  }

  pub fn cancel(&self) {
    let cancel = self.cancel.borrow_mut().take();
    if let Some(cancel) = cancel {
      cancel();
    }
  }

  pub fn is_active(&self) -> bool {
    self.cancel.borrow().is_some()
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.cancel();
  }
}

impl fmt::Debug for Subscription {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Subscription")
      .field("active", &self.is_active())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use std::{
    cell::Cell,
    rc::Rc,
  };

  use super::Subscription;

  #[test]
  fn cancel_runs_once() {
    let calls = Rc::new(Cell::new(0));
    let sub = Subscription::new({
      let calls = calls.clone();
      move || calls.set(calls.get() + 1)
    });

    assert!(sub.is_active());
    sub.cancel();
    sub.cancel();
    assert!(!sub.is_active());
    drop(sub);
    assert_eq!(calls.get(), 1);
  }

  #[test]
  fn drop_cancels() {
    let calls = Rc::new(Cell::new(0));
    {
      let _sub = Subscription::new({
        let calls = calls.clone();
        move || calls.set(calls.get() + 1)
      });
    }
    assert_eq!(calls.get(), 1);
  }

  #[test]
  fn inactive_is_inert() {
    let sub = Subscription::inactive();
    assert!(!sub.is_active());
    sub.cancel();
  }
}
