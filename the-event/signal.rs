use std::{
  cell::RefCell,
  fmt,
  rc::Rc,
};

use crate::{
  Subscription,
  subscribers::{
    self,
    SharedList,
  },
};

/// A single current value with change notification.
///
/// Cloning a `Signal` clones the handle, not the value: every clone observes
/// and updates the same value. Subscribers are only notified when [`set`]
/// stores a value that differs from the current one, and each subscriber is
/// handed the value current at the moment it runs.
///
/// [`set`]: Signal::set
pub struct Signal<T> {
  value:       Rc<RefCell<T>>,
  subscribers: SharedList<dyn Fn(&T)>,
}

impl<T> Clone for Signal<T> {
  fn clone(&self) -> Self {
    Self {
      value:       Rc::clone(&self.value),
      subscribers: Rc::clone(&self.subscribers),
    }
  }
}

impl<T: Clone + PartialEq + 'static> Signal<T> {
  pub fn new(value: T) -> Self {
    Self {
      value:       Rc::new(RefCell::new(value)),
      subscribers: Rc::default(),
    }
  }

  pub fn get(&self) -> T {
    self.value.borrow().clone()
  }

  /// Store `value`, notifying subscribers if it changed.
  ///
  /// Returns whether the value changed.
  pub fn set(&self, value: T) -> bool {
    {
      let mut current = self.value.borrow_mut();
      if *current == value {
        return false;
      }
      *current = value;
    }

    let delivered = subscribers::publish(&self.subscribers, |callback| {
      let current = self.get();
      callback(&current);
    });
    log::trace!("signal changed, notified {delivered} subscribers");
    true
  }

  pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
    let callback: Rc<dyn Fn(&T)> = Rc::new(callback);
    subscribers::subscribe(&self.subscribers, callback)
  }

  pub fn subscriber_count(&self) -> usize {
    self.subscribers.borrow().len()
  }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Signal")
      .field("value", &*self.value.borrow())
      .field("subscribers", &self.subscribers.borrow().len())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use std::{
    cell::RefCell,
    rc::Rc,
  };

  use super::Signal;

  #[test]
  fn set_notifies_only_on_change() {
    let signal = Signal::new(false);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let _sub = signal.subscribe({
      let seen = seen.clone();
      move |value: &bool| seen.borrow_mut().push(*value)
    });

    assert!(!signal.set(false));
    assert!(signal.set(true));
    assert!(!signal.set(true));
    assert!(signal.set(false));

    assert_eq!(*seen.borrow(), vec![true, false]);
  }

  #[test]
  fn clones_share_the_value() {
    let signal = Signal::new(1);
    let other = signal.clone();
    other.set(2);
    assert_eq!(signal.get(), 2);
  }

  #[test]
  fn cancelled_subscriber_stops_receiving() {
    let signal = Signal::new(0);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sub = signal.subscribe({
      let seen = seen.clone();
      move |value: &i32| seen.borrow_mut().push(*value)
    });

    signal.set(1);
    sub.cancel();
    signal.set(2);

    assert_eq!(*seen.borrow(), vec![1]);
    assert_eq!(signal.subscriber_count(), 0);
  }

  #[test]
  fn subscriber_cancelled_mid_publish_is_skipped() {
    let signal = Signal::new(0);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let second: Rc<RefCell<Option<crate::Subscription>>> = Rc::new(RefCell::new(None));

    let _first = signal.subscribe({
      let second = second.clone();
      let seen = seen.clone();
      move |_: &i32| {
        seen.borrow_mut().push("first");
        if let Some(sub) = second.borrow().as_ref() {
          sub.cancel();
        }
      }
    });
    *second.borrow_mut() = Some(signal.subscribe({
      let seen = seen.clone();
      move |_: &i32| seen.borrow_mut().push("second")
    }));

    signal.set(1);
    assert_eq!(*seen.borrow(), vec!["first"]);
  }

  #[test]
  fn reentrant_set_delivers_latest_value() {
    let signal = Signal::new(0);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let _bump = signal.subscribe({
      let signal = signal.clone();
      move |value: &i32| {
        if *value == 1 {
          signal.set(2);
        }
      }
    });
    let _record = signal.subscribe({
      let seen = seen.clone();
      move |value: &i32| seen.borrow_mut().push(*value)
    });

    signal.set(1);
    // The nested publish records 2, then the outer publish reads the current
    // value again instead of the stale 1.
    assert_eq!(*seen.borrow(), vec![2, 2]);
  }
}
