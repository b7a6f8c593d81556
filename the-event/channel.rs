use std::{
  cell::RefCell,
  fmt,
  hash::Hash,
  rc::{
    Rc,
    Weak,
  },
};

use foldhash::fast::RandomState;
use hashbrown::HashMap;

use crate::{
  Subscription,
  subscribers::{
    self,
    SharedList,
  },
};

/// Broadcast channel: every event reaches every subscriber.
pub struct Channel<E: ?Sized> {
  subscribers: SharedList<dyn Fn(&E)>,
}

impl<E: ?Sized> Clone for Channel<E> {
  fn clone(&self) -> Self {
    Self {
      subscribers: Rc::clone(&self.subscribers),
    }
  }
}

impl<E: ?Sized + 'static> Default for Channel<E> {
  fn default() -> Self {
    Self::new()
  }
}

impl<E: ?Sized + 'static> Channel<E> {
  pub fn new() -> Self {
    Self {
      subscribers: Rc::default(),
    }
  }

  pub fn subscribe(&self, callback: impl Fn(&E) + 'static) -> Subscription {
    let callback: Rc<dyn Fn(&E)> = Rc::new(callback);
    subscribers::subscribe(&self.subscribers, callback)
  }

  /// Deliver `event` to every subscriber, returning how many ran.
  pub fn publish(&self, event: &E) -> usize {
    subscribers::publish(&self.subscribers, |callback| callback(event))
  }

  pub fn subscriber_count(&self) -> usize {
    self.subscribers.borrow().len()
  }
}

impl<E: ?Sized> fmt::Debug for Channel<E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Channel")
      .field("subscribers", &self.subscribers.borrow().len())
      .finish()
  }
}

type KeyMap<K, E> = HashMap<K, SharedList<dyn Fn(&E)>, RandomState>;

/// Channel that routes each event to the subscribers of one key.
///
/// Publishing to a key nobody subscribed to is not an error: the event is
/// dropped and `publish` returns 0.
pub struct KeyedChannel<K, E: ?Sized> {
  routes: Rc<RefCell<KeyMap<K, E>>>,
}

impl<K, E: ?Sized> Clone for KeyedChannel<K, E> {
  fn clone(&self) -> Self {
    Self {
      routes: Rc::clone(&self.routes),
    }
  }
}

impl<K, E> Default for KeyedChannel<K, E>
where
  K: Eq + Hash + Clone + 'static,
  E: ?Sized + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<K, E> KeyedChannel<K, E>
where
  K: Eq + Hash + Clone + 'static,
  E: ?Sized + 'static,
{
  pub fn new() -> Self {
    Self {
      routes: Rc::new(RefCell::new(HashMap::default())),
    }
  }

  pub fn subscribe(&self, key: K, callback: impl Fn(&E) + 'static) -> Subscription {
    let callback: Rc<dyn Fn(&E)> = Rc::new(callback);
    let list = Rc::clone(
      self
        .routes
        .borrow_mut()
        .entry(key.clone())
        .or_insert_with(Rc::default),
    );
    let id = list.borrow_mut().insert(callback);

    let routes: Weak<RefCell<KeyMap<K, E>>> = Rc::downgrade(&self.routes);
    Subscription::new(move || {
      list.borrow_mut().remove(id);
      if !list.borrow().is_empty() {
        return;
      }
      if let Some(routes) = routes.upgrade() {
        let mut routes = routes.borrow_mut();
        // Only drop the bucket if it is still the one this subscription used.
        if routes
          .get(&key)
          .is_some_and(|current| Rc::ptr_eq(current, &list))
        {
          routes.remove(&key);
        }
      }
    })
  }

  /// Deliver `event` to the subscribers of `key`, returning how many ran.
  pub fn publish<Q>(&self, key: &Q, event: &E) -> usize
  where
    K: std::borrow::Borrow<Q>,
    Q: Eq + Hash + ?Sized,
  {
    let list = self.routes.borrow().get(key).cloned();
    match list {
      Some(list) => subscribers::publish(&list, |callback| callback(event)),
      None => 0,
    }
  }

  pub fn subscriber_count<Q>(&self, key: &Q) -> usize
  where
    K: std::borrow::Borrow<Q>,
    Q: Eq + Hash + ?Sized,
  {
    self
      .routes
      .borrow()
      .get(key)
      .map_or(0, |list| list.borrow().len())
  }

  /// Number of keys with at least one subscriber.
  pub fn key_count(&self) -> usize {
    self.routes.borrow().len()
  }
}

impl<K, E: ?Sized> fmt::Debug for KeyedChannel<K, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("KeyedChannel")
      .field("keys", &self.routes.borrow().len())
      .finish()
  }
}
