//! Global key subscriptions.
//!
//! A view that wants to react to a key anywhere on screen holds a
//! [`KeyListener`] from the [`KeyBus`]. The listener is the subscription:
//! rebinding replaces it in place and dropping it removes it, so one listener
//! can never leave more than one live binding behind.

use ratatui::crossterm::event::KeyCode;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::trace;

struct Binding<A> {
  id: u64,
  key: String,
  action: A,
}

struct Registry<A> {
  next_id: u64,
  bindings: Vec<Binding<A>>,
}

impl<A> Registry<A> {
  fn remove(&mut self, id: u64) {
    self.bindings.retain(|b| b.id != id);
  }
}

/// Canonical name of a key, in the style of DOM `KeyboardEvent.code` values.
pub fn key_name(code: KeyCode) -> Option<String> {
  let name = match code {
    KeyCode::Enter => "Enter",
    KeyCode::Esc => "Escape",
    KeyCode::Tab => "Tab",
    KeyCode::Backspace => "Backspace",
    KeyCode::Delete => "Delete",
    KeyCode::Up => "ArrowUp",
    KeyCode::Down => "ArrowDown",
    KeyCode::Left => "ArrowLeft",
    KeyCode::Right => "ArrowRight",
    KeyCode::Home => "Home",
    KeyCode::End => "End",
    KeyCode::PageUp => "PageUp",
    KeyCode::PageDown => "PageDown",
    KeyCode::F(n) => return Some(format!("F{}", n)),
    KeyCode::Char(' ') => "Space",
    KeyCode::Char(c) => return Some(c.to_string()),
    _ => return None,
  };
  Some(name.to_string())
}

/// Dispatches key presses to the listeners subscribed to them.
pub struct KeyBus<A> {
  registry: Rc<RefCell<Registry<A>>>,
}

impl<A: Clone> KeyBus<A> {
  pub fn new() -> Self {
    Self { registry: Rc::new(RefCell::new(Registry { next_id: 0, bindings: Vec::new() })) }
  }

  /// Subscribe `action` to `key` (case-insensitive) until the listener is dropped.
  pub fn listen(&self, key: &str, action: A) -> KeyListener<A> {
    let mut registry = self.registry.borrow_mut();
    let id = registry.next_id;
    registry.next_id += 1;
    registry.bindings.push(Binding { id, key: key.to_lowercase(), action });
    trace!(key, id, "key listener added");
    KeyListener { id, registry: Rc::downgrade(&self.registry) }
  }

  /// Actions of every listener bound to `code`, in subscription order.
  pub fn dispatch(&self, code: KeyCode) -> Vec<A> {
    let Some(name) = key_name(code) else { return Vec::new() };
    let name = name.to_lowercase();
    self.registry.borrow().bindings.iter().filter(|b| b.key == name).map(|b| b.action.clone()).collect()
  }

  /// Number of live subscriptions.
  pub fn active(&self) -> usize {
    self.registry.borrow().bindings.len()
  }
}

impl<A: Clone> Default for KeyBus<A> {
  fn default() -> Self {
    Self::new()
  }
}

/// A live subscription on a [`KeyBus`].
pub struct KeyListener<A> {
  id: u64,
  registry: Weak<RefCell<Registry<A>>>,
}

impl<A> KeyListener<A> {
  /// Point this subscription at a new key or action. The old binding is removed first.
  pub fn rebind(&mut self, key: &str, action: A) {
    let Some(registry) = self.registry.upgrade() else { return };
    let mut registry = registry.borrow_mut();
    registry.remove(self.id);
    let id = registry.next_id;
    registry.next_id += 1;
    registry.bindings.push(Binding { id, key: key.to_lowercase(), action });
    self.id = id;
  }
}

impl<A> Drop for KeyListener<A> {
  fn drop(&mut self) {
    if let Some(registry) = self.registry.upgrade() {
      registry.borrow_mut().remove(self.id);
      trace!(id = self.id, "key listener removed");
    }
  }
}
