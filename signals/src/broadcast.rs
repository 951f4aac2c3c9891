use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use tracing::trace;

/// A callback registered on a [`Broadcast`].
#[derive(Clone)]
pub enum Listener<T = ()> {
    /// Receives the sent value
    Value(Arc<dyn Fn(T) + Send + Sync + 'static>),
    /// Only learns that something was sent. Works with any payload type.
    Ping(Arc<dyn Fn() + Send + Sync + 'static>),
}

impl<T> Listener<T> {
    fn call(&self, value: T) {
        match self {
            Listener::Value(callback) => callback(value),
            Listener::Ping(callback) => callback(),
        }
    }
}

/// Conversion into a [`Listener`].
pub trait IntoListener<T> {
    fn into_listener(self) -> Listener<T>;
}

/// Synchronous fan-out of change notifications.
///
/// Listeners run on the sending thread in the order they subscribed, after the listener table
/// lock is released. A listener may subscribe or unsubscribe others while it runs; the change
/// takes effect from the next send.
#[derive(Clone)]
pub struct Broadcast<T = ()>(Arc<Inner<T>>);

struct Inner<T> {
    listeners: RwLock<BTreeMap<u64, Listener<T>>>,
    next_id: AtomicU64,
}

impl<T> std::fmt::Debug for Broadcast<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcast").field("listeners", &self.listener_count()).finish()
    }
}

/// Subscribe-only access to a broadcast
pub struct Ref<'a, T>(&'a Broadcast<T>);

/// Keeps one listener subscribed. Dropping the guard unsubscribes it.
/// The guard does not keep the broadcast alive.
pub struct ListenerGuard<T = ()> {
    inner: Weak<Inner<T>>,
    id: u64,
}

impl<T> ListenerGuard<T> {
    /// Whether the broadcast this guard listens to still exists
    pub fn is_live(&self) -> bool { self.inner.strong_count() > 0 }
}

impl<T> std::fmt::Debug for ListenerGuard<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerGuard").field("id", &self.id).field("live", &self.is_live()).finish()
    }
}

/// A subscription held only for its lifetime, whatever the payload type of the broadcast behind it.
/// Sources hand these out so a view can hold subscriptions to several broadcasts in one list.
pub trait Subscription: Send + Sync {}

impl<T> Subscription for ListenerGuard<T> {}

impl<T> Default for Broadcast<T>
where T: Clone
{
    fn default() -> Self { Self::new() }
}

impl<T> Broadcast<T> {
    pub fn listener_count(&self) -> usize { self.0.listeners.read().unwrap().len() }

    pub fn reference(&self) -> Ref<'_, T> { Ref(self) }
}

impl<T> Broadcast<T>
where T: Clone
{
    pub fn new() -> Self { Self(Arc::new(Inner { listeners: RwLock::new(BTreeMap::new()), next_id: AtomicU64::new(0) })) }

    /// Deliver `value` to every current listener and return how many were reached
    pub fn send(&self, value: T) -> usize {
        let listeners: Vec<Listener<T>> = self.0.listeners.read().unwrap().values().cloned().collect();
        trace!("Broadcast: notifying {} listeners", listeners.len());

        let Some((last, rest)) = listeners.split_last() else { return 0 };
        for listener in rest {
            listener.call(value.clone());
        }
        last.call(value);
        listeners.len()
    }
}

impl<T> Ref<'_, T> {
    pub fn listen<L>(&self, listener: L) -> ListenerGuard<T>
    where L: IntoListener<T> {
        let inner = &self.0.0;
        let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
        inner.listeners.write().unwrap().insert(id, listener.into_listener());
        ListenerGuard { inner: Arc::downgrade(inner), id }
    }
}

impl<T> Drop for ListenerGuard<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.listeners.write().unwrap().remove(&self.id);
        }
    }
}

impl<F, T> IntoListener<T> for F
where F: Fn(T) + Send + Sync + 'static
{
    fn into_listener(self) -> Listener<T> { Listener::Value(Arc::new(self)) }
}

impl<T> IntoListener<T> for Listener<T> {
    fn into_listener(self) -> Listener<T> { self }
}

impl<T> IntoListener<T> for Arc<dyn Fn() + Send + Sync + 'static> {
    fn into_listener(self) -> Listener<T> { Listener::Ping(self) }
}

impl<T> IntoListener<T> for std::sync::mpsc::Sender<T>
where T: Send + Sync + 'static
{
    fn into_listener(self) -> Listener<T> {
        Listener::Value(Arc::new(move |value| {
            // the receiver is gone once nobody watches anymore
            let _ = self.send(value);
        }))
    }
}
