/*!
Change propagation primitives for tablo.

- [`Broadcast`](broadcast::Broadcast) fans a value out to listeners synchronously, in subscription
  order. Listeners are unsubscribed by dropping the [`ListenerGuard`](broadcast::ListenerGuard)
  returned from `listen`.
- [`Memo`](memo::Memo) caches one computed value per key.

```rust
use tablo_signals::{Broadcast, Memo};

let changes = Broadcast::<u64>::new();
let memo: Memo<u64, String> = Memo::new();
let _guard = {
    let memo = memo.clone();
    changes.reference().listen(move |_: u64| memo.invalidate())
};

assert_eq!(memo.get_or_compute(1, |v| v.to_string()), "1");
changes.send(2);
assert!(!memo.is_cached());
```
*/

pub mod broadcast;
pub mod memo;

pub use broadcast::{Broadcast, IntoListener, Listener, ListenerGuard, Subscription};
pub use memo::Memo;
