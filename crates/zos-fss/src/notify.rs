//! Node event subscriptions.
//!
//! Subscriptions live on the node they watch. Delivery is synchronous: the
//! callback runs on the thread that completed the block I/O, after every
//! cache lock has been released.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::error::{FssError, FssResult};
use crate::node::FileNode;
use crate::types::{EventMask, FileEvent};

/// Callback invoked with the node, the event and the subscriber's context.
pub type NotifyCallback = Arc<dyn Fn(&FileNode, FileEvent, u64) + Send + Sync>;

/// One registered interest in a node's events.
#[derive(Clone)]
pub struct Subscription {
    pub mask: EventMask,
    pub callback: NotifyCallback,
    pub context: u64,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("mask", &self.mask)
            .field("context", &self.context)
            .finish()
    }
}

/// Registration and emit entry points.
pub struct NotifyHub {
    /// Delivery path for subscriptions made through requests
    delivery: Option<NotifyCallback>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    /// Hub without a request delivery path.
    pub fn new() -> Self {
        Self { delivery: None }
    }

    /// Hub that hands request subscriptions to `delivery`.
    pub fn with_delivery(delivery: NotifyCallback) -> Self {
        Self {
            delivery: Some(delivery),
        }
    }

    /// Subscribe `callback` to the events in `mask` on `node`.
    pub fn register(
        &self,
        node: &FileNode,
        mask: EventMask,
        callback: NotifyCallback,
        context: u64,
    ) -> FssResult<()> {
        if mask.is_empty() {
            return Err(FssError::BadArgument);
        }
        node.subscriptions.lock().push(Subscription {
            mask,
            callback,
            context,
        });
        Ok(())
    }

    /// Subscribe the request delivery path.
    pub fn register_delivery(&self, node: &FileNode, mask: EventMask, context: u64) -> FssResult<()> {
        let delivery = self.delivery.clone().ok_or(FssError::NotSupported)?;
        self.register(node, mask, delivery, context)
    }

    /// Remove the events in `mask` from every subscription on `node`.
    ///
    /// Subscriptions left with an empty mask are dropped. Fails with
    /// `NotFound` if no subscription listened for any of them.
    pub fn unregister(&self, node: &FileNode, mask: EventMask) -> FssResult<()> {
        if mask.is_empty() {
            return Err(FssError::BadArgument);
        }
        let mut subscriptions = node.subscriptions.lock();
        let mut touched = false;
        for sub in subscriptions.iter_mut() {
            let remaining = sub.mask.without(mask);
            if remaining != sub.mask {
                touched = true;
                sub.mask = remaining;
            }
        }
        subscriptions.retain(|sub| !sub.mask.is_empty());
        if touched {
            Ok(())
        } else {
            Err(FssError::NotFound)
        }
    }

    /// Deliver `event` to every subscriber of `node` listening for it.
    pub fn emit(&self, node: &FileNode, event: FileEvent) {
        let bit = EventMask::of(event);
        let targets: Vec<Subscription> = node
            .subscriptions
            .lock()
            .iter()
            .filter(|sub| sub.mask.contains(bit))
            .cloned()
            .collect();
        for sub in targets {
            (sub.callback)(node, event, sub.context);
        }
    }

    /// Number of subscriptions on `node`.
    pub fn subscription_count(&self, node: &FileNode) -> usize {
        node.subscriptions.lock().len()
    }
}
