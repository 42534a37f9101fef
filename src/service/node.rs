//! Node instance and channel registry.
//!
//! [`RelayNode`] is the process-wide handle the surrounding application
//! creates once: it stores the YP announce endpoint and owns the map
//! from channel id to [`Channel`] handle. Starting a relay is
//! idempotent: asking again for a channel that is already relaying
//! returns the existing handle.

use crate::service::channel::{Channel, ChannelStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Default YP announce port.
pub const DEFAULT_YP_PORT: u16 = 7144;

struct NodeInner {
    yp_address: String,
    yp_port: u16,
    channels: HashMap<String, Arc<Channel>>,
}

/// A media-relay node instance.
pub struct RelayNode {
    inner: Mutex<NodeInner>,
}

impl Default for RelayNode {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayNode {
    pub fn new() -> Self {
        RelayNode {
            inner: Mutex::new(NodeInner {
                yp_address: String::new(),
                yp_port: DEFAULT_YP_PORT,
                channels: HashMap::new(),
            }),
        }
    }

    /// Set the YP announce endpoint. Stored as-is; validation is the
    /// announcer's concern.
    pub fn set_yp(&self, address: &str, port: u16) {
        let mut inner = self.lock();
        inner.yp_address = address.to_string();
        inner.yp_port = port;
        info!(address, port, "yp endpoint updated");
    }

    pub fn yp_address(&self) -> String {
        self.lock().yp_address.clone()
    }

    pub fn yp_port(&self) -> u16 {
        self.lock().yp_port
    }

    /// Start relaying `channel_id`, or return the existing handle when a
    /// relay for that id is already held.
    pub fn relay(&self, channel_id: &str) -> Arc<Channel> {
        let mut inner = self.lock();
        if let Some(existing) = inner.channels.get(channel_id) {
            debug!(channel_id, "relay already held");
            return Arc::clone(existing);
        }
        let channel = Arc::new(Channel::new(channel_id, ChannelStatus::Searching));
        inner
            .channels
            .insert(channel_id.to_string(), Arc::clone(&channel));
        info!(channel_id, "relay started");
        channel
    }

    /// Look up an existing channel handle.
    pub fn channel(&self, channel_id: &str) -> Option<Arc<Channel>> {
        self.lock().channels.get(channel_id).cloned()
    }

    /// Status of a channel, [`ChannelStatus::NoChannel`] when the id is
    /// unknown.
    pub fn channel_status(&self, channel_id: &str) -> ChannelStatus {
        match self.lock().channels.get(channel_id) {
            Some(channel) => channel.status(),
            None => ChannelStatus::NoChannel,
        }
    }

    /// Drop all channel handles held by the node. Channels stay alive
    /// for as long as callers hold their own `Arc`s; sinks on channels
    /// released here get their close callback.
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        let count = inner.channels.len();
        inner.channels.clear();
        info!(channels = count, "node shut down");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NodeInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
