//! Lazily created, shareable channels.
//!
//! A [`ToolChannelHolder`] owns the recipe for one channel and builds it on
//! first use. Reads after that are lock free.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use smg_grpc_bridge::{BridgeChannel, GrpcChannelOptions};
use tracing::info;

use crate::error::{RegistryError, RegistryResult};

/// A connection tools are invoked over.
pub trait ToolChannel: Send + Sync + 'static {
    /// Release the underlying connection. Called at most once per channel.
    fn shutdown(&self);
}

impl ToolChannel for BridgeChannel {
    fn shutdown(&self) {
        self.close();
    }
}

/// Builds a channel from a target address and string options.
pub type ChannelFactory<C> =
    Arc<dyn Fn(&str, &HashMap<String, String>) -> RegistryResult<C> + Send + Sync>;

/// Factory for lazily connecting gRPC channels.
pub fn grpc_channel_factory() -> ChannelFactory<BridgeChannel> {
    Arc::new(
        |target: &str, options: &HashMap<String, String>| -> RegistryResult<BridgeChannel> {
            let options = GrpcChannelOptions::parse(options)?;
            Ok(BridgeChannel::connect_lazy(target, &options)?)
        },
    )
}

pub struct ToolChannelHolder<C: ToolChannel> {
    factory: ChannelFactory<C>,
    target: String,
    options: HashMap<String, String>,
    channel: ArcSwapOption<C>,
    init_lock: Mutex<()>,
    closed: AtomicBool,
}

impl<C: ToolChannel> ToolChannelHolder<C> {
    pub fn new(
        factory: ChannelFactory<C>,
        target: impl Into<String>,
        options: HashMap<String, String>,
    ) -> Self {
        Self {
            factory,
            target: target.into(),
            options,
            channel: ArcSwapOption::empty(),
            init_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn options(&self) -> &HashMap<String, String> {
        &self.options
    }

    /// Whether the channel has been built.
    pub fn is_created(&self) -> bool {
        self.channel.load().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The channel, built on the first call. Concurrent first calls build it once.
    pub fn get(&self) -> RegistryResult<Arc<C>> {
        if let Some(channel) = self.channel.load_full() {
            return Ok(channel);
        }

        let _guard = self.init_lock.lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(RegistryError::ChannelClosed(self.target.clone()));
        }
        if let Some(channel) = self.channel.load_full() {
            return Ok(channel);
        }

        let channel = Arc::new((self.factory)(&self.target, &self.options)?);
        self.channel.store(Some(Arc::clone(&channel)));
        info!(address = %self.target, "Created tool channel");
        Ok(channel)
    }

    /// Shut the channel down if it was built. Later calls are no-ops and
    /// [`get`](Self::get) fails from now on.
    pub fn close(&self) {
        let _guard = self.init_lock.lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(channel) = self.channel.swap(None) {
            channel.shutdown();
            info!(address = %self.target, "Closed tool channel");
        }
    }
}

impl<C: ToolChannel> fmt::Debug for ToolChannelHolder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolChannelHolder")
            .field("target", &self.target)
            .field("created", &self.is_created())
            .field("closed", &self.is_closed())
            .finish()
    }
}
