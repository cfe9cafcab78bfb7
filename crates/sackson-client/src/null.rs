//! A client with no peer, for tests and tooling.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::{Client, ClientCore, MessageSender, UnregisterSender};

const DEFAULT_CAPACITY: usize = 256;

/// Never sends anything. Messages delivered to it stay in the outbound
/// channel until someone takes it with
/// [`ClientCore::take_outbound`], or are discarded by its write pump.
pub struct NullClient {
    core: ClientCore,
}

impl NullClient {
    pub fn new(game: impl Into<String>) -> Arc<Self> {
        Self::with_capacity(game, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(game: impl Into<String>, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            core: ClientCore::new(game, capacity),
        })
    }
}

impl Client for NullClient {
    fn core(&self) -> &ClientCore {
        &self.core
    }

    fn is_bot(&self) -> bool {
        false
    }

    fn read_pump(
        self: Arc<Self>,
        _messages: MessageSender,
        _unregister: UnregisterSender,
    ) -> BoxFuture<'static, ()> {
        async {}.boxed()
    }

    fn write_pump(self: Arc<Self>) -> BoxFuture<'static, ()> {
        async move {
            if let Some(mut outbound) = self.core.take_outbound() {
                while outbound.recv().await.is_some() {}
            }
        }
        .boxed()
    }
}
