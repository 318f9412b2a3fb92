//! Command name to handler mapping.

use std::collections::HashMap;
use std::sync::Arc;

use activesync_types::{Command, ProtocolError};
use async_trait::async_trait;
use bytes::BytesMut;

use crate::context::RequestContext;
use crate::error::AppResult;

/// What a handler produced besides its body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// WBXML (or multipart) body; the flag is the handler's success result
    Completed(bool),
    /// Non-WBXML body, e.g. raw attachment bytes
    ContentType(String),
}

/// Executes one ActiveSync command.
///
/// Response headers are already fixed when `handle` runs; it only writes the body.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(
        &self,
        ctx: &mut RequestContext,
        request: &[u8],
        response: &mut BytesMut,
    ) -> AppResult<HandlerOutcome>;
}

/// Handlers keyed by command family.
#[derive(Clone, Default)]
pub struct CommandRouter {
    handlers: HashMap<Command, Arc<dyn CommandHandler>>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `command`'s family. Registering `FolderUpdate`
    /// therefore also serves `FolderCreate` and `FolderDelete`.
    pub fn register(mut self, command: Command, handler: Arc<dyn CommandHandler>) -> Self {
        self.handlers.insert(command.handler_family(), handler);
        self
    }

    pub fn route(&self, command: Command) -> Result<Arc<dyn CommandHandler>, ProtocolError> {
        self.handlers
            .get(&command.handler_family())
            .cloned()
            .ok_or_else(|| ProtocolError::NotImplemented { command: command.to_string() })
    }
}
