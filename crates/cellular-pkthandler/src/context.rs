//! The per-modem context: lifecycle, registration and shared correlation state.
//!
//! ## Locks
//!
//! A [`PacketHandler`] carries two locks with different scopes:
//!
//! - the **request lock** is held by a requester for its whole request,
//!   including the transport send and the response wait, so at most one
//!   request is in flight;
//! - the **slot lock** guards the armed request fields and is only held for
//!   short sections that never send or wait.
//!
//! The response handoff is a capacity-1 channel created per wait. Its sender
//! lives in the slot while a request waits; the delivery thread posts to it
//! without blocking.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cellular_at_core::AtCommandType;
use crossbeam_channel::Sender;
use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::{debug, warn};

use crate::config::PktHandlerConfig;
use crate::error::{PktError, PktResult};
use crate::request::{
    DataPrefixCallback, DataSendPrefixCallback, GenericUrcCallback, InputBufferCallback,
    ResponseCallback, UndefinedRespCallback,
};
use crate::token_table::TokenTable;
use crate::transport::Transport;

// ============================================================================
// Armed Slot
// ============================================================================

/// Everything armed for the request in flight.
///
/// All fields are reset to their defaults when a request resolves, on every
/// exit path.
#[derive(Default)]
pub(crate) struct ArmedSlot {
    /// Command text, for diagnostics.
    pub(crate) command: Option<String>,
    /// Response shape the receive path should expect.
    pub(crate) command_type: AtCommandType,
    /// Expected intermediate line prefix.
    pub(crate) response_prefix: Option<String>,
    /// Response callback.
    pub(crate) callback: Option<ResponseCallback>,
    /// Data receive prefix callback.
    pub(crate) data_prefix: Option<DataPrefixCallback>,
    /// Data send prompt callback.
    pub(crate) data_send_prefix: Option<DataSendPrefixCallback>,
    /// Command-specific success result codes.
    pub(crate) extra_success_tokens: Vec<String>,
    /// Sender half of the current response channel.
    pub(crate) responder: Option<Sender<PktResult<()>>>,
}

/// What the receive path needs to know about the request in flight.
#[derive(Clone, Default)]
pub(crate) struct ReceiveView {
    pub(crate) command_type: AtCommandType,
    pub(crate) response_prefix: Option<String>,
    pub(crate) data_prefix: Option<DataPrefixCallback>,
    pub(crate) data_send_prefix: Option<DataSendPrefixCallback>,
    pub(crate) extra_success_tokens: Vec<String>,
}

#[derive(Default)]
struct RegisteredCallbacks {
    generic_urc: Option<GenericUrcCallback>,
    undefined_resp: Option<UndefinedRespCallback>,
    input_buffer: Option<InputBufferCallback>,
}

// ============================================================================
// Packet Handler
// ============================================================================

/// Correlates AT requests with modem responses and dispatches URCs.
///
/// One instance exists per modem connection and is shared, usually in an
/// [`Arc`], between the requester threads and the single receive thread.
///
/// # Example
///
/// ```rust,ignore
/// let handler = Arc::new(PacketHandler::new(transport, tokens, PktHandlerConfig::default()));
/// handler.validate_token_map()?;
/// handler.init()?;
/// let reader = spawn_reader(Arc::clone(&handler), rx_bytes);
///
/// let req = AtRequest::new("AT+CSQ", AtCommandType::WithPrefix).with_prefix("+CSQ");
/// handler.request(&req)?;
/// ```
pub struct PacketHandler {
    config: PktHandlerConfig,
    tokens: TokenTable,
    transport: Arc<dyn Transport>,
    module_context: Option<Arc<dyn Any + Send + Sync>>,
    active: AtomicBool,
    pub(crate) request_lock: Mutex<()>,
    slot: Mutex<ArmedSlot>,
    callbacks: RwLock<RegisteredCallbacks>,
}

impl PacketHandler {
    /// Create a context. It must be initialized with [`PacketHandler::init`]
    /// before use.
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: TokenTable,
        config: PktHandlerConfig,
    ) -> Self {
        PacketHandler {
            config,
            tokens,
            transport,
            module_context: None,
            active: AtomicBool::new(false),
            request_lock: Mutex::new(()),
            slot: Mutex::new(ArmedSlot::default()),
            callbacks: RwLock::new(RegisteredCallbacks::default()),
        }
    }

    /// Attach modem-specific state that URC handlers can reach through
    /// [`PacketHandler::module_context`].
    pub fn with_module_context<T: Any + Send + Sync>(mut self, context: Arc<T>) -> Self {
        let context: Arc<dyn Any + Send + Sync> = context;
        self.module_context = Some(context);
        self
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Bring the context up.
    ///
    /// Fails with [`PktError::Failure`] if it is already initialized.
    pub fn init(&self) -> PktResult<()> {
        if self.active.swap(true, Ordering::AcqRel) {
            warn!("Packet handler already initialized");
            return Err(PktError::Failure);
        }
        *self.slot.lock() = ArmedSlot::default();
        debug!("Packet handler initialized");
        Ok(())
    }

    /// Tear the context down after any request in flight resolves.
    pub fn cleanup(&self) -> PktResult<()> {
        self.ensure_active()?;
        let _request = self.request_lock.lock();
        self.active.store(false, Ordering::Release);
        *self.slot.lock() = ArmedSlot::default();
        debug!("Packet handler cleaned up");
        Ok(())
    }

    /// Whether [`PacketHandler::init`] has run without a matching cleanup.
    pub fn is_initialized(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_active(&self) -> PktResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(PktError::InvalidHandle)
        }
    }

    /// Check the URC token map ordering. Call once before traffic starts.
    pub fn validate_token_map(&self) -> PktResult<()> {
        self.tokens.urc_map.validate()
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Configuration in use.
    pub fn config(&self) -> &PktHandlerConfig {
        &self.config
    }

    /// Token tables in use.
    pub fn tokens(&self) -> &TokenTable {
        &self.tokens
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// The module context, if one of type `T` was attached.
    pub fn module_context<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.module_context.clone()?.downcast::<T>().ok()
    }

    /// Command text of the request in flight.
    pub fn current_command(&self) -> Option<String> {
        self.slot.lock().command.clone()
    }

    /// Response shape of the request in flight.
    pub fn current_command_type(&self) -> AtCommandType {
        self.slot.lock().command_type
    }

    /// Whether any callback or response channel is currently armed.
    pub fn is_armed(&self) -> bool {
        let slot = self.slot.lock();
        slot.callback.is_some()
            || slot.data_prefix.is_some()
            || slot.data_send_prefix.is_some()
            || slot.responder.is_some()
            || !slot.extra_success_tokens.is_empty()
    }

    pub(crate) fn lock_slot(&self) -> MutexGuard<'_, ArmedSlot> {
        self.slot.lock()
    }

    pub(crate) fn receive_view(&self) -> ReceiveView {
        let slot = self.slot.lock();
        ReceiveView {
            command_type: slot.command_type,
            response_prefix: slot.response_prefix.clone(),
            data_prefix: slot.data_prefix.clone(),
            data_send_prefix: slot.data_send_prefix.clone(),
            extra_success_tokens: slot.extra_success_tokens.clone(),
        }
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Install or clear the fallback for unmapped URCs.
    pub fn register_generic_urc_callback(
        &self,
        callback: Option<GenericUrcCallback>,
    ) -> PktResult<()> {
        self.ensure_active()?;
        self.callbacks.write().generic_urc = callback;
        Ok(())
    }

    /// Install or clear the callback for undefined lines.
    pub fn register_undefined_resp_callback(
        &self,
        callback: Option<UndefinedRespCallback>,
    ) -> PktResult<()> {
        self.ensure_active()?;
        self.callbacks.write().undefined_resp = callback;
        Ok(())
    }

    /// Install or clear the raw receive buffer hook.
    pub fn register_input_buffer_callback(
        &self,
        callback: Option<InputBufferCallback>,
    ) -> PktResult<()> {
        self.ensure_active()?;
        self.callbacks.write().input_buffer = callback;
        Ok(())
    }

    pub(crate) fn generic_urc_callback(&self) -> Option<GenericUrcCallback> {
        self.callbacks.read().generic_urc.clone()
    }

    pub(crate) fn undefined_resp_callback(&self) -> Option<UndefinedRespCallback> {
        self.callbacks.read().undefined_resp.clone()
    }

    pub(crate) fn input_buffer_callback(&self) -> Option<InputBufferCallback> {
        self.callbacks.read().input_buffer.clone()
    }
}
