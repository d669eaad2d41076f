//! Command lookup and views for an external UI transport.
//!
//! The transport itself lives elsewhere; it hands [`UiRequest`]s to a
//! [`UiDispatcher`] and serializes the [`UiResponse`].

use shared::{
    domain::CallbackId,
    error::{ApiError, ErrorCode},
    protocol::{CallbackView, UiRequest, UiResponse},
};
use tracing::{debug, warn};

use crate::callback::Handle;

pub struct UiDispatcher {
    callbacks: Vec<Handle>,
}

impl UiDispatcher {
    pub fn new(callbacks: Vec<Handle>) -> Self {
        Self { callbacks }
    }

    pub fn views(&self) -> Vec<CallbackView> {
        self.callbacks.iter().map(Handle::view).collect()
    }

    pub fn view(&self, id: CallbackId) -> Option<CallbackView> {
        self.find(id).map(Handle::view)
    }

    pub fn handle(&self, request: UiRequest) -> UiResponse {
        match request {
            UiRequest::ListCallbacks => UiResponse::Callbacks(self.views()),
            UiRequest::GetCallbackData { id } => match self.view(id) {
                Some(view) => UiResponse::Callback(view),
                None => UiResponse::Error(unknown_callback(id)),
            },
            UiRequest::Invoke { id, command } => match self.invoke(id, &command) {
                Ok(view) => UiResponse::Callback(view),
                Err(error) => UiResponse::Error(error),
            },
        }
    }

    /// Fires the named command of one callback and returns its refreshed
    /// view. `get_cb_data` only returns the view.
    pub fn invoke(&self, id: CallbackId, command: &str) -> Result<CallbackView, ApiError> {
        let callback = self.find(id).ok_or_else(|| unknown_callback(id))?;
        if command == "get_cb_data" {
            return Ok(callback.view());
        }

        let target = callback
            .commands()
            .and_then(|group| group.get_command(command))
            .ok_or_else(|| {
                ApiError::not_found(format!(
                    "callback `{}` has no command `{command}`",
                    callback.name()
                ))
            })?;
        debug!(plugin = %callback.name(), command, "invoking command from ui");
        if let Err(error) = target.fire() {
            warn!(plugin = %callback.name(), command, error = %format!("{error:#}"), "ui command failed");
            return Err(ApiError::new(ErrorCode::Internal, format!("{error:#}")));
        }
        Ok(callback.view())
    }

    fn find(&self, id: CallbackId) -> Option<&Handle> {
        self.callbacks.iter().find(|callback| callback.id() == id)
    }
}

fn unknown_callback(id: CallbackId) -> ApiError {
    ApiError::not_found(format!("no callback with id {}", id.0))
}

#[cfg(test)]
#[path = "tests/ui_tests.rs"]
mod tests;
