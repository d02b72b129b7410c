use std::pin::Pin;
use std::sync::Arc;

use chromiumoxide::cdp::js_protocol::runtime::{
    AddBindingParams, EnableParams as RuntimeEnableParams, EventBindingCalled,
};
use chromiumoxide::Page;
use futures::{Stream, StreamExt};

use crate::error::SessionError;

/// Stream of payload strings delivered through one named host binding.
/// Page-side code invokes `window.<name>(payload)`; each call surfaces here
/// exactly once, in call order.
pub struct BindingStream {
    name: String,
    events: Pin<Box<dyn Stream<Item = Arc<EventBindingCalled>> + Send>>,
}

impl BindingStream {
    /// Next payload for this binding; other bindings sharing the page are
    /// filtered out. `None` once the page is gone.
    pub async fn next_payload(&mut self) -> Option<String> {
        while let Some(event) = self.events.next().await {
            if event.name == self.name {
                return Some(event.payload.clone());
            }
        }
        None
    }
}

/// Register a host-callable function in the page and return the stream of
/// its invocations. Must run before any in-page code referencing the
/// binding is installed.
pub async fn install_binding(page: &Page, name: &str) -> Result<BindingStream, SessionError> {
    page.execute(RuntimeEnableParams::default())
        .await
        .map_err(SessionError::from_cdp)?;
    let params = AddBindingParams::builder()
        .name(name)
        .build()
        .map_err(SessionError::Config)?;
    page.execute(params).await.map_err(SessionError::from_cdp)?;
    let events = page
        .event_listener::<EventBindingCalled>()
        .await
        .map_err(SessionError::from_cdp)?;
    Ok(BindingStream {
        name: name.to_string(),
        events: Box::pin(events),
    })
}
