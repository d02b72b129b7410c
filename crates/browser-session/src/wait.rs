use std::time::Duration;

use chromiumoxide::element::Element;
use chromiumoxide::Page;
use tokio::time::{sleep, Instant};

use crate::error::SessionError;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bounded wait for a selector to appear. A `timeout` of zero disables the
/// bound entirely (the caller relies on session teardown for cancellation,
/// surfacing here as `TargetClosed`). Failure modes are distinct:
/// `SelectorTimeout` when the element never appears, `TargetClosed` when the
/// page goes away, `Cdp` for anything else fatal.
pub async fn wait_for_selector(
    page: &Page,
    selector: &str,
    timeout: Duration,
) -> Result<Element, SessionError> {
    let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);
    loop {
        match page.find_element(selector).await {
            Ok(element) => return Ok(element),
            Err(err) => {
                let mapped = SessionError::from_cdp(err);
                if mapped.is_abort() {
                    return Err(mapped);
                }
                // not present yet; keep polling
            }
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(SessionError::SelectorTimeout {
                    selector: selector.to_string(),
                    timeout,
                });
            }
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Unbounded wait; cancellation comes only from the session being torn down
/// elsewhere, which call sites treat as a clean abort.
pub async fn wait_for_selector_forever(
    page: &Page,
    selector: &str,
) -> Result<Element, SessionError> {
    wait_for_selector(page, selector, Duration::ZERO).await
}
