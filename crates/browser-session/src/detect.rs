use std::future::Future;
use std::time::Duration;

use chromiumoxide::Page;
use tracing::debug;

use chatpilot_core_types::AuthState;

use crate::error::SessionError;
use crate::wait::wait_for_selector;

/// Marker selectors the detector races. The post-login marker doubles as the
/// login flow's terminal confirmation signal.
#[derive(Clone, Debug)]
pub struct DetectorSelectors {
    pub authenticated_marker: String,
    pub qr_marker: String,
}

impl Default for DetectorSelectors {
    fn default() -> Self {
        Self {
            authenticated_marker: "[data-chat-list]".to_string(),
            qr_marker: "div[data-ref]".to_string(),
        }
    }
}

/// Race two marker waits; the first to settle, successfully or not, decides
/// the outcome. The loser keeps running detached and its result is ignored —
/// it is abandoned, not cancelled.
pub async fn race_auth<A, B>(marker: A, qr: B) -> Result<AuthState, SessionError>
where
    A: Future<Output = Result<(), SessionError>> + Send + 'static,
    B: Future<Output = Result<(), SessionError>> + Send + 'static,
{
    let marker = tokio::spawn(marker);
    let qr = tokio::spawn(qr);
    tokio::select! {
        res = marker => match res {
            Ok(Ok(())) => Ok(AuthState::Authenticated),
            Ok(Err(err)) => Err(err),
            Err(join) => Err(SessionError::Cdp(join.to_string())),
        },
        res = qr => match res {
            Ok(Ok(())) => Ok(AuthState::NeedsInteractiveAuth),
            Ok(Err(err)) => Err(err),
            Err(join) => Err(SessionError::Cdp(join.to_string())),
        },
    }
}

/// Tri-state page-state detection: authenticated, needs interactive auth, or
/// the first-settled error.
pub async fn detect_auth_state(
    page: &Page,
    selectors: &DetectorSelectors,
    timeout: Duration,
) -> Result<AuthState, SessionError> {
    let marker_page = page.clone();
    let marker_selector = selectors.authenticated_marker.clone();
    let qr_page = page.clone();
    let qr_selector = selectors.qr_marker.clone();

    let outcome = race_auth(
        async move {
            wait_for_selector(&marker_page, &marker_selector, timeout)
                .await
                .map(|_| ())
        },
        async move {
            wait_for_selector(&qr_page, &qr_selector, timeout)
                .await
                .map(|_| ())
        },
    )
    .await?;

    debug!(?outcome, "page state detected");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test(flavor = "multi_thread")]
    async fn first_success_wins() {
        let outcome = race_auth(
            async {
                sleep(Duration::from_millis(5)).await;
                Ok(())
            },
            async {
                sleep(Duration::from_secs(5)).await;
                Ok(())
            },
        )
        .await
        .unwrap();
        assert_eq!(outcome, AuthState::Authenticated);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn qr_side_winning_flags_interactive_auth() {
        let outcome = race_auth(
            async {
                sleep(Duration::from_secs(5)).await;
                Ok(())
            },
            async { Ok(()) },
        )
        .await
        .unwrap();
        assert_eq!(outcome, AuthState::NeedsInteractiveAuth);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn winner_decides_even_if_loser_would_error() {
        let outcome = race_auth(
            async { Ok(()) },
            async {
                sleep(Duration::from_secs(5)).await;
                Err(SessionError::TargetClosed)
            },
        )
        .await
        .unwrap();
        assert_eq!(outcome, AuthState::Authenticated);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn first_error_propagates() {
        let result = race_auth(
            async {
                sleep(Duration::from_secs(5)).await;
                Ok(())
            },
            async {
                Err(SessionError::SelectorTimeout {
                    selector: "qr".to_string(),
                    timeout: Duration::from_millis(1),
                })
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(SessionError::SelectorTimeout { .. })
        ));
    }
}
