use base64::engine::general_purpose::STANDARD as Base64;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, Headers, SetExtraHttpHeadersParams,
    SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{NavigateParams, SetBypassCspParams};
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::SessionError;

struct SessionInner {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

/// Exclusive owner of one browser process (or remote attachment) and the
/// single page that drives one logical client. Created by [`launch`], torn
/// down by [`close`]; `close` is safe to call at any point, any number of
/// times, including while an initialize is still in flight elsewhere.
///
/// [`launch`]: BrowserSession::launch
/// [`close`]: BrowserSession::close
pub struct BrowserSession {
    inner: Mutex<Option<SessionInner>>,
    cancel: CancellationToken,
}

impl BrowserSession {
    /// Launch a local browser over the configured profile, or attach to a
    /// running one when a websocket endpoint is configured. Exactly one of
    /// the two happens. Failures carry the underlying error text
    /// uninterpreted; no retry at this layer.
    pub async fn launch(config: &SessionConfig) -> Result<Self, SessionError> {
        let (browser, mut handler) = if let Some(ws) = &config.browser_ws_url {
            info!(endpoint = %ws, "attaching to running browser");
            Browser::connect(ws.clone())
                .await
                .map_err(|err| SessionError::Launch(err.to_string()))?
        } else {
            let mut builder = BrowserConfig::builder();
            if !config.headless {
                builder = builder.with_head();
            }
            if let Some(dir) = &config.data_dir {
                builder = builder.user_data_dir(dir);
            }
            if let Some(exe) = &config.executable {
                builder = builder.chrome_executable(exe);
            }
            builder = builder.window_size(config.viewport.width, config.viewport.height);
            for arg in config.launch_args() {
                builder = builder.arg(arg);
            }
            let browser_config = builder.build().map_err(SessionError::Launch)?;
            info!(
                profile = ?config.data_dir,
                headless = config.headless,
                "launching browser"
            );
            Browser::launch(browser_config)
                .await
                .map_err(|err| SessionError::Launch(err.to_string()))?
        };

        let cancel = CancellationToken::new();
        let drain_cancel = cancel.clone();
        let handler_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = drain_cancel.cancelled() => break,
                    event = handler.next() => match event {
                        Some(Ok(_)) => {}
                        Some(Err(err)) => debug!(error = %err, "browser handler error"),
                        None => break,
                    },
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(SessionError::from_cdp)?;
        apply_page_overrides(&page, config).await?;

        Ok(Self {
            inner: Mutex::new(Some(SessionInner {
                browser,
                page,
                handler_task,
            })),
            cancel,
        })
    }

    /// Handle to the single page driving this session.
    pub async fn page(&self) -> Result<Page, SessionError> {
        self.inner
            .lock()
            .await
            .as_ref()
            .map(|inner| inner.page.clone())
            .ok_or(SessionError::TargetClosed)
    }

    pub async fn is_open(&self) -> bool {
        self.inner.lock().await.is_some()
    }

    /// Navigate the page to `url`, optionally with a referrer, and wait for
    /// the load to settle.
    pub async fn navigate(&self, url: &str, referrer: Option<&str>) -> Result<(), SessionError> {
        let page = self.page().await?;
        let mut builder = NavigateParams::builder().url(url);
        if let Some(referrer) = referrer {
            builder = builder.referrer(referrer);
        }
        let params = builder.build().map_err(SessionError::Config)?;
        page.goto(params).await.map_err(SessionError::from_cdp)?;
        page.wait_for_navigation()
            .await
            .map_err(SessionError::from_cdp)?;
        Ok(())
    }

    /// Best-effort teardown. Any in-flight page operation fails with
    /// `TargetClosed` once this runs; a second call is a no-op.
    pub async fn close(&self) {
        let inner = self.inner.lock().await.take();
        self.cancel.cancel();
        let Some(SessionInner {
            mut browser,
            handler_task,
            ..
        }) = inner
        else {
            return;
        };
        if let Err(err) = browser.close().await {
            debug!(error = %err, "browser close reported an error");
        }
        let _ = browser.wait().await;
        let _ = handler_task.await;
        info!("browser session closed");
    }
}

/// User agent, viewport, CSP bypass and extra headers, applied to the page
/// before it navigates anywhere meaningful.
async fn apply_page_overrides(page: &Page, config: &SessionConfig) -> Result<(), SessionError> {
    page.execute(NetworkEnableParams::default())
        .await
        .map_err(SessionError::from_cdp)?;

    if let Some(ua) = &config.user_agent {
        let params = SetUserAgentOverrideParams::builder()
            .user_agent(ua)
            .build()
            .map_err(SessionError::Config)?;
        page.execute(params).await.map_err(SessionError::from_cdp)?;
    }

    let metrics = SetDeviceMetricsOverrideParams::builder()
        .width(config.viewport.width as i64)
        .height(config.viewport.height as i64)
        .device_scale_factor(config.viewport.device_scale_factor)
        .mobile(config.viewport.mobile)
        .build()
        .map_err(SessionError::Config)?;
    page.execute(metrics).await.map_err(SessionError::from_cdp)?;

    if config.bypass_csp {
        page.execute(SetBypassCspParams::new(true))
            .await
            .map_err(SessionError::from_cdp)?;
    }

    if let Some(proxy) = &config.proxy {
        if let (Some(user), Some(pass)) = (&proxy.username, &proxy.password) {
            let token = Base64.encode(format!("{user}:{pass}"));
            let headers = Headers::new(json!({ "Proxy-Authorization": format!("Basic {token}") }));
            page.execute(SetExtraHttpHeadersParams::new(headers))
                .await
                .map_err(SessionError::from_cdp)?;
        }
    }

    Ok(())
}
