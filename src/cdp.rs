//! Chrome DevTools Protocol capture backend
//!
//! Uses the `headless_chrome` crate: one shared browser process, one fresh
//! tab per capture. The browser handle is internally reference counted, so
//! concurrent captures can each drive their own tab.

use crate::engine::{EngineDriver, EngineLauncher};
use crate::{CaptureTarget, Error, Result, ServiceConfig, Viewport};
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use log::warn;
use std::sync::Arc;
use std::time::Duration;

/// Launches headless Chrome instances for the engine handle.
pub struct CdpLauncher {
    viewport: Viewport,
    user_agent: String,
}

impl CdpLauncher {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            viewport: config.viewport,
            user_agent: config.user_agent.clone(),
        }
    }
}

impl EngineLauncher for CdpLauncher {
    fn launch(&self) -> Result<Arc<dyn EngineDriver>> {
        // Captures only ever visit operator-configured targets, so the
        // Chrome sandbox stays off (containers rarely allow it anyway).
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .window_size(Some((self.viewport.width, self.viewport.height)))
            .build()
            .map_err(|e| Error::EngineStart(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::EngineStart(format!("Failed to launch browser: {}", e)))?;

        Ok(Arc::new(CdpDriver {
            browser,
            user_agent: self.user_agent.clone(),
        }))
    }
}

/// CDP-based engine driver (one live Chrome process).
pub struct CdpDriver {
    browser: Browser,
    user_agent: String,
}

impl EngineDriver for CdpDriver {
    fn capture(&self, target: &CaptureTarget) -> Result<Vec<u8>> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| Error::Capture(format!("Failed to create tab: {}", e)))?;

        tab.set_user_agent(&self.user_agent, None, None)
            .map_err(|e| Error::Capture(format!("Failed to set user agent: {}", e)))?;

        // Navigation gets the longer timeout, element waits the shorter one.
        tab.set_default_timeout(Duration::from_millis(target.navigation_timeout_ms));
        tab.navigate_to(&target.url)
            .map_err(|e| Error::Capture(format!("Navigation failed: {}", e)))?;
        tab.wait_until_navigated()
            .map_err(|e| Error::Capture(format!("Wait for navigation failed: {}", e)))?;
        tab.set_default_timeout(Duration::from_millis(target.timeout_ms));

        if let Some(wait_ms) = target.wait_for_ms {
            std::thread::sleep(Duration::from_millis(wait_ms));
        }

        let data = if let Some(selector) = &target.selector {
            let element = tab
                .wait_for_element(selector)
                .map_err(|_| Error::TargetNotFound(selector.clone()))?;
            element
                .capture_screenshot(Page::CaptureScreenshotFormatOption::Png)
                .map_err(|e| Error::Capture(format!("Element screenshot failed: {}", e)))?
        } else if target.full_page {
            let body = tab
                .wait_for_element("body")
                .map_err(|_| Error::TargetNotFound("body".to_string()))?;
            body.capture_screenshot(Page::CaptureScreenshotFormatOption::Png)
                .map_err(|e| Error::Capture(format!("Full page screenshot failed: {}", e)))?
        } else {
            tab.capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
                .map_err(|e| Error::Capture(format!("Screenshot failed: {}", e)))?
        };

        if let Err(e) = tab.close(true) {
            warn!("Failed to close tab: {}", e);
        }

        Ok(data)
    }

    fn close(&self) -> Result<()> {
        // Dropping the last browser handle terminates the child process;
        // nothing to flush beyond that.
        Ok(())
    }
}
