use crate::driver::ChromeDriver;
use anyhow::{anyhow, Result};
use lecture_config::{Credentials, SiteConfig};
use lecture_core::{BrowserHandle, SiteSelectors, StatusSink};
use std::time::Duration;
use tracing::{info, warn};

const LOGIN_FORM_TIMEOUT: Duration = Duration::from_secs(10);
const LOGGED_IN_TIMEOUT: Duration = Duration::from_secs(25);

/// Sign in with the institution code and password.
///
/// Success is the search banner appearing after the form is submitted.
pub async fn login(
    driver: &ChromeDriver,
    credentials: &Credentials,
    site: &SiteConfig,
    status: &dyn StatusSink,
) -> Result<()> {
    let selectors = SiteSelectors::default();
    status.status("Logging in...");

    match submit_login(driver, credentials, site, &selectors).await {
        Ok(()) => {
            info!(operation = "login", "Logged in");
            status.status("Logged in.");
            Ok(())
        }
        Err(e) => {
            warn!(operation = "login", error = %e, "Login failed");
            driver.capture_diagnostics("login_failed").await;
            status.status("Login failed. Check the institution code and password.");
            Err(e)
        }
    }
}

async fn submit_login(
    driver: &ChromeDriver,
    credentials: &Credentials,
    site: &SiteConfig,
    selectors: &SiteSelectors,
) -> Result<()> {
    driver.navigate(&site.login_url).await?;

    let code_input = driver
        .wait_until_visible(selectors.login_code, LOGIN_FORM_TIMEOUT)
        .await?;
    driver.type_into(&code_input, &credentials.institution_code).await?;

    let password_input = driver
        .find_elements(selectors.login_password)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Password field not found on login page"))?;
    driver.type_into(&password_input, &credentials.password).await?;
    driver.press_enter(&password_input).await?;

    info!("Submitted login form, waiting for authentication...");
    driver
        .wait_until_visible(selectors.logged_in_marker, LOGGED_IN_TIMEOUT)
        .await?;
    Ok(())
}
