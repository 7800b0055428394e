//! ChromiumPage against a real browser.
//!
//! Run with: STEPWRIGHT_USE_REAL_CHROME=1 cargo test -p cdp-adapter --test chromium_page

use std::time::Duration;

use cdp_adapter::{AnchorDescriptor, CdpConfig, ChromiumSession, ClickMode, PageDriver, PageQuery};

fn should_run_chrome_tests() -> bool {
    std::env::var("STEPWRIGHT_USE_REAL_CHROME")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

macro_rules! skip_without_chrome {
    () => {
        if !should_run_chrome_tests() {
            eprintln!("Skipping test: STEPWRIGHT_USE_REAL_CHROME not set");
            return Ok(());
        }
    };
}

const PAGE: &str = r#"<!doctype html>
<html>
  <head><title>Fixture</title></head>
  <body>
    <button id="go" onclick="document.title = 'clicked'">Go</button>
    <input id="name" type="text" placeholder="Name">
  </body>
</html>"#;

#[tokio::test]
async fn queries_clicks_and_types() -> Result<(), Box<dyn std::error::Error>> {
    skip_without_chrome!();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("fixture.html");
    std::fs::write(&path, PAGE)?;

    let session = ChromiumSession::launch(CdpConfig {
        headless: true,
        user_data_dir: dir.path().join("profile"),
        ..CdpConfig::default()
    })
    .await?;
    let page = session.new_page().await?;
    page.goto(&format!("file://{}", path.display()), Duration::from_secs(15))
        .await?;
    assert_eq!(page.title().await?, "Fixture");

    let buttons = page.query(&AnchorDescriptor::text_exact("Go")).await?;
    let button = buttons.first().ok_or("button not found")?;
    assert_eq!(button.tag, "button");
    assert!(button.visible);
    page.click_element(&button.handle, ClickMode::Regular).await?;
    assert_eq!(page.title().await?, "clicked");

    let inputs = page.query(&AnchorDescriptor::css("#name")).await?;
    let input = inputs.first().ok_or("input not found")?;
    page.insert_text(&input.handle, "stepwright").await?;
    assert_eq!(page.input_value(&input.handle).await?, "stepwright");

    let viewport = page.viewport_metrics().await?;
    assert!(viewport.width > 0.0);

    session.close().await?;
    Ok(())
}
