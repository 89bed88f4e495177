//! Screenshot capture.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use image::ImageReader;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::TabId;
use crate::relay::ensure_attached;

use super::Executor;

/// Wire name of the capture format.
const FORMAT: &str = "png";

// ============================================================================
// Helpers
// ============================================================================

/// Reads the pixel dimensions of base64-encoded image data.
///
/// # Errors
///
/// [`Error::Protocol`] if the data is not a decodable image.
pub fn image_dimensions(data: &str) -> Result<(u32, u32)> {
    let bytes = Base64Standard
        .decode(data)
        .map_err(|e| Error::protocol(format!("Invalid screenshot data: {e}")))?;

    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| Error::protocol(format!("Invalid screenshot image: {e}")))
}

// ============================================================================
// Executor - Screenshot
// ============================================================================

impl Executor {
    /// Captures the visible viewport as PNG.
    ///
    /// Result: `{ "data": "<base64>", "format": "png", "width": w, "height": h }`.
    ///
    /// # Errors
    ///
    /// - [`Error::TabNotAttached`]
    /// - [`Error::Protocol`] if the capture fails or returns no image
    pub async fn screenshot(&self, tab_id: TabId) -> Result<Value> {
        ensure_attached(&self.registry, tab_id)?;

        let response = self
            .browser
            .send_command(tab_id, "Page.captureScreenshot", json!({ "format": FORMAT }))
            .await?;

        let data = response
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::protocol("No screenshot data in response"))?;

        let (width, height) = image_dimensions(data)?;
        debug!(%tab_id, width, height, bytes = data.len(), "Screenshot captured");

        Ok(json!({
            "data": data,
            "format": FORMAT,
            "width": width,
            "height": height,
        }))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use image::{ImageFormat, RgbaImage};

    use crate::interaction::tests::attached_executor;

    fn png(width: u32, height: u32) -> String {
        let mut bytes = Vec::new();
        RgbaImage::new(width, height)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode");
        Base64Standard.encode(bytes)
    }

    #[test]
    fn test_image_dimensions() {
        assert_eq!(image_dimensions(&png(3, 2)).expect("dimensions"), (3, 2));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(image_dimensions("%%%").is_err());
        assert!(image_dimensions(&Base64Standard.encode(b"not an image")).is_err());
    }

    #[tokio::test]
    async fn test_screenshot_result() {
        let (executor, browser, tab) = attached_executor().await;
        let data = png(4, 5);
        let reply = data.clone();
        browser.respond("Page.captureScreenshot", move |_| Ok(json!({ "data": reply })));

        let result = executor.screenshot(tab).await.expect("screenshot");

        assert_eq!(
            result,
            json!({ "data": data, "format": "png", "width": 4, "height": 5 })
        );
    }

    #[tokio::test]
    async fn test_screenshot_without_data() {
        let (executor, _browser, tab) = attached_executor().await;

        let err = executor.screenshot(tab).await.expect_err("no data");
        assert!(matches!(err, Error::Protocol { .. }));
    }
}
