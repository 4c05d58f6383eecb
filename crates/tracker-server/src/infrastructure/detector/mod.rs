//! Face detector construction.
//!
//! The detector is optional.  [`build_locator`] returns `None` (detector
//! unavailable) when no model is configured, when the binary was built
//! without a backend feature, or when the model fails to load.  The server
//! keeps running in that case and simply never issues commands.

use std::sync::Arc;

use tracing::warn;
#[cfg(feature = "backend-tract")]
use tracing::info;

use crate::domain::config::DetectorConfig;
use crate::domain::locator::FaceLocator;

#[cfg_attr(not(feature = "backend-tract"), allow(dead_code))]
pub mod postprocess;
pub mod tract;

/// Builds the configured face locator, or `None` if detection is unavailable.
pub fn build_locator(config: &DetectorConfig) -> Option<Arc<dyn FaceLocator>> {
    let Some(model_path) = config.model_path.as_deref() else {
        warn!("no face model configured; detection disabled, no commands will be issued");
        return None;
    };

    #[cfg(feature = "backend-tract")]
    {
        match tract::UltraFaceLocator::load(model_path, config) {
            Ok(locator) => {
                info!("face detector loaded from {}", model_path.display());
                Some(Arc::new(locator))
            }
            Err(e) => {
                warn!("face detector unavailable: {e:#}");
                None
            }
        }
    }

    #[cfg(not(feature = "backend-tract"))]
    {
        warn!(
            "face model {} configured but this build has no detector backend \
             (enable the `backend-tract` feature); detection disabled",
            model_path.display()
        );
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
