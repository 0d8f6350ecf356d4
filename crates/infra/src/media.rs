//! QR image rendering into the media directory.

use std::path::{Path, PathBuf};

use qrcode::render::svg;
use qrcode::QrCode;
use thiserror::Error;
use tracing::debug;

use supplydesk_borrowing::QrPayload;
use supplydesk_core::{RequestId, SupplyId};

pub const SUPPLY_QR_DIR: &str = "qr_codes";
pub const BORROWING_QR_DIR: &str = "borrowing_qr_codes";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to encode QR payload: {0}")]
    Encode(String),

    #[error("media io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A rendered QR image, relative to the media root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredQr {
    pub payload: String,
    pub relative_path: String,
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn write_supply_qr(&self, supply_id: SupplyId, payload: &QrPayload) -> Result<StoredQr, MediaError> {
        self.write(SUPPLY_QR_DIR, &format!("supply_{supply_id}.svg"), payload).await
    }

    pub async fn write_borrowing_qr(&self, request_id: RequestId, payload: &QrPayload) -> Result<StoredQr, MediaError> {
        self.write(BORROWING_QR_DIR, &format!("borrowing_{request_id}.svg"), payload).await
    }

    async fn write(&self, dir: &str, file: &str, payload: &QrPayload) -> Result<StoredQr, MediaError> {
        let payload = payload.to_string();
        let image = render_svg(&payload)?;

        let dir_path = self.root.join(dir);
        tokio::fs::create_dir_all(&dir_path).await?;
        tokio::fs::write(dir_path.join(file), image).await?;

        let relative_path = format!("{dir}/{file}");
        debug!(path = %relative_path, "qr image written");
        Ok(StoredQr {
            payload,
            relative_path,
        })
    }
}

pub fn render_svg(payload: &str) -> Result<String, MediaError> {
    let code = QrCode::new(payload.as_bytes()).map_err(|e| MediaError::Encode(e.to_string()))?;
    Ok(code
        .render::<svg::Color<'_>>()
        .min_dimensions(200, 200)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build())
}
