//! PNG export of the grid.

use crate::pixels::PixelStore;
use base64::{Engine, engine::general_purpose::STANDARD};
use std::path::Path;
use thiserror::Error;

/// File name offered for downloads.
pub const DEFAULT_FILE_NAME: &str = "image.png";

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Cannot export an empty {width}x{height} grid")]
    Empty { width: u32, height: u32 },
    #[error("PNG encoding failed: {0}")]
    Encoding(#[from] ::png::EncodingError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encode a grid as an opaque RGBA PNG, one image pixel per cell.
pub fn encode_png(store: &PixelStore) -> Result<Vec<u8>, ExportError> {
    let (width, height) = store.size();
    if width == 0 || height == 0 {
        return Err(ExportError::Empty { width, height });
    }
    let rgba: Vec<u8> = store.as_slice().iter().flat_map(|c| c.to_rgba()).collect();

    let mut png_data = Vec::new();
    {
        let mut encoder = ::png::Encoder::new(&mut png_data, width, height);
        encoder.set_color(::png::ColorType::Rgba);
        encoder.set_depth(::png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&rgba)?;
        writer.finish()?;
    }
    log::debug!("Encoded {}x{} grid as {} byte PNG", width, height, png_data.len());
    Ok(png_data)
}

/// Encode a grid as a `data:image/png;base64,...` URL.
pub fn png_data_url(store: &PixelStore) -> Result<String, ExportError> {
    let png_data = encode_png(store)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png_data)))
}

/// Write a grid to a PNG file.
pub fn save_png(store: &PixelStore, path: &Path) -> Result<(), ExportError> {
    let png_data = encode_png(store)?;
    std::fs::write(path, png_data)?;
    log::info!("Exported PNG to: {:?}", path);
    Ok(())
}
