//! Card export: the platform capabilities a browser would provide (XML
//! serializer, canvas, clipboard, download link) and the three export paths
//! built on them.

pub mod clipboard;
pub mod raster;
pub mod save;

pub use clipboard::{Clipboard, ClipboardImage, MemoryClipboard, SystemClipboard};
pub use raster::{decode_data_url, serialize_svg, svg_data_url, Raster, SvgRasterizer};
pub use save::{DirectorySaver, FileSaver};

use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, instrument};

/// Name of the file the download export writes.
pub const DOWNLOAD_FILE_NAME: &str = "generated.png";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("SVG element not found")]
    SvgElementMissing,
    #[error("Invalid SVG data URL: {0}")]
    DataUrl(String),
    #[error("Failed to load SVG image: {0}")]
    Parse(String),
    #[error("Cannot create a {width}x{height} canvas")]
    Canvas { width: u32, height: u32 },
    #[error("Failed to encode PNG: {0}")]
    Encode(String),
    #[error("Clipboard write failed: {0}")]
    Clipboard(String),
    #[error("Failed to save {}: {source}", .path.display())]
    Save {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// What the host platform has to offer for exporting a card.
pub trait Capabilities: Send + Sync {
    /// Serialize vector image.
    fn serialize_vector(&self, markup: &str) -> Result<String, RenderError>;
    /// Rasterize to bitmap at the image's natural size.
    fn rasterize(&self, serialized: &str) -> Result<Raster, RenderError>;
    /// Write bitmap to clipboard.
    fn write_image(&self, raster: &Raster) -> Result<(), RenderError>;
    /// Write text to clipboard.
    fn write_text(&self, text: &str) -> Result<(), RenderError>;
    /// Trigger file save.
    fn save_file(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, RenderError>;
}

/// resvg for drawing, plus pluggable clipboard and file targets.
pub struct NativeCapabilities {
    rasterizer: SvgRasterizer,
    clipboard: Box<dyn Clipboard>,
    saver: Box<dyn FileSaver>,
}

impl NativeCapabilities {
    pub fn new(
        rasterizer: SvgRasterizer,
        clipboard: Box<dyn Clipboard>,
        saver: Box<dyn FileSaver>,
    ) -> Self {
        Self {
            rasterizer,
            clipboard,
            saver,
        }
    }

    /// System fonts, the desktop clipboard, downloads into `out_dir`.
    pub fn desktop(out_dir: impl Into<PathBuf>) -> Self {
        Self::new(
            SvgRasterizer::new(),
            Box::new(SystemClipboard),
            Box::new(DirectorySaver::new(out_dir)),
        )
    }
}

impl Capabilities for NativeCapabilities {
    fn serialize_vector(&self, markup: &str) -> Result<String, RenderError> {
        serialize_svg(markup)
    }

    fn rasterize(&self, serialized: &str) -> Result<Raster, RenderError> {
        self.rasterizer.load_image(&svg_data_url(serialized))
    }

    fn write_image(&self, raster: &Raster) -> Result<(), RenderError> {
        self.clipboard.write_image(raster)
    }

    fn write_text(&self, text: &str) -> Result<(), RenderError> {
        self.clipboard.write_text(text)
    }

    fn save_file(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, RenderError> {
        self.saver.save_file(name, bytes)
    }
}

/// Copies the markup verbatim.
pub fn copy_svg(caps: &dyn Capabilities, svg: &str) -> Result<(), RenderError> {
    caps.write_text(svg)
}

/// Serialize, rasterize, encode, save as `generated.png`.
#[instrument(skip_all)]
pub fn download_png(caps: &dyn Capabilities, svg: &str) -> Result<PathBuf, RenderError> {
    let raster = caps.rasterize(&caps.serialize_vector(svg)?)?;
    let png = raster.encode_png()?;
    let path = caps.save_file(DOWNLOAD_FILE_NAME, &png)?;
    info!(width = raster.width(), height = raster.height(), "PNG downloaded");
    Ok(path)
}

/// Same rasterization as [`download_png`], written to the clipboard instead.
#[instrument(skip_all)]
pub fn copy_png(caps: &dyn Capabilities, svg: &str) -> Result<Raster, RenderError> {
    let raster = caps.rasterize(&caps.serialize_vector(svg)?)?;
    caps.write_image(&raster)?;
    info!(width = raster.width(), height = raster.height(), "PNG copied");
    Ok(raster)
}
