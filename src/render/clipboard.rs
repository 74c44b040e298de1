use arboard::ImageData;
use std::borrow::Cow;
use std::sync::Mutex;
use tracing::debug;

use super::{Raster, RenderError};

pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<(), RenderError>;
    fn write_image(&self, raster: &Raster) -> Result<(), RenderError>;
}

/// The desktop clipboard, opened per write.
///
/// On Linux the writing process owns the selection, so each write blocks
/// until another application replaces the contents. Short-lived callers
/// would otherwise exit and take the copied card with them.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl SystemClipboard {
    fn open() -> Result<arboard::Clipboard, RenderError> {
        arboard::Clipboard::new().map_err(|e| RenderError::Clipboard(e.to_string()))
    }
}

#[cfg(target_os = "linux")]
fn hand_off(set: arboard::Set<'_>) -> arboard::Set<'_> {
    use arboard::SetExtLinux;
    debug!("Holding the clipboard until another application takes it over");
    set.wait()
}

#[cfg(not(target_os = "linux"))]
fn hand_off(set: arboard::Set<'_>) -> arboard::Set<'_> {
    set
}

impl Clipboard for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<(), RenderError> {
        let mut clipboard = Self::open()?;
        hand_off(clipboard.set())
            .text(text.to_string())
            .map_err(|e| RenderError::Clipboard(e.to_string()))
    }

    fn write_image(&self, raster: &Raster) -> Result<(), RenderError> {
        let image = ImageData {
            width: raster.width() as usize,
            height: raster.height() as usize,
            bytes: Cow::Owned(raster.to_rgba()),
        };
        debug!(width = image.width, height = image.height, "Writing image to clipboard");
        let mut clipboard = Self::open()?;
        hand_off(clipboard.set())
            .image(image)
            .map_err(|e| RenderError::Clipboard(e.to_string()))
    }
}

/// PNG bytes plus the dimensions they were drawn at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardImage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// Process-local clipboard for headless runs and tests.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    text: Mutex<Option<String>>,
    image: Mutex<Option<ClipboardImage>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_text(&self) -> Option<String> {
        self.text.lock().ok().and_then(|t| t.clone())
    }

    pub fn read_image(&self) -> Option<ClipboardImage> {
        self.image.lock().ok().and_then(|i| i.clone())
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&self, text: &str) -> Result<(), RenderError> {
        let mut slot = self
            .text
            .lock()
            .map_err(|_| RenderError::Clipboard("clipboard lock poisoned".to_string()))?;
        *slot = Some(text.to_string());
        Ok(())
    }

    fn write_image(&self, raster: &Raster) -> Result<(), RenderError> {
        let png = raster.encode_png()?;
        let mut slot = self
            .image
            .lock()
            .map_err(|_| RenderError::Clipboard("clipboard lock poisoned".to_string()))?;
        *slot = Some(ClipboardImage {
            width: raster.width(),
            height: raster.height(),
            png,
        });
        Ok(())
    }
}

impl<C: Clipboard + ?Sized> Clipboard for std::sync::Arc<C> {
    fn write_text(&self, text: &str) -> Result<(), RenderError> {
        (**self).write_text(text)
    }

    fn write_image(&self, raster: &Raster) -> Result<(), RenderError> {
        (**self).write_image(raster)
    }
}
