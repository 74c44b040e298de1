//! SVG serialization, data URLs and rasterization via resvg.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use quick_xml::escape::{escape, resolve_html5_entity};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{fontdb, Options, Tree};
use std::sync::Arc;
use tracing::debug;

use super::RenderError;

pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
const DATA_URL_PREFIX: &str = "data:image/svg+xml;base64,";

/// A drawn card: premultiplied RGBA at the SVG's natural size.
#[derive(Clone)]
pub struct Raster {
    pixmap: Pixmap,
}

impl std::fmt::Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl Raster {
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        self.pixmap
            .encode_png()
            .map_err(|e| RenderError::Encode(e.to_string()))
    }

    /// Straight-alpha RGBA rows, the layout system clipboards expect.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixmap.data().len());
        for pixel in self.pixmap.pixels() {
            let color = pixel.demultiply();
            bytes.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
        }
        bytes
    }
}

/// Returns the first root `<svg>` element, cut at its matching close tag,
/// the way a browser's XML serializer emits a live element: the SVG
/// namespace is declared and loose HTML entity use is made well-formed.
pub fn serialize_svg(markup: &str) -> Result<String, RenderError> {
    let start = find_svg_start(markup).ok_or(RenderError::SvgElementMissing)?;
    let root = scan_root(&markup[start..])?;
    let element = normalize_entities(&markup[start..start + root.len]);

    if root.has_namespace {
        return Ok(element);
    }

    let insert_at = "<svg".len();
    let mut serialized = String::with_capacity(element.len() + SVG_NAMESPACE.len() + 9);
    serialized.push_str(&element[..insert_at]);
    serialized.push_str(" xmlns=\"");
    serialized.push_str(SVG_NAMESPACE);
    serialized.push('"');
    serialized.push_str(&element[insert_at..]);
    Ok(serialized)
}

struct RootElement {
    len: usize,
    has_namespace: bool,
}

/// Walks the markup from its opening `<svg` to the matching `</svg>`.
/// An element left open runs to the end of the input.
fn scan_root(element: &str) -> Result<RootElement, RenderError> {
    let mut reader = Reader::from_str(element);
    reader.config_mut().check_end_names = false;

    let mut depth = 0usize;
    let mut has_namespace = false;
    loop {
        let event = reader
            .read_event()
            .map_err(|e| RenderError::Parse(e.to_string()))?;
        match event {
            Event::Empty(tag) if depth == 0 => {
                return Ok(RootElement {
                    len: reader.buffer_position() as usize,
                    has_namespace: declares_namespace(&tag),
                });
            }
            Event::Start(tag) if tag.local_name().as_ref() == b"svg" => {
                if depth == 0 {
                    has_namespace = declares_namespace(&tag);
                }
                depth += 1;
            }
            Event::End(tag) if tag.local_name().as_ref() == b"svg" => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(RootElement {
                        len: reader.buffer_position() as usize,
                        has_namespace,
                    });
                }
            }
            Event::Eof => {
                return Ok(RootElement {
                    len: element.len(),
                    has_namespace,
                })
            }
            _ => {}
        }
    }
}

fn declares_namespace(tag: &BytesStart) -> bool {
    tag.attributes()
        .flatten()
        .any(|attr| attr.key.as_ref() == b"xmlns")
}

/// Keeps XML and numeric references, resolves HTML named entities such as
/// `&nbsp;`, and escapes any other `&`.
fn normalize_entities(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut rest = markup;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let reference = after
            .find(';')
            .map(|end| &after[..end])
            .filter(|name| is_reference_name(name));

        match reference {
            Some(name) => {
                if name.starts_with('#') || XML_ENTITIES.contains(&name) {
                    out.push('&');
                    out.push_str(name);
                    out.push(';');
                } else if let Some(text) = resolve_html5_entity(name) {
                    out.push_str(&escape(text));
                } else {
                    out.push_str("&amp;");
                    out.push_str(name);
                    out.push(';');
                }
                rest = &after[name.len() + 1..];
            }
            None => {
                out.push_str("&amp;");
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

const XML_ENTITIES: [&str; 5] = ["amp", "lt", "gt", "quot", "apos"];

fn is_reference_name(name: &str) -> bool {
    match name.strip_prefix('#') {
        Some(number) => match number.strip_prefix(['x', 'X']) {
            Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
            None => !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()),
        },
        None => !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric()),
    }
}

fn find_svg_start(markup: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(found) = markup[offset..].find("<svg") {
        let start = offset + found;
        let next = markup[start + 4..].chars().next();
        if matches!(next, Some(c) if c.is_whitespace() || c == '>' || c == '/') {
            return Some(start);
        }
        offset = start + 4;
    }
    None
}

/// `data:image/svg+xml;base64,...` for serialized markup.
pub fn svg_data_url(serialized: &str) -> String {
    format!("{}{}", DATA_URL_PREFIX, STANDARD.encode(serialized.as_bytes()))
}

pub fn decode_data_url(url: &str) -> Result<Vec<u8>, RenderError> {
    let payload = url
        .strip_prefix(DATA_URL_PREFIX)
        .ok_or_else(|| RenderError::DataUrl("not a base64 SVG data URL".to_string()))?;
    STANDARD
        .decode(payload)
        .map_err(|e| RenderError::DataUrl(e.to_string()))
}

/// Loads SVG images and draws them onto pixmaps.
pub struct SvgRasterizer {
    options: Options<'static>,
}

impl SvgRasterizer {
    /// Uses the fonts installed on this machine so CJK text renders.
    pub fn new() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        debug!(faces = db.len(), "Loaded system fonts");
        Self::with_fonts(db)
    }

    pub fn with_fonts(db: fontdb::Database) -> Self {
        Self {
            options: Options {
                fontdb: Arc::new(db),
                ..Options::default()
            },
        }
    }

    /// Decodes a data URL into an image and draws it at its natural size.
    pub fn load_image(&self, data_url: &str) -> Result<Raster, RenderError> {
        let data = decode_data_url(data_url)?;
        let tree =
            Tree::from_data(&data, &self.options).map_err(|e| RenderError::Parse(e.to_string()))?;

        let size = tree.size();
        let width = size.width().ceil() as u32;
        let height = size.height().ceil() as u32;

        let mut pixmap =
            Pixmap::new(width, height).ok_or(RenderError::Canvas { width, height })?;
        resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());

        debug!(width, height, "Rasterized SVG");
        Ok(Raster { pixmap })
    }

    /// serialize → data URL → image → canvas.
    pub fn rasterize(&self, markup: &str) -> Result<Raster, RenderError> {
        let serialized = serialize_svg(markup)?;
        self.load_image(&svg_data_url(&serialized))
    }
}

impl Default for SvgRasterizer {
    fn default() -> Self {
        Self::new()
    }
}
