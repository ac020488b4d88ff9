//! Custom `genpdf` elements used by the PDF exporter.
//!
//! This module adds chart images with captions, a wrapper that moves a block to the next page
//! instead of splitting it, and an anchor that records the page a section starts on.

use std::cell::{Cell, RefCell};
use std::io::Cursor;
use std::path::Path;
use std::rc::Rc;

use image::{DynamicImage, GenericImageView, ImageBuffer, ImageOutputFormat, Rgb};

use genpdf::elements::{Image, Paragraph};
use genpdf::error::{Context as _, Error};
use genpdf::style::Style;
use genpdf::{render, Alignment, Element, Mm, Position, RenderResult, Scale, Size};

pub const DEFAULT_IMAGE_DPI: f64 = 300.0;
const MM_PER_INCH: f64 = 25.4;
const DEFAULT_CAPTION_SPACING_MM: f64 = 2.0;

pub(crate) fn mm_from_f64(value: f64) -> Mm {
    Mm::from(printpdf::Mm(value))
}

pub(crate) fn mm_to_f64(value: Mm) -> f64 {
    let mm: printpdf::Mm = value.into();
    mm.0
}

/// Physical size of an image printed at `dpi`.
pub fn natural_size(image: &DynamicImage, dpi: f64) -> Size {
    let (px_width, px_height) = image.dimensions();
    let width_mm = MM_PER_INCH * (px_width as f64) / dpi;
    let height_mm = MM_PER_INCH * (px_height as f64) / dpi;
    Size::new(mm_from_f64(width_mm), mm_from_f64(height_mm))
}

/// Loads an image from the given path using the [`image`] crate with descriptive errors.
pub fn decode_image_from_path(path: impl AsRef<Path>) -> Result<DynamicImage, Error> {
    let path = path.as_ref();
    let reader = image::io::Reader::open(path)
        .with_context(|| format!("Failed to open chart image {}", path.display()))?;
    reader
        .with_guessed_format()
        .context("Unable to determine chart image format")?
        .decode()
        .with_context(|| format!("Failed to decode chart image {}", path.display()))
}

/// Loads an image from in-memory bytes.
pub fn decode_image_from_bytes(bytes: impl AsRef<[u8]>) -> Result<DynamicImage, Error> {
    image::load_from_memory(bytes.as_ref()).context("Failed to decode chart image from bytes")
}

/// Flattens transparency onto a white background.
///
/// PDF images are embedded without an alpha channel, so transparent chart backgrounds would
/// otherwise turn black.
pub fn flatten_alpha(image: &DynamicImage) -> DynamicImage {
    if !image.color().has_alpha() {
        return image.clone();
    }

    let rgba = image.to_rgba8();
    let flattened = ImageBuffer::from_fn(rgba.width(), rgba.height(), |x, y| {
        let pixel = rgba.get_pixel(x, y);
        let alpha = pixel[3] as f32 / 255.0;
        let mut channels = [0u8; 3];
        for (index, channel) in channels.iter_mut().enumerate() {
            let value = pixel[index] as f32 * alpha + 255.0 * (1.0 - alpha);
            *channel = value.round().clamp(0.0, 255.0) as u8;
        }
        Rgb(channels)
    });
    DynamicImage::ImageRgb8(flattened)
}

/// Re-encodes the image as JPEG at `quality` (1-100) and decodes the result.
pub fn reencode_jpeg(image: &DynamicImage, quality: u8) -> Result<DynamicImage, Error> {
    let rgb = DynamicImage::ImageRgb8(flatten_alpha(image).to_rgb8());
    let mut bytes = Vec::new();
    rgb.write_to(
        &mut Cursor::new(&mut bytes),
        ImageOutputFormat::Jpeg(quality.clamp(1, 100)),
    )
    .context("Failed to re-encode chart image")?;
    decode_image_from_bytes(&bytes)
}

fn default_caption_spacing() -> Mm {
    mm_from_f64(DEFAULT_CAPTION_SPACING_MM)
}

/// A chart image with its caption stacked underneath.
///
/// The image and the caption share the same alignment and the image can be rescaled to a specific
/// width while keeping the aspect ratio.
pub struct CaptionedImage {
    image: Image,
    caption: Option<Paragraph>,
    alignment: Alignment,
    natural_size: Size,
    requested_width: Option<Mm>,
    spacing: Mm,
    image_rendered: bool,
}

impl CaptionedImage {
    /// Creates a captioned image from an already prepared [`DynamicImage`].
    pub fn from_dynamic_image(
        image: DynamicImage,
        dpi: f64,
        caption: Option<Paragraph>,
    ) -> Result<Self, Error> {
        let natural_size = natural_size(&image, dpi);
        let mut element = Self {
            image: Image::from_dynamic_image(image)?.with_dpi(dpi),
            caption,
            alignment: Alignment::Left,
            natural_size,
            requested_width: None,
            spacing: default_caption_spacing(),
            image_rendered: false,
        };
        element.apply_alignment();
        Ok(element)
    }

    /// Size of the image at scale 1.
    pub fn natural_size(&self) -> Size {
        self.natural_size
    }

    /// Rendered width after applying the requested width.
    pub fn rendered_width(&self) -> Mm {
        self.requested_width.unwrap_or(self.natural_size.width)
    }

    /// Rendered image height after applying the requested width.
    pub fn rendered_height(&self) -> Mm {
        let natural = mm_to_f64(self.natural_size.width);
        if natural > f64::EPSILON {
            self.natural_size.height * (mm_to_f64(self.rendered_width()) / natural)
        } else {
            self.natural_size.height
        }
    }

    pub fn set_alignment(&mut self, alignment: Alignment) {
        self.alignment = alignment;
        self.apply_alignment();
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.set_alignment(alignment);
        self
    }

    /// Constrains the rendered width of the image while preserving the aspect ratio.
    pub fn set_width(&mut self, width: Option<Mm>) {
        self.requested_width = width;
        self.apply_width();
    }

    pub fn with_width(mut self, width: impl Into<Option<Mm>>) -> Self {
        self.set_width(width.into());
        self
    }

    fn apply_alignment(&mut self) {
        self.image.set_alignment(self.alignment);
        if let Some(caption) = self.caption.as_mut() {
            caption.set_alignment(self.alignment);
        }
    }

    fn apply_width(&mut self) {
        let natural = mm_to_f64(self.natural_size.width);
        let scale = match self.requested_width {
            Some(width) if natural > f64::EPSILON => mm_to_f64(width) / natural,
            _ => 1.0,
        };
        self.image.set_scale(Scale::new(scale, scale));
    }
}

impl Element for CaptionedImage {
    fn render(
        &mut self,
        context: &genpdf::Context,
        mut area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let mut result = RenderResult::default();
        // A caption continued on the next page must not draw the image a second time.
        if !self.image_rendered {
            let image_result = self.image.render(context, area.clone(), style)?;
            self.image_rendered = true;
            result.size = result.size.stack_vertical(image_result.size);

            if self.caption.is_some() {
                let offset = image_result.size.height + self.spacing;
                area.add_offset(Position::new(0, offset));
                result.size = result.size.stack_vertical(Size::new(0, self.spacing));
            }
        }

        let Some(caption) = self.caption.as_mut() else {
            return Ok(result);
        };

        let caption_result = caption.render(context, area, style)?;
        result.size = result.size.stack_vertical(caption_result.size);
        result.has_more = caption_result.has_more;

        Ok(result)
    }
}

/// How much vertical space a [`KeepTogether`] element expects to need.
#[derive(Clone, Copy, Debug)]
pub enum Extent {
    /// A fixed height.
    Height(Mm),
    /// A number of text lines in the given style.
    Lines { count: usize, style: Style },
}

/// Moves the wrapped element to the next page when it does not fit the remaining space.
///
/// The element is deferred at most once, and never when it would not fit on an empty page
/// either, so oversized content still renders (split across pages by the inner element).
pub struct KeepTogether<E> {
    inner: E,
    extent: Extent,
    page_body_height: Mm,
    deferred: bool,
    started: bool,
}

impl<E: Element> KeepTogether<E> {
    pub fn new(inner: E, extent: Extent, page_body_height: Mm) -> Self {
        Self {
            inner,
            extent,
            page_body_height,
            deferred: false,
            started: false,
        }
    }

    /// Decides whether this render call should leave the remaining `available` space empty.
    ///
    /// Only the first call can defer, and only when the element would fit on a fresh page.
    fn defers(&mut self, required: Mm, available: Mm) -> bool {
        if self.started || self.deferred {
            self.started = true;
            return false;
        }
        if required > available && required <= self.page_body_height {
            self.deferred = true;
            return true;
        }
        self.started = true;
        false
    }

    fn required_height(&self, context: &genpdf::Context, style: Style) -> Mm {
        match self.extent {
            Extent::Height(height) => height,
            Extent::Lines { count, style: own } => {
                style.and(own).line_height(&context.font_cache) * count as f64
            }
        }
    }
}

impl<E: Element> Element for KeepTogether<E> {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let required = self.required_height(context, style);
        if self.defers(required, area.size().height) {
            let mut result = RenderResult::default();
            result.has_more = true;
            return Ok(result);
        }
        self.inner.render(context, area, style)
    }
}

/// Shared page counter advanced by the page decorator.
#[derive(Clone, Debug, Default)]
pub struct PageCounter(Rc<Cell<usize>>);

impl PageCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 1-indexed number of the page being rendered, 0 before the first page.
    pub fn current(&self) -> usize {
        self.0.get()
    }

    pub(crate) fn advance(&self) -> usize {
        let page = self.0.get() + 1;
        self.0.set(page);
        page
    }
}

/// Page numbers at which anchored elements were first rendered, by anchor slot.
pub type AnchorPages = Rc<RefCell<Vec<Option<usize>>>>;

/// Records the page on which the wrapped element is first rendered.
pub struct PageAnchor<E> {
    inner: E,
    slot: usize,
    counter: PageCounter,
    pages: AnchorPages,
}

impl<E: Element> PageAnchor<E> {
    pub fn new(inner: E, slot: usize, counter: PageCounter, pages: AnchorPages) -> Self {
        Self {
            inner,
            slot,
            counter,
            pages,
        }
    }
}

impl<E: Element> Element for PageAnchor<E> {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let result = self.inner.render(context, area, style)?;
        // An element that did not fit at all rendered nothing here and moves on.
        if result.size.height > Mm::from(0) || !result.has_more {
            let mut pages = self.pages.borrow_mut();
            if pages.len() <= self.slot {
                pages.resize(self.slot + 1, None);
            }
            pages[self.slot].get_or_insert(self.counter.current());
        }
        Ok(result)
    }
}
