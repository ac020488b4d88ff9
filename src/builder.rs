//! Construction of `genpdf::Document` instances with report page decorations.

use genpdf::error::{Error, ErrorKind};
use genpdf::render::Area;
use genpdf::style::Style;
use genpdf::{self, Element, Margins, Mm, PageDecorator, Position, Size};

use crate::elements::PageCounter;
use crate::fonts;

type DecorationFactory = dyn Fn(usize) -> Option<Box<dyn Element>>;

/// Per-page element produced from the 1-indexed page number.
///
/// A footer reserves a fixed band at the bottom of the page; a header takes whatever height its
/// element renders at.  Returning `None` leaves the page undecorated.
struct Decoration {
    reserved: Option<Mm>,
    factory: Box<DecorationFactory>,
}

impl Decoration {
    fn new<F, E>(reserved: Option<Mm>, factory: F) -> Self
    where
        F: Fn(usize) -> Option<E> + 'static,
        E: Element + 'static,
    {
        Self {
            reserved,
            factory: Box::new(move |page| {
                factory(page).map(|element| Box::new(element) as Box<dyn Element>)
            }),
        }
    }

    fn element(&self, page: usize) -> Option<Box<dyn Element>> {
        (self.factory)(page)
    }
}

/// Builder for `genpdf::Document` instances pre-configured for reports.
#[derive(Default)]
pub struct DocumentBuilder {
    title: Option<String>,
    paper_size: Option<Size>,
    margins: Option<Margins>,
    font_size: Option<u8>,
    page_counter: PageCounter,
    header: Option<Decoration>,
    footer: Option<Decoration>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the document title stored in the PDF metadata.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_paper_size(mut self, paper_size: impl Into<Size>) -> Self {
        self.paper_size = Some(paper_size.into());
        self
    }

    /// Sets the margins applied through the page decorator.
    pub fn with_margins(mut self, margins: impl Into<Margins>) -> Self {
        self.margins = Some(margins.into());
        self
    }

    pub fn with_font_size(mut self, font_size: u8) -> Self {
        self.font_size = Some(font_size);
        self
    }

    /// Shares the counter the page decorator advances for every new page.
    pub fn with_page_counter(mut self, counter: PageCounter) -> Self {
        self.page_counter = counter;
        self
    }

    /// Renders `header(page)` at the top of every page that gets one.
    pub fn with_header<F, E>(mut self, header: F) -> Self
    where
        F: Fn(usize) -> Option<E> + 'static,
        E: Element + 'static,
    {
        self.header = Some(Decoration::new(None, header));
        self
    }

    /// Reserves `height` at the bottom of every page and renders `footer(page)` into it.
    pub fn with_footer<F, E>(mut self, height: impl Into<Mm>, footer: F) -> Self
    where
        F: Fn(usize) -> Option<E> + 'static,
        E: Element + 'static,
    {
        self.footer = Some(Decoration::new(Some(height.into()), footer));
        self
    }

    /// Builds a fully configured `genpdf::Document` instance.
    ///
    /// Fonts are resolved here, so nothing before export needs them.
    pub fn build(self) -> Result<genpdf::Document, Error> {
        let mut document = genpdf::Document::new(fonts::default_font_family()?);

        if let Some(title) = self.title {
            document.set_title(title);
        }
        if let Some(paper_size) = self.paper_size {
            document.set_paper_size(paper_size);
        }
        if let Some(font_size) = self.font_size {
            document.set_font_size(font_size);
        }

        document.set_page_decorator(ReportPageDecorator {
            counter: self.page_counter,
            margins: self.margins,
            header: self.header,
            footer: self.footer,
        });
        Ok(document)
    }
}

struct ReportPageDecorator {
    counter: PageCounter,
    margins: Option<Margins>,
    header: Option<Decoration>,
    footer: Option<Decoration>,
}

impl ReportPageDecorator {
    fn render_footer(
        footer: &Decoration,
        page: usize,
        context: &genpdf::Context,
        area: &mut Area<'_>,
        style: Style,
    ) -> Result<(), Error> {
        let Some(reserved) = footer.reserved else {
            return Ok(());
        };
        let available = area.size().height;
        if reserved > available {
            return Err(Error::new(
                format!("Page {} has no room for the footer", page),
                ErrorKind::InvalidData,
            ));
        }

        if let Some(mut element) = footer.element(page) {
            let mut band = area.clone();
            band.add_offset(Position::new(0, available - reserved));
            if element.render(context, band, style)?.has_more {
                return Err(Error::new(
                    "Footer does not fit into its reserved band",
                    ErrorKind::PageSizeExceeded,
                ));
            }
        }
        area.set_height(available - reserved);
        Ok(())
    }
}

impl PageDecorator for ReportPageDecorator {
    fn decorate_page<'a>(
        &mut self,
        context: &genpdf::Context,
        mut area: Area<'a>,
        style: Style,
    ) -> Result<Area<'a>, Error> {
        let page = self.counter.advance();

        if let Some(margins) = self.margins {
            area.add_margins(margins);
        }

        if let Some(mut element) = self.header.as_ref().and_then(|header| header.element(page)) {
            let rendered = element.render(context, area.clone(), style)?;
            area.add_offset(Position::new(0, rendered.size.height));
        }

        if let Some(footer) = &self.footer {
            Self::render_footer(footer, page, context, &mut area, style)?;
        }

        Ok(area)
    }
}
