//! Host-side driver for a PDFium build compiled to WebAssembly.
//!
//! An [`Instance`] wraps one instantiated module: its linear memory,
//! its exported `malloc`/`free`, and a registry that files every guest
//! object pointer under an opaque UUID token. Callers only ever hold
//! tokens; raw pointers never cross the API surface.
//!
//! ```no_run
//! use pdfium_wasm::Config;
//!
//! # fn main() -> pdfium_wasm::Result<()> {
//! let wasm = std::fs::read("pdfium.wasm")?;
//! let pdfium = Config::new(wasm).build()?;
//!
//! let data = std::fs::read("report.pdf")?;
//! let doc = pdfium.open_document(&data, None)?;
//! println!("{} pages", pdfium.page_count(&doc)?);
//! println!("title: {:?}", pdfium.metadata_text(&doc, "Title")?);
//!
//! pdfium.close_document(&doc)?;
//! pdfium.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! Every operation serializes on the instance lock, so an `Instance`
//! is a single-lane worker; instantiate the module once per lane for
//! parallelism. Callback-style arguments (readers, writers, pause and
//! form-fill handlers) are bridged through process-wide tables keyed
//! by host-generated identifiers, never by guest pointer values.

mod bitmap;
mod bookmark;
mod callbacks;
mod document;
mod error;
mod formfill;
mod geometry;
mod handles;
mod imports;
mod instance;
mod metadata;
mod page;
mod progressive;
mod refs;
mod save;
mod text;
mod textpage;
mod vm;

#[cfg(test)]
mod tests;

pub use bitmap::render_flags;
pub use bookmark::Bookmark;
pub use callbacks::{
    set_unsupported_feature_handler, FormFillHandler, UnsupportedFeature, UnsupportedHandler,
};
pub use error::{Error, PdfiumError, Result};
pub use geometry::{Matrix, PointF, QuadPointsF, RectF, SizeF};
pub use instance::{Config, Instance};
pub use progressive::RenderStatus;
pub use refs::{
    ActionRef, BitmapRef, BookmarkRef, DestRef, DocumentRef, PageRef, SearchRef, TextPageRef,
};
pub use save::SaveFlags;
pub use textpage::search_flags;
