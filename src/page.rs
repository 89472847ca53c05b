//! Page loading and the single-active-page machine.
//!
//! PDFium keeps at most one page of a document resident at a time in
//! this embedding. Loading the index that is already resident returns
//! the existing token without touching the guest; loading a different
//! index releases the resident page first, which invalidates its token.

use crate::error::{Error, PdfiumError, Result};
use crate::geometry::{RectF, SizeF};
use crate::instance::Instance;
use crate::refs::{DocumentRef, PageRef};

impl Instance {
    /// Loads page `index` (zero-based) of a document.
    pub fn load_page(&self, document: &DocumentRef, index: i32) -> Result<PageRef> {
        let mut inner = self.lock()?;

        let doc = inner.document(document)?;
        let doc_handle = doc.handle;

        if let Some(current) = doc.current_page.clone() {
            let resident_index = inner.pages.get(&current).map(|page| page.index);
            match resident_index {
                Some(resident) if resident == index => return Ok(current),
                Some(_) => inner.close_page_by_ref(&current)?,
                None => {}
            }
        }

        let handle = inner
            .vm
            .call("FPDF_LoadPage", &[doc_handle, index as u32 as u64])?
            .as_ptr()?;
        if handle == 0 {
            return Err(Error::Pdfium(PdfiumError::Page));
        }

        Ok(inner.register_page(document, handle, index))
    }

    /// Releases a page. A token that is already closed is a no-op.
    pub fn close_page(&self, page: &PageRef) -> Result<()> {
        self.lock()?.close_page_by_ref(page)
    }

    /// Page dimensions in points.
    pub fn page_size(&self, page: &PageRef) -> Result<SizeF> {
        let mut inner = self.lock()?;
        let handle = inner.page(page)?.handle;
        let width = inner.vm.call("FPDF_GetPageWidthF", &[handle])?.as_f32()?;
        let height = inner.vm.call("FPDF_GetPageHeightF", &[handle])?.as_f32()?;
        Ok(SizeF { width, height })
    }

    /// Page dimensions by index, without loading the page.
    pub fn page_size_by_index(&self, document: &DocumentRef, index: i32) -> Result<SizeF> {
        let mut inner = self.lock()?;
        let handle = inner.document(document)?.handle;

        let size_ptr = inner.vm.malloc(SizeF::BYTE_SIZE)?;
        let ok = inner
            .vm
            .call(
                "FPDF_GetPageSizeByIndexF",
                &[handle, index as u32 as u64, size_ptr],
            )
            .and_then(|ret| ret.as_i32());
        let size = match ok {
            Ok(0) => Err(Error::Pdfium(PdfiumError::Page)),
            Ok(_) => SizeF::read_from(&inner.vm, size_ptr),
            Err(err) => Err(err),
        };
        inner.vm.free(size_ptr)?;
        size
    }

    /// The page bounding box (the intersection of crop and media
    /// boxes), in page coordinates.
    pub fn page_bounding_box(&self, page: &PageRef) -> Result<RectF> {
        let mut inner = self.lock()?;
        let handle = inner.page(page)?.handle;

        let rect_ptr = inner.vm.malloc(RectF::BYTE_SIZE)?;
        let ok = inner
            .vm
            .call("FPDF_GetPageBoundingBox", &[handle, rect_ptr])
            .and_then(|ret| ret.as_i32());
        let rect = match ok {
            Ok(0) => Err(Error::GuestFailure("FPDF_GetPageBoundingBox")),
            Ok(_) => RectF::read_from(&inner.vm, rect_ptr),
            Err(err) => Err(err),
        };
        inner.vm.free(rect_ptr)?;
        rect
    }

    /// Clockwise page rotation in quarter turns (0..=3).
    pub fn page_rotation(&self, page: &PageRef) -> Result<i32> {
        let mut inner = self.lock()?;
        let handle = inner.page(page)?.handle;
        inner.vm.call("FPDFPage_GetRotation", &[handle])?.as_i32()
    }
}
