//! Rendering bitmaps.

use crate::error::{Error, Result};
use crate::geometry::{Matrix, RectF};
use crate::instance::Instance;
use crate::refs::{BitmapRef, PageRef};

/// Render flags (`FPDF_ANNOT` and friends); combine with bitwise or.
pub mod render_flags {
    pub const ANNOTATIONS: u32 = 0x01;
    pub const LCD_TEXT: u32 = 0x02;
    pub const GRAYSCALE: u32 = 0x08;
    pub const PRINTING: u32 = 0x800;
}

impl Instance {
    /// Allocates a `width` × `height` rendering bitmap in guest
    /// memory, BGRA if `alpha`, BGRx otherwise. Bitmaps belong to the
    /// instance, not to any document.
    pub fn create_bitmap(&self, width: i32, height: i32, alpha: bool) -> Result<BitmapRef> {
        let mut inner = self.lock()?;
        let handle = inner
            .vm
            .call(
                "FPDFBitmap_Create",
                &[width as u32 as u64, height as u32 as u64, alpha as u64],
            )?
            .as_ptr()?;
        if handle == 0 {
            return Err(Error::GuestFailure("FPDFBitmap_Create"));
        }
        Ok(inner.register_bitmap(handle))
    }

    /// Fills a rectangle with an ARGB color.
    pub fn fill_bitmap_rect(
        &self,
        bitmap: &BitmapRef,
        left: i32,
        top: i32,
        width: i32,
        height: i32,
        color: u32,
    ) -> Result<()> {
        let mut inner = self.lock()?;
        let handle = inner.bitmap(bitmap)?.handle;
        inner.vm.call(
            "FPDFBitmap_FillRect",
            &[
                handle,
                left as u32 as u64,
                top as u32 as u64,
                width as u32 as u64,
                height as u32 as u64,
                color as u64,
            ],
        )?;
        Ok(())
    }

    /// Copies the rendered pixels out of guest memory.
    pub fn bitmap_pixels(&self, bitmap: &BitmapRef) -> Result<Vec<u8>> {
        let mut inner = self.lock()?;
        let handle = inner.bitmap(bitmap)?.handle;

        let stride = inner.vm.call("FPDFBitmap_GetStride", &[handle])?.as_i32()?;
        let height = inner.vm.call("FPDFBitmap_GetHeight", &[handle])?.as_i32()?;
        let buffer = inner.vm.call("FPDFBitmap_GetBuffer", &[handle])?.as_ptr()?;
        if stride < 0 || height < 0 || buffer == 0 {
            return Err(Error::GuestFailure("FPDFBitmap_GetBuffer"));
        }

        inner.vm.read_bytes(buffer, stride as usize * height as usize)
    }

    /// Renders a page into a bitmap in one shot.
    #[allow(clippy::too_many_arguments)]
    pub fn render_page_bitmap(
        &self,
        bitmap: &BitmapRef,
        page: &PageRef,
        start_x: i32,
        start_y: i32,
        size_x: i32,
        size_y: i32,
        rotate: i32,
        flags: u32,
    ) -> Result<()> {
        let mut inner = self.lock()?;
        let bitmap_handle = inner.bitmap(bitmap)?.handle;
        let page_handle = inner.page(page)?.handle;
        inner.vm.call(
            "FPDF_RenderPageBitmap",
            &[
                bitmap_handle,
                page_handle,
                start_x as u32 as u64,
                start_y as u32 as u64,
                size_x as u32 as u64,
                size_y as u32 as u64,
                rotate as u32 as u64,
                flags as u64,
            ],
        )?;
        Ok(())
    }

    /// Renders a page through an explicit transform and clip.
    pub fn render_page_bitmap_with_matrix(
        &self,
        bitmap: &BitmapRef,
        page: &PageRef,
        matrix: &Matrix,
        clip: &RectF,
        flags: u32,
    ) -> Result<()> {
        let mut inner = self.lock()?;
        let bitmap_handle = inner.bitmap(bitmap)?.handle;
        let page_handle = inner.page(page)?.handle;

        let matrix_ptr = inner.vm.malloc(Matrix::BYTE_SIZE)?;
        let clip_ptr = inner.vm.malloc(RectF::BYTE_SIZE)?;

        let outcome = matrix
            .write_to(&mut inner.vm, matrix_ptr)
            .and_then(|()| clip.write_to(&mut inner.vm, clip_ptr))
            .and_then(|()| {
                inner.vm.call(
                    "FPDF_RenderPageBitmapWithMatrix",
                    &[bitmap_handle, page_handle, matrix_ptr, clip_ptr, flags as u64],
                )
            })
            .map(|_| ());

        let freed = inner
            .vm
            .free(clip_ptr)
            .and_then(|()| inner.vm.free(matrix_ptr));
        outcome?;
        freed
    }

    /// Destroys a bitmap. Already-closed tokens are a no-op.
    pub fn close_bitmap(&self, bitmap: &BitmapRef) -> Result<()> {
        self.lock()?.close_bitmap_by_ref(bitmap)
    }
}
