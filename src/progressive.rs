//! Progressive (pausable) rendering.
//!
//! The pause callback crosses the guest boundary through a small
//! `IFSDK_PAUSE` glue struct allocated by the guest; the struct only
//! carries the registry key back to the host export. One registration
//! is live per page at a time and is replaced wholesale whenever a
//! progressive call supplies a new callback.

use crate::callbacks;
use crate::error::{Error, Result};
use crate::handles::{Inner, PauseReg};
use crate::instance::Instance;
use crate::refs::{BitmapRef, PageRef};

/// Progressive render state, as reported by the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    Ready,
    ToBeContinued,
    Done,
    Failed,
}

impl RenderStatus {
    fn from_raw(raw: i32) -> Result<Self> {
        match raw {
            0 => Ok(Self::Ready),
            1 => Ok(Self::ToBeContinued),
            2 => Ok(Self::Done),
            3 => Ok(Self::Failed),
            _ => Err(Error::DecodeFailed("render status")),
        }
    }
}

impl Instance {
    /// Begins rendering a page into a bitmap. The pause callback is
    /// polled by the guest between rendering stages; returning `true`
    /// yields control back with [`RenderStatus::ToBeContinued`].
    #[allow(clippy::too_many_arguments)]
    pub fn render_page_start(
        &self,
        bitmap: &BitmapRef,
        page: &PageRef,
        start_x: i32,
        start_y: i32,
        size_x: i32,
        size_y: i32,
        rotate: i32,
        flags: u32,
        pause: impl FnMut() -> bool + Send + 'static,
    ) -> Result<RenderStatus> {
        let mut inner = self.lock()?;
        let bitmap_handle = inner.bitmap(bitmap)?.handle;
        let page_handle = inner.page(page)?.handle;

        let glue = inner.install_pause(page, Box::new(pause))?;

        let status = inner
            .vm
            .call(
                "FPDF_RenderPageBitmap_Start",
                &[
                    bitmap_handle,
                    page_handle,
                    start_x as u32 as u64,
                    start_y as u32 as u64,
                    size_x as u32 as u64,
                    size_y as u32 as u64,
                    rotate as u32 as u64,
                    flags as u64,
                    glue,
                ],
            )?
            .as_i32()?;
        RenderStatus::from_raw(status)
    }

    /// Continues a paused render. A fresh pause callback may be
    /// supplied; `None` runs to completion.
    pub fn render_page_continue(
        &self,
        page: &PageRef,
        pause: Option<Box<dyn FnMut() -> bool + Send>>,
    ) -> Result<RenderStatus> {
        let mut inner = self.lock()?;
        let page_handle = inner.page(page)?.handle;

        // The previous registration is gone either way.
        inner.drop_pause_reg(page)?;
        let glue = match pause {
            Some(pause) => inner.install_pause(page, pause)?,
            None => 0,
        };

        let status = inner
            .vm
            .call("FPDF_RenderPage_Continue", &[page_handle, glue])?
            .as_i32()?;
        RenderStatus::from_raw(status)
    }

    /// Ends a progressive render and releases its pause registration.
    pub fn render_page_close(&self, page: &PageRef) -> Result<()> {
        let mut inner = self.lock()?;
        let page_handle = inner.page(page)?.handle;
        inner.vm.call("FPDF_RenderPage_Close", &[page_handle])?;
        inner.drop_pause_reg(page)
    }
}

impl Inner {
    /// Replaces the page's pause registration: new table entry, new
    /// guest glue struct carrying the key.
    fn install_pause(&mut self, page: &PageRef, pause: callbacks::PauseFn) -> Result<u64> {
        self.drop_pause_reg(page)?;

        let key = callbacks::register_pause(pause);
        let glue = self
            .vm
            .call("IFSDK_PAUSE_Create", &[key as u64])
            .and_then(|ret| ret.as_ptr());

        match glue {
            Ok(0) => {
                callbacks::remove_pause(key);
                Err(Error::GuestFailure("IFSDK_PAUSE_Create"))
            }
            Ok(glue) => {
                self.pauses.insert(page.clone(), PauseReg { key, glue });
                Ok(glue)
            }
            Err(err) => {
                callbacks::remove_pause(key);
                Err(err)
            }
        }
    }
}
