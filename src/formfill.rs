//! Form-fill environment wiring.
//!
//! The guest-side `FPDF_FORMFILLINFO` glue struct forwards the
//! invalidate and on-change slots to host exports carrying the
//! registration key; page pointers in those events are translated
//! back to issued tokens through the instance's shared page index.

use crate::callbacks::{self, FormFillEntry, FormFillHandler};
use crate::error::{Error, Result};
use crate::handles::FormFillReg;
use crate::instance::Instance;
use crate::refs::{DocumentRef, PageRef};

impl Instance {
    /// Attaches a form-fill environment to a document. At most one
    /// environment is live per document; it is torn down when the
    /// document closes.
    pub fn init_form_fill(
        &self,
        document: &DocumentRef,
        handler: impl FormFillHandler + 'static,
    ) -> Result<()> {
        let mut inner = self.lock()?;
        let doc = inner.document(document)?;
        if doc.form_fill.is_some() {
            return Err(Error::InvalidInput(
                "document already has a form-fill environment",
            ));
        }
        let handle = doc.handle;

        let key = callbacks::register_form_fill(FormFillEntry {
            handler: Box::new(handler),
            pages: inner.page_ptrs.clone(),
        });

        let glue = inner
            .vm
            .call("FPDF_FORMFILLINFO_Create", &[key as u64])
            .and_then(|ret| ret.as_ptr());
        let glue = match glue {
            Ok(0) => {
                callbacks::remove_form_fill(key);
                return Err(Error::GuestFailure("FPDF_FORMFILLINFO_Create"));
            }
            Ok(glue) => glue,
            Err(err) => {
                callbacks::remove_form_fill(key);
                return Err(err);
            }
        };

        let form_handle = inner
            .vm
            .call("FPDFDOC_InitFormFillEnvironment", &[handle, glue])
            .and_then(|ret| ret.as_ptr());

        match form_handle {
            Ok(0) => {
                let _ = inner.vm.free(glue);
                callbacks::remove_form_fill(key);
                Err(Error::GuestFailure("FPDFDOC_InitFormFillEnvironment"))
            }
            Ok(form_handle) => {
                if let Some(doc) = inner.documents.get_mut(document) {
                    doc.form_fill = Some(FormFillReg {
                        key,
                        glue,
                        form_handle,
                    });
                }
                Ok(())
            }
            Err(err) => {
                let _ = inner.vm.free(glue);
                callbacks::remove_form_fill(key);
                Err(err)
            }
        }
    }

    /// Notifies the form environment that a page became visible.
    pub fn form_on_after_load_page(&self, document: &DocumentRef, page: &PageRef) -> Result<()> {
        let mut inner = self.lock()?;
        let form_handle = inner
            .document(document)?
            .form_fill
            .as_ref()
            .map(|reg| reg.form_handle)
            .ok_or(Error::InvalidInput("document has no form-fill environment"))?;
        let page_handle = inner.page(page)?.handle;

        inner
            .vm
            .call("FORM_OnAfterLoadPage", &[page_handle, form_handle])?;
        Ok(())
    }

    /// Notifies the form environment that a page is going away. Call
    /// before closing a page that was announced with
    /// [`Instance::form_on_after_load_page`].
    pub fn form_on_before_close_page(
        &self,
        document: &DocumentRef,
        page: &PageRef,
    ) -> Result<()> {
        let mut inner = self.lock()?;
        let form_handle = inner
            .document(document)?
            .form_fill
            .as_ref()
            .map(|reg| reg.form_handle)
            .ok_or(Error::InvalidInput("document has no form-fill environment"))?;
        let page_handle = inner.page(page)?.handle;

        inner
            .vm
            .call("FORM_OnBeforeClosePage", &[page_handle, form_handle])?;
        Ok(())
    }

    /// Draws the form field layer of a page onto a bitmap.
    #[allow(clippy::too_many_arguments)]
    pub fn form_draw(
        &self,
        document: &DocumentRef,
        bitmap: &crate::refs::BitmapRef,
        page: &PageRef,
        start_x: i32,
        start_y: i32,
        size_x: i32,
        size_y: i32,
        rotate: i32,
        flags: u32,
    ) -> Result<()> {
        let mut inner = self.lock()?;
        let form_handle = inner
            .document(document)?
            .form_fill
            .as_ref()
            .map(|reg| reg.form_handle)
            .ok_or(Error::InvalidInput("document has no form-fill environment"))?;
        let bitmap_handle = inner.bitmap(bitmap)?.handle;
        let page_handle = inner.page(page)?.handle;

        inner.vm.call(
            "FPDF_FFLDraw",
            &[
                form_handle,
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
}
