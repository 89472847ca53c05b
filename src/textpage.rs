//! Text extraction and search.

use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::refs::{PageRef, SearchRef, TextPageRef};

/// Flags for [`Instance::find_start`]; combine with bitwise or.
pub mod search_flags {
    pub const MATCH_CASE: u32 = 1;
    pub const MATCH_WHOLE_WORD: u32 = 2;
    pub const CONSECUTIVE: u32 = 4;
}

impl Instance {
    /// Prepares the text content of a loaded page for extraction and
    /// search. The text page is registered under the page's document
    /// and survives until closed explicitly or the document closes.
    pub fn load_text_page(&self, page: &PageRef) -> Result<TextPageRef> {
        let mut inner = self.lock()?;
        let page_handle = inner.page(page)?.handle;
        let document = inner.page(page)?.document.clone();

        let handle = inner.vm.call("FPDFText_LoadPage", &[page_handle])?.as_ptr()?;
        if handle == 0 {
            return Err(Error::GuestFailure("FPDFText_LoadPage"));
        }

        Ok(inner.register_text_page(&document, handle))
    }

    /// Releases a text page. Already-closed tokens are a no-op.
    pub fn close_text_page(&self, text_page: &TextPageRef) -> Result<()> {
        self.lock()?.close_text_page_by_ref(text_page)
    }

    /// Number of characters on the text page, counting generated
    /// whitespace.
    pub fn count_chars(&self, text_page: &TextPageRef) -> Result<i32> {
        let mut inner = self.lock()?;
        let handle = inner.text_page(text_page)?.handle;
        let count = inner.vm.call("FPDFText_CountChars", &[handle])?.as_i32()?;
        if count < 0 {
            return Err(Error::GuestFailure("FPDFText_CountChars"));
        }
        Ok(count)
    }

    /// Extracts the whole text content of the page.
    pub fn text(&self, text_page: &TextPageRef) -> Result<String> {
        let mut inner = self.lock()?;
        let handle = inner.text_page(text_page)?.handle;

        let count = inner.vm.call("FPDFText_CountChars", &[handle])?.as_i32()?;
        if count < 0 {
            return Err(Error::GuestFailure("FPDFText_CountChars"));
        }
        if count == 0 {
            return Ok(String::new());
        }

        // One extra unit for the terminator the guest appends.
        let units = count as u64 + 1;
        let buffer = inner.vm.malloc(units * 2)?;

        let written = inner
            .vm
            .call("FPDFText_GetText", &[handle, 0, count as u64, buffer])
            .and_then(|ret| ret.as_i32());
        let value = match written {
            Ok(written) if written > 0 => inner
                .vm
                .read_bytes(buffer, written as usize * 2)
                .and_then(|bytes| crate::text::from_utf16le(&bytes)),
            Ok(_) => Ok(String::new()),
            Err(err) => Err(err),
        };

        inner.vm.free(buffer)?;
        value
    }

    /// Starts a search for `query` on a text page. The query is copied
    /// into guest memory and stays allocated for the lifetime of the
    /// search, as PDFium reads it incrementally.
    pub fn find_start(
        &self,
        text_page: &TextPageRef,
        query: &str,
        flags: u32,
        start_index: i32,
    ) -> Result<SearchRef> {
        let mut inner = self.lock()?;
        let handle = inner.text_page(text_page)?.handle;
        let document = inner.text_page(text_page)?.document.clone();

        let query_ptr = inner.vm.alloc_wide_string(query)?;
        let search = inner
            .vm
            .call(
                "FPDFText_FindStart",
                &[
                    handle,
                    query_ptr,
                    flags as u64,
                    start_index as u32 as u64,
                ],
            )
            .and_then(|ret| ret.as_ptr());

        match search {
            Ok(0) => {
                let _ = inner.vm.free(query_ptr);
                Err(Error::GuestFailure("FPDFText_FindStart"))
            }
            Ok(search) => Ok(inner.register_search(&document, search, query_ptr)),
            Err(err) => {
                let _ = inner.vm.free(query_ptr);
                Err(err)
            }
        }
    }

    /// Advances to the next match. Returns `false` when exhausted.
    pub fn find_next(&self, search: &SearchRef) -> Result<bool> {
        let mut inner = self.lock()?;
        let handle = inner.search(search)?.handle;
        Ok(inner.vm.call("FPDFText_FindNext", &[handle])?.as_i32()? != 0)
    }

    /// Character index of the current match.
    pub fn match_index(&self, search: &SearchRef) -> Result<i32> {
        let mut inner = self.lock()?;
        let handle = inner.search(search)?.handle;
        inner
            .vm
            .call("FPDFText_GetSchResultIndex", &[handle])?
            .as_i32()
    }

    /// Character length of the current match.
    pub fn match_length(&self, search: &SearchRef) -> Result<i32> {
        let mut inner = self.lock()?;
        let handle = inner.search(search)?.handle;
        inner.vm.call("FPDFText_GetSchCount", &[handle])?.as_i32()
    }

    /// Ends a search and frees its query buffer. Already-closed tokens
    /// are a no-op.
    pub fn close_search(&self, search: &SearchRef) -> Result<()> {
        self.lock()?.close_search_by_ref(search)
    }
}
