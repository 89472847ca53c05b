//! Opening and closing documents.

use std::io::{Read, Seek};
use std::path::Path;

use crate::callbacks;
use crate::error::{Error, PdfiumError, Result};
use crate::handles::{FileAccessReg, Inner};
use crate::instance::Instance;
use crate::refs::DocumentRef;

impl Instance {
    /// Opens a document from an in-memory byte buffer. The bytes are
    /// copied into guest memory and stay allocated until the document
    /// is closed.
    pub fn open_document(&self, data: &[u8], password: Option<&str>) -> Result<DocumentRef> {
        let mut inner = self.lock()?;
        inner.with_password(password, |inner, password_ptr| {
            inner.open_from_memory(data, password_ptr)
        })
    }

    /// Opens a document from a file path. The file is read host-side
    /// and loaded through the in-memory path.
    pub fn open_document_from_file(
        &self,
        path: impl AsRef<Path>,
        password: Option<&str>,
    ) -> Result<DocumentRef> {
        let data = std::fs::read(path)?;
        self.open_document(&data, password)
    }

    /// Opens a document through a seekable reader. The guest pulls
    /// byte ranges on demand via the file-access bridge, so only the
    /// ranges PDFium touches are ever read.
    pub fn open_document_from_reader<R>(
        &self,
        reader: R,
        size: u64,
        password: Option<&str>,
    ) -> Result<DocumentRef>
    where
        R: Read + Seek + Send + 'static,
    {
        let mut inner = self.lock()?;
        inner.with_password(password, |inner, password_ptr| {
            inner.open_from_reader(Box::new(reader), size, password_ptr)
        })
    }

    /// Closes a document and every child object registered under it.
    /// Closing an already-closed token is a no-op.
    pub fn close_document(&self, document: &DocumentRef) -> Result<()> {
        self.lock()?.close_document_by_ref(document)
    }

    pub fn page_count(&self, document: &DocumentRef) -> Result<i32> {
        let mut inner = self.lock()?;
        let handle = inner.document(document)?.handle;
        inner.vm.call("FPDF_GetPageCount", &[handle])?.as_i32()
    }

    /// PDF file version times ten (14 for 1.4, 17 for 1.7, ...).
    pub fn file_version(&self, document: &DocumentRef) -> Result<i32> {
        let mut inner = self.lock()?;
        let handle = inner.document(document)?.handle;
        let out = inner.vm.alloc_out::<i32>()?;
        let ok = inner
            .vm
            .call("FPDF_GetFileVersion", &[handle, out.ptr])?
            .as_i32()?;
        let version = inner.vm.read_out(&out);
        inner.vm.free_out(out)?;
        if ok == 0 {
            return Err(Error::GuestFailure("FPDF_GetFileVersion"));
        }
        version
    }

    /// Document permission bits, as defined by the PDF standard.
    pub fn permissions(&self, document: &DocumentRef) -> Result<u32> {
        let mut inner = self.lock()?;
        let handle = inner.document(document)?.handle;
        inner.vm.call("FPDF_GetDocPermissions", &[handle])?.as_u32()
    }
}

impl Inner {
    /// Allocates the password C string (if any) around `body`, freeing
    /// it whichever way the body exits.
    fn with_password<T>(
        &mut self,
        password: Option<&str>,
        body: impl FnOnce(&mut Self, u64) -> Result<T>,
    ) -> Result<T> {
        let password_ptr = match password {
            Some(password) => self.vm.alloc_cstring(password)?,
            None => 0,
        };

        let outcome = body(self, password_ptr);

        if password_ptr != 0 {
            self.free_logged(password_ptr, "password buffer");
        }
        outcome
    }

    fn free_logged(&mut self, ptr: u64, what: &str) {
        if let Err(err) = self.vm.free(ptr) {
            log::warn!("could not free {what}: {err}");
        }
    }

    fn open_from_memory(&mut self, data: &[u8], password_ptr: u64) -> Result<DocumentRef> {
        let data_ptr = self.vm.alloc_bytes(data)?;

        // The 32-bit entry point caps the length argument; bigger
        // buffers go through the 64-bit variant.
        let handle = if data.len() <= i32::MAX as usize {
            self.vm.call(
                "FPDF_LoadMemDocument",
                &[data_ptr, data.len() as u64, password_ptr],
            )
        } else {
            self.vm.call(
                "FPDF_LoadMemDocument64",
                &[data_ptr, data.len() as u64, password_ptr],
            )
        }
        .and_then(|ret| ret.as_ptr());

        match handle {
            Ok(0) => {
                let err = self.last_error();
                self.free_logged(data_ptr, "document buffer");
                Err(err)
            }
            Ok(handle) => {
                let token = self.register_document(handle);
                if let Some(doc) = self.documents.get_mut(&token) {
                    doc.data_ptr = Some(data_ptr);
                }
                Ok(token)
            }
            Err(err) => {
                self.free_logged(data_ptr, "document buffer");
                Err(err)
            }
        }
    }

    fn open_from_reader(
        &mut self,
        reader: Box<dyn callbacks::ReadSeek>,
        size: u64,
        password_ptr: u64,
    ) -> Result<DocumentRef> {
        let key = callbacks::register_reader(reader);

        let glue = self
            .vm
            .call("FPDF_FILEACCESS_Create", &[size, key as u64])
            .and_then(|ret| ret.as_ptr());
        let glue = match glue {
            Ok(0) => {
                callbacks::remove_reader(key);
                return Err(Error::GuestFailure("FPDF_FILEACCESS_Create"));
            }
            Ok(glue) => glue,
            Err(err) => {
                callbacks::remove_reader(key);
                return Err(err);
            }
        };

        let handle = self
            .vm
            .call("FPDF_LoadCustomDocument", &[glue, password_ptr])
            .and_then(|ret| ret.as_ptr());

        match handle {
            Ok(0) => {
                let err = self.last_error();
                self.free_logged(glue, "file-access glue");
                callbacks::remove_reader(key);
                Err(err)
            }
            Ok(handle) => {
                let token = self.register_document(handle);
                if let Some(doc) = self.documents.get_mut(&token) {
                    doc.file_access = Some(FileAccessReg { key, glue });
                }
                Ok(token)
            }
            Err(err) => {
                self.free_logged(glue, "file-access glue");
                callbacks::remove_reader(key);
                Err(err)
            }
        }
    }

    /// Reads `FPDF_GetLastError` and wraps it. Falls back to a plain
    /// failure if even the error query fails.
    pub(crate) fn last_error(&mut self) -> Error {
        match self
            .vm
            .call("FPDF_GetLastError", &[])
            .and_then(|ret| ret.as_u32())
        {
            Ok(code) => Error::Pdfium(PdfiumError::from_last_error(code)),
            Err(err) => err,
        }
    }
}

