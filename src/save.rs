//! Saving documents through the file-write bridge.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::callbacks;
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::refs::DocumentRef;

/// How the incremental structure of the saved file is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFlags {
    Incremental,
    NoIncremental,
    RemoveSecurity,
}

impl SaveFlags {
    fn as_word(self) -> u64 {
        match self {
            Self::Incremental => 1,
            Self::NoIncremental => 2,
            Self::RemoveSecurity => 3,
        }
    }
}

impl Instance {
    /// Saves a copy of the document, streaming the output to `writer`
    /// through the guest's `FPDF_FILEWRITE` bridge. `version`, when
    /// given, forces the PDF file version (times ten: 17 for 1.7).
    pub fn save_document<W: Write + Send + 'static>(
        &self,
        document: &DocumentRef,
        writer: W,
        flags: Option<SaveFlags>,
        version: Option<i32>,
    ) -> Result<()> {
        let mut inner = self.lock()?;
        let handle = inner.document(document)?.handle;

        let key = callbacks::register_writer(Box::new(writer));
        let glue = inner
            .vm
            .call("FPDF_FILEWRITE_Create", &[key as u64])
            .and_then(|ret| ret.as_ptr());
        let glue = match glue {
            Ok(0) => {
                callbacks::remove_writer(key);
                return Err(Error::GuestFailure("FPDF_FILEWRITE_Create"));
            }
            Ok(glue) => glue,
            Err(err) => {
                callbacks::remove_writer(key);
                return Err(err);
            }
        };

        let flags_word = flags.map_or(0, SaveFlags::as_word);
        let success = match version {
            None => inner
                .vm
                .call("FPDF_SaveAsCopy", &[handle, glue, flags_word]),
            Some(version) => inner.vm.call(
                "FPDF_SaveWithVersion",
                &[handle, glue, flags_word, version as u32 as u64],
            ),
        }
        .and_then(|ret| ret.as_i32());

        // The writer registration and the glue struct are transient,
        // success or not.
        callbacks::remove_writer(key);
        let freed = inner.vm.free(glue);

        match success? {
            0 => Err(Error::GuestFailure("FPDF_SaveAsCopy")),
            _ => freed,
        }
    }

    /// Saves a copy of the document to a file path.
    pub fn save_document_to_file(
        &self,
        document: &DocumentRef,
        path: impl AsRef<Path>,
        flags: Option<SaveFlags>,
        version: Option<i32>,
    ) -> Result<()> {
        let file = File::create(path)?;
        self.save_document(document, file, flags, version)
    }

    /// Saves a copy of the document into a byte vector.
    pub fn save_document_to_bytes(
        &self,
        document: &DocumentRef,
        flags: Option<SaveFlags>,
        version: Option<i32>,
    ) -> Result<Vec<u8>> {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        self.save_document(document, SharedBuffer(buffer.clone()), flags, version)?;

        let bytes = buffer.lock().unwrap_or_else(|e| e.into_inner());
        Ok(bytes.clone())
    }
}

struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
