//! Document metadata queries.

use crate::error::Result;
use crate::instance::Instance;
use crate::refs::DocumentRef;

impl Instance {
    /// Reads an information-dictionary entry (`Title`, `Author`,
    /// `Subject`, `Keywords`, `Creator`, `Producer`, `CreationDate`,
    /// `ModDate`). Returns `None` when the document has no value for
    /// the tag.
    pub fn metadata_text(&self, document: &DocumentRef, tag: &str) -> Result<Option<String>> {
        let mut inner = self.lock()?;
        let handle = inner.document(document)?.handle;

        let tag_ptr = inner.vm.alloc_cstring(tag)?;
        let value = inner.vm.utf16_two_call("FPDF_GetMetaText", &[handle, tag_ptr]);
        let freed = inner.vm.free(tag_ptr);
        let value = value?;
        freed?;
        Ok(value)
    }
}
