//! Bookmark (outline) tree traversal.

use crate::error::Result;
use crate::handles::Inner;
use crate::instance::Instance;
use crate::refs::{ActionRef, BookmarkRef, DestRef, DocumentRef};

/// One outline item, with its subtree.
#[derive(Debug)]
pub struct Bookmark {
    pub reference: BookmarkRef,
    pub title: Option<String>,
    /// Where activating the bookmark navigates to, if it carries an
    /// explicit destination.
    pub dest: Option<DestRef>,
    /// The action triggered by the bookmark, if any.
    pub action: Option<ActionRef>,
    pub children: Vec<Bookmark>,
}

impl Instance {
    /// Walks the complete bookmark tree of a document. Every bookmark,
    /// destination and action encountered is registered as a child of
    /// the document and stays resolvable until the document closes.
    pub fn bookmarks(&self, document: &DocumentRef) -> Result<Vec<Bookmark>> {
        let mut inner = self.lock()?;
        let doc_handle = inner.document(document)?.handle;
        inner.walk_bookmarks(document, doc_handle, 0)
    }
}

impl Inner {
    fn walk_bookmarks(
        &mut self,
        document: &DocumentRef,
        doc_handle: u64,
        parent: u64,
    ) -> Result<Vec<Bookmark>> {
        let mut items = Vec::new();

        let mut cursor = self
            .vm
            .call("FPDFBookmark_GetFirstChild", &[doc_handle, parent])?
            .as_ptr()?;

        while cursor != 0 {
            let reference = self.register_bookmark(document, cursor);

            let title = self
                .vm
                .utf16_two_call("FPDFBookmark_GetTitle", &[cursor])?;

            let dest_handle = self
                .vm
                .call("FPDFBookmark_GetDest", &[doc_handle, cursor])?
                .as_ptr()?;
            let dest = (dest_handle != 0).then(|| self.register_dest(document, dest_handle));

            let action_handle = self
                .vm
                .call("FPDFBookmark_GetAction", &[cursor])?
                .as_ptr()?;
            let action =
                (action_handle != 0).then(|| self.register_action(document, action_handle));

            let children = self.walk_bookmarks(document, doc_handle, cursor)?;

            items.push(Bookmark {
                reference,
                title,
                dest,
                action,
                children,
            });

            cursor = self
                .vm
                .call("FPDFBookmark_GetNextSibling", &[doc_handle, cursor])?
                .as_ptr()?;
        }

        Ok(items)
    }
}
