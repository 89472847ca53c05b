//! Handle registry: raw guest pointers filed under opaque tokens.
//!
//! The instance owns one map per object category; a document
//! additionally tracks the token sets of its children so that closing
//! it can cascade. Child sets hold tokens only — the category maps are
//! the single owner of every handle.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::callbacks;
use crate::error::{Error, Result};
use crate::refs::{
    ActionRef, BitmapRef, BookmarkRef, DestRef, DocumentRef, PageRef, SearchRef, TextPageRef,
};
use crate::vm::Vm;

// === Handle records === //

pub(crate) struct DocumentHandle {
    pub handle: u64,
    /// Backing buffer for documents opened from memory.
    pub data_ptr: Option<u64>,
    /// `FPDF_FILEACCESS` glue + reader key for custom-reader documents.
    pub file_access: Option<FileAccessReg>,
    pub form_fill: Option<FormFillReg>,
    /// The page PDFium currently has loaded for this document, if any.
    pub current_page: Option<PageRef>,
    pub pages: HashSet<PageRef>,
    pub bookmarks: HashSet<BookmarkRef>,
    pub dests: HashSet<DestRef>,
    pub actions: HashSet<ActionRef>,
    pub text_pages: HashSet<TextPageRef>,
    pub searches: HashSet<SearchRef>,
}

pub(crate) struct FileAccessReg {
    pub key: u32,
    pub glue: u64,
}

pub(crate) struct FormFillReg {
    pub key: u32,
    pub glue: u64,
    pub form_handle: u64,
}

pub(crate) struct PageHandle {
    pub handle: u64,
    pub index: i32,
    pub document: DocumentRef,
}

pub(crate) struct BookmarkHandle {
    pub handle: u64,
    pub document: DocumentRef,
}

pub(crate) struct DestHandle {
    pub handle: u64,
    pub document: DocumentRef,
}

pub(crate) struct ActionHandle {
    pub handle: u64,
    pub document: DocumentRef,
}

pub(crate) struct TextPageHandle {
    pub handle: u64,
    pub document: DocumentRef,
}

pub(crate) struct SearchHandle {
    pub handle: u64,
    pub document: DocumentRef,
    /// The UTF-16LE query buffer stays alive for the whole search.
    pub query_ptr: u64,
}

pub(crate) struct BitmapHandle {
    pub handle: u64,
}

pub(crate) struct PauseReg {
    pub key: u32,
    pub glue: u64,
}

// === Inner === //

/// Everything behind the instance lock.
pub(crate) struct Inner {
    pub vm: Vm,
    pub documents: HashMap<DocumentRef, DocumentHandle>,
    pub pages: HashMap<PageRef, PageHandle>,
    pub bookmarks: HashMap<BookmarkRef, BookmarkHandle>,
    pub dests: HashMap<DestRef, DestHandle>,
    pub actions: HashMap<ActionRef, ActionHandle>,
    pub text_pages: HashMap<TextPageRef, TextPageHandle>,
    pub searches: HashMap<SearchRef, SearchHandle>,
    pub bitmaps: HashMap<BitmapRef, BitmapHandle>,
    /// Active pause registration per page, replaced wholesale on each
    /// progressive call that supplies a new callback.
    pub pauses: HashMap<PageRef, PauseReg>,
    /// Raw guest page pointer → token, shared with form-fill entries.
    pub page_ptrs: Arc<Mutex<HashMap<u64, PageRef>>>,
    pub closed: bool,
}

macro_rules! resolver {
    ($fn:ident, $map:ident, $ref:ty, $handle:ty) => {
        pub fn $fn(&self, token: &$ref) -> Result<&$handle> {
            self.$map.get(token).ok_or(Error::HandleNotFound {
                category: <$ref>::CATEGORY,
            })
        }
    };
}

impl Inner {
    pub fn new(vm: Vm) -> Self {
        Self {
            vm,
            documents: HashMap::new(),
            pages: HashMap::new(),
            bookmarks: HashMap::new(),
            dests: HashMap::new(),
            actions: HashMap::new(),
            text_pages: HashMap::new(),
            searches: HashMap::new(),
            bitmaps: HashMap::new(),
            pauses: HashMap::new(),
            page_ptrs: Arc::default(),
            closed: false,
        }
    }

    resolver!(document, documents, DocumentRef, DocumentHandle);
    resolver!(page, pages, PageRef, PageHandle);
    resolver!(text_page, text_pages, TextPageRef, TextPageHandle);
    resolver!(search, searches, SearchRef, SearchHandle);
    resolver!(bitmap, bitmaps, BitmapRef, BitmapHandle);
    resolver!(bookmark, bookmarks, BookmarkRef, BookmarkHandle);
    resolver!(dest, dests, DestRef, DestHandle);
    resolver!(action, actions, ActionRef, ActionHandle);

    // === Registration === //

    pub fn register_document(&mut self, handle: u64) -> DocumentRef {
        let token = DocumentRef::generate();
        self.documents.insert(
            token.clone(),
            DocumentHandle {
                handle,
                data_ptr: None,
                file_access: None,
                form_fill: None,
                current_page: None,
                pages: HashSet::new(),
                bookmarks: HashSet::new(),
                dests: HashSet::new(),
                actions: HashSet::new(),
                text_pages: HashSet::new(),
                searches: HashSet::new(),
            },
        );
        log::debug!("registered document {token} (guest handle {handle:#x})");
        token
    }

    pub fn register_page(&mut self, document: &DocumentRef, handle: u64, index: i32) -> PageRef {
        let token = PageRef::generate();
        self.pages.insert(
            token.clone(),
            PageHandle {
                handle,
                index,
                document: document.clone(),
            },
        );
        if let Some(doc) = self.documents.get_mut(document) {
            doc.pages.insert(token.clone());
            doc.current_page = Some(token.clone());
        }
        self.page_ptrs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(handle, token.clone());
        token
    }

    pub fn register_bookmark(&mut self, document: &DocumentRef, handle: u64) -> BookmarkRef {
        let token = BookmarkRef::generate();
        self.bookmarks.insert(
            token.clone(),
            BookmarkHandle {
                handle,
                document: document.clone(),
            },
        );
        if let Some(doc) = self.documents.get_mut(document) {
            doc.bookmarks.insert(token.clone());
        }
        token
    }

    pub fn register_dest(&mut self, document: &DocumentRef, handle: u64) -> DestRef {
        let token = DestRef::generate();
        self.dests.insert(
            token.clone(),
            DestHandle {
                handle,
                document: document.clone(),
            },
        );
        if let Some(doc) = self.documents.get_mut(document) {
            doc.dests.insert(token.clone());
        }
        token
    }

    pub fn register_action(&mut self, document: &DocumentRef, handle: u64) -> ActionRef {
        let token = ActionRef::generate();
        self.actions.insert(
            token.clone(),
            ActionHandle {
                handle,
                document: document.clone(),
            },
        );
        if let Some(doc) = self.documents.get_mut(document) {
            doc.actions.insert(token.clone());
        }
        token
    }

    pub fn register_text_page(&mut self, document: &DocumentRef, handle: u64) -> TextPageRef {
        let token = TextPageRef::generate();
        self.text_pages.insert(
            token.clone(),
            TextPageHandle {
                handle,
                document: document.clone(),
            },
        );
        if let Some(doc) = self.documents.get_mut(document) {
            doc.text_pages.insert(token.clone());
        }
        token
    }

    pub fn register_search(
        &mut self,
        document: &DocumentRef,
        handle: u64,
        query_ptr: u64,
    ) -> SearchRef {
        let token = SearchRef::generate();
        self.searches.insert(
            token.clone(),
            SearchHandle {
                handle,
                document: document.clone(),
                query_ptr,
            },
        );
        if let Some(doc) = self.documents.get_mut(document) {
            doc.searches.insert(token.clone());
        }
        token
    }

    pub fn register_bitmap(&mut self, handle: u64) -> BitmapRef {
        let token = BitmapRef::generate();
        self.bitmaps.insert(token.clone(), BitmapHandle { handle });
        token
    }

    // === Closing === //

    /// Releases a page handle: guest close, pause cleanup, map and
    /// index removal. Silently a no-op if the token is already gone.
    pub fn close_page_by_ref(&mut self, token: &PageRef) -> Result<()> {
        let Some(page) = self.pages.remove(token) else {
            return Ok(());
        };

        self.page_ptrs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&page.handle);

        if let Some(doc) = self.documents.get_mut(&page.document) {
            doc.pages.remove(token);
            if doc.current_page.as_ref() == Some(token) {
                doc.current_page = None;
            }
        }

        // Both cleanup steps run either way; the first error wins.
        let mut first_err = None;
        note(&mut first_err, self.drop_pause_reg(token));
        note(
            &mut first_err,
            self.vm.call("FPDF_ClosePage", &[page.handle]).map(|_| ()),
        );
        first_err.map_or(Ok(()), Err)
    }

    pub fn close_text_page_by_ref(&mut self, token: &TextPageRef) -> Result<()> {
        let Some(text_page) = self.text_pages.remove(token) else {
            return Ok(());
        };
        if let Some(doc) = self.documents.get_mut(&text_page.document) {
            doc.text_pages.remove(token);
        }
        self.vm.call("FPDFText_ClosePage", &[text_page.handle])?;
        Ok(())
    }

    pub fn close_search_by_ref(&mut self, token: &SearchRef) -> Result<()> {
        let Some(search) = self.searches.remove(token) else {
            return Ok(());
        };
        if let Some(doc) = self.documents.get_mut(&search.document) {
            doc.searches.remove(token);
        }
        let closed = self.vm.call("FPDFText_FindClose", &[search.handle]);
        self.vm.free(search.query_ptr)?;
        closed.map(|_| ())
    }

    pub fn close_bitmap_by_ref(&mut self, token: &BitmapRef) -> Result<()> {
        let Some(bitmap) = self.bitmaps.remove(token) else {
            return Ok(());
        };
        self.vm.call("FPDFBitmap_Destroy", &[bitmap.handle])?;
        Ok(())
    }

    /// Drops a page's pause registration, if any: table entry removed,
    /// guest glue struct freed.
    pub fn drop_pause_reg(&mut self, token: &PageRef) -> Result<()> {
        let Some(reg) = self.pauses.remove(token) else {
            return Ok(());
        };
        callbacks::remove_pause(reg.key);
        self.vm.free(reg.glue)
    }

    /// Cascading document close. Children go first (searches before
    /// their text pages), then the document itself, then host-side
    /// registrations. Every step runs even when an earlier one failed;
    /// the first error is reported.
    pub fn close_document_by_ref(&mut self, token: &DocumentRef) -> Result<()> {
        let Some(doc) = self.documents.remove(token) else {
            return Ok(());
        };

        let mut first_err = None;

        for search in &doc.searches {
            note(&mut first_err, self.close_search_by_ref(search));
        }
        for text_page in &doc.text_pages {
            note(&mut first_err, self.close_text_page_by_ref(text_page));
        }
        for page in &doc.pages {
            note(&mut first_err, self.close_page_by_ref(page));
        }

        // Bookmarks, destinations and actions have no guest-side
        // release call; dropping their tokens is the whole close.
        for bookmark in &doc.bookmarks {
            self.bookmarks.remove(bookmark);
        }
        for dest in &doc.dests {
            self.dests.remove(dest);
        }
        for action in &doc.actions {
            self.actions.remove(action);
        }

        if let Some(form_fill) = &doc.form_fill {
            note(
                &mut first_err,
                self.vm
                    .call("FPDFDOC_ExitFormFillEnvironment", &[form_fill.form_handle])
                    .map(|_| ()),
            );
            note(&mut first_err, self.vm.free(form_fill.glue));
            callbacks::remove_form_fill(form_fill.key);
        }

        note(
            &mut first_err,
            self.vm.call("FPDF_CloseDocument", &[doc.handle]).map(|_| ()),
        );

        if let Some(data_ptr) = doc.data_ptr {
            note(&mut first_err, self.vm.free(data_ptr));
        }
        if let Some(file_access) = &doc.file_access {
            note(&mut first_err, self.vm.free(file_access.glue));
            callbacks::remove_reader(file_access.key);
        }

        log::debug!("closed document {token}");
        first_err.map_or(Ok(()), Err)
    }

    /// Best-effort release of everything the instance still tracks.
    pub fn teardown(&mut self) -> Result<()> {
        let mut first_err = None;

        let documents: Vec<DocumentRef> = self.documents.keys().cloned().collect();
        for document in &documents {
            note(&mut first_err, self.close_document_by_ref(document));
        }

        let bitmaps: Vec<BitmapRef> = self.bitmaps.keys().cloned().collect();
        for bitmap in &bitmaps {
            note(&mut first_err, self.close_bitmap_by_ref(bitmap));
        }

        first_err.map_or(Ok(()), Err)
    }
}

fn note(first_err: &mut Option<Error>, result: Result<()>) {
    if let Err(err) = result {
        log::warn!("release step failed: {err}");
        if first_err.is_none() {
            *first_err = Some(err);
        }
    }
}
