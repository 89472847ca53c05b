//! Opaque references handed out to callers.
//!
//! Every registered guest object is identified by a freshly generated
//! UUIDv4 token, one newtype per object category so that a page token
//! cannot be passed where a document token is expected. Tokens carry no
//! pointer information; they only have meaning to the instance that
//! issued them.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

macro_rules! define_ref {
    ($(#[$attr:meta])* $name:ident => $category:literal) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(Arc<str>);

        impl $name {
            pub(crate) const CATEGORY: &'static str = $category;

            pub(crate) fn generate() -> Self {
                Self(Uuid::new_v4().to_string().into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

define_ref! {
    /// Token for an open document.
    DocumentRef => "document"
}

define_ref! {
    /// Token for the currently loaded page of a document.
    PageRef => "page"
}

define_ref! {
    /// Token for a bookmark (outline item).
    BookmarkRef => "bookmark"
}

define_ref! {
    /// Token for a link destination.
    DestRef => "destination"
}

define_ref! {
    /// Token for a document action.
    ActionRef => "action"
}

define_ref! {
    /// Token for a text page.
    TextPageRef => "text page"
}

define_ref! {
    /// Token for an active text search.
    SearchRef => "search"
}

define_ref! {
    /// Token for a rendering bitmap.
    BitmapRef => "bitmap"
}
