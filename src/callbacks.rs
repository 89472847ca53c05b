//! Process-wide registries for guest-to-host callbacks.
//!
//! PDFium takes C function pointers inside structs (`FPDF_FILEACCESS`,
//! `FPDF_FILEWRITE`, `IFSDK_PAUSE`, `FPDF_FORMFILLINFO`). The
//! WebAssembly build replaces those with small guest-side glue structs
//! that carry an opaque `u32` key and forward every invocation to a
//! host export (see [`crate::imports`]), which looks the key up here.
//!
//! Keys are handed out by a host-side atomic counter and are never
//! derived from guest pointer values, so two instances can never mint
//! colliding entries no matter how their allocators behave. The tables
//! are process-wide because the host exports have no instance context;
//! the cost is that callback-bearing operations assume one logical
//! caller at a time per instance, which the instance-level lock
//! already enforces.

use std::collections::HashMap;
use std::io::{Read, Seek, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use crate::geometry::RectF;
use crate::refs::PageRef;

static NEXT_KEY: AtomicU32 = AtomicU32::new(1);

pub(crate) fn next_key() -> u32 {
    NEXT_KEY.fetch_add(1, Ordering::Relaxed)
}

// === File readers === //

pub(crate) trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

static FILE_READERS: LazyLock<Mutex<HashMap<u32, Box<dyn ReadSeek>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

pub(crate) fn register_reader(reader: Box<dyn ReadSeek>) -> u32 {
    let key = next_key();
    lock(&FILE_READERS).insert(key, reader);
    key
}

pub(crate) fn with_reader<R>(key: u32, f: impl FnOnce(&mut dyn ReadSeek) -> R) -> Option<R> {
    let mut readers = lock(&FILE_READERS);
    readers.get_mut(&key).map(|reader| f(reader.as_mut()))
}

pub(crate) fn remove_reader(key: u32) {
    lock(&FILE_READERS).remove(&key);
}

// === File writers === //

static FILE_WRITERS: LazyLock<Mutex<HashMap<u32, Box<dyn Write + Send>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

pub(crate) fn register_writer(writer: Box<dyn Write + Send>) -> u32 {
    let key = next_key();
    lock(&FILE_WRITERS).insert(key, writer);
    key
}

pub(crate) fn with_writer<R>(key: u32, f: impl FnOnce(&mut dyn Write) -> R) -> Option<R> {
    let mut writers = lock(&FILE_WRITERS);
    writers.get_mut(&key).map(|writer| f(writer.as_mut()))
}

pub(crate) fn remove_writer(key: u32) -> Option<Box<dyn Write + Send>> {
    lock(&FILE_WRITERS).remove(&key)
}

// === Pause callbacks === //

/// Returns `true` to pause rendering now.
pub(crate) type PauseFn = Box<dyn FnMut() -> bool + Send>;

static PAUSE_FNS: LazyLock<Mutex<HashMap<u32, PauseFn>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

pub(crate) fn register_pause(pause: PauseFn) -> u32 {
    let key = next_key();
    lock(&PAUSE_FNS).insert(key, pause);
    key
}

pub(crate) fn call_pause(key: u32) -> Option<bool> {
    let mut pauses = lock(&PAUSE_FNS);
    pauses.get_mut(&key).map(|pause| pause())
}

pub(crate) fn remove_pause(key: u32) {
    lock(&PAUSE_FNS).remove(&key);
}

// === Form-fill handlers === //

/// Host-side receiver for form-fill environment events.
pub trait FormFillHandler: Send {
    /// A page region must be redrawn.
    fn invalidate(&mut self, _page: PageRef, _rect: RectF) {}

    /// The document changed (a field value was edited, ...).
    fn on_change(&mut self) {}
}

pub(crate) struct FormFillEntry {
    pub handler: Box<dyn FormFillHandler>,
    /// Raw guest page pointer → issued token, shared with the owning
    /// instance so invalidation events can name the page without
    /// touching the instance lock.
    pub pages: Arc<Mutex<HashMap<u64, PageRef>>>,
}

static FORM_FILLS: LazyLock<Mutex<HashMap<u32, FormFillEntry>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

pub(crate) fn register_form_fill(entry: FormFillEntry) -> u32 {
    let key = next_key();
    lock(&FORM_FILLS).insert(key, entry);
    key
}

pub(crate) fn with_form_fill<R>(key: u32, f: impl FnOnce(&mut FormFillEntry) -> R) -> Option<R> {
    let mut fills = lock(&FORM_FILLS);
    fills.get_mut(&key).map(f)
}

pub(crate) fn remove_form_fill(key: u32) {
    lock(&FORM_FILLS).remove(&key);
}

// === Unsupported-feature handler === //

/// Document feature PDFium reports as unsupported in this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedFeature {
    XfaForm,
    PortableCollection,
    Attachment,
    Security,
    SharedReview,
    SharedFormAcrobat,
    SharedFormFilesystem,
    SharedFormEmail,
    Unknown(u32),
}

impl UnsupportedFeature {
    pub(crate) fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::XfaForm,
            2 => Self::PortableCollection,
            3 => Self::Attachment,
            4 => Self::Security,
            5 => Self::SharedReview,
            6 => Self::SharedFormAcrobat,
            7 => Self::SharedFormFilesystem,
            8 => Self::SharedFormEmail,
            other => Self::Unknown(other),
        }
    }
}

/// Receiver for unsupported-feature notifications.
pub type UnsupportedHandler = Box<dyn Fn(UnsupportedFeature) + Send + Sync>;

static UNSUPPORTED_HANDLER: Mutex<Option<UnsupportedHandler>> = Mutex::new(None);

/// Installs (or clears) the process-wide unsupported-feature handler.
pub fn set_unsupported_feature_handler(handler: Option<UnsupportedHandler>) {
    *UNSUPPORTED_HANDLER.lock().unwrap_or_else(|e| e.into_inner()) = handler;
}

pub(crate) fn notify_unsupported(feature: UnsupportedFeature) {
    let handler = UNSUPPORTED_HANDLER.lock().unwrap_or_else(|e| e.into_inner());
    match handler.as_ref() {
        Some(handler) => handler(feature),
        None => log::warn!("document uses unsupported feature {feature:?}"),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
