//! Release-accounting tests. These reach into the registry to read the
//! stand-in module's counters, pinning down exactly how many guest
//! release calls each host operation performs.

use crate::callbacks;
use crate::error::Error;
use crate::geometry::Matrix;
use crate::handles::PauseReg;
use crate::instance::{Config, Instance};

const STUB: &str = include_str!("../tests/stub.wat");

fn instance() -> Instance {
    let _ = env_logger::builder().is_test(true).try_init();
    Config::new(STUB.as_bytes().to_vec()).build().unwrap()
}

fn counter(pdfium: &Instance, name: &str) -> i32 {
    let mut inner = pdfium.lock().unwrap();
    inner.vm.call(name, &[]).unwrap().as_i32().unwrap()
}

fn counter_f32(pdfium: &Instance, name: &str) -> f32 {
    let mut inner = pdfium.lock().unwrap();
    inner.vm.call(name, &[]).unwrap().as_f32().unwrap()
}

#[test]
fn cascade_releases_each_child_exactly_once() {
    let pdfium = instance();
    let doc = pdfium.open_document(b"%PDF-counter", None).unwrap();

    let page = pdfium.load_page(&doc, 0).unwrap();
    let text_page = pdfium.load_text_page(&page).unwrap();
    let _search = pdfium.find_start(&text_page, "x", 0, 0).unwrap();
    // Bookmarks, destinations and actions have no guest release call;
    // they only contribute tokens.
    let _outline = pdfium.bookmarks(&doc).unwrap();

    pdfium.close_document(&doc).unwrap();

    // Three releasable children, each released exactly once, plus the
    // document itself.
    assert_eq!(counter(&pdfium, "page_close_count"), 1);
    assert_eq!(counter(&pdfium, "textpage_close_count"), 1);
    assert_eq!(counter(&pdfium, "search_close_count"), 1);
    assert_eq!(counter(&pdfium, "doc_close_count"), 1);

    // Idempotent: a second close must not release anything again.
    pdfium.close_document(&doc).unwrap();
    assert_eq!(counter(&pdfium, "doc_close_count"), 1);
    assert_eq!(counter(&pdfium, "page_close_count"), 1);
}

#[test]
fn reloading_the_resident_index_is_a_host_side_no_op() {
    let pdfium = instance();
    let doc = pdfium.open_document(b"%PDF-counter", None).unwrap();

    let first = pdfium.load_page(&doc, 2).unwrap();
    assert_eq!(counter(&pdfium, "page_load_count"), 1);

    let again = pdfium.load_page(&doc, 2).unwrap();
    assert_eq!(first, again);
    assert_eq!(counter(&pdfium, "page_load_count"), 1);
    assert_eq!(counter(&pdfium, "page_close_count"), 0);

    let _other = pdfium.load_page(&doc, 0).unwrap();
    assert_eq!(counter(&pdfium, "page_load_count"), 2);
    assert_eq!(counter(&pdfium, "page_close_count"), 1);

    pdfium.close_document(&doc).unwrap();
}

#[test]
fn double_page_close_releases_once() {
    let pdfium = instance();
    let doc = pdfium.open_document(b"%PDF-counter", None).unwrap();
    let page = pdfium.load_page(&doc, 0).unwrap();

    pdfium.close_page(&page).unwrap();
    pdfium.close_page(&page).unwrap();
    assert_eq!(counter(&pdfium, "page_close_count"), 1);

    pdfium.close_document(&doc).unwrap();
}

#[test]
fn document_buffer_is_freed_on_close() {
    let pdfium = instance();
    let doc = pdfium.open_document(b"%PDF-counter", None).unwrap();

    let before = counter(&pdfium, "free_count");
    pdfium.close_document(&doc).unwrap();

    // Exactly the backing byte buffer: no children were loaded and no
    // password was allocated.
    assert_eq!(counter(&pdfium, "free_count") - before, 1);
}

#[test]
fn absent_metadata_skips_the_fill_call() {
    let pdfium = instance();
    let doc = pdfium.open_document(b"%PDF-counter", None).unwrap();

    let before = counter(&pdfium, "free_count");
    assert_eq!(pdfium.metadata_text(&doc, "Producer").unwrap(), None);
    let after = counter(&pdfium, "free_count");

    // Only the tag string was allocated and freed; a fill buffer would
    // have added a second free.
    assert_eq!(after - before, 1);

    pdfium.close_document(&doc).unwrap();
}

#[test]
fn matrix_fields_reach_the_guest_in_order() {
    let pdfium = instance();
    let doc = pdfium.open_document(b"%PDF-counter", None).unwrap();
    let page = pdfium.load_page(&doc, 0).unwrap();
    let bitmap = pdfium.create_bitmap(2, 2, true).unwrap();

    let matrix = Matrix {
        a: 2.5,
        ..Matrix::IDENTITY
    };
    pdfium
        .render_page_bitmap_with_matrix(&bitmap, &page, &matrix, &Default::default(), 0)
        .unwrap();
    assert_eq!(counter_f32(&pdfium, "last_matrix_a"), 2.5);

    pdfium.close_bitmap(&bitmap).unwrap();
    pdfium.close_document(&doc).unwrap();
}

// A build without `FPDF_ClosePage`, for exercising the failure leg of
// the page-close cleanup.
const NO_CLOSE_STUB: &str = r#"
    (module
        (memory (export "memory") 2)
        (global $next (mut i32) (i32.const 1024))
        (global $frees (mut i32) (i32.const 0))

        (func $malloc (export "malloc") (param $size i32) (result i32)
            (local $ptr i32)
            (local.set $ptr (global.get $next))
            (global.set $next
                (i32.and
                    (i32.add (i32.add (global.get $next) (local.get $size)) (i32.const 7))
                    (i32.const -8)))
            (local.get $ptr))

        (func (export "free") (param i32)
            (global.set $frees (i32.add (global.get $frees) (i32.const 1))))

        (func (export "free_count") (result i32) (global.get $frees))

        (func (export "FPDF_InitLibrary"))
        (func (export "FPDF_LoadMemDocument") (param i32 i32 i32) (result i32)
            (i32.const 4096))
        (func (export "FPDF_LoadPage") (param i32 i32) (result i32)
            (i32.const 8192))
    )
"#;

#[test]
fn failed_page_close_still_releases_the_pause_registration() {
    let _ = env_logger::builder().is_test(true).try_init();
    let pdfium = Config::new(NO_CLOSE_STUB.as_bytes().to_vec())
        .build()
        .unwrap();
    let doc = pdfium.open_document(b"%PDF-counter", None).unwrap();
    let page = pdfium.load_page(&doc, 0).unwrap();

    let key = {
        let mut inner = pdfium.lock().unwrap();
        let key = callbacks::register_pause(Box::new(|| false));
        let glue = inner.vm.malloc(8).unwrap();
        inner.pauses.insert(page.clone(), PauseReg { key, glue });
        key
    };

    let before = counter(&pdfium, "free_count");
    assert!(matches!(
        pdfium.close_page(&page),
        Err(Error::Unsupported(name)) if name == "FPDF_ClosePage"
    ));

    // The failed guest call did not swallow the cleanup: the glue was
    // freed, the table entry removed, and the token invalidated.
    assert_eq!(counter(&pdfium, "free_count") - before, 1);
    assert_eq!(callbacks::call_pause(key), None);
    assert!(matches!(
        pdfium.page_size(&page),
        Err(Error::HandleNotFound { .. })
    ));
}

#[test]
fn save_with_version_forwards_the_version_word() {
    let pdfium = instance();
    let doc = pdfium.open_document(b"%PDF-counter", None).unwrap();

    pdfium
        .save_document_to_bytes(&doc, None, Some(14))
        .unwrap();
    assert_eq!(counter(&pdfium, "last_saved_version"), 14);

    pdfium.close_document(&doc).unwrap();
}
