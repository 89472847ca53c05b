//! End-to-end tests against a behavioral stand-in module (see
//! `stub.wat`): the full marshal, registry, and callback paths run for
//! real; only PDFium's rendering internals are faked.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use pdfium_wasm::{
    search_flags, Config, Error, FormFillHandler, Instance, Matrix, PageRef, PdfiumError, RectF,
    RenderStatus, SaveFlags,
};

const STUB: &str = include_str!("stub.wat");
const SAMPLE: &[u8] = b"%PDF-1.7 sample bytes for the stub";

fn instance() -> Instance {
    let _ = env_logger::builder().is_test(true).try_init();
    Config::new(STUB.as_bytes().to_vec()).build().unwrap()
}

#[test]
fn open_inspect_extract_close() {
    let pdfium = instance();
    let doc = pdfium.open_document(SAMPLE, None).unwrap();

    assert_eq!(pdfium.page_count(&doc).unwrap(), 3);
    assert_eq!(pdfium.file_version(&doc).unwrap(), 17);
    assert_eq!(pdfium.permissions(&doc).unwrap(), u32::MAX);
    assert_eq!(
        pdfium.metadata_text(&doc, "Title").unwrap().as_deref(),
        Some("Sample")
    );
    assert_eq!(pdfium.metadata_text(&doc, "Producer").unwrap(), None);

    let page = pdfium.load_page(&doc, 0).unwrap();
    let size = pdfium.page_size(&page).unwrap();
    assert_eq!((size.width, size.height), (595.0, 842.0));

    let text_page = pdfium.load_text_page(&page).unwrap();
    assert_eq!(pdfium.count_chars(&text_page).unwrap(), 6);
    assert_eq!(pdfium.text(&text_page).unwrap(), "Sample");

    let search = pdfium
        .find_start(&text_page, "Sample", search_flags::MATCH_CASE, 0)
        .unwrap();
    assert!(pdfium.find_next(&search).unwrap());
    assert_eq!(pdfium.match_index(&search).unwrap(), 0);
    assert_eq!(pdfium.match_length(&search).unwrap(), 6);
    assert!(!pdfium.find_next(&search).unwrap());

    pdfium.close_search(&search).unwrap();
    pdfium.close_text_page(&text_page).unwrap();
    pdfium.close_page(&page).unwrap();
    pdfium.close_document(&doc).unwrap();

    assert!(matches!(
        pdfium.page_count(&doc),
        Err(Error::HandleNotFound { category: "document" })
    ));
}

#[test]
fn open_failures_carry_pdfium_codes() {
    let pdfium = instance();

    assert!(matches!(
        pdfium.open_document(b"", None),
        Err(Error::Pdfium(PdfiumError::Format))
    ));
    assert!(matches!(
        pdfium.open_document(b"not a pdf at all", None),
        Err(Error::Pdfium(PdfiumError::Format))
    ));

    let err = pdfium.open_document(SAMPLE, Some("wrong")).unwrap_err();
    assert!(err.is_password_error());

    // The stub accepts any password starting with 's'.
    let doc = pdfium.open_document(SAMPLE, Some("secret")).unwrap();
    pdfium.close_document(&doc).unwrap();
}

#[test]
fn reader_backed_document_and_save() {
    let pdfium = instance();
    let doc = pdfium
        .open_document_from_reader(Cursor::new(SAMPLE.to_vec()), SAMPLE.len() as u64, None)
        .unwrap();
    assert_eq!(pdfium.page_count(&doc).unwrap(), 3);

    let bytes = pdfium.save_document_to_bytes(&doc, None, None).unwrap();
    assert_eq!(bytes, b"%PDF-stub\n");

    let bytes = pdfium
        .save_document_to_bytes(&doc, Some(SaveFlags::NoIncremental), Some(17))
        .unwrap();
    assert_eq!(bytes, b"%PDF-stub\n");

    pdfium.close_document(&doc).unwrap();
}

#[test]
fn reader_failure_maps_to_file_error() {
    let pdfium = instance();
    // Claimed size exceeds what the reader can produce, so the guest's
    // header read fails through the bridge.
    let result = pdfium.open_document_from_reader(Cursor::new(vec![0u8; 2]), 1 << 20, None);
    assert!(matches!(result, Err(Error::Pdfium(PdfiumError::File))));
}

#[test]
fn tokens_are_unique_across_documents() {
    let pdfium = instance();
    let doc_a = pdfium.open_document(SAMPLE, None).unwrap();
    let doc_b = pdfium.open_document(SAMPLE, None).unwrap();
    assert_ne!(doc_a.as_str(), doc_b.as_str());

    let page_a = pdfium.load_page(&doc_a, 0).unwrap();
    let page_b = pdfium.load_page(&doc_b, 0).unwrap();
    assert_ne!(page_a.as_str(), page_b.as_str());

    pdfium.close_document(&doc_a).unwrap();
    // The other document is untouched by the close.
    assert_eq!(pdfium.page_size(&page_b).unwrap().width, 595.0);
    pdfium.close_document(&doc_b).unwrap();
}

#[test]
fn one_page_resident_per_document() {
    let pdfium = instance();
    let doc = pdfium.open_document(SAMPLE, None).unwrap();

    let first = pdfium.load_page(&doc, 0).unwrap();
    let again = pdfium.load_page(&doc, 0).unwrap();
    assert_eq!(first, again);

    let second = pdfium.load_page(&doc, 1).unwrap();
    assert_ne!(first, second);

    // Loading a different index displaced the first page.
    assert!(matches!(
        pdfium.page_size(&first),
        Err(Error::HandleNotFound { category: "page" })
    ));
    // Closing the displaced token again is a quiet no-op.
    pdfium.close_page(&first).unwrap();

    assert!(matches!(
        pdfium.load_page(&doc, 99),
        Err(Error::Pdfium(PdfiumError::Page))
    ));

    pdfium.close_document(&doc).unwrap();
}

#[test]
fn closing_a_document_cascades_to_children() {
    let pdfium = instance();
    let doc = pdfium.open_document(SAMPLE, None).unwrap();

    let page = pdfium.load_page(&doc, 0).unwrap();
    let text_page = pdfium.load_text_page(&page).unwrap();
    let search = pdfium.find_start(&text_page, "Sample", 0, 0).unwrap();
    let outline = pdfium.bookmarks(&doc).unwrap();
    assert_eq!(outline.len(), 2);
    assert_eq!(outline[0].title.as_deref(), Some("One"));
    assert!(outline[0].dest.is_some());
    assert!(outline[1].action.is_some());

    pdfium.close_document(&doc).unwrap();

    assert!(matches!(
        pdfium.page_size(&page),
        Err(Error::HandleNotFound { .. })
    ));
    assert!(matches!(
        pdfium.count_chars(&text_page),
        Err(Error::HandleNotFound { .. })
    ));
    assert!(matches!(
        pdfium.find_next(&search),
        Err(Error::HandleNotFound { .. })
    ));
    assert!(matches!(
        pdfium.bookmarks(&doc),
        Err(Error::HandleNotFound { .. })
    ));

    // Close is idempotent.
    pdfium.close_document(&doc).unwrap();
}

#[test]
fn closed_instance_rejects_everything() {
    let pdfium = instance();
    let doc = pdfium.open_document(SAMPLE, None).unwrap();

    pdfium.close().unwrap();

    assert!(matches!(pdfium.page_count(&doc), Err(Error::InstanceClosed)));
    assert!(matches!(
        pdfium.open_document(SAMPLE, None),
        Err(Error::InstanceClosed)
    ));
    assert!(matches!(pdfium.close(), Err(Error::InstanceClosed)));
}

#[test]
fn progressive_render_pauses_and_resumes() {
    let pdfium = instance();
    let doc = pdfium.open_document(SAMPLE, None).unwrap();
    let page = pdfium.load_page(&doc, 0).unwrap();
    let bitmap = pdfium.create_bitmap(4, 4, true).unwrap();

    let polls = Arc::new(Mutex::new(0u32));
    let seen = polls.clone();
    let status = pdfium
        .render_page_start(&bitmap, &page, 0, 0, 4, 4, 0, 0, move || {
            *seen.lock().unwrap() += 1;
            true
        })
        .unwrap();
    assert_eq!(status, RenderStatus::ToBeContinued);
    assert_eq!(*polls.lock().unwrap(), 1);

    let status = pdfium.render_page_continue(&page, None).unwrap();
    assert_eq!(status, RenderStatus::Done);

    let status = pdfium
        .render_page_continue(&page, Some(Box::new(|| false)))
        .unwrap();
    assert_eq!(status, RenderStatus::Done);

    pdfium.render_page_close(&page).unwrap();
    pdfium.close_bitmap(&bitmap).unwrap();
    pdfium.close_document(&doc).unwrap();
}

#[test]
fn bitmap_rendering_and_pixel_readback() {
    let pdfium = instance();
    let doc = pdfium.open_document(SAMPLE, None).unwrap();
    let page = pdfium.load_page(&doc, 0).unwrap();

    let bitmap = pdfium.create_bitmap(2, 2, false).unwrap();
    pdfium
        .fill_bitmap_rect(&bitmap, 0, 0, 2, 2, 0x1122_3344)
        .unwrap();
    pdfium
        .render_page_bitmap(&bitmap, &page, 0, 0, 2, 2, 0, 0)
        .unwrap();
    pdfium
        .render_page_bitmap_with_matrix(
            &bitmap,
            &page,
            &Matrix::IDENTITY,
            &RectF {
                left: 0.0,
                top: 0.0,
                right: 2.0,
                bottom: 2.0,
            },
            0,
        )
        .unwrap();

    let pixels = pdfium.bitmap_pixels(&bitmap).unwrap();
    assert_eq!(pixels.len(), 2 * 2 * 4);
    assert_eq!(&pixels[..4], &[0x44, 0x33, 0x22, 0x11]);

    assert!(matches!(
        pdfium.create_bitmap(0, 4, true),
        Err(Error::GuestFailure(_))
    ));

    pdfium.close_bitmap(&bitmap).unwrap();
    pdfium.close_bitmap(&bitmap).unwrap(); // idempotent
    pdfium.close_document(&doc).unwrap();
}

#[test]
fn geometry_queries() {
    let pdfium = instance();
    let doc = pdfium.open_document(SAMPLE, None).unwrap();
    let page = pdfium.load_page(&doc, 0).unwrap();

    let size = pdfium.page_size_by_index(&doc, 1).unwrap();
    assert_eq!((size.width, size.height), (595.0, 842.0));
    assert!(matches!(
        pdfium.page_size_by_index(&doc, 7),
        Err(Error::Pdfium(PdfiumError::Page))
    ));

    let rect = pdfium.page_bounding_box(&page).unwrap();
    assert_eq!((rect.left, rect.top, rect.right, rect.bottom), (0.0, 842.0, 595.0, 0.0));

    pdfium.close_document(&doc).unwrap();
}

#[test]
fn missing_export_reports_unsupported() {
    let pdfium = instance();
    let doc = pdfium.open_document(SAMPLE, None).unwrap();
    let page = pdfium.load_page(&doc, 0).unwrap();

    // The stand-in build deliberately leaves this export out.
    assert!(matches!(
        pdfium.page_rotation(&page),
        Err(Error::Unsupported(name)) if name == "FPDFPage_GetRotation"
    ));

    pdfium.close_document(&doc).unwrap();
}

// === Form-fill events === //

#[derive(Debug, PartialEq)]
enum Event {
    Invalidate(PageRef, (f32, f32, f32, f32)),
    Change,
}

struct Recorder(Arc<Mutex<Vec<Event>>>);

impl FormFillHandler for Recorder {
    fn invalidate(&mut self, page: PageRef, rect: RectF) {
        self.0.lock().unwrap().push(Event::Invalidate(
            page,
            (rect.left, rect.top, rect.right, rect.bottom),
        ));
    }

    fn on_change(&mut self) {
        self.0.lock().unwrap().push(Event::Change);
    }
}

#[test]
fn form_fill_events_name_pages_by_token() {
    let pdfium = instance();
    let doc = pdfium.open_document(SAMPLE, None).unwrap();
    let page = pdfium.load_page(&doc, 0).unwrap();

    let events: Arc<Mutex<Vec<Event>>> = Arc::default();
    pdfium
        .init_form_fill(&doc, Recorder(events.clone()))
        .unwrap();
    assert!(matches!(
        pdfium.init_form_fill(&doc, Recorder(events.clone())),
        Err(Error::InvalidInput(_))
    ));

    // The stub fires one invalidate and one change on page load.
    pdfium.form_on_after_load_page(&doc, &page).unwrap();
    {
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            Event::Invalidate(page.clone(), (0.0, 10.0, 20.0, 30.0))
        );
        assert_eq!(events[1], Event::Change);
    }

    let bitmap = pdfium.create_bitmap(2, 2, true).unwrap();
    pdfium
        .form_draw(&doc, &bitmap, &page, 0, 0, 2, 2, 0, 0)
        .unwrap();

    pdfium.form_on_before_close_page(&doc, &page).unwrap();
    pdfium.close_bitmap(&bitmap).unwrap();
    pdfium.close_document(&doc).unwrap();
}
