//! Host functions exported to the guest under the `"env"` module.
//!
//! The PDFium WebAssembly build's glue structs forward their C
//! callback slots here, each invocation carrying the `u32` registry
//! key the host embedded at registration time (see
//! [`crate::callbacks`]). An unregistered key is answered with the
//! callback's neutral failure result and an error log entry; it never
//! traps the guest.

use wasmtime::{Caller, Extern, Linker, Memory};

use crate::callbacks::{self, UnsupportedFeature};
use crate::error::Result;
use crate::geometry::RectF;
use crate::vm::HostState;

pub(crate) fn add_to_linker(linker: &mut Linker<HostState>) -> Result<()> {
    linker
        .func_wrap("env", "FPDF_FILEACCESS_CB", file_access_cb)
        .and_then(|l| l.func_wrap("env", "FPDF_FILEWRITE_CB", file_write_cb))
        .and_then(|l| l.func_wrap("env", "IFSDK_PAUSE_CB", pause_cb))
        .and_then(|l| l.func_wrap("env", "UNSUPPORT_INFO_CB", unsupported_cb))
        .and_then(|l| l.func_wrap("env", "FFI_INVALIDATE_CB", ffi_invalidate_cb))
        .and_then(|l| l.func_wrap("env", "FFI_ONCHANGE_CB", ffi_onchange_cb))
        .map_err(crate::error::Error::Instantiate)?;
    Ok(())
}

fn exported_memory(caller: &mut Caller<'_, HostState>) -> Option<Memory> {
    match caller.get_export("memory") {
        Some(Extern::Memory(memory)) => Some(memory),
        _ => None,
    }
}

/// `FPDF_FILEACCESS::m_GetBlock`: fill `buf` with `size` bytes at
/// `position` from the registered reader. Returns `size` on success,
/// 0 on any failure (PDFium treats 0 as a read error).
fn file_access_cb(
    mut caller: Caller<'_, HostState>,
    key: u32,
    position: u32,
    buf: u32,
    size: u32,
) -> u32 {
    use std::io::SeekFrom;

    let mut block = vec![0u8; size as usize];
    let read = callbacks::with_reader(key, |reader| {
        reader.seek(SeekFrom::Start(position as u64))?;
        reader.read_exact(&mut block)
    });

    match read {
        Some(Ok(())) => {}
        Some(Err(err)) => {
            log::error!("file reader {key} failed at position {position}: {err}");
            return 0;
        }
        None => {
            log::error!("file read requested for unregistered reader key {key}");
            return 0;
        }
    }

    let Some(memory) = exported_memory(&mut caller) else {
        log::error!("guest requested a file read but exports no memory");
        return 0;
    };

    let dst = memory
        .data_mut(&mut caller)
        .get_mut(buf as usize..)
        .and_then(|tail| tail.get_mut(..block.len()));
    match dst {
        Some(dst) => {
            dst.copy_from_slice(&block);
            size
        }
        None => {
            log::error!("file read destination {buf:#x}+{size} is out of bounds");
            0
        }
    }
}

/// `FPDF_FILEWRITE::WriteBlock`: hand `size` bytes at `data` to the
/// registered writer. Returns `size` on success, 0 on failure.
fn file_write_cb(mut caller: Caller<'_, HostState>, key: u32, data: u32, size: u32) -> u32 {
    let Some(memory) = exported_memory(&mut caller) else {
        log::error!("guest requested a file write but exports no memory");
        return 0;
    };

    let block = memory
        .data(&caller)
        .get(data as usize..)
        .and_then(|tail| tail.get(..size as usize))
        .map(<[u8]>::to_vec);
    let Some(block) = block else {
        log::error!("file write source {data:#x}+{size} is out of bounds");
        return 0;
    };

    match callbacks::with_writer(key, |writer| writer.write_all(&block)) {
        Some(Ok(())) => size,
        Some(Err(err)) => {
            log::error!("file writer {key} failed: {err}");
            0
        }
        None => {
            log::error!("file write requested for unregistered writer key {key}");
            0
        }
    }
}

/// `IFSDK_PAUSE::NeedToPauseNow`: nonzero means pause. An unregistered
/// key reports "no pause" so rendering runs to completion.
fn pause_cb(_caller: Caller<'_, HostState>, key: u32) -> u32 {
    match callbacks::call_pause(key) {
        Some(pause) => pause as u32,
        None => {
            log::error!("pause requested for unregistered key {key}");
            0
        }
    }
}

/// `UNSUPPORT_INFO::FSDK_UnSupport_Handler`.
fn unsupported_cb(_caller: Caller<'_, HostState>, _this: u32, feature: u32) {
    callbacks::notify_unsupported(UnsupportedFeature::from_raw(feature));
}

/// `FPDF_FORMFILLINFO::FFI_Invalidate`. The raw page pointer is mapped
/// back to its issued token through the entry's shared page index; an
/// event for a page the host no longer tracks is dropped.
fn ffi_invalidate_cb(
    _caller: Caller<'_, HostState>,
    key: u32,
    page: u32,
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
) {
    let dispatched = callbacks::with_form_fill(key, |entry| {
        let page_ref = {
            let pages = entry.pages.lock().unwrap_or_else(|e| e.into_inner());
            pages.get(&(page as u64)).cloned()
        };
        match page_ref {
            Some(page_ref) => entry.handler.invalidate(
                page_ref,
                RectF {
                    left: left as f32,
                    top: top as f32,
                    right: right as f32,
                    bottom: bottom as f32,
                },
            ),
            None => log::debug!("invalidate event for untracked page pointer {page:#x}"),
        }
    });

    if dispatched.is_none() {
        log::error!("invalidate event for unregistered form-fill key {key}");
    }
}

/// `FPDF_FORMFILLINFO::FFI_OnChange`.
fn ffi_onchange_cb(_caller: Caller<'_, HostState>, key: u32) {
    if callbacks::with_form_fill(key, |entry| entry.handler.on_change()).is_none() {
        log::error!("change event for unregistered form-fill key {key}");
    }
}
