//! The guest virtual machine: store, linear memory, and the calling
//! convention shared by every PDFium export.
//!
//! Calls are made positionally with `u64` words, one per parameter.
//! Before dispatch each word is coerced to the parameter type the
//! guest actually declares (`i32`/`i64`/`f32`/`f64`); the single
//! result word comes back wrapped in a [`CallRet`] and the call site
//! decodes it with the accessor matching the export's documented
//! return category. Mixing those up is a bug at the call site, not
//! something this layer guesses at.

use std::collections::HashMap;
use std::sync::Mutex;

use wasmtime::{Func, Memory, Store, Val, ValType};
use wasmtime_wasi::WasiCtx;

use crate::error::{Error, Result};
use crate::text;

/// Host-side store data. WASI is wired in because PDFium's emscripten
/// builds import clock and random primitives through it.
pub(crate) struct HostState {
    pub wasi: WasiCtx,
}

// === Vm === //

pub(crate) struct Vm {
    store: Store<HostState>,
    memory: Memory,
    instance: wasmtime::Instance,
    // Function lookup cache. Guarded by its own lock so that resolving
    // a name never extends the instance-level critical section.
    funcs: Mutex<HashMap<String, Func>>,
}

impl Vm {
    pub fn new(store: Store<HostState>, memory: Memory, instance: wasmtime::Instance) -> Self {
        Self {
            store,
            memory,
            instance,
            funcs: Mutex::new(HashMap::new()),
        }
    }

    fn lookup(&mut self, name: &str) -> Result<Func> {
        let mut funcs = self.funcs.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(func) = funcs.get(name) {
            return Ok(*func);
        }

        let func = self
            .instance
            .get_func(&mut self.store, name)
            .ok_or_else(|| Error::Unsupported(name.to_owned()))?;

        funcs.insert(name.to_owned(), func);
        Ok(func)
    }

    pub fn has_func(&mut self, name: &str) -> bool {
        self.lookup(name).is_ok()
    }

    /// Invokes a guest export with positional `u64` argument words.
    pub fn call(&mut self, name: &str, args: &[u64]) -> Result<CallRet> {
        let func = self.lookup(name)?;
        let ty = func.ty(&self.store);

        if ty.params().len() != args.len() {
            return Err(Error::GuestCall {
                name: name.to_owned(),
                source: anyhow::anyhow!(
                    "expected {} argument words, got {}",
                    ty.params().len(),
                    args.len()
                ),
            });
        }

        let mut params = Vec::with_capacity(args.len());
        for (param_ty, &word) in ty.params().zip(args) {
            params.push(match param_ty {
                ValType::I32 => Val::I32(word as u32 as i32),
                ValType::I64 => Val::I64(word as i64),
                ValType::F32 => Val::F32(word as u32),
                ValType::F64 => Val::F64(word),
                other => {
                    return Err(Error::GuestCall {
                        name: name.to_owned(),
                        source: anyhow::anyhow!("unsupported parameter type {other}"),
                    })
                }
            });
        }

        let mut results = vec![Val::I32(0); ty.results().len()];
        func.call(&mut self.store, &params, &mut results)
            .map_err(|source| Error::GuestCall {
                name: name.to_owned(),
                source,
            })?;

        let word = match results.first() {
            None => None,
            Some(Val::I32(v)) => Some(*v as u32 as u64),
            Some(Val::I64(v)) => Some(*v as u64),
            Some(Val::F32(bits)) => Some(*bits as u64),
            Some(Val::F64(bits)) => Some(*bits),
            Some(other) => {
                return Err(Error::GuestCall {
                    name: name.to_owned(),
                    source: anyhow::anyhow!("unsupported result type {}", other.ty()),
                })
            }
        };

        log::trace!("guest call {name}({args:?}) -> {word:?}");

        Ok(CallRet {
            name: name.to_owned(),
            word,
        })
    }

    // === Raw memory access === //

    pub fn read_bytes(&self, ptr: u64, len: usize) -> Result<Vec<u8>> {
        self.memory
            .data(&self.store)
            .get(ptr as usize..)
            .and_then(|tail| tail.get(..len))
            .map(<[u8]>::to_vec)
            .ok_or(Error::MemoryReadRejected { offset: ptr, len })
    }

    pub fn write_bytes(&mut self, ptr: u64, bytes: &[u8]) -> Result<()> {
        self.memory
            .data_mut(&mut self.store)
            .get_mut(ptr as usize..)
            .and_then(|tail| tail.get_mut(..bytes.len()))
            .map(|dst| dst.copy_from_slice(bytes))
            .ok_or(Error::MemoryWriteRejected {
                offset: ptr,
                len: bytes.len(),
            })
    }

    // === Guest allocation === //

    /// Allocates `size` bytes in guest memory and zero-fills them.
    ///
    /// PDFium leaves out-parameters untouched on some failure paths, so
    /// a fresh allocation must never expose stale allocator contents.
    pub fn malloc(&mut self, size: u64) -> Result<u64> {
        let ptr = self.call("malloc", &[size])?.as_ptr()?;
        if ptr == 0 {
            return Err(Error::AllocationFailed { size });
        }

        self.write_bytes(ptr, &vec![0u8; size as usize])?;
        Ok(ptr)
    }

    pub fn free(&mut self, ptr: u64) -> Result<()> {
        self.call("free", &[ptr]).map(|_| ())
    }

    /// Copies `data` into a fresh guest allocation.
    pub fn alloc_bytes(&mut self, data: &[u8]) -> Result<u64> {
        // A zero-length buffer still gets a real allocation so that the
        // guest sees a valid, distinct pointer.
        let ptr = self.malloc((data.len() as u64).max(1))?;
        self.write_bytes(ptr, data)?;
        Ok(ptr)
    }

    /// Copies a NUL-terminated UTF-8 string into guest memory.
    pub fn alloc_cstring(&mut self, value: &str) -> Result<u64> {
        if value.bytes().any(|b| b == 0) {
            return Err(Error::InvalidInput("string contains a NUL byte"));
        }

        // malloc zero-fills, which provides the terminator.
        let ptr = self.malloc(value.len() as u64 + 1)?;
        self.write_bytes(ptr, value.as_bytes())?;
        Ok(ptr)
    }

    /// Copies a UTF-16LE rendition of `value`, including the
    /// terminating zero unit, into guest memory.
    pub fn alloc_wide_string(&mut self, value: &str) -> Result<u64> {
        let bytes = text::to_utf16le(value);
        self.alloc_bytes(&bytes)
    }

    // === Scalar out-pointers === //

    pub fn alloc_out<T: GuestScalar>(&mut self) -> Result<OutPtr<T>> {
        Ok(OutPtr {
            ptr: self.malloc(T::SIZE)?,
            _marker: std::marker::PhantomData,
        })
    }

    pub fn read_out<T: GuestScalar>(&self, out: &OutPtr<T>) -> Result<T> {
        T::read(self, out.ptr)
    }

    pub fn free_out<T: GuestScalar>(&mut self, out: OutPtr<T>) -> Result<()> {
        self.free(out.ptr)
    }

    pub fn read_f32(&self, ptr: u64) -> Result<f32> {
        f32::read(self, ptr)
    }

    pub fn write_f32(&mut self, ptr: u64, value: f32) -> Result<()> {
        self.write_bytes(ptr, &value.to_le_bytes())
    }

    // === Two-call size-then-fill protocol === //

    /// Runs a PDFium `name(args..., buffer, buflen) -> bytes` text query.
    ///
    /// The first call passes a null buffer to learn the byte length
    /// (terminator included). A zero length means "no value" and
    /// short-circuits without a second call or any allocation.
    pub fn utf16_two_call(&mut self, name: &str, args: &[u64]) -> Result<Option<String>> {
        let mut sized = args.to_vec();
        sized.extend([0, 0]);
        let len = self.call(name, &sized)?.as_u32()?;
        if len == 0 {
            return Ok(None);
        }

        let buffer = self.malloc(len as u64)?;
        let mut filled = args.to_vec();
        filled.extend([buffer, len as u64]);

        let outcome = self.call(name, &filled).and_then(|_| {
            let bytes = self.read_bytes(buffer, len as usize)?;
            text::from_utf16le(&bytes)
        });

        // The buffer is transient either way.
        let freed = self.free(buffer);
        let value = outcome?;
        freed?;

        Ok(Some(value))
    }
}

// === CallRet === //

/// The raw result word of a guest call, decoded on demand.
#[derive(Debug)]
pub(crate) struct CallRet {
    name: String,
    word: Option<u64>,
}

impl CallRet {
    fn word(&self) -> Result<u64> {
        self.word.ok_or_else(|| Error::GuestCall {
            name: self.name.clone(),
            source: anyhow::anyhow!("export returns no value"),
        })
    }

    pub fn as_u64(&self) -> Result<u64> {
        self.word()
    }

    pub fn as_i32(&self) -> Result<i32> {
        Ok(self.word()? as u32 as i32)
    }

    pub fn as_u32(&self) -> Result<u32> {
        Ok(self.word()? as u32)
    }

    /// Guest pointers are 32-bit; widened here for the word convention.
    pub fn as_ptr(&self) -> Result<u64> {
        Ok(self.word()? as u32 as u64)
    }

    pub fn as_f32(&self) -> Result<f32> {
        Ok(f32::from_bits(self.word()? as u32))
    }

    pub fn as_f64(&self) -> Result<f64> {
        Ok(f64::from_bits(self.word()?))
    }
}

// === GuestScalar === //

/// A fixed-size little-endian scalar readable from guest memory.
pub(crate) trait GuestScalar: Copy {
    const SIZE: u64;

    fn read(vm: &Vm, ptr: u64) -> Result<Self>;
}

macro_rules! impl_guest_scalar {
    ($($ty:ty),+) => {$(
        impl GuestScalar for $ty {
            const SIZE: u64 = std::mem::size_of::<$ty>() as u64;

            fn read(vm: &Vm, ptr: u64) -> Result<Self> {
                let bytes = vm.read_bytes(ptr, Self::SIZE as usize)?;
                let bytes = bytes
                    .try_into()
                    .map_err(|_| Error::DecodeFailed(stringify!($ty)))?;
                Ok(<$ty>::from_le_bytes(bytes))
            }
        }
    )+};
}

impl_guest_scalar!(i32, u32, i64, u64, f32, f64);

/// Typed pointer to a guest out-parameter slot.
pub(crate) struct OutPtr<T> {
    pub ptr: u64,
    _marker: std::marker::PhantomData<fn() -> T>,
}

// === Test support === //
