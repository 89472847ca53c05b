//! Instance construction and lifecycle.

use std::sync::{Mutex, MutexGuard};

use wasmtime::{Engine, Linker, Module, Store};
use wasmtime_wasi::WasiCtxBuilder;

use crate::error::{Error, Result};
use crate::handles::Inner;
use crate::imports;
use crate::vm::{HostState, Vm};

/// Instance construction options.
pub struct Config {
    wasm: Vec<u8>,
    inherit_stdio: bool,
}

impl Config {
    /// Configures an instance around a PDFium WebAssembly build
    /// (binary or text format).
    pub fn new(wasm: Vec<u8>) -> Self {
        Self {
            wasm,
            inherit_stdio: false,
        }
    }

    /// Routes the guest's stdio to the host process, which surfaces
    /// PDFium's own diagnostics.
    pub fn inherit_stdio(mut self) -> Self {
        self.inherit_stdio = true;
        self
    }

    /// Instantiates the module and initializes the PDFium library.
    pub fn build(self) -> Result<Instance> {
        Instance::new(self)
    }
}

/// One instantiated PDFium module with its own linear memory and
/// handle registry.
///
/// All operations serialize on an internal lock; an instance is `Send`
/// and `Sync` but behaves as a single-lane worker. Run one instance
/// per lane of desired parallelism.
pub struct Instance {
    inner: Mutex<Inner>,
}

impl Instance {
    fn new(config: Config) -> Result<Instance> {
        let engine = Engine::default();
        let module = Module::new(&engine, &config.wasm).map_err(Error::Instantiate)?;

        let mut linker = Linker::new(&engine);
        wasmtime_wasi::add_to_linker(&mut linker, |state: &mut HostState| &mut state.wasi)
            .map_err(Error::Instantiate)?;
        imports::add_to_linker(&mut linker)?;

        let wasi = if config.inherit_stdio {
            WasiCtxBuilder::new().inherit_stdio().build()
        } else {
            WasiCtxBuilder::new().build()
        };
        let mut store = Store::new(&engine, HostState { wasi });

        let module_instance = linker
            .instantiate(&mut store, &module)
            .map_err(Error::Instantiate)?;
        let memory = module_instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| Error::Instantiate(anyhow::anyhow!("module exports no memory")))?;

        let mut vm = Vm::new(store, memory, module_instance);

        // Reactor-style builds want their initializer run once before
        // any other export.
        if vm.has_func("_initialize") {
            vm.call("_initialize", &[])?;
        }
        vm.call("FPDF_InitLibrary", &[])?;

        log::debug!("PDFium instance initialized");
        Ok(Instance {
            inner: Mutex::new(Inner::new(vm)),
        })
    }

    /// Locks the registry, rejecting use after close.
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.closed {
            return Err(Error::InstanceClosed);
        }
        Ok(inner)
    }

    /// Releases every tracked handle and marks the instance closed.
    ///
    /// Teardown is best-effort: every release step runs even when an
    /// earlier one fails, and the first error is returned. Operations
    /// after a close (including a second close) report
    /// [`Error::InstanceClosed`].
    pub fn close(&self) -> Result<()> {
        let mut inner = self.lock()?;
        let outcome = inner.teardown();
        inner.closed = true;
        outcome
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(|e| e.into_inner());
        if !inner.closed {
            if let Err(err) = inner.teardown() {
                log::warn!("instance teardown on drop failed: {err}");
            }
            inner.closed = true;
        }
    }
}
