mod error;

pub use error::LoaderError;

use module::{ModuleApis, ModuleGetApisFn, MODULE_GETAPIS_NAME};

/// A loaded module library that can hand back its capability vector. This
/// is the seam that lets `gateway-core` unit-test rollback/teardown against
/// a fake implementation without touching the filesystem or `libloading`.
pub trait ModuleLibrary: Send + Sync {
    fn apis(&self) -> &ModuleApis;
}

/// Loads a module shared library by path, resolving the well-known entry
/// point. A separate trait (rather than one concrete type) so tests can
/// substitute an in-process loader.
pub trait ModuleLoader {
    fn load(&self, path: &str) -> Result<Box<dyn ModuleLibrary>, LoaderError>;
}

struct LoadedLibrary {
    // Order matters: `apis` points into memory owned by `_library`, so the
    // library must outlive it and therefore must be declared after it —
    // struct fields drop in declaration order.
    apis: *const ModuleApis,
    _library: libloading::Library,
}

// Safety: `apis` is a pointer to a `'static` value the module library owns
// for as long as the library stays loaded (which `_library` guarantees by
// living alongside it), and `ModuleApis` itself is `Send + Sync` by
// contract (its function pointers may be called from any thread).
unsafe impl Send for LoadedLibrary {}
unsafe impl Sync for LoadedLibrary {}

impl ModuleLibrary for LoadedLibrary {
    fn apis(&self) -> &ModuleApis {
        // Safety: `apis` was produced by a successful call to the module's
        // `Module_GetAPIS` export and the backing library is still loaded.
        unsafe { &*self.apis }
    }
}

/// Production `ModuleLoader`: opens the shared library with `libloading`
/// and resolves `Module_GetAPIS` once at load time.
#[derive(Default)]
pub struct LibloadingModuleLoader;

impl ModuleLoader for LibloadingModuleLoader {
    fn load(&self, path: &str) -> Result<Box<dyn ModuleLibrary>, LoaderError> {
        let library = unsafe { libloading::Library::new(path) }.map_err(|source| {
            LoaderError::LoadFailed {
                path: path.to_string(),
                source,
            }
        })?;

        let get_apis: libloading::Symbol<ModuleGetApisFn> =
            unsafe { library.get(MODULE_GETAPIS_NAME.as_bytes()) }.map_err(|_| {
                LoaderError::SymbolMissing {
                    path: path.to_string(),
                    symbol: MODULE_GETAPIS_NAME.to_string(),
                }
            })?;

        let apis = unsafe { get_apis() };
        if apis.is_null() {
            return Err(LoaderError::SymbolMissing {
                path: path.to_string(),
                symbol: MODULE_GETAPIS_NAME.to_string(),
            });
        }

        tracing::debug!(path, "loaded module library");
        Ok(Box::new(LoadedLibrary {
            apis,
            _library: library,
        }))
    }
}
