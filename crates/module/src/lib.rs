//! The stable ABI a hosted module exposes across a shared-library boundary.
//!
//! Everything in this crate is `#[repr(C)]` and carries no dependency on the
//! internal `message` crate's `Message` type: sharing a non-`repr(C)` Rust
//! type (especially one backed by `Arc`) across separately compiled crates
//! is undefined behavior, even if both sides happen to use the same Rust
//! compiler version. `RawMessage`/`RawProperty` are borrowed views the host
//! builds for the lifetime of a single `receive` call; a module that wants
//! to keep the data past that call must copy it out.

use std::os::raw::c_void;

/// The well-known exported symbol every module shared library must provide.
pub const MODULE_GETAPIS_NAME: &str = "Module_GetAPIS";

/// Opaque per-instance state, owned by the module, returned from `create`.
pub type ModuleHandle = *mut c_void;

#[repr(C)]
pub struct RawProperty {
    pub key: *const u8,
    pub key_len: usize,
    pub value: *const u8,
    pub value_len: usize,
}

#[repr(C)]
pub struct RawMessage {
    pub content: *const u8,
    pub content_len: usize,
    pub properties: *const RawProperty,
    pub properties_len: usize,
}

/// The capability vector a module exports. `receive` is optional: a
/// publish-only module has no use for it.
#[repr(C)]
pub struct ModuleApis {
    pub create: unsafe extern "C" fn(config: *const u8, config_len: usize) -> ModuleHandle,
    pub destroy: unsafe extern "C" fn(handle: ModuleHandle),
    pub receive: Option<unsafe extern "C" fn(handle: ModuleHandle, message: *const RawMessage)>,
}

/// Signature of the single exported entry point (`Module_GetAPIS`) every
/// module shared library must provide, returning a pointer to a static
/// `ModuleApis` the host may call at any time until `destroy` returns.
pub type ModuleGetApisFn = unsafe extern "C" fn() -> *const ModuleApis;
