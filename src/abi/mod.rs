//! Foreign-ABI emulation layer.
//!
//! Host functions with the calling conventions and data layouts the image
//! was compiled against. Every function here is reached through an address
//! in the symbol table, never called by name from the image.
//!
//! Callbacks that need process state (path rewriting, the symbol table,
//! the thread stack size) read it from the [`Context`] handed to
//! [`install`], which is the only injection point into this layer.

use std::sync::{Arc, LazyLock, OnceLock};

use crate::context::Context;

/// Declares functions that take or return floating point values. 32-bit
/// Android code uses the soft-float variant of the procedure call
/// standard, which on hard-float hosts must be requested explicitly.
macro_rules! softfp {
    () => {};
    (
        $(#[$meta:meta])*
        pub unsafe fn $name:ident($($arg:ident: $ty:ty),* $(,)?) $(-> $ret:ty)? $body:block
        $($rest:tt)*
    ) => {
        #[cfg(target_arch = "arm")]
        $(#[$meta])*
        pub unsafe extern "aapcs" fn $name($($arg: $ty),*) $(-> $ret)? $body

        #[cfg(not(target_arch = "arm"))]
        $(#[$meta])*
        pub unsafe extern "C" fn $name($($arg: $ty),*) $(-> $ret)? $body

        softfp! { $($rest)* }
    };
    (
        $(#[$meta:meta])*
        pub fn $name:ident($($arg:ident: $ty:ty),* $(,)?) $(-> $ret:ty)? $body:block
        $($rest:tt)*
    ) => {
        #[cfg(target_arch = "arm")]
        $(#[$meta])*
        pub extern "aapcs" fn $name($($arg: $ty),*) $(-> $ret)? $body

        #[cfg(not(target_arch = "arm"))]
        $(#[$meta])*
        pub extern "C" fn $name($($arg: $ty),*) $(-> $ret)? $body

        softfp! { $($rest)* }
    };
}

pub(crate) use softfp;

pub mod aeabi;
pub mod android_log;
pub mod asset;
pub mod ctype;
pub mod cxa;
pub mod dirent;
pub mod dl;
pub mod fs;
pub mod math;
pub mod path;
pub mod process;
pub mod sem;
pub mod stdio;
pub mod string;
pub mod stubs;
pub mod sync;
pub mod thread;
pub mod time;
pub mod valist;
pub mod zlib;

pub use path::PathRewriter;

static CONTEXT: OnceLock<Arc<Context>> = OnceLock::new();

static DEFAULT_PATHS: LazyLock<PathRewriter> = LazyLock::new(PathRewriter::default);

/// Makes `context` visible to the callbacks. Only the first call has an
/// effect; returns whether this call installed it.
pub fn install(context: Arc<Context>) -> bool {
    CONTEXT.set(context).is_ok()
}

pub(crate) fn context() -> Option<&'static Context> {
    CONTEXT.get().map(Arc::as_ref)
}

pub(crate) fn paths() -> &'static PathRewriter {
    context().map(|ctx| &ctx.paths).unwrap_or(&DEFAULT_PATHS)
}

/// Sets the calling thread's errno.
pub(crate) fn set_errno(value: libc::c_int) {
    unsafe { *libc::__errno_location() = value };
}

#[cfg(test)]
pub(crate) fn errno() -> libc::c_int {
    unsafe { *libc::__errno_location() }
}
