//! The host table every image is linked against.

use crate::abi::{self, stubs::StubKind};

use super::{Origin, SymbolEntry};

/// Host C library functions whose bionic counterparts have the same
/// signature and semantics. Only their addresses are taken.
macro_rules! passthrough {
    ($($name:ident),* $(,)?) => {
        mod sys {
            #[allow(clashing_extern_declarations, dead_code)]
            unsafe extern "C" {
                $(pub fn $name();)*
            }
        }

        fn passthrough() -> Vec<SymbolEntry> {
            vec![$(SymbolEntry::function(stringify!($name), sys::$name as *const () as usize, Origin::Libc)),*]
        }
    };
}

/// Functions implemented in [`crate::abi`], registered under their own name.
macro_rules! implemented {
    ($out:ident, $origin:expr; $($module:ident::{$($name:ident),* $(,)?})*) => {
        $($(
            $out.push(SymbolEntry::function(stringify!($name), abi::$module::$name as *const () as usize, $origin));
        )*)*
    };
}

passthrough! {
    // memory
    malloc, calloc, realloc, free, memalign, posix_memalign,
    memchr, memrchr, memcmp, memcpy, memmove, memset,
    // strings
    strlen, strnlen, strcmp, strncmp, strcasecmp, strncasecmp, strcpy, strncpy,
    strcat, strncat, strchr, strrchr, strstr, strcasestr, strpbrk, strcspn,
    strdup, strtok, strtok_r, strcoll, strxfrm, strerror, basename,
    strtol, strtoul, strtoll, strtoull, strtoll_l, strtoull_l, strtold_l, atoi, atol, atoll,
    // wide and multibyte strings
    wcslen, wcscmp, wcsncpy, wcscpy, wcscat, wcsstr, wcscoll, wcsxfrm, wcsftime,
    wcstoul, wcstoll, wcstoull, wcstombs, wcsnrtombs, mbsnrtowcs, wcrtomb,
    mbrtowc, mbtowc, mbrlen, btowc, wctob, wmemchr, wmemcmp, wmemcpy, wmemmove,
    wmemset, towlower, towupper, wctype, iswctype,
    // classification
    isalnum, isalpha, isascii, isblank, iscntrl, isdigit, islower, isprint,
    ispunct, isspace, isupper, isxdigit, tolower, toupper, iswalpha, iswcntrl,
    iswdigit, iswlower, iswprint, iswpunct, iswspace, iswupper, iswxdigit,
    newlocale, uselocale,
    // formatted I/O
    printf, sprintf, snprintf, vprintf, vsprintf, vsnprintf, vasprintf,
    sscanf, vsscanf, swprintf, vswprintf, puts,
    // descriptors
    read, write, close, lseek, lseek64, ftruncate, realpath,
    // time
    time, clock, mktime, localtime, localtime_r, asctime, strftime,
    // process
    exit, raise, setjmp, longjmp, _setjmp, _longjmp,
    qsort, bsearch, rand, srand, lrand48, srand48,
    // threads without foreign layout differences
    pthread_join, pthread_detach, pthread_equal, pthread_exit, pthread_self,
    pthread_once, pthread_key_create, pthread_key_delete, pthread_getspecific,
    pthread_setspecific, pthread_getschedparam, pthread_setschedparam,
}

const ZERO_STUBS: &[&str] = &[
    "getenv",
    "setenv",
    "sysconf",
    "getpid",
    "gettid",
    "fcntl",
    "sigaction",
    "bsd_signal",
    "setlocale",
    "__system_property_get",
    "sched_get_priority_min",
    "__pthread_cleanup_push",
    "__pthread_cleanup_pop",
    "pthread_setname_np",
    "pthread_attr_setschedpolicy",
    "__gnu_Unwind_Find_exidx",
    "dl_unwind_find_exidx",
    "__gnu_unwind_frame",
    "gzopen",
    // static destructors are never run
    "__cxa_atexit",
    "__cxa_finalize",
    "__aeabi_atexit",
];

/// Names bound to another entry's implementation.
const ALIASES: &[(&str, &str)] = &[
    ("__aeabi_memcpy4", "__aeabi_memcpy"),
    ("__aeabi_memcpy8", "__aeabi_memcpy"),
    ("__aeabi_memset4", "__aeabi_memset"),
    ("__aeabi_memset8", "__aeabi_memset"),
    ("__aeabi_memclr4", "__aeabi_memclr"),
    ("__aeabi_memclr8", "__aeabi_memclr"),
    ("__aeabi_memmove", "memmove"),
    ("__aeabi_memmove4", "memmove"),
    ("__aeabi_memmove8", "memmove"),
];

fn hooks(out: &mut Vec<SymbolEntry>) {
    implemented! { out, Origin::Hook;
        time::{clock_gettime, gettimeofday, nanosleep, usleep}
        sync::{
            pthread_mutex_init, pthread_mutex_destroy, pthread_mutex_lock,
            pthread_mutex_trylock, pthread_mutex_unlock, pthread_mutexattr_init,
            pthread_mutexattr_destroy, pthread_mutexattr_settype,
            pthread_mutexattr_setpshared, pthread_cond_init, pthread_cond_destroy,
            pthread_cond_signal, pthread_cond_broadcast, pthread_cond_wait,
            pthread_cond_timedwait, pthread_condattr_init, pthread_condattr_destroy,
        }
        thread::{
            pthread_create, pthread_attr_init, pthread_attr_destroy,
            pthread_attr_setdetachstate, pthread_attr_getdetachstate,
            pthread_attr_setstacksize, pthread_attr_getstacksize,
            pthread_attr_setstack, pthread_attr_getstack,
            pthread_attr_setschedparam, pthread_attr_getschedparam, pthread_getattr_np,
        }
        sem::{sem_init, sem_destroy, sem_post, sem_wait, sem_trywait, sem_timedwait, sem_getvalue}
        dirent::{opendir, readdir, closedir}
        fs::{
            open, fopen, stat, lstat, fstat, access, mkdir, rmdir, unlink, remove,
            rename, getcwd, chdir,
        }
        asset::{
            AAssetManager_fromJava, AAssetManager_open, AAsset_read, AAsset_seek,
            AAsset_getLength, AAsset_getLength64, AAsset_getRemainingLength,
            AAsset_close, AAssetManager_openDir, AAssetDir_getNextFileName,
            AAssetDir_close,
        }
        stdio::{
            fwrite, fputs, fputc, fflush, fclose, vfprintf, fprintf, fscanf, fread,
            fgets, getc, ungetc, getwc, ungetwc, putc, putwc, fseek, fseeko, ftell,
            ftello, fsetpos, feof, ferror, clearerr, fileno, setvbuf,
        }
        string::{strlcpy, strlcat, __strlen_chk, strerror_r}
        cxa::{
            __cxa_guard_acquire, __cxa_guard_release, __cxa_guard_abort,
            __cxa_call_unexpected, __stack_chk_fail,
        }
        process::{__errno, abort, __assert2}
        android_log::{__android_log_print, __android_log_write, __android_log_vprint}
        dl::{dlopen, dlsym, dlclose, dlerror}
        math::{
            acos, acosf, acosh, asin, asinf, asinh, atan, atanf, atanh, atan2,
            atan2f, ceil, ceilf, cos, cosf, cosh, exp, expf, exp2, exp2f, fabsf,
            floor, floorf, fmod, fmodf, frexp, frexpf, ldexp, ldexpf, log, logf,
            log10, log10f, lrint, lrintf, llrint, llrintf, modf, modff, pow, powf,
            rint, rintf, round, roundf, sin, sinf, sinh, sincos, sincosf, sqrt,
            sqrtf, tan, tanf, tanh, trunc, atof, strtod, strtof, wcstod, wcstof,
        }
    }
}

fn helpers(out: &mut Vec<SymbolEntry>) {
    implemented! { out, Origin::AbiHelper;
        aeabi::{
            __aeabi_idiv, __aeabi_uidiv, __aeabi_idivmod, __aeabi_uidivmod,
            __aeabi_l2d, __aeabi_ul2d, __aeabi_l2f, __aeabi_ul2f, __aeabi_d2lz,
            __aeabi_d2ulz, __aeabi_i2d, __aeabi_dadd, __aeabi_dmul, __aeabi_ddiv,
            __aeabi_memcpy, __aeabi_memset, __aeabi_memclr,
        }
    }
    runtime_helpers(out);
}

#[cfg(target_arch = "arm")]
fn runtime_helpers(out: &mut Vec<SymbolEntry>) {
    use crate::abi::aeabi::runtime;

    out.push(SymbolEntry::function("__aeabi_ldivmod", runtime::__aeabi_ldivmod as *const () as usize, Origin::AbiHelper));
    out.push(SymbolEntry::function("__aeabi_uldivmod", runtime::__aeabi_uldivmod as *const () as usize, Origin::AbiHelper));
}

#[cfg(not(target_arch = "arm"))]
fn runtime_helpers(_out: &mut Vec<SymbolEntry>) {}

fn bridge(out: &mut Vec<SymbolEntry>) {
    out.push(SymbolEntry::function(
        "Android_JNI_GetEnv",
        crate::bridge::Android_JNI_GetEnv as *const () as usize,
        Origin::Bridge,
    ));
}

fn codec(out: &mut Vec<SymbolEntry>) {
    implemented! { out, Origin::Codec;
        zlib::{
            inflateInit_, inflateInit2_, inflate, inflateEnd, inflateReset,
            deflateInit_, deflateInit2_, deflate, deflateEnd, deflateReset,
            compress, compress2, compressBound, uncompress, crc32, adler32,
            zlibVersion,
        }
    }
}

fn data(out: &mut Vec<SymbolEntry>) {
    use crate::abi::{ctype, cxa, stdio};

    out.push(SymbolEntry::data("__sF", stdio::FAKE_SF.as_ptr() as usize, Origin::Hook));
    for (index, name) in ["stdin", "stdout", "stderr"].into_iter().enumerate() {
        out.push(SymbolEntry::data(name, stdio::STD_STREAMS.slot_address(index), Origin::Hook));
    }
    out.push(SymbolEntry::data("_ctype_", ctype::CTYPE_PTR.address(), Origin::Hook));
    out.push(SymbolEntry::data("_tolower_tab_", ctype::TOLOWER_PTR.address(), Origin::Hook));
    out.push(SymbolEntry::data("_toupper_tab_", ctype::TOUPPER_PTR.address(), Origin::Hook));
    out.push(SymbolEntry::data(
        "__stack_chk_guard",
        &cxa::STACK_CHK_GUARD as *const cxa::StackGuard as usize,
        Origin::Hook,
    ));
}

/// Every built-in entry, in a fixed order.
pub fn entries() -> Vec<SymbolEntry> {
    let mut out = passthrough();
    hooks(&mut out);
    helpers(&mut out);
    bridge(&mut out);
    codec(&mut out);
    data(&mut out);

    out.extend(ZERO_STUBS.iter().map(|name| SymbolEntry::stub(*name, StubKind::Zero)));
    out.push(SymbolEntry::stub("sched_get_priority_max", StubKind::NinetyNine));

    let aliases: Vec<_> = ALIASES
        .iter()
        .filter_map(|(alias, target)| {
            out.iter()
                .find(|entry| entry.name == *target)
                .map(|entry| SymbolEntry::function(*alias, entry.address, entry.origin))
        })
        .collect();
    out.extend(aliases);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolKind;

    #[test]
    fn aliases_share_their_target_address() {
        let entries = entries();
        let find = |name: &str| entries.iter().find(|e| e.name == name).map(|e| e.address);
        assert_eq!(find("__aeabi_memcpy8"), find("__aeabi_memcpy"));
        assert_eq!(find("__aeabi_memmove4"), find("memmove"));
        assert!(find("__aeabi_memmove4").is_some());
    }

    #[test]
    fn locale_and_bridge_entry_points_resolve() {
        let entries = entries();
        for name in ["strtold_l", "Android_JNI_GetEnv"] {
            let entry = entries.iter().find(|e| e.name == name).expect(name);
            assert_ne!(entry.address, 0);
            assert_eq!(entry.kind, SymbolKind::Function);
        }
        let get_env = entries.iter().find(|e| e.name == "Android_JNI_GetEnv").expect("get env");
        assert_eq!(get_env.origin, Origin::Bridge);
    }

    #[test]
    fn stream_and_table_symbols_are_data() {
        let entries = entries();
        for name in ["__sF", "stdout", "_ctype_", "__stack_chk_guard"] {
            let entry = entries.iter().find(|e| e.name == name).expect(name);
            assert_eq!(entry.kind, SymbolKind::Data);
        }
    }

    #[test]
    fn hooked_names_override_the_host_library() {
        let entries = entries();
        let rmdir = entries.iter().find(|e| e.name == "rmdir").expect("rmdir");
        assert_eq!(rmdir.origin, Origin::Hook);
        let memcpy = entries.iter().find(|e| e.name == "memcpy").expect("memcpy");
        assert_eq!(memcpy.origin, Origin::Libc);
    }
}
