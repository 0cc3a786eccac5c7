use std::ffi::{CStr, CString};

/// Maps paths used by the image into the host filesystem.
///
/// `rewrite(p)` is `p` when it already starts with `native_prefix`, and
/// `data_root + p` otherwise. Because `data_root` itself starts with
/// `native_prefix`, rewriting is idempotent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRewriter {
    native_prefix: String,
    data_root: String,
}

impl Default for PathRewriter {
    fn default() -> Self {
        Self {
            native_prefix: "/".into(),
            data_root: "/data/valiant".into(),
        }
    }
}

impl PathRewriter {
    /// Returns `None` when `data_root` does not carry `native_prefix`.
    pub fn new(native_prefix: impl Into<String>, data_root: impl Into<String>) -> Option<Self> {
        let native_prefix = native_prefix.into();
        let data_root = data_root.into().trim_end_matches('/').to_string();
        if native_prefix.is_empty() || !data_root.starts_with(&native_prefix) {
            return None;
        }
        Some(Self {
            native_prefix,
            data_root,
        })
    }

    pub fn data_root(&self) -> &str {
        &self.data_root
    }

    pub fn native_prefix(&self) -> &str {
        &self.native_prefix
    }

    pub fn is_native(&self, path: &[u8]) -> bool {
        path.starts_with(self.native_prefix.as_bytes())
    }

    pub fn rewrite_bytes(&self, path: &[u8]) -> Vec<u8> {
        if self.is_native(path) {
            return path.to_vec();
        }
        let mut out = Vec::with_capacity(self.data_root.len() + 1 + path.len());
        out.extend_from_slice(self.data_root.as_bytes());
        if !path.starts_with(b"/") {
            out.push(b'/');
        }
        out.extend_from_slice(path);
        out
    }

    pub fn rewrite(&self, path: &str) -> String {
        String::from_utf8_lossy(&self.rewrite_bytes(path.as_bytes())).into_owned()
    }

    pub fn rewrite_c(&self, path: &CStr) -> CString {
        // an interior NUL is impossible: the input came from a CStr
        CString::new(self.rewrite_bytes(path.to_bytes())).unwrap_or_default()
    }

    /// Rewrites a NUL-terminated path handed over by the image.
    ///
    /// # Safety
    ///
    /// `path` must be null or point at a NUL-terminated string.
    pub unsafe fn rewrite_raw(&self, path: *const libc::c_char) -> Option<CString> {
        if path.is_null() {
            return None;
        }
        Some(self.rewrite_c(unsafe { CStr::from_ptr(path) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn relative_and_foreign_paths_land_under_the_root() {
        let paths = PathRewriter::new("/", "/srv/game").expect("valid");
        assert_eq!(paths.rewrite("main.obb"), "/srv/game/main.obb");
        assert_eq!(paths.rewrite("/etc/hosts"), "/etc/hosts");
    }

    #[test]
    fn narrow_prefix_remaps_absolute_paths() {
        let paths = PathRewriter::new("/srv/", "/srv/game/").expect("valid");
        assert_eq!(paths.data_root(), "/srv/game");
        assert_eq!(paths.rewrite("/Files/save.dat"), "/srv/game/Files/save.dat");
        assert_eq!(paths.rewrite("/srv/game/x"), "/srv/game/x");
    }

    #[test]
    fn root_outside_prefix_is_rejected() {
        assert!(PathRewriter::new("/mnt/", "/data/valiant").is_none());
        assert!(PathRewriter::new("", "/data").is_none());
    }

    proptest! {
        #[test]
        fn rewriting_twice_equals_rewriting_once(path in "[a-zA-Z0-9_./-]{0,40}") {
            for paths in [PathRewriter::default(), PathRewriter::new("/data/", "/data/valiant").expect("valid")] {
                let once = paths.rewrite(&path);
                prop_assert_eq!(paths.rewrite(&once), once);
            }
        }
    }
}
