//! Named constant-return stubs.
//!
//! Symbols the image imports but whose behaviour does not matter on this
//! host are bound to one of these, and the binding is recorded in the
//! symbol table with [`Origin::Stub`](crate::symbols::Origin::Stub) so it
//! can be audited.

use std::fmt;

macro_rules! stub_kinds {
    ($($(#[$meta:meta])* $kind:ident => $func:ident = $value:expr),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StubKind {
            $($(#[$meta])* $kind),*
        }

        impl StubKind {
            pub const ALL: &'static [StubKind] = &[$(StubKind::$kind),*];

            /// Value every stub of this kind returns.
            pub fn value(self) -> isize {
                match self {
                    $(StubKind::$kind => $value),*
                }
            }

            pub fn address(self) -> usize {
                match self {
                    $(StubKind::$kind => $func as *const () as usize),*
                }
            }
        }

        $(
            extern "C" fn $func() -> isize {
                $value
            }
        )*
    };
}

stub_kinds! {
    Zero => ret_zero = 0,
    One => ret_one = 1,
    MinusOne => ret_minus_one = -1,
    NinetyNine => ret_ninety_nine = 99,
    /// SL_RESULT_FEATURE_UNSUPPORTED
    SlFeatureUnsupported => ret_sl_feature_unsupported = 12,
    /// OV_EFAULT
    VorbisFault => ret_vorbis_fault = -129,
}

impl fmt::Display for StubKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "returns {}", self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_kind_has_its_own_function() {
        let mut addresses: Vec<_> = StubKind::ALL.iter().map(|k| k.address()).collect();
        addresses.sort_unstable();
        addresses.dedup();
        assert_eq!(addresses.len(), StubKind::ALL.len());
    }

    #[test]
    fn stubs_return_their_value() {
        for kind in StubKind::ALL {
            let f: extern "C" fn() -> isize = unsafe { std::mem::transmute(kind.address()) };
            assert_eq!(f(), kind.value(), "{kind:?}");
        }
    }
}
