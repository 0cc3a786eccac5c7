/// Java methods the bridge gives behaviour to. Every other name resolves
/// to [`MethodId::Unknown`], whose calls return zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum MethodId {
    Unknown = 0,
    Init,
    GetNativeOutputSampleRate,
    HasWindowFocus,
    GetConnectionType,
    IsGamepadConnected,
    IsGamepadKeyPressed,
}

const HANDLE_BASE: usize = 0x1000;

const NAMES: &[(&str, MethodId)] = &[
    ("<init>", MethodId::Init),
    ("getNativeOutputSampleRate", MethodId::GetNativeOutputSampleRate),
    ("hasWindowFocus", MethodId::HasWindowFocus),
    ("getConnectionType", MethodId::GetConnectionType),
    ("isGamePadConnected", MethodId::IsGamepadConnected),
    ("isGamePadKeyPressed", MethodId::IsGamepadKeyPressed),
];

const ALL: &[MethodId] = &[
    MethodId::Unknown,
    MethodId::Init,
    MethodId::GetNativeOutputSampleRate,
    MethodId::HasWindowFocus,
    MethodId::GetConnectionType,
    MethodId::IsGamepadConnected,
    MethodId::IsGamepadKeyPressed,
];

impl MethodId {
    /// Exact, case-sensitive lookup; the signature is not consulted.
    pub fn from_name(name: &[u8]) -> Self {
        NAMES
            .iter()
            .find(|(known, _)| known.as_bytes() == name)
            .map(|(_, id)| *id)
            .unwrap_or(MethodId::Unknown)
    }

    /// Opaque `jmethodID` handed to the image. Never null.
    pub fn handle(self) -> usize {
        HANDLE_BASE + self as usize
    }

    pub fn from_handle(handle: usize) -> Self {
        handle
            .checked_sub(HANDLE_BASE)
            .and_then(|index| ALL.get(index).copied())
            .unwrap_or(MethodId::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_exactly() {
        assert_eq!(MethodId::from_name(b"hasWindowFocus"), MethodId::HasWindowFocus);
        assert_eq!(MethodId::from_name(b"isGamePadKeyPressed"), MethodId::IsGamepadKeyPressed);
        assert_eq!(MethodId::from_name(b"isGamepadKeyPressed"), MethodId::Unknown);
        assert_eq!(MethodId::from_name(b""), MethodId::Unknown);
    }

    #[test]
    fn handles_round_trip_and_are_non_null() {
        for id in ALL {
            assert_ne!(id.handle(), 0);
            assert_eq!(MethodId::from_handle(id.handle()), *id);
        }
        assert_eq!(MethodId::from_handle(0), MethodId::Unknown);
        assert_eq!(MethodId::from_handle(0xdead_beef), MethodId::Unknown);
    }
}
