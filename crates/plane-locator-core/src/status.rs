use serde::{Deserialize, Serialize};

/// Outcome code carried by every detection record.
///
/// The integer values are stable and part of the public contract:
///
/// | code | meaning |
/// |---:|---|
/// | `1` | object found and validated |
/// | `0` | ran to completion, nothing survived filtering |
/// | `-1` | malformed arguments |
/// | `-2` | reference (or single) image bytes could not be decoded |
/// | `-3` | scene image bytes could not be decoded |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum Status {
    Found = 1,
    #[default]
    NotFound = 0,
    InvalidInput = -1,
    DecodeFailed = -2,
    SceneDecodeFailed = -3,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Found,
        Status::NotFound,
        Status::InvalidInput,
        Status::DecodeFailed,
        Status::SceneDecodeFailed,
    ];

    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    #[inline]
    pub fn is_found(self) -> bool {
        self == Status::Found
    }

    /// Errors indicate caller bugs or malformed data; retrying is pointless.
    #[inline]
    pub fn is_error(self) -> bool {
        self.code() < 0
    }
}
