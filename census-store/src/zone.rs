use std::fmt::{Debug, Display, Formatter};

use serde::{Serialize, Serializer};

/// The number of characters in every stored zone code.
pub const ZONE_CODE_LEN: usize = 10;

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
/// An error that can occur when building a [ZoneCode].
pub enum ZoneCodeError {
    #[error("Zone code {0:?} is longer than {len} characters", len = ZONE_CODE_LEN)]
    /// Codes are padded but never truncated.
    TooLong(String),
    #[error("Zone code is empty")]
    /// The source field contained no zone code.
    Empty,
    #[error("Zone code {0:?} contains a `,`")]
    /// A comma would split the zone code across two CSV columns.
    Delimiter(String),
    #[error("Zone code {code:?} contains {c:?} which cannot be stored as a single UTF-16 unit")]
    /// Characters outside of the basic multilingual plane take up two
    /// UTF-16 units and do not fit the fixed width layout.
    Unrepresentable { code: String, c: char },
}

#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
/// A geographic zone identifier, right padded with spaces to
/// [ZONE_CODE_LEN] characters.
pub struct ZoneCode([char; ZONE_CODE_LEN]);

impl ZoneCode {
    /// Creates a new zone code, padding it with spaces if it is shorter
    /// than [ZONE_CODE_LEN].
    ///
    /// Codes containing a `,` or characters outside of the basic
    /// multilingual plane are rejected.
    pub fn new(code: &str) -> Result<Self, ZoneCodeError> {
        let mut chars = [' '; ZONE_CODE_LEN];
        for (idx, c) in code.chars().enumerate() {
            if c == ',' {
                return Err(ZoneCodeError::Delimiter(code.to_string()));
            }
            if c.len_utf16() != 1 {
                return Err(ZoneCodeError::Unrepresentable {
                    code: code.to_string(),
                    c,
                });
            }

            let Some(slot) = chars.get_mut(idx) else {
                return Err(ZoneCodeError::TooLong(code.to_string()));
            };
            *slot = c;
        }
        Ok(Self(chars))
    }

    /// A zone code made up entirely of padding.
    pub const fn blank() -> Self {
        Self([' '; ZONE_CODE_LEN])
    }

    /// Extracts the zone code from the first column of a source line.
    ///
    /// Source files quote the code, i.e. `"00AAFA0001"`, in which case the
    /// quotes are stripped. At most [ZONE_CODE_LEN] characters are kept.
    pub fn from_source_field(field: &str) -> Result<Self, ZoneCodeError> {
        let field = field.trim();
        let field = field.strip_prefix('"').unwrap_or(field);
        let field = field.strip_suffix('"').unwrap_or(field);

        if field.is_empty() {
            return Err(ZoneCodeError::Empty);
        }

        let end = field
            .char_indices()
            .nth(ZONE_CODE_LEN)
            .map(|(idx, _)| idx)
            .unwrap_or(field.len());
        Self::new(&field[..end])
    }

    /// Builds a zone code from its UTF-16 code units as stored on disk.
    pub(crate) fn from_utf16(units: [u16; ZONE_CODE_LEN]) -> Option<Self> {
        let mut chars = [' '; ZONE_CODE_LEN];
        for (slot, c) in chars.iter_mut().zip(char::decode_utf16(units)) {
            *slot = c.ok()?;
        }
        Some(Self(chars))
    }

    /// Returns the UTF-16 code units written to disk.
    pub(crate) fn to_utf16(self) -> [u16; ZONE_CODE_LEN] {
        let mut units = [0u16; ZONE_CODE_LEN];
        for (unit, c) in units.iter_mut().zip(self.0) {
            // Every character is a single unit, see `ZoneCode::new`.
            let mut buf = [0u16; 2];
            *unit = c.encode_utf16(&mut buf)[0];
        }
        units
    }

    /// Returns the padded code.
    pub fn as_string(&self) -> String {
        self.0.iter().collect()
    }

    /// Returns the code without the right padding.
    pub fn trimmed(&self) -> String {
        let mut code = self.as_string();
        code.truncate(code.trim_end_matches(' ').len());
        code
    }

    /// Returns if the code begins with the given prefix.
    pub fn starts_with(&self, prefix: &str) -> bool {
        let mut chars = self.0.iter();
        prefix.chars().all(|c| chars.next() == Some(&c))
    }

    /// Returns if the code is entirely padding.
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|c| *c == ' ')
    }
}

impl Default for ZoneCode {
    fn default() -> Self {
        Self::blank()
    }
}

impl Display for ZoneCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for c in self.0 {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl Debug for ZoneCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ZoneCode({:?})", self.as_string())
    }
}

impl Serialize for ZoneCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.trimmed())
    }
}
