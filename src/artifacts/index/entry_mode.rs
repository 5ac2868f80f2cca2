//! File modes tracked by trees and index entries
//!
//! Only three modes exist in this engine: regular files (`100644`),
//! executable files (`100755`) and subtrees (`40000`). Symlinks and
//! gitlinks are out of scope.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileMode {
    #[default]
    Regular,
    Executable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryMode {
    File(FileMode),
    Directory,
}

impl Default for EntryMode {
    fn default() -> Self {
        EntryMode::File(FileMode::Regular)
    }
}

impl EntryMode {
    pub fn as_u32(&self) -> u32 {
        match self {
            EntryMode::File(FileMode::Regular) => 0o100644,
            EntryMode::File(FileMode::Executable) => 0o100755,
            EntryMode::Directory => 0o40000,
        }
    }

    /// Octal form as written inside tree objects (no zero padding).
    pub fn as_octal_str(&self) -> &str {
        match self {
            EntryMode::File(FileMode::Regular) => "100644",
            EntryMode::File(FileMode::Executable) => "100755",
            EntryMode::Directory => "40000",
        }
    }

    /// Six-character octal form used by `ls-tree` output.
    pub fn as_padded_str(&self) -> &str {
        match self {
            EntryMode::Directory => "040000",
            _ => self.as_octal_str(),
        }
    }

    pub fn from_octal_str(mode: &str) -> anyhow::Result<Self> {
        let mode = u32::from_str_radix(mode, 8)?;
        Ok(Self::from(mode))
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, EntryMode::Directory)
    }

    pub fn is_executable(&self) -> bool {
        matches!(self, EntryMode::File(FileMode::Executable))
    }
}

impl From<u32> for EntryMode {
    fn from(mode: u32) -> Self {
        match mode {
            0o40000 => EntryMode::Directory,
            0o100755 => EntryMode::File(FileMode::Executable),
            _ => EntryMode::File(FileMode::Regular),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn octal_round_trip() {
        for mode in [
            EntryMode::File(FileMode::Regular),
            EntryMode::File(FileMode::Executable),
            EntryMode::Directory,
        ] {
            assert_eq!(EntryMode::from_octal_str(mode.as_octal_str()).unwrap(), mode);
            assert_eq!(EntryMode::from(mode.as_u32()), mode);
        }
    }

    #[test]
    fn padded_form_only_pads_directories() {
        assert_eq!(EntryMode::Directory.as_padded_str(), "040000");
        assert_eq!(EntryMode::default().as_padded_str(), "100644");
    }
}
