//! Validated branch names
//!
//! Branch names live under `refs/heads/` and follow Git's ref-name
//! rules: no spaces or control bytes, no `..`, no leading `-` or `.`, no
//! `@{`, none of `*:?[\^~`, no component starting with a dot, and no
//! `.lock` suffix.

use crate::errors::RvsError;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BranchName(String);

impl BranchName {
    pub fn try_parse(name: String) -> anyhow::Result<Self> {
        if !Self::is_valid(&name) {
            anyhow::bail!(RvsError::InvalidRef(name));
        }

        Ok(BranchName(name))
    }

    fn is_valid(name: &str) -> bool {
        if name.is_empty() || name.starts_with('-') || name.starts_with('/') {
            return false;
        }
        if name.ends_with('/') || name.ends_with('.') || name.ends_with(".lock") {
            return false;
        }
        if name.contains("..") || name.contains("@{") || name.contains("//") {
            return false;
        }
        if name
            .bytes()
            .any(|b| b <= 0x20 || b == 0x7f || b"*:?[\\^~".contains(&b))
        {
            return false;
        }

        // no path component may start with a dot
        name.split('/').all(|component| !component.starts_with('.'))
    }

    /// Path of this branch's ref relative to the repository metadata
    /// directory.
    pub fn ref_path(&self) -> PathBuf {
        PathBuf::from("refs").join("heads").join(&self.0)
    }

    pub fn short_name(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::proptest;

    proptest! {
        #[test]
        fn alphanumeric_names_are_valid(name in "[a-zA-Z0-9_][a-zA-Z0-9_-]*") {
            assert!(BranchName::try_parse(name).is_ok());
        }

        #[test]
        fn hierarchical_names_are_valid(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+",
        ) {
            assert!(BranchName::try_parse(format!("{}/{}", prefix, suffix)).is_ok());
        }

        #[test]
        fn consecutive_dots_are_rejected(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+",
        ) {
            assert!(BranchName::try_parse(format!("{}..{}", prefix, suffix)).is_err());
        }

        #[test]
        fn lock_suffix_is_rejected(prefix in "[a-zA-Z0-9_-]+") {
            assert!(BranchName::try_parse(format!("{}.lock", prefix)).is_err());
        }

        #[test]
        fn embedded_special_bytes_are_rejected(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+",
            special in r"[ \*:\?\[\\\^~]",
        ) {
            assert!(BranchName::try_parse(format!("{}{}{}", prefix, special, suffix)).is_err());
        }
    }

    #[test]
    fn edge_cases() {
        assert!(BranchName::try_parse("".into()).is_err());
        assert!(BranchName::try_parse("-leading-dash".into()).is_err());
        assert!(BranchName::try_parse(".hidden".into()).is_err());
        assert!(BranchName::try_parse("feature/.hidden".into()).is_err());
        assert!(BranchName::try_parse("trailing/".into()).is_err());
        assert!(BranchName::try_parse("a@{b}".into()).is_err());
        assert!(BranchName::try_parse("with\x00nul".into()).is_err());

        assert!(BranchName::try_parse("main".into()).is_ok());
        assert!(BranchName::try_parse("feature/issue-42".into()).is_ok());
    }

    #[test]
    fn ref_path_lives_under_heads() {
        let name = BranchName::try_parse("feature/x".into()).unwrap();
        assert_eq!(name.ref_path(), PathBuf::from("refs/heads/feature/x"));
    }
}
