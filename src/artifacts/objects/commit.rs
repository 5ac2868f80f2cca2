//! Commit object
//!
//! Text payload with header lines in fixed order (`tree`, zero or more
//! `parent`, `author`, `committer`), then a blank line and the message.
//! Author lines carry the epoch timestamp and a `±HHMM` zone offset.

use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use std::io::{BufRead, Write};

/// Author or committer identity with timestamp.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Author {
    name: String,
    email: String,
    timestamp: chrono::DateTime<chrono::FixedOffset>,
}

impl Author {
    pub fn new(name: String, email: String) -> Self {
        Author {
            name,
            email,
            timestamp: chrono::Local::now().fixed_offset(),
        }
    }

    pub fn new_with_timestamp(
        name: String,
        email: String,
        timestamp: chrono::DateTime<chrono::FixedOffset>,
    ) -> Self {
        Author {
            name,
            email,
            timestamp,
        }
    }

    /// Identity as `Name <email>`.
    pub fn display_name(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }

    /// Full header form: `Name <email> <epoch> <±HHMM>`.
    pub fn display(&self) -> String {
        format!(
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp.timestamp(),
            self.timestamp.format("%z")
        )
    }

    /// Resolve the author identity from the environment.
    ///
    /// `RVS_AUTHOR_NAME`/`RVS_AUTHOR_EMAIL` win, falling back to the
    /// committer variables and finally to the built-in default identity.
    pub fn load_author_from_env() -> Self {
        Self::from_env_pair("RVS_AUTHOR_NAME", "RVS_COMMITTER_NAME")
    }

    /// Resolve the committer identity from the environment, mirroring
    /// [`Author::load_author_from_env`] with the lookup order reversed.
    pub fn load_committer_from_env() -> Self {
        Self::from_env_pair("RVS_COMMITTER_NAME", "RVS_AUTHOR_NAME")
    }

    fn from_env_pair(primary: &str, fallback: &str) -> Self {
        let email_primary = primary.replace("_NAME", "_EMAIL");
        let email_fallback = fallback.replace("_NAME", "_EMAIL");

        let name = std::env::var(primary)
            .or_else(|_| std::env::var(fallback))
            .unwrap_or_else(|_| "RVS User".to_string());
        let email = std::env::var(email_primary)
            .or_else(|_| std::env::var(email_fallback))
            .unwrap_or_else(|_| "rvs@example.com".to_string());

        Author::new(name, email)
    }

    /// Timestamp formatted like `Mon Jan 1 12:34:56 2024 +0000`.
    pub fn readable_timestamp(&self) -> String {
        self.timestamp
            .format("%a %b %-d %H:%M:%S %Y %z")
            .to_string()
    }

    pub fn timestamp(&self) -> chrono::DateTime<chrono::FixedOffset> {
        self.timestamp
    }
}

impl TryFrom<&str> for Author {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // "Name <email> epoch ±HHMM", split from the right
        let parts: Vec<&str> = value.rsplitn(3, ' ').collect();
        if parts.len() < 3 {
            return Err(anyhow::anyhow!("invalid author line: {}", value));
        }

        let zone = parts[0];
        let epoch = parts[1]
            .parse::<i64>()
            .map_err(|_| anyhow::anyhow!("invalid author timestamp: {}", parts[1]))?;
        let name_email = parts[2];

        let email_start = name_email
            .find('<')
            .ok_or_else(|| anyhow::anyhow!("invalid author line: missing '<'"))?;
        let email_end = name_email
            .find('>')
            .ok_or_else(|| anyhow::anyhow!("invalid author line: missing '>'"))?;

        let name = name_email[..email_start].trim().to_string();
        let email = name_email[email_start + 1..email_end].to_string();

        let offset = parse_zone_offset(zone)?;
        let timestamp = chrono::DateTime::from_timestamp(epoch, 0)
            .ok_or_else(|| anyhow::anyhow!("invalid author timestamp: {}", epoch))?
            .with_timezone(&offset);

        Ok(Author {
            name,
            email,
            timestamp,
        })
    }
}

fn parse_zone_offset(zone: &str) -> anyhow::Result<chrono::FixedOffset> {
    if zone.len() != 5 || !(zone.starts_with('+') || zone.starts_with('-')) {
        anyhow::bail!("invalid timezone offset: {}", zone);
    }

    let hours: i32 = zone[1..3].parse()?;
    let minutes: i32 = zone[3..5].parse()?;
    let seconds = (hours * 60 + minutes) * 60;

    let offset = if zone.starts_with('-') {
        chrono::FixedOffset::west_opt(seconds)
    } else {
        chrono::FixedOffset::east_opt(seconds)
    };

    offset.ok_or_else(|| anyhow::anyhow!("invalid timezone offset: {}", zone))
}

/// Lightweight commit view used by graph walks.
///
/// Carries just what traversal needs so walkers can cache thousands of
/// commits cheaply.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SlimCommit {
    pub oid: ObjectId,
    pub parents: Vec<ObjectId>,
    pub timestamp: chrono::DateTime<chrono::FixedOffset>,
}

/// Full commit record.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Commit {
    parents: Vec<ObjectId>,
    tree_oid: ObjectId,
    author: Author,
    committer: Author,
    message: String,
}

impl Commit {
    /// Create a commit, normalizing the message to end with a newline.
    pub fn new(
        parents: Vec<ObjectId>,
        tree_oid: ObjectId,
        author: Author,
        committer: Author,
        message: String,
    ) -> Self {
        let mut message = message;
        if !message.ends_with('\n') {
            message.push('\n');
        }

        Commit {
            parents,
            tree_oid,
            author,
            committer,
            message,
        }
    }

    /// First line of the message, for one-line displays.
    pub fn short_message(&self) -> String {
        self.message.lines().next().unwrap_or("").to_string()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn tree_oid(&self) -> &ObjectId {
        &self.tree_oid
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    pub fn parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn committer(&self) -> &Author {
        &self.committer
    }

    pub fn timestamp(&self) -> chrono::DateTime<chrono::FixedOffset> {
        self.committer.timestamp()
    }

    pub fn to_slim(&self, oid: ObjectId) -> SlimCommit {
        SlimCommit {
            oid,
            parents: self.parents.clone(),
            timestamp: self.timestamp(),
        }
    }

    fn payload(&self) -> String {
        let mut lines = String::new();

        lines.push_str(&format!("tree {}\n", self.tree_oid.as_ref()));
        for parent in &self.parents {
            lines.push_str(&format!("parent {}\n", parent.as_ref()));
        }
        lines.push_str(&format!("author {}\n", self.author.display()));
        lines.push_str(&format!("committer {}\n", self.committer.display()));
        lines.push('\n');
        lines.push_str(&self.message);

        lines
    }
}

impl Packable for Commit {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let payload = self.payload();

        let mut commit_bytes = Vec::with_capacity(payload.len() + 16);
        let header = format!("{} {}\0", self.object_type().as_str(), payload.len());
        commit_bytes.write_all(header.as_bytes())?;
        commit_bytes.write_all(payload.as_bytes())?;

        Ok(Bytes::from(commit_bytes))
    }
}

impl Unpackable for Commit {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let content = reader
            .bytes()
            .collect::<Result<Vec<u8>, std::io::Error>>()?;
        let content = String::from_utf8(content)?;

        let (headers, message) = content
            .split_once("\n\n")
            .context("invalid commit object: missing header separator")?;

        let mut tree_oid = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;

        for line in headers.lines() {
            if let Some(oid) = line.strip_prefix("tree ") {
                tree_oid = Some(ObjectId::try_parse(oid.to_string())?);
            } else if let Some(oid) = line.strip_prefix("parent ") {
                parents.push(ObjectId::try_parse(oid.to_string())?);
            } else if let Some(ident) = line.strip_prefix("author ") {
                author = Some(Author::try_from(ident)?);
            } else if let Some(ident) = line.strip_prefix("committer ") {
                committer = Some(Author::try_from(ident)?);
            } else {
                anyhow::bail!("invalid commit object: unexpected header '{}'", line);
            }
        }

        let tree_oid = tree_oid.context("invalid commit object: missing tree line")?;
        let author = author.context("invalid commit object: missing author line")?;
        let committer = committer.context("invalid commit object: missing committer line")?;

        Ok(Commit {
            parents,
            tree_oid,
            author,
            committer,
            message: message.to_string(),
        })
    }
}

impl Object for Commit {
    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }
}
