use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::entry::{ManifestEntry, NodeKind};
use crate::error::{ManifestError, ManifestResult};
use crate::replay::Replay;

/// Pre-order, depth-tagged flattening of a repository forest.
///
/// Serialized as one `"<depth> <kind> <identifier>\n"` line per entry. The
/// depth of consecutive entries may grow by at most one; that invariant is
/// upheld by [`ManifestBuilder`](crate::ManifestBuilder) and can be checked
/// with [`validate`](Self::validate), but parsing never enforces it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeManifest {
    entries: Vec<ManifestEntry>,
}

impl TreeManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    /// Append an entry.
    pub fn push(&mut self, depth: u32, kind: NodeKind, id: impl Into<String>) {
        self.entries.push(ManifestEntry::new(depth, kind, id));
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ManifestEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an identifier appears anywhere in the manifest.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Walk entries in order together with each entry's parent.
    pub fn replay(&self) -> Replay<'_> {
        Replay::new(&self.entries)
    }

    // ---- Flat text ----

    /// Render the manifest in its flat line format.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.to_string());
            out.push('\n');
        }
        out
    }

    pub fn write_to<W: Write>(&self, mut out: W) -> io::Result<()> {
        for entry in &self.entries {
            writeln!(out, "{entry}")?;
        }
        out.flush()
    }

    /// Parse flat text. Blank lines are skipped; structure is not checked.
    pub fn parse(text: &str) -> ManifestResult<Self> {
        Self::read_from(text.as_bytes())
    }

    pub fn read_from<R: BufRead>(input: R) -> ManifestResult<Self> {
        let mut entries = Vec::new();
        for (idx, line) in input.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(parse_line(idx + 1, &line)?);
        }
        Ok(Self { entries })
    }

    pub fn save(&self, path: &Path) -> ManifestResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.write_to(BufWriter::new(File::create(path)?))?;
        tracing::info!(path = %path.display(), entries = self.len(), "manifest saved");
        Ok(())
    }

    pub fn load(path: &Path) -> ManifestResult<Self> {
        let manifest = Self::read_from(BufReader::new(File::open(path)?))?;
        tracing::info!(path = %path.display(), entries = manifest.len(), "manifest loaded");
        Ok(manifest)
    }

    // ---- Structure ----

    /// Check the invariants replay depends on.
    ///
    /// - the first entry is a root (depth 0)
    /// - depth grows by at most one between consecutive entries
    /// - leaves are never followed by a deeper entry
    /// - identifiers are unique
    pub fn validate(&self) -> ManifestResult<()> {
        let mut seen = HashSet::new();
        let mut prev: Option<&ManifestEntry> = None;
        for (idx, entry) in self.entries.iter().enumerate() {
            let line = idx + 1;
            match prev {
                None if entry.depth != 0 => {
                    return Err(ManifestError::FirstEntryNotRoot { depth: entry.depth });
                }
                None => {}
                Some(p) => {
                    if entry.depth > p.depth + 1 {
                        return Err(ManifestError::DepthJump {
                            line,
                            from: p.depth,
                            to: entry.depth,
                        });
                    }
                    if entry.depth == p.depth + 1 && p.kind.is_leaf() {
                        return Err(ManifestError::LeafWithChildren {
                            line: idx,
                            id: p.id.clone(),
                        });
                    }
                }
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(ManifestError::DuplicateIdentifier {
                    line,
                    id: entry.id.clone(),
                });
            }
            prev = Some(entry);
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a TreeManifest {
    type Item = &'a ManifestEntry;
    type IntoIter = std::slice::Iter<'a, ManifestEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn parse_line(line: usize, text: &str) -> ManifestResult<ManifestEntry> {
    let err = |reason: String| ManifestError::Parse { line, reason };
    let mut fields = text.split_whitespace();

    let depth = fields
        .next()
        .ok_or_else(|| err("missing depth".into()))?
        .parse::<u32>()
        .map_err(|e| err(format!("bad depth: {e}")))?;
    let code = fields
        .next()
        .ok_or_else(|| err("missing kind".into()))?
        .parse::<u32>()
        .map_err(|e| err(format!("bad kind: {e}")))?;
    let kind = NodeKind::from_code(code).ok_or_else(|| err(format!("unknown kind code {code}")))?;
    let id = fields.next().ok_or_else(|| err("missing identifier".into()))?;
    if fields.next().is_some() {
        return Err(err("unexpected trailing field".into()));
    }

    Ok(ManifestEntry::new(depth, kind, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TreeManifest {
        let mut m = TreeManifest::new();
        m.push(0, NodeKind::Community, "1721.1/1");
        m.push(1, NodeKind::Collection, "1721.1/2");
        m.push(2, NodeKind::Item, "1721.1/3");
        m.push(0, NodeKind::Community, "1721.1/4");
        m
    }

    #[test]
    fn text_format_is_exact() {
        assert_eq!(
            sample().to_text(),
            "0 4 1721.1/1\n1 3 1721.1/2\n2 2 1721.1/3\n0 4 1721.1/4\n"
        );
    }

    #[test]
    fn empty_manifest_is_empty_text() {
        assert_eq!(TreeManifest::new().to_text(), "");
        assert!(TreeManifest::parse("").unwrap().is_empty());
    }

    #[test]
    fn write_to_matches_to_text() {
        let mut out = Vec::new();
        sample().write_to(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), sample().to_text());
    }

    #[test]
    fn parse_roundtrip() {
        let m = sample();
        assert_eq!(TreeManifest::parse(&m.to_text()).unwrap(), m);
    }

    #[test]
    fn parse_tolerates_blank_lines_and_missing_final_newline() {
        let m = TreeManifest::parse("0 4 a\n\n1 3 b").unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.entries()[1], ManifestEntry::new(1, NodeKind::Collection, "b"));
    }

    #[test]
    fn parse_reports_line_numbers() {
        let err = TreeManifest::parse("0 4 a\nx 3 b\n").unwrap_err();
        assert!(matches!(err, ManifestError::Parse { line: 2, .. }));
    }

    #[test]
    fn parse_rejects_negative_depth() {
        assert!(matches!(
            TreeManifest::parse("-1 4 a").unwrap_err(),
            ManifestError::Parse { line: 1, .. }
        ));
    }

    #[test]
    fn parse_rejects_unknown_kind() {
        let err = TreeManifest::parse("0 9 a").unwrap_err();
        assert!(err.to_string().contains("unknown kind code 9"));
    }

    #[test]
    fn parse_rejects_missing_and_extra_fields() {
        assert!(TreeManifest::parse("0 4").is_err());
        assert!(TreeManifest::parse("0 4 a b").is_err());
    }

    #[test]
    fn parse_does_not_validate_structure() {
        let m = TreeManifest::parse("3 2 a\n0 4 b\n").unwrap();
        assert_eq!(m.len(), 2);
        assert!(m.validate().is_err());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scratch").join("export.map");
        let m = sample();
        m.save(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), m.to_text());
        assert_eq!(TreeManifest::load(&path).unwrap(), m);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TreeManifest::load(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ManifestError::Io(_)));
    }

    #[test]
    fn validate_accepts_well_formed() {
        sample().validate().unwrap();
        TreeManifest::new().validate().unwrap();
    }

    #[test]
    fn validate_rejects_non_root_start() {
        let m = TreeManifest::parse("1 4 a\n").unwrap();
        assert!(matches!(m.validate(), Err(ManifestError::FirstEntryNotRoot { depth: 1 })));
    }

    #[test]
    fn validate_rejects_depth_jump() {
        let m = TreeManifest::parse("0 4 a\n2 3 b\n").unwrap();
        assert!(matches!(
            m.validate(),
            Err(ManifestError::DepthJump { line: 2, from: 0, to: 2 })
        ));
    }

    #[test]
    fn validate_rejects_leaf_with_child() {
        let m = TreeManifest::parse("0 3 c\n1 2 i\n2 2 j\n").unwrap();
        match m.validate() {
            Err(ManifestError::LeafWithChildren { line, id }) => {
                assert_eq!(line, 2);
                assert_eq!(id, "i");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_duplicates() {
        let m = TreeManifest::parse("0 4 a\n1 3 b\n1 3 b\n").unwrap();
        assert!(matches!(
            m.validate(),
            Err(ManifestError::DuplicateIdentifier { line: 3, .. })
        ));
    }

    #[test]
    fn contains_and_iter() {
        let m = sample();
        assert!(m.contains("1721.1/3"));
        assert!(!m.contains("1721.1/9"));
        assert_eq!((&m).into_iter().count(), 4);
    }
}
