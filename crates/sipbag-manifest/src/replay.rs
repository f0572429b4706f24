use std::cmp::Ordering;

use crate::entry::ManifestEntry;

/// One replayed entry together with its reconstructed parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplayStep<'a> {
    /// Position of the entry in the manifest.
    pub index: usize,
    pub entry: &'a ManifestEntry,
    /// Identifier of the nearest ancestor, `None` for roots.
    pub parent: Option<&'a str>,
}

/// Single forward pass over a manifest that rebuilds parent context.
///
/// Keeps a stack of ancestor identifiers seeded with a `None` sentinel. The
/// top of the stack is the parent of the entry about to be yielded; after
/// yielding, the stack is adjusted by comparing this entry's depth with the
/// next one: push on descend, keep on sibling, pop the depth difference on
/// ascend. The sentinel itself is never popped.
///
/// Replay trusts the manifest. A depth jump of more than one level still
/// pushes a single ancestor and yields a wrong parent; call
/// [`TreeManifest::validate`](crate::TreeManifest::validate) first when the
/// input is untrusted.
#[derive(Clone, Debug)]
pub struct Replay<'a> {
    entries: &'a [ManifestEntry],
    index: usize,
    parents: Vec<Option<&'a str>>,
}

impl<'a> Replay<'a> {
    pub fn new(entries: &'a [ManifestEntry]) -> Self {
        Self {
            entries,
            index: 0,
            parents: vec![None],
        }
    }

    /// Current ancestor stack, sentinel first.
    pub fn stack(&self) -> &[Option<&'a str>] {
        &self.parents
    }

    fn advance(&mut self, current: &'a ManifestEntry, next: &ManifestEntry) {
        match next.depth.cmp(&current.depth) {
            Ordering::Greater => self.parents.push(Some(current.id.as_str())),
            Ordering::Equal => {}
            Ordering::Less => {
                let pops = (current.depth - next.depth) as usize;
                let keep = self.parents.len().saturating_sub(pops).max(1);
                if self.parents.len() - keep < pops {
                    tracing::warn!(
                        id = %next.id,
                        depth = next.depth,
                        "manifest ascends past its roots; clamping to top level"
                    );
                }
                self.parents.truncate(keep);
            }
        }
    }
}

impl<'a> Iterator for Replay<'a> {
    type Item = ReplayStep<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let entries = self.entries;
        let entry = entries.get(self.index)?;
        let step = ReplayStep {
            index: self.index,
            entry,
            parent: self.parents.last().copied().flatten(),
        };
        if let Some(next) = entries.get(self.index + 1) {
            self.advance(entry, next);
        }
        self.index += 1;
        Some(step)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.entries.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Replay<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::NodeKind;
    use crate::manifest::TreeManifest;

    fn manifest(entries: &[(u32, NodeKind, &str)]) -> TreeManifest {
        let mut m = TreeManifest::new();
        for (depth, kind, id) in entries {
            m.push(*depth, *kind, *id);
        }
        m
    }

    fn parents(m: &TreeManifest) -> Vec<(String, Option<String>)> {
        m.replay()
            .map(|s| (s.entry.id.clone(), s.parent.map(str::to_string)))
            .collect()
    }

    fn pair(id: &str, parent: Option<&str>) -> (String, Option<String>) {
        (id.to_string(), parent.map(str::to_string))
    }

    #[test]
    fn siblings_share_parent_and_roots_have_none() {
        use NodeKind::*;
        let m = manifest(&[(0, Collection, "a"), (1, Item, "a1"), (1, Item, "a2"), (0, Collection, "b")]);
        assert_eq!(
            parents(&m),
            vec![
                pair("a", None),
                pair("a1", Some("a")),
                pair("a2", Some("a")),
                pair("b", None),
            ]
        );
    }

    #[test]
    fn ascending_pops_exactly_the_depth_difference() {
        use NodeKind::*;
        let m = manifest(&[(0, Community, "x"), (1, Community, "y"), (2, Item, "z"), (1, Community, "w")]);
        let mut replay = m.replay();

        assert_eq!(replay.next().unwrap().parent, None);
        assert_eq!(replay.stack(), &[None, Some("x")]);
        assert_eq!(replay.next().unwrap().parent, Some("x"));
        assert_eq!(replay.stack(), &[None, Some("x"), Some("y")]);

        let z = replay.next().unwrap();
        assert_eq!(z.entry.id, "z");
        assert_eq!(z.parent, Some("y"));
        assert_eq!(replay.stack(), &[None, Some("x")]);

        let w = replay.next().unwrap();
        assert_eq!(w.parent, Some("x"));
        assert!(replay.next().is_none());
    }

    #[test]
    fn multi_level_ascent() {
        use NodeKind::*;
        let m = manifest(&[
            (0, Community, "r"),
            (1, Community, "s"),
            (2, Collection, "c"),
            (3, Item, "i"),
            (0, Community, "r2"),
            (1, Collection, "c2"),
        ]);
        assert_eq!(
            parents(&m),
            vec![
                pair("r", None),
                pair("s", Some("r")),
                pair("c", Some("s")),
                pair("i", Some("c")),
                pair("r2", None),
                pair("c2", Some("r2")),
            ]
        );
    }

    #[test]
    fn narrowed_manifest_starts_with_ancestor_chain() {
        use NodeKind::*;
        let m = manifest(&[
            (0, Community, "top"),
            (1, Community, "mid"),
            (2, Collection, "target"),
            (3, Item, "i1"),
            (3, Item, "i2"),
        ]);
        let steps: Vec<_> = m.replay().collect();
        assert_eq!(steps[2].parent, Some("mid"));
        assert_eq!(steps[4].parent, Some("target"));
        assert_eq!(steps[4].index, 4);
    }

    #[test]
    fn empty_manifest_replays_nothing() {
        let m = TreeManifest::new();
        assert_eq!(m.replay().count(), 0);
    }

    #[test]
    fn exact_size() {
        use NodeKind::*;
        let m = manifest(&[(0, Community, "a"), (1, Collection, "b")]);
        let mut replay = m.replay();
        assert_eq!(replay.len(), 2);
        replay.next();
        assert_eq!(replay.len(), 1);
    }

    #[test]
    fn depth_jump_yields_wrong_parent_without_panicking() {
        use NodeKind::*;
        // Replay is permissive: a +2 jump pushes one level only.
        let m = manifest(&[(0, Community, "a"), (2, Item, "b"), (0, Community, "c")]);
        let steps = parents(&m);
        assert_eq!(steps[1], pair("b", Some("a")));
        assert_eq!(steps[2], pair("c", None));
    }

    #[test]
    fn sentinel_survives_underflow() {
        use NodeKind::*;
        let m = manifest(&[(3, Collection, "a"), (0, Collection, "b"), (1, Item, "c")]);
        let steps = parents(&m);
        assert_eq!(steps[0], pair("a", None));
        assert_eq!(steps[1], pair("b", None));
        assert_eq!(steps[2], pair("c", Some("b")));
    }
}
