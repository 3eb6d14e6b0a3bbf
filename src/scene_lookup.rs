//! Resolves `scene/path/to/object` strings from an `--objects` manifest into
//! the `Transform` they name.
//!
//! Unity lets sibling `GameObject`s share a name, and root names collide just
//! as easily (cloned prefabs, "Enemy (1)", "Enemy (2)", ...). Rather than
//! erroring on the first ambiguous segment, every candidate with a matching
//! name is carried forward speculatively; a branch is only discarded once the
//! remainder of the path fails to resolve through it. If more than one
//! candidate survives to the end, the first is used and the collision is
//! logged rather than treated as fatal.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io::{Read, Seek};

use anyhow::Result;
use rabex::files::SerializedFile;
use rabex::objects::pptr::PathId;
use rabex::objects::ClassId;
use rabex::typetree::TypeTreeProvider;

use crate::error::AmbiguousPath;
use crate::unity::types::Transform;

enum RootLookup {
    Ambiguous(Vec<usize>),
    Root(usize),
}

/// Indexes every root `Transform`/`RectTransform` (one with no `m_Father`) in
/// a scene by its `GameObject`'s name, so `lookup_path` doesn't rescan the
/// scene per call.
pub struct SceneLookup<'a, P> {
    roots: Vec<(PathId, Transform)>,
    roots_lookup: HashMap<String, RootLookup>,
    file: &'a SerializedFile,
    tpk: P,
}

impl<'a, P: TypeTreeProvider> SceneLookup<'a, P> {
    pub fn new(file: &'a SerializedFile, reader: &mut (impl Read + Seek), tpk: P) -> Result<Self> {
        let mut roots = Vec::new();
        let mut roots_lookup = HashMap::new();

        // A scene root can be either a plain `Transform` or a `RectTransform`
        // (e.g. a root-level Canvas) -- both share the leading fields this
        // tool reads, so both are decoded into the same `Transform` struct,
        // matching `SerializedFileHandle::transforms()`'s class filter.
        let root_candidates = file
            .objects()
            .filter(|obj| {
                obj.m_ClassID == ClassId::Transform || obj.m_ClassID == ClassId::RectTransform
            })
            .map(|obj| obj.m_PathID)
            .collect::<Vec<_>>();

        for path_id in root_candidates {
            let transform: Transform = file.get_object::<Transform>(path_id, &tpk)?.read(reader)?;
            if transform.m_Father.optional().is_some() {
                continue;
            }

            let go = transform
                .m_GameObject
                .deref_local(file, &tpk)?
                .read(reader)?;

            let index = roots.len();
            roots.push((path_id, transform));

            match roots_lookup.entry(go.m_Name) {
                Entry::Occupied(mut occupied_entry) => match occupied_entry.get_mut() {
                    RootLookup::Ambiguous(items) => items.push(index),
                    other => *other = RootLookup::Ambiguous(vec![index]),
                },
                Entry::Vacant(entry) => drop(entry.insert(RootLookup::Root(index))),
            }
        }

        Ok(SceneLookup {
            roots,
            roots_lookup,
            file,
            tpk,
        })
    }

    pub fn roots(&self) -> impl ExactSizeIterator<Item = (PathId, &Transform)> {
        self.roots
            .iter()
            .map(|(path_id, transform)| (*path_id, transform))
    }

    /// Resolves a `/`-separated path such as `Level/Enemies/Boss` against the
    /// roots indexed at construction.
    pub fn lookup_path(
        &self,
        reader: &mut (impl Read + Seek),
        scene_name: &str,
        path: &str,
    ) -> Result<Option<(PathId, Transform)>> {
        let mut segments = path.split('/');
        let Some(root_name) = segments.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = segments.collect();

        let root_candidates: Vec<(PathId, Transform)> = match self.roots_lookup.get(root_name) {
            Some(RootLookup::Root(index)) => vec![self.roots[*index].clone()],
            Some(RootLookup::Ambiguous(indices)) => {
                indices.iter().map(|i| self.roots[*i].clone()).collect()
            }
            None => return Ok(None),
        };

        let results = self.resolve_ambiguous(reader, &root_candidates, &rest)?;
        Ok(self.pick(scene_name, path, results))
    }

    /// If `candidates` has more than one entry, resolves each independently
    /// and keeps only the branches whose remaining path actually resolves.
    /// Otherwise resolves the single (or zero) candidate directly.
    fn resolve_ambiguous(
        &self,
        reader: &mut (impl Read + Seek),
        candidates: &[(PathId, Transform)],
        segments: &[&str],
    ) -> Result<Vec<(PathId, Transform)>> {
        if candidates.len() <= 1 {
            return self.resolve(reader, candidates, segments);
        }

        let mut successes = Vec::new();
        for candidate in candidates {
            successes.extend(self.resolve(reader, std::slice::from_ref(candidate), segments)?);
        }
        Ok(successes)
    }

    fn resolve(
        &self,
        reader: &mut (impl Read + Seek),
        candidates: &[(PathId, Transform)],
        segments: &[&str],
    ) -> Result<Vec<(PathId, Transform)>> {
        let Some((segment, rest)) = segments.split_first() else {
            return Ok(candidates.to_vec());
        };

        let mut children = Vec::new();
        for candidate in candidates {
            children.extend(self.children_named(reader, candidate, segment)?);
        }

        self.resolve_ambiguous(reader, &children, rest)
    }

    fn children_named(
        &self,
        reader: &mut (impl Read + Seek),
        current: &(PathId, Transform),
        name: &str,
    ) -> Result<Vec<(PathId, Transform)>> {
        let mut found = Vec::new();
        for child_pptr in &current.1.m_Children {
            let child = child_pptr.deref_local(self.file, &self.tpk)?.read(reader)?;
            let go = child
                .m_GameObject
                .deref_local(self.file, &self.tpk)?
                .read(reader)?;

            if go.m_Name == name {
                found.push((child_pptr.m_PathID, child));
            }
        }
        Ok(found)
    }

    fn pick(
        &self,
        scene_name: &str,
        path: &str,
        mut results: Vec<(PathId, Transform)>,
    ) -> Option<(PathId, Transform)> {
        match results.len() {
            0 => None,
            1 => results.pop(),
            n => {
                let ambiguous = AmbiguousPath {
                    scene: scene_name,
                    path,
                    candidates: n,
                };
                tracing::warn!(scene = scene_name, path, candidates = n, "{ambiguous}");
                Some(results.remove(0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rabex::files::serializedfile::build_common_offset_map;
    use rabex::files::serializedfile::builder::SerializedFileBuilder;
    use rabex::objects::pptr::PPtr;

    use super::*;
    use crate::test_support;
    use crate::unity::types::GameObject;

    /// Two root `GameObject`s both named "Enemy" (cloned-prefab siblings),
    /// each with a child also named "Weapon", plus a "Boss" child that only
    /// exists under the second root. Mirrors the ambiguous-siblings scenario
    /// `lookup_path`'s doc comment describes.
    fn ambiguous_siblings_scene() -> (SerializedFile, Vec<u8>) {
        let version = test_support::unity_version();
        let tpk = test_support::tpk();
        let com = build_common_offset_map(&tpk.inner, &version);
        let mut file = SerializedFileBuilder::new(&version, &tpk, &com, false);

        file.add_object_at(1, &GameObject {
            m_Component: Vec::new(),
            m_Layer: 0,
            m_Name: "Enemy".to_owned(),
            m_Tag: 0,
            m_IsActive: true,
        }).unwrap();
        file.add_object_at(2, &Transform {
            m_GameObject: PPtr::local(1).typed(),
            m_Children: vec![PPtr::local(6).typed()],
            ..Default::default()
        }).unwrap();

        file.add_object_at(3, &GameObject {
            m_Component: Vec::new(),
            m_Layer: 0,
            m_Name: "Enemy".to_owned(),
            m_Tag: 0,
            m_IsActive: true,
        }).unwrap();
        file.add_object_at(4, &Transform {
            m_GameObject: PPtr::local(3).typed(),
            m_Children: vec![PPtr::local(8).typed(), PPtr::local(10).typed()],
            ..Default::default()
        }).unwrap();

        file.add_object_at(5, &GameObject {
            m_Component: Vec::new(),
            m_Layer: 0,
            m_Name: "Weapon".to_owned(),
            m_Tag: 0,
            m_IsActive: true,
        }).unwrap();
        file.add_object_at(6, &Transform {
            m_GameObject: PPtr::local(5).typed(),
            m_Father: PPtr::local(2).typed(),
            ..Default::default()
        }).unwrap();

        file.add_object_at(7, &GameObject {
            m_Component: Vec::new(),
            m_Layer: 0,
            m_Name: "Weapon".to_owned(),
            m_Tag: 0,
            m_IsActive: true,
        }).unwrap();
        file.add_object_at(8, &Transform {
            m_GameObject: PPtr::local(7).typed(),
            m_Father: PPtr::local(4).typed(),
            ..Default::default()
        }).unwrap();

        file.add_object_at(9, &GameObject {
            m_Component: Vec::new(),
            m_Layer: 0,
            m_Name: "Boss".to_owned(),
            m_Tag: 0,
            m_IsActive: true,
        }).unwrap();
        file.add_object_at(10, &Transform {
            m_GameObject: PPtr::local(9).typed(),
            m_Father: PPtr::local(4).typed(),
            ..Default::default()
        }).unwrap();

        let bytes = file.write_vec().unwrap();
        let parsed = test_support::parse(&bytes);
        (parsed, bytes)
    }

    #[test]
    fn ambiguous_root_resolves_to_one_of_the_matching_siblings() {
        let (file, bytes) = ambiguous_siblings_scene();
        let tpk = test_support::tpk();
        let mut reader = Cursor::new(bytes.as_slice());

        let lookup = SceneLookup::new(&file, &mut reader, &tpk).unwrap();
        let (path_id, _) = lookup
            .lookup_path(&mut reader, "TestScene", "Enemy/Weapon")
            .unwrap()
            .expect("one of the two ambiguous 'Weapon' children should resolve");

        assert!(path_id == 6 || path_id == 8);
    }

    #[test]
    fn ambiguous_root_with_unique_child_resolves_without_error() {
        let (file, bytes) = ambiguous_siblings_scene();
        let tpk = test_support::tpk();
        let mut reader = Cursor::new(bytes.as_slice());

        let lookup = SceneLookup::new(&file, &mut reader, &tpk).unwrap();
        let (path_id, _) = lookup
            .lookup_path(&mut reader, "TestScene", "Enemy/Boss")
            .unwrap()
            .expect("'Boss' only exists under the second 'Enemy' root");

        assert_eq!(path_id, 10);
    }

    #[test]
    fn missing_child_under_ambiguous_root_resolves_to_none() {
        let (file, bytes) = ambiguous_siblings_scene();
        let tpk = test_support::tpk();
        let mut reader = Cursor::new(bytes.as_slice());

        let lookup = SceneLookup::new(&file, &mut reader, &tpk).unwrap();
        let result = lookup
            .lookup_path(&mut reader, "TestScene", "Enemy/Nonexistent")
            .unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn unknown_root_name_resolves_to_none() {
        let (file, bytes) = ambiguous_siblings_scene();
        let tpk = test_support::tpk();
        let mut reader = Cursor::new(bytes.as_slice());

        let lookup = SceneLookup::new(&file, &mut reader, &tpk).unwrap();
        let result = lookup
            .lookup_path(&mut reader, "TestScene", "Nobody/Here")
            .unwrap();

        assert!(result.is_none());
    }
}
