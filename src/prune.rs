//! Rewrites a scene in memory down to the reachable closure of a caller-given
//! set of object paths, re-rooting each kept subtree so it no longer depends
//! on its former ancestors.
//!
//! Object-table replacement and type-table compaction (steps 2 and 5 of the
//! algorithm below) are delegated to `SerializedFileBuilder::from_serialized`
//! at the call site (see `driver.rs`), exactly the way the teacher's
//! `examples/repack.rs`/`repack_assetbundle.rs` hand a filtered object
//! iterator to the builder and let it rebuild the type table from scratch.
//! This module is only responsible for steps 1, 3 and 4: computing the
//! surviving set and producing the small number of payload rewrites
//! (reparented transforms, renamed/deactivated roots) that the builder can't
//! infer on its own.

use std::collections::BTreeSet;
use std::io::{Read, Seek};

use anyhow::{Context, Result};
use rabex::files::SerializedFile;
use rabex::objects::pptr::PathId;
use rabex::objects::{ClassId, ClassIdType};
use rabex::serde_typetree;
use rabex::typetree::TypeTreeProvider;
use rustc_hash::FxHashMap;

use crate::error::RepackError;
use crate::reachable;
use crate::scene_lookup::SceneLookup;
use crate::unity::types::{GameObject, RectTransform, Transform};

/// One seed: the caller-given path that named it, and the `path_id` of the
/// `Transform` it resolved to.
pub struct Root {
    pub path: String,
    pub transform_path_id: PathId,
}

pub struct PruneSceneResult {
    /// Every `path_id` that must survive into the output scene.
    pub surviving: BTreeSet<PathId>,
    /// The seed transforms, in the order they were requested.
    pub roots: Vec<Root>,
}

/// Runs the full rewrite described in the module doc: resolve seeds, compute
/// the class-specific reachable closure, augment with `always_include`
/// classes, then build payload replacements for the seeds' `m_Father` and
/// (name/active) cosmetics on their `GameObject`s.
///
/// Returns the surviving id set plus a `path_id -> replacement bytes` map to
/// be spliced into a `SerializedFileBuilder`'s object table by the caller.
pub fn prune_scene<'a>(
    file: &SerializedFile,
    reader: &mut (impl Read + Seek),
    tpk: &impl TypeTreeProvider,
    scene_name: &str,
    retain_paths: impl IntoIterator<Item = &'a str>,
    always_include: &[ClassId],
    disable_roots: bool,
) -> Result<(PruneSceneResult, FxHashMap<PathId, Vec<u8>>)> {
    let scene_lookup = SceneLookup::new(file, reader, tpk)?;

    let mut seeds = Vec::new();
    for path in retain_paths {
        let (path_id, transform) = scene_lookup.lookup_path(reader, scene_name, path)?.ok_or_else(|| {
            RepackError::PathNotFound {
                scene: scene_name.to_owned(),
                path: path.to_owned(),
                segment: path.rsplit('/').next().unwrap_or(path).to_owned(),
            }
        })?;
        seeds.push((path.to_owned(), path_id, transform));
    }

    let mut surviving = reachable::reachable(
        file,
        reader,
        tpk,
        seeds.iter().map(|(_, path_id, _)| *path_id),
    )?;

    if !always_include.is_empty() {
        for info in file.objects() {
            if always_include.contains(&info.m_ClassID) {
                surviving.insert(info.m_PathID);
            }
        }
    }

    let mut replacements = FxHashMap::default();
    reparent_seeds(file, reader, &seeds, &mut replacements, tpk)?;
    rename_and_disable_roots(file, reader, &seeds, disable_roots, &mut replacements, tpk)?;

    let roots = seeds
        .into_iter()
        .map(|(path, transform_path_id, _)| Root {
            path,
            transform_path_id,
        })
        .collect();

    Ok((PruneSceneResult { surviving, roots }, replacements))
}

/// Step 3: null out `m_Father` on every seed transform so it becomes a root
/// of the output scene. The former ancestor chain is simply not carried into
/// the surviving set, unlike the teacher's own `prune_scene_inner` which
/// keeps ancestors reachable instead.
///
/// A seed can be genuinely `RectTransform`-classed (e.g. a UI element named
/// directly in the manifest) even though `scene_lookup.rs` decodes every
/// path segment into the narrower `Transform` struct, which only carries the
/// fields the two classes share and can't be used to tell which one a seed
/// actually is on disk. Each seed is therefore re-read and re-encoded
/// against its real `m_ClassID`, the same way `reachable.rs`'s
/// `visible_edges` dispatches per object class, so a `RectTransform` seed
/// keeps its anchor/pivot fields instead of being silently truncated to a
/// plain `Transform`'s layout while its `ObjectInfo` still declares it
/// `RectTransform`.
fn reparent_seeds(
    file: &SerializedFile,
    reader: &mut (impl Read + Seek),
    seeds: &[(String, PathId, Transform)],
    replacements: &mut FxHashMap<PathId, Vec<u8>>,
    tpk: &impl TypeTreeProvider,
) -> Result<()> {
    if seeds.is_empty() {
        return Ok(());
    }

    for (_, path_id, _) in seeds {
        let info = file
            .get_object_info(*path_id)
            .with_context(|| format!("seed transform {path_id} missing from object table"))?;

        let bytes = match info.m_ClassID {
            ClassId::RectTransform => {
                let mut rect: RectTransform =
                    file.get_object::<RectTransform>(*path_id, tpk)?.read(reader)?;
                rect.m_Father = Default::default();
                let typetree = file.get_typetree_for_class(RectTransform::CLASS_ID, tpk)?;
                serde_typetree::to_vec_endianed(&rect, &typetree, file.m_Header.m_Endianess)?
            }
            _ => {
                let mut transform: Transform =
                    file.get_object::<Transform>(*path_id, tpk)?.read(reader)?;
                transform.m_Father = Default::default();
                let typetree = file.get_typetree_for_class(Transform::CLASS_ID, tpk)?;
                serde_typetree::to_vec_endianed(&transform, &typetree, file.m_Header.m_Endianess)?
            }
        };

        replacements.insert(*path_id, bytes);
    }

    Ok(())
}

/// Step 4: canonicalize each kept root's name (Unity suffixes clones as
/// `"Name (n)"`; the bare prefix is the prefab's real name) and, if
/// requested, deactivate it.
fn rename_and_disable_roots(
    file: &SerializedFile,
    reader: &mut (impl Read + Seek),
    seeds: &[(String, PathId, Transform)],
    disable: bool,
    replacements: &mut FxHashMap<PathId, Vec<u8>>,
    tpk: &impl TypeTreeProvider,
) -> Result<()> {
    if seeds.is_empty() {
        return Ok(());
    }

    let go_typetree = file.get_typetree_for_class(GameObject::CLASS_ID, tpk)?;

    for (_, _, transform) in seeds {
        let go_path_id = transform.m_GameObject.m_PathID;
        let mut go: GameObject = file.get_object::<GameObject>(go_path_id, tpk)?.read(reader)?;

        if let Some((prefix, _)) = go.m_Name.split_once(" (") {
            go.m_Name = prefix.to_owned();
        }
        if disable {
            go.m_IsActive = false;
        }

        let bytes =
            serde_typetree::to_vec_endianed(&go, &go_typetree, file.m_Header.m_Endianess)?;
        replacements.insert(go_path_id, bytes);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::io::Cursor;

    use rabex::files::serializedfile::build_common_offset_map;
    use rabex::files::serializedfile::builder::SerializedFileBuilder;
    use rabex::objects::pptr::PPtr;

    use super::*;
    use crate::test_support;
    use crate::unity::types::SpriteAtlas;

    /// A "Keep (1)" object one level under a "Container" root, a sibling
    /// "Drop" root that's never requested, and an orphan `SpriteAtlas`
    /// nothing references -- standing in for `RenderSettings`, which has no
    /// Rust struct in this crate, to exercise the same class-agnostic
    /// `always_include` path.
    fn single_object_scene() -> (SerializedFile, Vec<u8>) {
        let version = test_support::unity_version();
        let tpk = test_support::tpk();
        let com = build_common_offset_map(&tpk.inner, &version);
        let mut file = SerializedFileBuilder::new(&version, &tpk, &com, false);

        file.add_object_at(1, &GameObject {
            m_Component: Vec::new(),
            m_Layer: 0,
            m_Name: "Container".to_owned(),
            m_Tag: 0,
            m_IsActive: true,
        }).unwrap();
        file.add_object_at(2, &Transform {
            m_GameObject: PPtr::local(1).typed(),
            m_Children: vec![PPtr::local(4).typed()],
            ..Default::default()
        }).unwrap();

        file.add_object_at(3, &GameObject {
            m_Component: Vec::new(),
            m_Layer: 0,
            m_Name: "Keep (1)".to_owned(),
            m_Tag: 0,
            m_IsActive: true,
        }).unwrap();
        file.add_object_at(4, &Transform {
            m_GameObject: PPtr::local(3).typed(),
            m_Father: PPtr::local(2).typed(),
            ..Default::default()
        }).unwrap();

        file.add_object_at(5, &GameObject {
            m_Component: Vec::new(),
            m_Layer: 0,
            m_Name: "Drop".to_owned(),
            m_Tag: 0,
            m_IsActive: true,
        }).unwrap();
        file.add_object_at(6, &Transform {
            m_GameObject: PPtr::local(5).typed(),
            ..Default::default()
        }).unwrap();

        file.add_object_at(7, &SpriteAtlas {
            m_Name: "OrphanAtlas".to_owned(),
            m_PackedSprites: Vec::new(),
        }).unwrap();

        let bytes = file.write_vec().unwrap();
        let parsed = test_support::parse(&bytes);
        (parsed, bytes)
    }

    #[test]
    fn single_seed_prunes_to_its_own_closure_plus_always_included() {
        let (file, bytes) = single_object_scene();
        let tpk = test_support::tpk();
        let mut reader = Cursor::new(bytes.as_slice());

        let (result, replacements) = prune_scene(
            &file,
            &mut reader,
            &tpk,
            "TestScene",
            ["Container/Keep (1)"],
            &[ClassId::SpriteAtlas],
            false,
        )
        .unwrap();

        assert_eq!(
            result.surviving,
            BTreeSet::from([3, 4, 7]),
            "Container (1, 2) and Drop (5, 6) must not survive"
        );
        assert_eq!(result.roots.len(), 1);
        assert_eq!(result.roots[0].path, "Container/Keep (1)");
        assert_eq!(result.roots[0].transform_path_id, 4);

        assert!(replacements.contains_key(&4));
        assert!(replacements.contains_key(&3));

        let version = test_support::unity_version();
        let com = build_common_offset_map(&tpk.inner, &version);
        let mut rebuilt = SerializedFileBuilder::from_serialized(
            &version,
            &file,
            bytes.as_slice(),
            &tpk,
            &com,
            file.objects()
                .filter(|obj| result.surviving.contains(&obj.m_PathID))
                .cloned(),
        );
        for (path_id, replacement) in replacements {
            rebuilt.objects.get_mut(&path_id).unwrap().1 = Cow::Owned(replacement);
        }
        let rebuilt_bytes = rebuilt.write_vec().unwrap();
        let rebuilt_file = test_support::parse(&rebuilt_bytes);
        let mut rebuilt_reader = Cursor::new(rebuilt_bytes.as_slice());

        assert!(rebuilt_file.get_object_info(1).is_none());
        assert!(rebuilt_file.get_object_info(2).is_none());
        assert!(rebuilt_file.get_object_info(5).is_none());
        assert!(rebuilt_file.get_object_info(6).is_none());

        let kept_transform: Transform = rebuilt_file
            .get_object::<Transform>(4, &tpk)
            .unwrap()
            .read(&mut rebuilt_reader)
            .unwrap();
        assert!(
            kept_transform.m_Father.optional().is_none(),
            "reparented seed must become a root"
        );

        let kept_go: GameObject = rebuilt_file
            .get_object::<GameObject>(3, &tpk)
            .unwrap()
            .read(&mut rebuilt_reader)
            .unwrap();
        assert_eq!(kept_go.m_Name, "Keep", "clone suffix must be stripped");
        assert!(kept_go.m_IsActive, "disable_roots was false");

        assert!(rebuilt_file.get_object_info(7).is_some());
    }

    #[test]
    fn disable_roots_deactivates_kept_game_object() {
        let (file, bytes) = single_object_scene();
        let tpk = test_support::tpk();
        let mut reader = Cursor::new(bytes.as_slice());

        let (_, replacements) = prune_scene(
            &file,
            &mut reader,
            &tpk,
            "TestScene",
            ["Container/Keep (1)"],
            &[],
            true,
        )
        .unwrap();

        let version = test_support::unity_version();
        let com = build_common_offset_map(&tpk.inner, &version);
        let mut rebuilt = SerializedFileBuilder::from_serialized(
            &version,
            &file,
            bytes.as_slice(),
            &tpk,
            &com,
            file.objects().filter(|obj| obj.m_PathID == 3).cloned(),
        );
        for (path_id, replacement) in replacements {
            rebuilt.objects.get_mut(&path_id).unwrap().1 = Cow::Owned(replacement);
        }
        let rebuilt_bytes = rebuilt.write_vec().unwrap();
        let rebuilt_file = test_support::parse(&rebuilt_bytes);
        let mut rebuilt_reader = Cursor::new(rebuilt_bytes.as_slice());

        let kept_go: GameObject = rebuilt_file
            .get_object::<GameObject>(3, &tpk)
            .unwrap()
            .read(&mut rebuilt_reader)
            .unwrap();
        assert!(!kept_go.m_IsActive);
    }

    #[test]
    fn unresolved_path_is_a_path_not_found_error() {
        let (file, bytes) = single_object_scene();
        let tpk = test_support::tpk();
        let mut reader = Cursor::new(bytes.as_slice());

        let err = prune_scene(
            &file,
            &mut reader,
            &tpk,
            "TestScene",
            ["Container/Nonexistent"],
            &[],
            false,
        )
        .unwrap_err();

        match err.downcast_ref::<RepackError>() {
            Some(RepackError::PathNotFound { scene, path, segment }) => {
                assert_eq!(scene, "TestScene");
                assert_eq!(path, "Container/Nonexistent");
                assert_eq!(segment, "Nonexistent");
            }
            other => panic!("expected RepackError::PathNotFound, got {other:?}"),
        }
    }
}
