//! Breadth-first closure over the object graph, restricted to the small set
//! of edges that actually matter for a scene subtree: component ownership
//! and the transform hierarchy. Unlike a generic "every PPtr field" walker,
//! this deliberately does not chase MonoBehaviour, renderer or material
//! references — those are assumed to resolve through the game's existing
//! asset bundles at load time, and chasing them would pull in most of the
//! scene.

use std::collections::{BTreeSet, VecDeque};
use std::io::{Read, Seek};

use anyhow::Result;
use rabex::files::SerializedFile;
use rabex::objects::pptr::PathId;
use rabex::objects::{ClassId, PPtr};
use rabex::typetree::TypeTreeProvider;

use crate::unity::types::{GameObject, RectTransform, SpriteAtlas, Transform};

/// Walks the class-specific visible edges from `seeds`, returning every
/// reachable local `path_id`. PPtrs with `file_id != 0` (external) or
/// `path_id == 0` (null) are not followed.
pub fn reachable<P: TypeTreeProvider>(
    file: &SerializedFile,
    reader: &mut (impl Read + Seek),
    tpk: &P,
    seeds: impl IntoIterator<Item = PathId>,
) -> Result<BTreeSet<PathId>> {
    let mut surviving = BTreeSet::new();
    let mut queue: VecDeque<PathId> = seeds.into_iter().collect();

    while let Some(node) = queue.pop_front() {
        if !surviving.insert(node) {
            continue;
        }

        for edge in visible_edges(file, reader, tpk, node)? {
            if !edge.is_local() || edge.m_PathID == 0 {
                continue;
            }
            if !surviving.contains(&edge.m_PathID) {
                queue.push_back(edge.m_PathID);
            }
        }
    }

    Ok(surviving)
}

/// Outgoing edges of a single object, dispatched on its class id. Every
/// other class is treated as an opaque leaf.
fn visible_edges<P: TypeTreeProvider>(
    file: &SerializedFile,
    reader: &mut (impl Read + Seek),
    tpk: &P,
    node: PathId,
) -> Result<Vec<PPtr>> {
    let info = file
        .get_object_info(node)
        .ok_or_else(|| anyhow::anyhow!("no object with path_id {node} in scene"))?;

    let edges = match info.m_ClassID {
        ClassId::GameObject => {
            let go: GameObject = file.get_object::<GameObject>(node, tpk)?.read(reader)?;
            go.m_Component.into_iter().map(|c| c.component).collect()
        }
        ClassId::Transform => {
            let transform: Transform = file.get_object::<Transform>(node, tpk)?.read(reader)?;
            let mut edges = vec![transform.m_GameObject.untyped()];
            edges.extend(transform.m_Children.into_iter().map(|c| c.untyped()));
            edges
        }
        ClassId::RectTransform => {
            let rect: RectTransform = file
                .get_object::<RectTransform>(node, tpk)?
                .read(reader)?;
            let mut edges = vec![rect.m_GameObject.untyped()];
            edges.extend(rect.m_Children.into_iter().map(|c| c.untyped()));
            edges
        }
        ClassId::SpriteAtlas => {
            let atlas: SpriteAtlas = file.get_object::<SpriteAtlas>(node, tpk)?.read(reader)?;
            atlas.m_PackedSprites
        }
        ClassId::Canvas => Vec::new(),
        _ => Vec::new(),
    };

    Ok(edges)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rabex::files::serializedfile::build_common_offset_map;
    use rabex::files::serializedfile::builder::SerializedFileBuilder;
    use rabex::objects::pptr::PPtr;

    use super::*;
    use crate::test_support;
    use crate::unity::types::ComponentPair;

    /// A root transform whose `GameObject` carries a `SpriteAtlas` component,
    /// whose single packed sprite is a separate leaf object. A second,
    /// disconnected root proves the walk doesn't just collect everything in
    /// the file.
    fn sprite_atlas_scene() -> (SerializedFile, Vec<u8>) {
        let version = test_support::unity_version();
        let tpk = test_support::tpk();
        let com = build_common_offset_map(&tpk.inner, &version);
        let mut file = SerializedFileBuilder::new(&version, &tpk, &com, false);

        file.add_object_at(1, &Transform {
            m_GameObject: PPtr::local(2).typed(),
            ..Default::default()
        }).unwrap();
        file.add_object_at(2, &GameObject {
            m_Component: vec![ComponentPair {
                component: PPtr::local(3),
            }],
            m_Layer: 0,
            m_Name: "Root".to_owned(),
            m_Tag: 0,
            m_IsActive: true,
        }).unwrap();
        file.add_object_at(3, &SpriteAtlas {
            m_Name: "Atlas".to_owned(),
            m_PackedSprites: vec![PPtr::local(4)],
        }).unwrap();
        file.add_object_at(4, &GameObject {
            m_Component: Vec::new(),
            m_Layer: 0,
            m_Name: "SpriteLeaf".to_owned(),
            m_Tag: 0,
            m_IsActive: true,
        }).unwrap();

        file.add_object_at(6, &Transform {
            m_GameObject: PPtr::local(5).typed(),
            ..Default::default()
        }).unwrap();
        file.add_object_at(5, &GameObject {
            m_Component: Vec::new(),
            m_Layer: 0,
            m_Name: "Other".to_owned(),
            m_Tag: 0,
            m_IsActive: true,
        }).unwrap();

        let bytes = file.write_vec().unwrap();
        let parsed = test_support::parse(&bytes);
        (parsed, bytes)
    }

    #[test]
    fn sprite_atlas_packed_sprites_are_reachable() {
        let (file, bytes) = sprite_atlas_scene();
        let tpk = test_support::tpk();
        let mut reader = Cursor::new(bytes.as_slice());

        let surviving = reachable(&file, &mut reader, &tpk, [1]).unwrap();

        assert_eq!(
            surviving,
            BTreeSet::from([1, 2, 3, 4]),
            "expected the root transform, its GameObject, the SpriteAtlas component and its packed sprite"
        );
    }
}
