//! Assembles the pruned scenes into a single UnityFS bundle.
//!
//! The original tool ships a pre-built `empty_scene_bundle.unity3d` template
//! and patches its lone `AssetBundle` object; there is no real Unity export
//! available to embed here, and the teacher crate already shows the cheaper
//! route (`examples/create_empty_assetbundle.rs`): build the sharedAssets
//! file from scratch with [`SerializedFileBuilder::new`] and add the
//! manifest object directly. The two approaches produce the same bytes where
//! it matters — the template's only required content was the single
//! `AssetBundle` at `path_id = 2`.

use anyhow::Result;
use rabex::UnityVersion;
use rabex::files::bundlefile::{BundleFileBuilder, CompressionType};
use rabex::files::serializedfile::builder::SerializedFileBuilder;
use rabex::typetree::TypeTreeProvider;

use crate::unity::types::{AssetBundle, AssetInfo};

/// The `path_id` the empty-bundle manifest's sole `AssetBundle` object lives
/// at, matching `unity_scene_repacker/repack.py::repack_scene_bundle`.
const ASSET_BUNDLE_PATH_ID: i64 = 2;

/// A single scene's pruned, already-serialized `SerializedFile` bytes, ready
/// to be dropped into the output bundle as `BuildPlayer-{name}`. `name` is
/// already `bundle_{scene_name}` by the time it reaches this module — the
/// `bundle_` prefix is applied once, by the driver, per
/// `unity_scene_repacker/cli.py::main`'s `prefix = "bundle"` /
/// `f"{prefix}_{name}"`.
pub struct PrunedScene {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Builds the `AssetBundle` (class 142) manifest object shared by every
/// scene in the output bundle: one `m_Container` entry per scene, at
/// `Assets/SceneBundle/{name}.unity` (`name` already carrying its
/// `bundle_` prefix), with no preloads or main asset.
fn build_manifest(scenes: &[PrunedScene]) -> AssetBundle {
    let mut manifest = AssetBundle::scene_base("scenebundle");
    manifest.m_AssetBundleName = String::new();
    manifest.m_ExplicitDataLayout = 0;
    manifest.m_PathFlags = 7;

    for scene in scenes {
        manifest.m_Container.insert(
            format!("Assets/SceneBundle/{}.unity", scene.name),
            AssetInfo::default(),
        );
    }

    manifest
}

/// Builds and serializes the output bundle: for each scene, a
/// `BuildPlayer-{name}.sharedAssets` carrying the manifest (only the first
/// scene's copy actually holds the `AssetBundle` object; later scenes get an
/// equivalent empty sharedAssets, matching the shallow-clone-and-drop
/// behavior of the Python original) followed by `BuildPlayer-{name}`.
pub fn repack_scene_bundle<P: TypeTreeProvider, Com>(
    unity_version: &UnityVersion,
    tpk: &P,
    com: &Com,
    scenes: &[PrunedScene],
    compression: CompressionType,
) -> Result<Vec<u8>> {
    let manifest = build_manifest(scenes);

    let mut manifest_shared = SerializedFileBuilder::new(unity_version, tpk, com, false);
    manifest_shared.add_object_at(ASSET_BUNDLE_PATH_ID, &manifest)?;
    let manifest_shared_bytes = manifest_shared.write_vec()?;

    let empty_shared_bytes = SerializedFileBuilder::new(unity_version, tpk, com, false).write_vec()?;

    let mut bundle = BundleFileBuilder::unityfs(8, unity_version);
    for (index, scene) in scenes.iter().enumerate() {
        let shared_bytes = if index == 0 {
            &manifest_shared_bytes
        } else {
            &empty_shared_bytes
        };

        bundle.add_file(
            &format!("BuildPlayer-{}.sharedAssets", scene.name),
            shared_bytes.as_slice(),
        )?;
        bundle.add_file(&format!("BuildPlayer-{}", scene.name), scene.bytes.as_slice())?;
    }

    let mut out = Vec::new();
    bundle.write(&mut out, compression)?;
    Ok(out)
}
