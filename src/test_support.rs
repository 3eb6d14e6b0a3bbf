//! Synthetic `SerializedFile` fixtures shared by the unit tests in
//! `scene_lookup.rs`, `reachable.rs` and `prune.rs`.
//!
//! Built through [`SerializedFileBuilder`], the same route the teacher's
//! `examples/create_empty_assetbundle.rs` uses to produce a bundle from
//! scratch, so tests exercise the real typetree codec instead of hand-rolled
//! bytes.

#![cfg(test)]

use std::io::Cursor;
use std::str::FromStr;

use rabex::UnityVersion;
use rabex::files::SerializedFile;
use rabex::tpk::TpkTypeTreeBlob;
use rabex::typetree::typetree_cache::sync::TypeTreeCache;

pub fn unity_version() -> UnityVersion {
    UnityVersion::from_str("2021.3.16f1").expect("valid version string")
}

pub fn tpk() -> TypeTreeCache<TpkTypeTreeBlob> {
    TypeTreeCache::embedded()
}

/// Parses bytes a [`SerializedFileBuilder`] wrote back into a `SerializedFile`,
/// mirroring the round-trip `env.rs` performs when opening a level file.
///
/// [`SerializedFileBuilder`]: rabex::files::serializedfile::builder::SerializedFileBuilder
pub fn parse(bytes: &[u8]) -> SerializedFile {
    SerializedFile::from_reader(&mut Cursor::new(bytes)).expect("fixture parses back")
}
