pub mod types;

pub use types::{
    AssetBundle, AssetInfo, BuildSettings, Component, ComponentPair, GameObject, RectTransform,
    SpriteAtlas, Transform,
};
