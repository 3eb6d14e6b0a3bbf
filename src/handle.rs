use std::io::Cursor;
use std::path::Path;

use anyhow::{Context as _, Result};
use rabex::files::serializedfile::ObjectRef;
use rabex::files::{SerializedFile, serializedfile};
use rabex::objects::pptr::PathId;
use rabex::objects::{ClassId, ClassIdType, TypedPPtr};
use rabex::tpk::TpkTypeTreeBlob;
use rabex::typetree::typetree_cache::sync::TypeTreeCache;
use rabex::typetree::{TypeTreeNode, TypeTreeProvider};
use serde::Deserialize;

use crate::Environment;
use crate::game_files::GameFiles;
use crate::resolver::EnvResolver;
use crate::unity::types::Transform;

pub struct SerializedFileHandle<'a, R = GameFiles, P = TypeTreeCache<TpkTypeTreeBlob>> {
    pub file: &'a SerializedFile,
    pub data: &'a [u8],
    pub env: &'a Environment<R, P>,
}
pub struct ObjectRefHandle<'a, T, R = GameFiles, P = TypeTreeCache<TpkTypeTreeBlob>> {
    pub object: ObjectRef<'a, T>,
    pub file: SerializedFileHandle<'a, R, P>,
}

impl<'a, T, R, P> std::fmt::Debug for ObjectRefHandle<'a, T, R, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectRefHandle")
            .field("object", &self.object.info)
            .finish()
    }
}
impl<'a, R, P> SerializedFileHandle<'a, R, P> {
    pub fn reborrow(&self) -> SerializedFileHandle<'a, R, P> {
        SerializedFileHandle {
            file: self.file,
            data: self.data,
            env: self.env,
        }
    }

    pub fn new(env: &'a Environment<R, P>, file: &'a SerializedFile, data: &'a [u8]) -> Self {
        SerializedFileHandle { file, data, env }
    }

    pub fn reader(&self) -> Cursor<&'a [u8]> {
        Cursor::new(self.data)
    }
}

impl<'a, R: EnvResolver, P: TypeTreeProvider> SerializedFileHandle<'a, R, P> {
    pub fn object_at<T>(&self, path_id: PathId) -> Result<ObjectRefHandle<'a, T, R, P>> {
        let object = self.file.get_object(path_id, &self.env.tpk)?;
        Ok(ObjectRefHandle::new(object, self.reborrow()))
    }

    pub fn find_object_of<T: ClassIdType + for<'de> Deserialize<'de>>(&self) -> Result<Option<T>> {
        let Some(data) = self.file.find_object_of::<T>(&self.env.tpk) else {
            return Ok(None);
        };
        Ok(Some(data.read(&mut self.reader())?))
    }

    pub fn objects<T>(&self) -> impl ExactSizeIterator<Item = ObjectRefHandle<'a, T, R, P>> {
        self.file.objects().map(|o| {
            let tt = self.file.get_typetree_for(o, &self.env.tpk);
            ObjectRefHandle::new(ObjectRef::new(self.file, o, tt), self.reborrow())
        })
    }

    pub fn objects_of<T>(&self) -> impl Iterator<Item = ObjectRefHandle<'a, T, R, P>>
    where
        T: ClassIdType,
    {
        let iter = self.file.objects_of::<T>(&self.env.tpk);
        iter.map(|o| ObjectRefHandle::new(o, self.reborrow()))
    }

    /// Returns `Transform`s and `RectTransform`s
    pub fn transforms(&self) -> impl Iterator<Item = ObjectRefHandle<'a, Transform, R, P>> {
        self.file
            .objects()
            .filter(|obj| {
                obj.m_ClassID == ClassId::Transform || obj.m_ClassID == ClassId::RectTransform
            })
            .map(move |o| {
                let tt = self.file.get_typetree_for(o, &self.env.tpk);
                ObjectRefHandle::new(ObjectRef::new(self.file, o, tt), self.reborrow())
            })
    }

    pub fn deref_optional<T: for<'de> Deserialize<'de>>(
        &self,
        pptr: TypedPPtr<T>,
    ) -> Result<Option<ObjectRefHandle<'a, T, R, P>>> {
        match pptr.optional() {
            Some(pptr) => self.deref(pptr).map(Some),
            None => Ok(None),
        }
    }

    pub fn deref_read_optional<T: for<'de> Deserialize<'de>>(
        &self,
        pptr: TypedPPtr<T>,
    ) -> Result<Option<T>> {
        self.deref_optional(pptr)?.map(|obj| obj.read()).transpose()
    }

    pub fn deref<T: for<'de> Deserialize<'de>>(
        &self,
        pptr: TypedPPtr<T>,
    ) -> Result<ObjectRefHandle<'a, T, R, P>> {
        Ok(match pptr.m_FileID.get_external(self.file) {
            None => {
                let object = pptr.deref_local(self.file, &self.env.tpk)?;
                ObjectRefHandle::new(object, self.reborrow())
            }
            Some(external_path) => {
                let external = self
                    .env
                    .load_external_file(Path::new(&external_path))
                    .with_context(|| format!("failed to load external file '{}'", external_path))?;
                let object = pptr
                    .make_local()
                    .deref_local(external.file, &self.env.tpk)
                    .with_context(|| format!("In external {} {}", pptr.m_FileID, external_path))?;
                ObjectRefHandle::new(object, external)
            }
        })
    }

    pub fn deref_read<T: for<'de> Deserialize<'de>>(&self, pptr: TypedPPtr<T>) -> Result<T> {
        self.deref(pptr)?.read()
    }
}

impl<'a, T, R: EnvResolver, P: TypeTreeProvider> ObjectRefHandle<'a, T, R, P> {
    pub fn new(object: ObjectRef<'a, T>, file: SerializedFileHandle<'a, R, P>) -> Self {
        ObjectRefHandle { object, file }
    }

    pub fn read(&self) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let data = self.object.read(&mut self.file.reader())?;
        Ok(data)
    }

    pub fn typetree(&self) -> Result<&TypeTreeNode, serializedfile::Error> {
        self.object.typetree()
    }
}

impl<'a, T, R, P> ObjectRefHandle<'a, T, R, P> {
    pub fn path_id(&self) -> PathId {
        self.object.info.m_PathID
    }

    pub fn class_id(&self) -> ClassId {
        self.object.info.m_ClassID
    }

    pub fn data(&self) -> &'a [u8] {
        &self.file.data[self.object.info.m_Offset as usize
            ..(self.object.info.m_Offset as usize + self.object.info.m_Size as usize)]
    }

    pub fn object_reader(&self) -> Cursor<&'a [u8]> {
        Cursor::new(self.data())
    }
}

impl<'a, T, R: EnvResolver, P: TypeTreeProvider> ObjectRefHandle<'a, T, R, P> {
    pub fn cast<U>(&'a self) -> ObjectRefHandle<'a, U, R, P> {
        ObjectRefHandle {
            object: self.object.cast(),
            file: self.file.reborrow(),
        }
    }

    pub fn cast_owned<U>(self) -> ObjectRefHandle<'a, U, R, P> {
        ObjectRefHandle {
            object: self.object.cast_owned(),
            file: self.file.reborrow(),
        }
    }
}
