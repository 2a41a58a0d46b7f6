use std::path::{Path, PathBuf};

use application::{AttachmentError, AttachmentStorage};
use async_trait::async_trait;
use tokio::fs;

/// 以目录为根的附件存储，文件平铺在根目录下。
#[derive(Debug, Clone)]
pub struct DiskAttachmentStorage {
    root: PathBuf,
}

impl DiskAttachmentStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 只接受单一路径成分，拒绝任何逃逸出根目录的名称
    fn path_for(&self, stored_name: &str) -> Result<PathBuf, AttachmentError> {
        let valid = !stored_name.is_empty()
            && !stored_name.starts_with('.')
            && !stored_name.contains(['/', '\\', '\0']);
        if !valid {
            return Err(AttachmentError::io(format!(
                "refusing attachment path '{stored_name}'"
            )));
        }
        Ok(self.root.join(stored_name))
    }
}

#[async_trait]
impl AttachmentStorage for DiskAttachmentStorage {
    async fn put(&self, stored_name: &str, payload: Vec<u8>) -> Result<(), AttachmentError> {
        let path = self.path_for(stored_name)?;
        fs::create_dir_all(&self.root)
            .await
            .map_err(|err| AttachmentError::io(format!("failed to create upload dir: {err}")))?;
        fs::write(&path, payload)
            .await
            .map_err(|err| AttachmentError::io(format!("failed to write {stored_name}: {err}")))
    }

    async fn get(&self, stored_name: &str) -> Result<Option<Vec<u8>>, AttachmentError> {
        let path = self.path_for(stored_name)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AttachmentError::io(format!(
                "failed to read {stored_name}: {err}"
            ))),
        }
    }

    async fn delete(&self, stored_name: &str) -> Result<(), AttachmentError> {
        let path = self.path_for(stored_name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AttachmentError::io(format!(
                "failed to delete {stored_name}: {err}"
            ))),
        }
    }
}
