//! 附件处理：扩展名白名单、大小上限、文件名清洗与落盘命名。

use std::sync::Arc;

use async_trait::async_trait;
use domain::{AttachmentRef, MessageKind, UserId};

use crate::{clock::Clock, error::AttachmentError};

/// 源文件大小上限 16 MiB
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 16 * 1024 * 1024;

pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "mp4", "mov", "avi", "wav", "mp3", "ogg", "blob", "pdf", "txt",
    "doc", "docx",
];

/// 附件字节的存储后端，按存储文件名寻址。
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AttachmentStorage: Send + Sync {
    async fn put(&self, stored_name: &str, payload: Vec<u8>) -> Result<(), AttachmentError>;
    async fn get(&self, stored_name: &str) -> Result<Option<Vec<u8>>, AttachmentError>;
    /// 文件不存在时视为成功
    async fn delete(&self, stored_name: &str) -> Result<(), AttachmentError>;
}

pub struct AttachmentHandler {
    storage: Arc<dyn AttachmentStorage>,
    clock: Arc<dyn Clock>,
    max_bytes: u64,
}

impl AttachmentHandler {
    pub fn new(storage: Arc<dyn AttachmentStorage>, clock: Arc<dyn Clock>, max_bytes: u64) -> Self {
        Self {
            storage,
            clock,
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// 校验并写入附件，返回相对存储路径。
    pub async fn store(
        &self,
        owner: UserId,
        payload: Vec<u8>,
        declared_filename: &str,
    ) -> Result<AttachmentRef, AttachmentError> {
        let filename = sanitize_filename(declared_filename);
        let extension = extension_of(&filename);
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(AttachmentError::ExtensionNotAllowed { extension });
        }
        if payload.len() as u64 > self.max_bytes {
            return Err(AttachmentError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let stamp = self.clock.now().unix_timestamp();
        let stored_name = format!("{owner}_{stamp}_{filename}");
        let reference = AttachmentRef::for_stored_name(&stored_name)
            .map_err(|err| AttachmentError::io(err.to_string()))?;

        self.storage.put(&stored_name, payload).await?;
        tracing::debug!(attachment = %reference, %owner, "stored attachment");
        Ok(reference)
    }

    pub async fn open(&self, reference: &AttachmentRef) -> Result<Option<Vec<u8>>, AttachmentError> {
        self.storage.get(reference.stored_name()).await
    }

    /// 尽力删除，失败只记录日志
    pub async fn remove(&self, reference: &AttachmentRef) {
        if let Err(err) = self.storage.delete(reference.stored_name()).await {
            tracing::warn!(attachment = %reference, error = %err, "failed to remove attachment");
        }
    }

    /// 客户端未声明类型时按扩展名推断
    pub fn kind_for(filename: &str) -> MessageKind {
        MessageKind::from_filename(filename)
    }
}

/// 去掉路径成分，只保留 ASCII 字母数字与 `.` `_` `-`，空白转为下划线。
pub fn sanitize_filename(raw: &str) -> String {
    let flattened = raw.replace(['/', '\\'], " ");
    let mut cleaned = String::with_capacity(flattened.len());
    for word in flattened.split_whitespace() {
        let word: String = word
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            .collect();
        if word.is_empty() {
            continue;
        }
        if !cleaned.is_empty() {
            cleaned.push('_');
        }
        cleaned.push_str(&word);
    }
    cleaned.trim_matches(|c| c == '.' || c == '_').to_owned()
}

fn extension_of(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}
