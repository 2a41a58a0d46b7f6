use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{AttachmentRef, MessageId, RoomName, Timestamp, Username};

/// 回复预览中文本截断长度（按字符计）
pub const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Video,
    Audio,
    Document,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Video => "video",
            MessageKind::Audio => "audio",
            MessageKind::Document => "document",
        }
    }

    /// 预览中使用的展示名
    pub fn label(self) -> &'static str {
        match self {
            MessageKind::Text => "Text",
            MessageKind::Image => "Image",
            MessageKind::Video => "Video",
            MessageKind::Audio => "Audio",
            MessageKind::Document => "Document",
        }
    }

    pub fn is_media(self) -> bool {
        self != MessageKind::Text
    }

    /// 根据文件扩展名推断消息类型；未知扩展名按文档处理。
    pub fn from_filename(filename: &str) -> MessageKind {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "png" | "jpg" | "jpeg" | "gif" => MessageKind::Image,
            "mp4" | "mov" | "avi" => MessageKind::Video,
            "wav" | "mp3" | "ogg" | "blob" => MessageKind::Audio,
            _ => MessageKind::Document,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(MessageKind::Text),
            "image" => Ok(MessageKind::Image),
            "video" => Ok(MessageKind::Video),
            "audio" => Ok(MessageKind::Audio),
            "document" | "file" => Ok(MessageKind::Document),
            other => Err(DomainError::UnknownMessageKind(other.to_owned())),
        }
    }
}

/// 写入前的消息。`id` 由存储层分配。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub room: RoomName,
    pub author: Username,
    pub body: Option<String>,
    pub kind: MessageKind,
    pub attachment: Option<AttachmentRef>,
    pub reply_to: Option<MessageId>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub room: RoomName,
    pub author: Username,
    pub body: Option<String>,
    pub kind: MessageKind,
    pub attachment: Option<AttachmentRef>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: Timestamp,
    #[serde(with = "time::serde::rfc3339::option")]
    pub edited_at: Option<Timestamp>,
    pub reply_to: Option<MessageId>,
}

impl Message {
    pub fn from_draft(id: MessageId, draft: MessageDraft) -> Self {
        Self {
            id,
            room: draft.room,
            author: draft.author,
            body: draft.body,
            kind: draft.kind,
            attachment: draft.attachment,
            created_at: draft.created_at,
            edited_at: None,
            reply_to: draft.reply_to,
        }
    }

    pub fn is_edited(&self) -> bool {
        self.edited_at.is_some()
    }

    /// 替换正文。只有文本消息允许编辑。
    pub fn edit(&mut self, body: String, now: Timestamp) -> Result<(), DomainError> {
        if self.kind != MessageKind::Text {
            return Err(DomainError::NotEditableKind);
        }
        if body.trim().is_empty() {
            return Err(DomainError::invalid_argument("message", "cannot be empty"));
        }
        self.body = Some(body);
        self.edited_at = Some(now);
        Ok(())
    }

    pub fn preview(&self) -> ReplyPreview {
        ReplyPreview::of(self)
    }
}

/// 被回复消息的摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyPreview {
    pub message_id: MessageId,
    pub author: Username,
    pub snippet: String,
}

impl ReplyPreview {
    pub fn of(parent: &Message) -> Self {
        let snippet = if parent.kind.is_media() {
            format!("[{} message]", parent.kind.label())
        } else {
            truncate_snippet(parent.body.as_deref().unwrap_or_default())
        };
        Self {
            message_id: parent.id,
            author: parent.author.clone(),
            snippet,
        }
    }
}

fn truncate_snippet(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
