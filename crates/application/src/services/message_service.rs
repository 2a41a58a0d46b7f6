use std::{collections::HashMap, sync::Arc};

use domain::{
    policy, AttachmentRef, DomainError, Message, MessageDraft, MessageId, MessageKind,
    ReplyPreview, Room, RoomName,
};

use crate::{
    attachments::AttachmentHandler,
    clock::Clock,
    dto::MessageView,
    error::ApplicationError,
    repository::{MessageRepository, RoomRepository},
    session::SessionContext,
};

/// 未指定时的分页大小，同时也是单页上限
pub const DEFAULT_PAGE_LIMIT: u32 = 850;

/// 随消息上传的文件
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct PostMessageRequest {
    pub room: String,
    pub kind: Option<MessageKind>,
    pub body: Option<String>,
    pub upload: Option<Upload>,
    pub reply_to: Option<MessageId>,
}

pub struct MessageServiceDependencies {
    pub room_repository: Arc<dyn RoomRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub attachments: Arc<AttachmentHandler>,
    pub clock: Arc<dyn Clock>,
}

pub struct MessageService {
    deps: MessageServiceDependencies,
}

impl MessageService {
    pub fn new(deps: MessageServiceDependencies) -> Self {
        Self { deps }
    }

    async fn load_room(&self, name: &str) -> Result<Room, ApplicationError> {
        let name = RoomName::parse(name).map_err(|_| ApplicationError::RoomNotFound)?;
        self.deps
            .room_repository
            .find_by_name(&name)
            .await?
            .ok_or(ApplicationError::RoomNotFound)
    }

    /// 进入房间：存在性检查在前，访问策略在后
    async fn enter_room(&self, ctx: &SessionContext, name: &str) -> Result<Room, ApplicationError> {
        let room = self.load_room(name).await?;
        policy::authorize_enter(ctx.role(), &room)?;
        Ok(room)
    }

    async fn load_message(&self, id: MessageId) -> Result<Message, ApplicationError> {
        self.deps
            .message_repository
            .find_by_id(id)
            .await?
            .ok_or(ApplicationError::MessageNotFound)
    }

    /// 发送消息。
    ///
    /// 校验顺序：房间存在、访问权限、内容非空、回复解析、附件。
    /// 回复目标不存在或不在同一房间时静默丢弃回复关系。
    /// 文件落盘之后只剩写库一步，写库失败时删除文件。
    pub async fn post(
        &self,
        ctx: &SessionContext,
        request: PostMessageRequest,
    ) -> Result<MessageView, ApplicationError> {
        let room = self.enter_room(ctx, &request.room).await?;

        let body = request
            .body
            .map(|body| body.trim().to_owned())
            .filter(|body| !body.is_empty());
        if body.is_none() && request.upload.is_none() {
            return Err(ApplicationError::EmptyContent);
        }

        let reply = match request.reply_to {
            Some(parent_id) => self.resolve_reply(&room, parent_id).await?,
            None => None,
        };

        // 带文件时类型取客户端声明的媒体类型，否则按扩展名推断；不带文件一律是文本
        let (attachment, kind) = match request.upload {
            Some(upload) => {
                let kind = request
                    .kind
                    .filter(|kind| kind.is_media())
                    .unwrap_or_else(|| AttachmentHandler::kind_for(&upload.filename));
                let reference = self
                    .deps
                    .attachments
                    .store(ctx.user_id(), upload.bytes, &upload.filename)
                    .await?;
                (Some(reference), kind)
            }
            None => (None, MessageKind::Text),
        };

        let draft = MessageDraft {
            room: room.name.clone(),
            author: ctx.username().clone(),
            body,
            kind,
            attachment: attachment.clone(),
            reply_to: reply.as_ref().map(|preview| preview.message_id),
            created_at: self.deps.clock.now(),
        };

        let message = match self.deps.message_repository.insert(draft).await {
            Ok(message) => message,
            Err(err) => {
                if let Some(reference) = &attachment {
                    self.deps.attachments.remove(reference).await;
                }
                return Err(err.into());
            }
        };

        tracing::debug!(message_id = %message.id, room = %room.name, author = %message.author, kind = %message.kind, "message posted");
        Ok(MessageView::new(&message, reply.as_ref()))
    }

    /// 读取附件内容。只有能进入附件所在房间的用户才能下载；
    /// 没有消息引用的文件一律视为不存在。
    pub async fn open_attachment(
        &self,
        ctx: &SessionContext,
        stored_name: &str,
    ) -> Result<Vec<u8>, ApplicationError> {
        let reference = AttachmentRef::for_stored_name(stored_name)
            .map_err(|_| ApplicationError::AttachmentNotFound)?;
        let message = self
            .deps
            .message_repository
            .find_by_attachment(&reference)
            .await?
            .ok_or(ApplicationError::AttachmentNotFound)?;
        self.enter_room(ctx, message.room.as_str()).await?;

        self.deps
            .attachments
            .open(&reference)
            .await?
            .ok_or(ApplicationError::AttachmentNotFound)
    }

    async fn resolve_reply(
        &self,
        room: &Room,
        parent_id: MessageId,
    ) -> Result<Option<ReplyPreview>, ApplicationError> {
        match self.deps.message_repository.find_by_id(parent_id).await? {
            Some(parent) if parent.room == room.name => Ok(Some(parent.preview())),
            _ => {
                tracing::debug!(reply_to = %parent_id, room = %room.name, "reply target unresolved, dropping link");
                Ok(None)
            }
        }
    }

    pub async fn edit(
        &self,
        ctx: &SessionContext,
        id: MessageId,
        new_body: String,
    ) -> Result<MessageView, ApplicationError> {
        let mut message = self.load_message(id).await?;
        let room = self.load_room(message.room.as_str()).await?;
        policy::authorize_edit(&ctx.actor, &message, &room)?;

        let body = new_body.trim().to_owned();
        if body.is_empty() {
            return Err(ApplicationError::EmptyContent);
        }
        message.edit(body, self.deps.clock.now()).map_err(|err| match err {
            DomainError::NotEditableKind => ApplicationError::NotEditableKind,
            other => ApplicationError::Domain(other),
        })?;

        let message = self.deps.message_repository.update(message).await?;
        let previews = self.previews_for(std::slice::from_ref(&message)).await?;
        Ok(view_with_previews(&message, &previews))
    }

    /// 删除消息行；附件删除是尽力而为，失败不影响结果。
    pub async fn delete(&self, ctx: &SessionContext, id: MessageId) -> Result<(), ApplicationError> {
        let message = self.load_message(id).await?;
        let room = self.load_room(message.room.as_str()).await?;
        policy::authorize_delete(&ctx.actor, &message, &room)?;

        self.deps.message_repository.delete(message.id).await?;
        if let Some(reference) = &message.attachment {
            self.deps.attachments.remove(reference).await;
        }
        tracing::debug!(message_id = %message.id, by = %ctx.username(), "message deleted");
        Ok(())
    }

    /// 分页读取：按最新优先取一页，再翻转为时间正序返回。
    pub async fn list(
        &self,
        ctx: &SessionContext,
        room: &str,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<MessageView>, ApplicationError> {
        let room = self.enter_room(ctx, room).await?;
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(DEFAULT_PAGE_LIMIT);
        let offset = offset.unwrap_or(0);

        let mut page = self
            .deps
            .message_repository
            .list_page(&room.name, limit, offset)
            .await?;
        page.reverse();

        let previews = self.previews_for(&page).await?;
        Ok(page
            .iter()
            .map(|message| view_with_previews(message, &previews))
            .collect())
    }

    /// 子串搜索，最新的在前
    pub async fn search(
        &self,
        ctx: &SessionContext,
        room: &str,
        query: &str,
    ) -> Result<Vec<MessageView>, ApplicationError> {
        if query.trim().is_empty() {
            return Err(DomainError::invalid_argument("q", "search query is required").into());
        }
        let room = self.enter_room(ctx, room).await?;
        let hits = self
            .deps
            .message_repository
            .search(&room.name, query)
            .await?;

        let previews = self.previews_for(&hits).await?;
        Ok(hits
            .iter()
            .map(|message| view_with_previews(message, &previews))
            .collect())
    }

    /// 读取时按 id 解析回复预览；被删除的父消息没有预览。
    async fn previews_for(
        &self,
        messages: &[Message],
    ) -> Result<HashMap<MessageId, ReplyPreview>, ApplicationError> {
        let mut ids: Vec<MessageId> = messages.iter().filter_map(|m| m.reply_to).collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        ids.sort_unstable();
        ids.dedup();

        let parents = self.deps.message_repository.find_by_ids(ids).await?;
        Ok(parents
            .iter()
            .map(|parent| (parent.id, parent.preview()))
            .collect())
    }
}

fn view_with_previews(message: &Message, previews: &HashMap<MessageId, ReplyPreview>) -> MessageView {
    let reply = message.reply_to.and_then(|id| previews.get(&id));
    MessageView::new(message, reply)
}
