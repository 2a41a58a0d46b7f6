//! 房间访问与消息生命周期

use application::{
    services::{PostMessageRequest, Upload},
    ApplicationError, SessionContext,
};
use domain::{MessageId, MessageKind, Role};
use tests::TestEnvironment;

fn text(room: &str, body: &str) -> PostMessageRequest {
    PostMessageRequest {
        room: room.into(),
        body: Some(body.into()),
        ..PostMessageRequest::default()
    }
}

async fn post(env: &TestEnvironment, ctx: &SessionContext, room: &str, body: &str) -> i64 {
    env.state
        .messages
        .post(ctx, text(room, body))
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn room_allow_list_decides_who_may_post() {
    let env = TestEnvironment::new().await.unwrap();
    let student = env.member("amy", Role::Student).await.unwrap();

    let err = env
        .state
        .messages
        .post(&student, text("parents_teachers", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::AccessDenied));

    let view = env
        .state
        .messages
        .post(&student, text("teachers_students", "  hi teacher  "))
        .await
        .unwrap();
    assert_eq!(view.body.as_deref(), Some("hi teacher"));
    assert_eq!(view.author, "amy");

    let rooms: Vec<_> = env
        .state
        .rooms
        .list_accessible(student.role())
        .await
        .unwrap()
        .into_iter()
        .map(|room| room.name.as_str().to_owned())
        .collect();
    assert_eq!(rooms, vec!["general", "teachers_students"]);

    let err = env
        .state
        .messages
        .post(&student, text("no_such_room", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::RoomNotFound));
}

#[tokio::test]
async fn inactive_room_is_closed_even_to_admins() {
    let env = TestEnvironment::new().await.unwrap();
    let admin = env.admin().await.unwrap();

    let mut general = env.state.rooms.get("general").await.unwrap();
    general.is_active = false;
    env.storage.room_repository.replace(general).await;

    let err = env
        .state
        .messages
        .post(&admin, text("general", "anyone?"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::AccessDenied));
    let err = env
        .state
        .messages
        .list(&admin, "general", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::AccessDenied));
    assert!(env
        .state
        .rooms
        .list_accessible(Role::Admin)
        .await
        .unwrap()
        .iter()
        .all(|room| room.name.as_str() != "general"));
}

#[tokio::test]
async fn image_messages_cannot_be_edited_by_anyone() {
    let env = TestEnvironment::new().await.unwrap();
    let teacher = env.member("mr_lee", Role::Teacher).await.unwrap();
    let admin = env.admin().await.unwrap();

    let image = env
        .state
        .messages
        .post(
            &teacher,
            PostMessageRequest {
                room: "general".into(),
                upload: Some(Upload {
                    filename: "field trip.png".into(),
                    bytes: vec![0x89, b'P', b'N', b'G'],
                }),
                ..PostMessageRequest::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(image.kind, MessageKind::Image);

    for ctx in [&teacher, &admin] {
        let err = env
            .state
            .messages
            .edit(ctx, MessageId::from(image.id), "caption".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotEditableKind));
    }

    let id = post(&env, &teacher, "general", "draft").await;
    let edited = env
        .state
        .messages
        .edit(&teacher, MessageId::from(id), "final".into())
        .await
        .unwrap();
    assert!(edited.is_edited);
    assert_eq!(edited.body.as_deref(), Some("final"));
}

#[tokio::test]
async fn delete_removes_row_and_attachment() {
    let env = TestEnvironment::new().await.unwrap();
    let teacher = env.member("ms_kim", Role::Teacher).await.unwrap();

    let view = env
        .state
        .messages
        .post(
            &teacher,
            PostMessageRequest {
                room: "teachers_students".into(),
                body: Some("homework".into()),
                upload: Some(Upload {
                    filename: "sheet.pdf".into(),
                    bytes: b"%PDF-1.4".to_vec(),
                }),
                ..PostMessageRequest::default()
            },
        )
        .await
        .unwrap();
    let attachment = view.attachment.clone().unwrap();
    let stored = env
        .upload_dir()
        .join(attachment.trim_start_matches("uploads/"));
    assert!(stored.exists());
    assert_eq!(view.kind, MessageKind::Document);

    env.state
        .messages
        .delete(&teacher, MessageId::from(view.id))
        .await
        .unwrap();
    assert!(!stored.exists());
    let err = env
        .state
        .messages
        .delete(&teacher, MessageId::from(view.id))
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::MessageNotFound));
}

#[tokio::test]
async fn delete_succeeds_when_file_is_already_gone() {
    let env = TestEnvironment::new().await.unwrap();
    let teacher = env.member("mr_cho", Role::Teacher).await.unwrap();
    let view = env
        .state
        .messages
        .post(
            &teacher,
            PostMessageRequest {
                room: "general".into(),
                upload: Some(Upload {
                    filename: "note.txt".into(),
                    bytes: b"remember".to_vec(),
                }),
                ..PostMessageRequest::default()
            },
        )
        .await
        .unwrap();
    let attachment = view.attachment.clone().unwrap();
    std::fs::remove_file(
        env.upload_dir()
            .join(attachment.trim_start_matches("uploads/")),
    )
    .unwrap();

    env.state
        .messages
        .delete(&teacher, MessageId::from(view.id))
        .await
        .unwrap();
    let page = env
        .state
        .messages
        .list(&teacher, "general", None, None)
        .await
        .unwrap();
    assert!(page.is_empty());
}

#[tokio::test]
async fn only_author_or_admin_may_delete() {
    let env = TestEnvironment::new().await.unwrap();
    let student = env.member("bo", Role::Student).await.unwrap();
    let teacher = env.member("ms_park", Role::Teacher).await.unwrap();
    let admin = env.admin().await.unwrap();

    let question = post(&env, &student, "general", "oops").await;
    let err = env
        .state
        .messages
        .delete(&teacher, MessageId::from(question))
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::NotAuthorized));
    env.state
        .messages
        .delete(&student, MessageId::from(question))
        .await
        .unwrap();

    let notice = post(&env, &teacher, "general", "quiz tomorrow").await;
    env.state
        .messages
        .delete(&admin, MessageId::from(notice))
        .await
        .unwrap();
}

#[tokio::test]
async fn replies_resolve_within_the_same_room_only() {
    let env = TestEnvironment::new().await.unwrap();
    let teacher = env.member("mr_han", Role::Teacher).await.unwrap();
    let parent = env.member("mrs_yoon", Role::Parent).await.unwrap();

    let question = post(&env, &parent, "parents_teachers", "When is the field trip?").await;
    let elsewhere = post(&env, &teacher, "general", "general news").await;

    let reply = env
        .state
        .messages
        .post(
            &teacher,
            PostMessageRequest {
                reply_to: Some(MessageId::from(question)),
                ..text("parents_teachers", "Next Friday")
            },
        )
        .await
        .unwrap();
    assert_eq!(reply.reply_to, Some(question));
    assert_eq!(reply.reply_author.as_deref(), Some("mrs_yoon"));
    assert_eq!(reply.reply_preview.as_deref(), Some("When is the field trip?"));

    for missing in [elsewhere, 9_999] {
        let view = env
            .state
            .messages
            .post(
                &teacher,
                PostMessageRequest {
                    reply_to: Some(MessageId::from(missing)),
                    ..text("parents_teachers", "dangling")
                },
            )
            .await
            .unwrap();
        assert_eq!(view.reply_to, None);
        assert_eq!(view.reply_preview, None);
    }
}

#[tokio::test]
async fn pages_are_oldest_to_newest_and_search_is_newest_first() {
    let env = TestEnvironment::new().await.unwrap();
    let student = env.member("cy", Role::Student).await.unwrap();

    for body in ["hello world", "one", "two", "Hello again", "say hello"] {
        post(&env, &student, "general", body).await;
    }

    let page = env
        .state
        .messages
        .list(&student, "general", Some(2), None)
        .await
        .unwrap();
    let bodies: Vec<_> = page.iter().filter_map(|m| m.body.as_deref()).collect();
    assert_eq!(bodies, vec!["Hello again", "say hello"]);

    let older = env
        .state
        .messages
        .list(&student, "general", Some(2), Some(2))
        .await
        .unwrap();
    let bodies: Vec<_> = older.iter().filter_map(|m| m.body.as_deref()).collect();
    assert_eq!(bodies, vec!["one", "two"]);

    let hits = env
        .state
        .messages
        .search(&student, "general", "hello")
        .await
        .unwrap();
    let bodies: Vec<_> = hits.iter().filter_map(|m| m.body.as_deref()).collect();
    assert_eq!(bodies, vec!["say hello", "hello world"]);
}
