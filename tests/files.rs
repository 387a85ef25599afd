mod common;

use bytes::Bytes;

use sealdrop::error::AppError;
use sealdrop::services::FileService;

#[tokio::test]
async fn upload_then_download_preserves_bytes_and_metadata() {
    let env = common::setup().await;
    let owner = common::register_user(&env.db, "alice", "alice@example.com").await;

    let content = vec![0x5a_u8; 10 * 1024];
    let uploaded = common::upload_sample(&env, &owner, &content).await;

    assert_eq!(uploaded.size, 10240);
    assert_eq!(uploaded.name, "report.pdf");
    assert_eq!(uploaded.mime_type, "application/pdf");
    assert_eq!(uploaded.permission.as_deref(), Some("DOWNLOAD"));

    let (file, data) = FileService::download(&env.db, &env.store, &owner, &uploaded.id)
        .await
        .unwrap();
    assert_eq!(data.as_ref(), content.as_slice());
    assert_eq!(file.original_name, "report.pdf");
}

#[tokio::test]
async fn each_file_gets_its_own_key_and_blob() {
    let env = common::setup().await;
    let owner = common::register_user(&env.db, "alice", "alice@example.com").await;

    let a = common::upload_sample(&env, &owner, b"same bytes").await;
    let b = common::upload_sample(&env, &owner, b"same bytes").await;

    let file_a = FileService::get_file(&env.db, &a.id).await.unwrap();
    let file_b = FileService::get_file(&env.db, &b.id).await.unwrap();

    assert_ne!(file_a.encryption_key, file_b.encryption_key);
    assert_ne!(file_a.name, file_b.name);
}

#[tokio::test]
async fn upload_rejects_invalid_names() {
    let env = common::setup().await;
    let owner = common::register_user(&env.db, "alice", "alice@example.com").await;

    for bad in ["", "../etc/passwd", "a\\b"] {
        let result = FileService::upload(
            &env.db,
            &env.store,
            &owner,
            bad.to_string(),
            None,
            None,
            Bytes::from_static(b"x"),
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))), "name {:?}", bad);
    }
}

#[tokio::test]
async fn stranger_cannot_see_or_fetch_file() {
    let env = common::setup().await;
    let owner = common::register_user(&env.db, "alice", "alice@example.com").await;
    let stranger = common::register_user(&env.db, "mallory", "mallory@example.com").await;

    let uploaded = common::upload_sample(&env, &owner, b"private").await;

    let result = FileService::get_if_authorized(&env.db, &stranger, &uploaded.id).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let result = FileService::download(&env.db, &env.store, &stranger, &uploaded.id).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let listed = FileService::list_visible(&env.db, &stranger).await.unwrap();
    assert!(listed.iter().all(|f| f.id != uploaded.id));
}

#[tokio::test]
async fn admin_sees_every_file() {
    let env = common::setup().await;
    let owner = common::register_user(&env.db, "alice", "alice@example.com").await;

    let uploaded = common::upload_sample(&env, &owner, b"anything").await;

    let listed = FileService::list_visible(&env.db, &env.admin).await.unwrap();
    let entry = listed.iter().find(|f| f.id == uploaded.id).expect("admin sees file");
    assert_eq!(entry.permission.as_deref(), Some("DOWNLOAD"));
}

#[tokio::test]
async fn listing_is_most_recent_first() {
    let env = common::setup().await;
    let owner = common::register_user(&env.db, "alice", "alice@example.com").await;

    let first = common::upload_sample(&env, &owner, b"one").await;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let second = common::upload_sample(&env, &owner, b"two").await;

    let listed = FileService::list_visible(&env.db, &owner).await.unwrap();
    let pos = |id: &str| listed.iter().position(|f| f.id == id).unwrap();
    assert!(pos(&second.id) < pos(&first.id));
}

#[tokio::test]
async fn owner_can_delete_stranger_cannot() {
    let env = common::setup().await;
    let owner = common::register_user(&env.db, "alice", "alice@example.com").await;
    let stranger = common::register_user(&env.db, "mallory", "mallory@example.com").await;

    let uploaded = common::upload_sample(&env, &owner, b"to be removed").await;

    let result = FileService::delete(&env.db, &env.store, &stranger, &uploaded.id).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    FileService::delete(&env.db, &env.store, &owner, &uploaded.id)
        .await
        .unwrap();

    let result = FileService::get_file(&env.db, &uploaded.id).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn client_key_is_stored_opaquely() {
    let env = common::setup().await;
    let owner = common::register_user(&env.db, "alice", "alice@example.com").await;

    let uploaded = FileService::upload(
        &env.db,
        &env.store,
        &owner,
        "notes.txt".to_string(),
        Some("text/plain".to_string()),
        Some("client-side-key-material".to_string()),
        Bytes::from_static(b"hello"),
    )
    .await
    .unwrap();

    let file = FileService::get_file(&env.db, &uploaded.id).await.unwrap();
    assert_eq!(file.client_key.as_deref(), Some("client-side-key-material"));
}
