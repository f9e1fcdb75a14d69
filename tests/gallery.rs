mod common;

use axum::body::Body;
use axum::http::StatusCode;
use common::{body_json, session_cookie, test_pool, TestApp};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use studio_gallery::assets::DiskAssetHost;
use studio_gallery::db;
use studio_gallery::error::AppError;
use studio_gallery::gallery::{GalleryService, Upload};

async fn service() -> (GalleryService, tempfile::TempDir) {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    let host = DiskAssetHost::new(dir.path(), "/assets");
    let service = GalleryService::start(pool, Arc::new(host)).await.unwrap();
    (service, dir)
}

fn upload(name: &str) -> Upload {
    Upload {
        file_name: name.to_string(),
        bytes: name.as_bytes().to_vec(),
    }
}

#[tokio::test]
async fn created_gallery_password_unlocks_it() {
    let (galleries, _dir) = service().await;

    let created = galleries.create_gallery("Jane Doe", "jane@example.com").await.unwrap();
    assert_eq!(created.password.chars().count(), 10);

    let gallery = galleries
        .client_login("jane@example.com", &created.password)
        .await
        .unwrap()
        .expect("password should unlock the gallery");
    assert_eq!(gallery.client_name, "Jane Doe");
    assert!(gallery.images.is_empty());
    assert_ne!(gallery.password, created.password);

    let wrong = galleries
        .client_login("jane@example.com", "not-the-password")
        .await
        .unwrap();
    assert!(wrong.is_none());

    let unknown = galleries
        .client_login("someone@example.com", &created.password)
        .await
        .unwrap();
    assert!(unknown.is_none());
}

#[tokio::test]
async fn legacy_plaintext_gallery_still_logs_in() {
    let pool = test_pool().await;
    sqlx::query(
        "INSERT INTO galleries (id, client_name, client_email, password, created_at) VALUES ('legacy', 'Old Client', 'old@example.com', 'plain-pass', '2024-01-01T00:00:00.000000Z')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let galleries = GalleryService::start(pool, Arc::new(DiskAssetHost::new(dir.path(), "/assets")))
        .await
        .unwrap();

    let gallery = galleries.client_login("old@example.com", "plain-pass").await.unwrap();
    assert_eq!(gallery.unwrap().id, "legacy");

    let gallery = galleries.client_login("old@example.com", "plain-pass2").await.unwrap();
    assert!(gallery.is_none());
}

#[tokio::test]
async fn images_append_in_upload_order() {
    let (galleries, _dir) = service().await;
    let created = galleries.create_gallery("Jane", "jane@example.com").await.unwrap();

    galleries
        .add_images(&created.id, vec![upload("1.jpg"), upload("2.jpg")])
        .await
        .unwrap();
    galleries.add_images(&created.id, vec![upload("3.jpg")]).await.unwrap();

    let gallery = galleries.get(&created.id).await.unwrap();
    assert_eq!(gallery.images.len(), 3);
    assert!(gallery.images.iter().all(|img| img.url.starts_with("/assets/")));
    assert!(gallery.images.iter().all(|img| !img.selected && img.edited_url.is_none()));
    assert_eq!(gallery.cover_url(), Some(gallery.images[0].url.as_str()));

    let missing = galleries.add_images("nope", vec![upload("x.jpg")]).await;
    assert!(matches!(missing, Err(AppError::NotFound)));
}

#[tokio::test]
async fn toggling_twice_restores_selection() {
    let (galleries, _dir) = service().await;
    let created = galleries.create_gallery("Jane", "jane@example.com").await.unwrap();
    let images = galleries.add_images(&created.id, vec![upload("a.jpg")]).await.unwrap();
    let image_id = &images[0].id;

    let first = galleries
        .toggle_image_selection(&created.id, image_id, false)
        .await
        .unwrap();
    assert!(first.selected);

    let second = galleries
        .toggle_image_selection(&created.id, image_id, first.selected)
        .await
        .unwrap();
    assert!(!second.selected);

    let missing = galleries.toggle_image_selection(&created.id, "nope", false).await;
    assert!(matches!(missing, Err(AppError::NotFound)));
}

#[tokio::test]
async fn edited_upload_attaches_url_and_keeps_selection() {
    let (galleries, _dir) = service().await;
    let created = galleries.create_gallery("Jane", "jane@example.com").await.unwrap();
    let images = galleries.add_images(&created.id, vec![upload("a.jpg")]).await.unwrap();
    let image_id = &images[0].id;
    galleries.toggle_image_selection(&created.id, image_id, false).await.unwrap();

    let edited = galleries
        .upload_edited_image(&created.id, image_id, upload("a-edit.jpg"))
        .await
        .unwrap();
    assert!(edited.selected);
    let first_edit = edited.edited_url.clone().unwrap();

    let replaced = galleries
        .upload_edited_image(&created.id, image_id, upload("a-edit-2.jpg"))
        .await
        .unwrap();
    assert!(replaced.edited_url.is_some());
    assert_ne!(replaced.edited_url.unwrap(), first_edit);

    let missing = galleries
        .upload_edited_image(&created.id, "nope", upload("b.jpg"))
        .await;
    assert!(matches!(missing, Err(AppError::NotFound)));
}

#[tokio::test]
async fn favorite_list_quota_is_enforced() {
    let (galleries, _dir) = service().await;
    let created = galleries.create_gallery("Jane", "jane@example.com").await.unwrap();
    let images = galleries
        .add_images(&created.id, vec![upload("a.jpg"), upload("b.jpg"), upload("c.jpg")])
        .await
        .unwrap();

    let list = galleries.add_favorite_list(&created.id, "Album", 2).await.unwrap();
    assert_eq!(list.limit, 2);

    let quota = galleries.select_favorite(&created.id, &list.id, &images[0].id).await.unwrap();
    assert_eq!((quota.used, quota.remaining), (1, 1));

    // selecting the same image again is a no-op
    let quota = galleries.select_favorite(&created.id, &list.id, &images[0].id).await.unwrap();
    assert_eq!(quota.used, 1);

    let quota = galleries.select_favorite(&created.id, &list.id, &images[1].id).await.unwrap();
    assert!(quota.is_full());

    let full = galleries.select_favorite(&created.id, &list.id, &images[2].id).await;
    assert!(matches!(full, Err(AppError::QuotaExceeded { limit: 2 })));

    let quota = galleries.deselect_favorite(&created.id, &list.id, &images[0].id).await.unwrap();
    assert_eq!(quota.remaining, 1);
    galleries.select_favorite(&created.id, &list.id, &images[2].id).await.unwrap();

    let gallery = galleries.get(&created.id).await.unwrap();
    assert_eq!(gallery.favorite_lists[0].selections, vec![images[1].id.clone(), images[2].id.clone()]);
}

#[tokio::test]
async fn favorite_list_needs_positive_limit() {
    let (galleries, _dir) = service().await;
    let created = galleries.create_gallery("Jane", "jane@example.com").await.unwrap();

    let zero = galleries.add_favorite_list(&created.id, "Album", 0).await;
    assert!(matches!(zero, Err(AppError::Validation(_))));

    let missing = galleries.add_favorite_list("nope", "Album", 10).await;
    assert!(matches!(missing, Err(AppError::NotFound)));
}

#[tokio::test]
async fn cover_photo_and_delete() {
    let (galleries, _dir) = service().await;
    let created = galleries.create_gallery("Jane", "jane@example.com").await.unwrap();
    let images = galleries
        .add_images(&created.id, vec![upload("a.jpg"), upload("b.jpg")])
        .await
        .unwrap();

    galleries.set_cover_photo(&created.id, &images[1].id).await.unwrap();
    let gallery = galleries.get(&created.id).await.unwrap();
    assert_eq!(gallery.cover_url(), Some(images[1].url.as_str()));

    galleries.delete_gallery(&created.id).await.unwrap();
    assert!(matches!(galleries.get(&created.id).await, Err(AppError::NotFound)));
    assert!(matches!(galleries.delete_gallery(&created.id).await, Err(AppError::NotFound)));
}

#[tokio::test]
async fn subscription_receives_changes_until_released() {
    let (galleries, _dir) = service().await;
    let mut subscription = galleries.subscribe();
    assert!(subscription.current().is_empty());
    assert_eq!(galleries.subscriber_count(), 1);

    galleries.create_gallery("Jane", "jane@example.com").await.unwrap();
    let snapshot = subscription.changed().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].client_name, "Jane");

    subscription.release();
    assert_eq!(galleries.subscriber_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_toggles_leave_the_feed_current() {
    let data = tempfile::tempdir().unwrap();
    let pool = db::init_pool(&format!("sqlite:{}", data.path().join("studio.db").display()))
        .await
        .unwrap();
    let assets = tempfile::tempdir().unwrap();
    let galleries = GalleryService::start(pool, Arc::new(DiskAssetHost::new(assets.path(), "/assets")))
        .await
        .unwrap();

    let created = galleries.create_gallery("Jane", "jane@example.com").await.unwrap();
    let uploads = (0..16).map(|i| upload(&format!("{i}.jpg"))).collect();
    let images = galleries.add_images(&created.id, uploads).await.unwrap();

    let toggles: Vec<_> = images
        .iter()
        .map(|image| {
            let galleries = galleries.clone();
            let gallery_id = created.id.clone();
            let image_id = image.id.clone();
            tokio::spawn(async move {
                galleries
                    .toggle_image_selection(&gallery_id, &image_id, false)
                    .await
            })
        })
        .collect();
    for toggle in futures::future::join_all(toggles).await {
        assert!(toggle.unwrap().unwrap().selected);
    }

    let stored = galleries.get(&created.id).await.unwrap();
    let snapshot = galleries.snapshot();
    assert_eq!(stored.selected_count(), 16);
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].selected_count(), 16);
    assert_eq!(snapshot[0].images, stored.images);
}

/// Read the next complete server-sent event from a streaming body.
async fn next_event(body: &mut Body) -> String {
    let mut text = String::new();
    while !text.contains("\n\n") {
        let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
            .await
            .expect("no event within five seconds")
            .expect("stream ended")
            .unwrap();
        if let Ok(data) = frame.into_data() {
            text.push_str(std::str::from_utf8(&data).unwrap());
        }
    }
    text
}

fn event_data(event: &str) -> Value {
    let data = event
        .lines()
        .find_map(|line| line.strip_prefix("data: "))
        .expect("event has a data line");
    serde_json::from_str(data).unwrap()
}

#[tokio::test]
async fn gallery_stream_pushes_snapshots_to_admins() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let customer = app.signup("Ada Lovelace", "ada@example.com").await;

    let resp = app.get("/admin/galleries/stream", Some(&customer)).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app.get("/admin/galleries/stream", Some(&admin)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    let mut body = resp.into_body();

    let first = next_event(&mut body).await;
    assert!(first.contains("event: galleries"));
    assert!(event_data(&first).as_array().unwrap().is_empty());
    assert_eq!(app.state.galleries.subscriber_count(), 1);

    app.post_json(
        "/admin/galleries",
        &json!({ "client_name": "Jane Doe", "client_email": "jane@example.com" }),
        Some(&admin),
    )
    .await;

    let second = next_event(&mut body).await;
    assert!(second.contains("event: galleries"));
    let galleries = event_data(&second);
    assert_eq!(galleries.as_array().unwrap().len(), 1);
    assert_eq!(galleries[0]["client_name"], "Jane Doe");

    drop(body);
    assert_eq!(app.state.galleries.subscriber_count(), 0);
}

#[tokio::test]
async fn edited_upload_over_http() {
    let app = TestApp::new().await;
    let admin = app.admin().await;

    let created = body_json(
        app.post_json(
            "/admin/galleries",
            &json!({ "client_name": "Jane Doe", "client_email": "jane@example.com" }),
            Some(&admin),
        )
        .await,
    )
    .await;
    let gallery_id = created["id"].as_str().unwrap().to_string();
    let password = created["password"].as_str().unwrap().to_string();

    let images = body_json(
        app.post_files(
            &format!("/admin/galleries/{gallery_id}/images"),
            &[("raw.jpg", &b"raw"[..])],
            Some(&admin),
        )
        .await,
    )
    .await;
    let image_id = images[0]["id"].as_str().unwrap().to_string();
    let uri = format!("/admin/galleries/{gallery_id}/images/{image_id}/edited");

    let resp = app.post_files(&uri, &[], Some(&admin)).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app.post_files(&uri, &[("edit.jpg", &b"edit one"[..])], Some(&admin)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let first = body_json(resp).await;
    assert_eq!(first["id"], image_id.as_str());
    let first_url = first["edited_url"].as_str().unwrap().to_string();
    assert!(first_url.starts_with("/assets/"));

    let resp = app.post_files(&uri, &[("edit.jpg", &b"edit two"[..])], Some(&admin)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let second_url = body_json(resp).await["edited_url"].as_str().unwrap().to_string();
    assert_ne!(second_url, first_url);

    let resp = app
        .post_files(
            &format!("/admin/galleries/{gallery_id}/images/nope/edited"),
            &[("edit.jpg", &b"edit"[..])],
            Some(&admin),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .post_json(
            "/gallery/login",
            &json!({ "email": "jane@example.com", "password": password }),
            None,
        )
        .await;
    let client = session_cookie(&resp).unwrap();
    let view = body_json(app.get("/gallery?view=edited", Some(&client)).await).await;
    assert_eq!(view["images"].as_array().unwrap().len(), 1);
    assert_eq!(view["images"][0]["edited_url"], second_url.as_str());
}

#[tokio::test]
async fn client_gallery_flow_over_http() {
    let app = TestApp::new().await;
    let admin = app.admin().await;

    let resp = app
        .post_json(
            "/admin/galleries",
            &json!({ "client_name": "Jane Doe", "client_email": "jane@example.com" }),
            Some(&admin),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await;
    let gallery_id = created["id"].as_str().unwrap().to_string();
    let password = created["password"].as_str().unwrap().to_string();

    let resp = app
        .post_files(
            &format!("/admin/galleries/{gallery_id}/images"),
            &[("one.jpg", &b"one"[..]), ("two.jpg", &b"two"[..])],
            Some(&admin),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let images = body_json(resp).await;
    let first_id = images[0]["id"].as_str().unwrap().to_string();

    let resp = app
        .post_json(
            "/gallery/login",
            &json!({ "email": "jane@example.com", "password": "wrong" }),
            None,
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .post_json(
            "/gallery/login",
            &json!({ "email": "jane@example.com", "password": password }),
            None,
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let client = session_cookie(&resp).unwrap();
    let view = body_json(resp).await;
    assert_eq!(view["client_name"], "Jane Doe");
    assert_eq!(view["images"].as_array().unwrap().len(), 2);

    let resp = app
        .post_json(
            &format!("/gallery/images/{first_id}/toggle"),
            &json!({ "selected": false }),
            Some(&client),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["selected"], true);

    let view = body_json(app.get("/gallery?view=selected", Some(&client)).await).await;
    assert_eq!(view["selected_count"], 1);
    assert_eq!(view["images"].as_array().unwrap().len(), 1);
    assert_eq!(view["images"][0]["id"], first_id.as_str());

    let view = body_json(app.get("/gallery?view=edited", Some(&client)).await).await;
    assert!(view["images"].as_array().unwrap().is_empty());

    let resp = app.get("/gallery", None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn favorites_over_http_report_quota() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let created = app
        .state
        .galleries
        .create_gallery("Jane", "jane@example.com")
        .await
        .unwrap();
    let images = app
        .state
        .galleries
        .add_images(&created.id, vec![upload("a.jpg"), upload("b.jpg")])
        .await
        .unwrap();

    let resp = app
        .post_json(
            &format!("/admin/galleries/{}/favorite-lists", created.id),
            &json!({ "name": "Prints", "limit": 1 }),
            Some(&admin),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let list_id = body_json(resp).await["id"].as_str().unwrap().to_string();

    let resp = app
        .post_json(
            "/gallery/login",
            &json!({ "email": "jane@example.com", "password": created.password }),
            None,
        )
        .await;
    let client = session_cookie(&resp).unwrap();

    let uri = format!("/gallery/favorites/{list_id}/images/{}", images[0].id);
    let resp = app.post_json(&uri, &json!({}), Some(&client)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["remaining"], 0);

    let uri = format!("/gallery/favorites/{list_id}/images/{}", images[1].id);
    let resp = app.post_json(&uri, &json!({}), Some(&client)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let uri = format!("/gallery/favorites/{list_id}/images/{}", images[0].id);
    let resp = app.delete(&uri, Some(&client)).await;
    assert_eq!(body_json(resp).await["used"], 0);
}

#[tokio::test]
async fn imported_galleries_keep_their_passwords_and_favorites() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    let export = dir.path().join("galleries.json");
    std::fs::write(
        &export,
        json!([{
            "clientName": "Old Client",
            "clientEmail": " Old@Example.com ",
            "password": "plain-pass",
            "images": [
                { "id": "0", "url": "https://cdn.example.com/a.jpg", "selected": true },
                { "id": "1", "url": "https://cdn.example.com/b.jpg", "editedUrl": "https://cdn.example.com/b-edit.jpg" }
            ],
            "favoriteLists": [
                { "name": "Album", "limit": 5, "selections": ["1", "missing"] },
                { "name": "Broken", "limit": 0 }
            ],
            "createdAt": "2024-01-01T00:00:00.000000Z"
        }])
        .to_string(),
    )
    .unwrap();

    studio_gallery::cli::import_galleries(&pool, export.to_str().unwrap())
        .await
        .unwrap();

    let galleries = GalleryService::start(pool, Arc::new(DiskAssetHost::new(dir.path(), "/assets")))
        .await
        .unwrap();
    let gallery = galleries
        .client_login("old@example.com", "plain-pass")
        .await
        .unwrap()
        .expect("imported plaintext password should still work");

    assert_eq!(gallery.images.len(), 2);
    assert!(gallery.images[0].selected);
    assert_eq!(
        gallery.images[1].edited_url.as_deref(),
        Some("https://cdn.example.com/b-edit.jpg")
    );
    assert_eq!(gallery.favorite_lists.len(), 1);
    assert_eq!(gallery.favorite_lists[0].selections, vec![gallery.images[1].id.clone()]);
}
