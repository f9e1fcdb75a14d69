//! Client galleries: access credentials, images, selections and favorite lists.

use futures::future::try_join_all;
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use crate::assets::AssetHost;
use crate::credentials;
use crate::error::AppError;
use crate::models::{
    timestamp_now, FavoriteList, FavoriteQuota, Gallery, GalleryImage, GalleryRow,
};

/// Returned once from [`GalleryService::create_gallery`]; the plaintext
/// password is not stored anywhere.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CreatedGallery {
    pub id: String,
    pub password: String,
}

/// A file handed to the asset host.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(FromRow)]
struct ImageRow {
    gallery_id: String,
    id: String,
    url: String,
    edited_url: Option<String>,
    selected: bool,
}

#[derive(FromRow)]
struct FavoriteListRow {
    id: String,
    gallery_id: String,
    name: String,
    selection_limit: i64,
}

#[derive(FromRow)]
struct SelectionRow {
    list_id: String,
    image_id: String,
}

type GallerySnapshot = Arc<Vec<Gallery>>;

/// Live view of every gallery for administrator screens. The feed is pushed
/// after each committed change. Dropping or releasing the subscription
/// detaches it from the feed.
pub struct GallerySubscription {
    rx: watch::Receiver<GallerySnapshot>,
}

impl GallerySubscription {
    pub fn current(&self) -> GallerySnapshot {
        self.rx.borrow().clone()
    }

    /// Waits for the next change. `None` once the service is gone.
    pub async fn changed(&mut self) -> Option<GallerySnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    pub fn release(self) {}
}

#[derive(Clone)]
pub struct GalleryService {
    db: SqlitePool,
    assets: Arc<dyn AssetHost>,
    feed: Arc<watch::Sender<GallerySnapshot>>,
    /// Held across reload and send so a slower publisher can never replace
    /// a newer snapshot with an older one.
    refresh: Arc<Mutex<()>>,
}

impl GalleryService {
    /// Build the service and prime the live feed with the current galleries.
    pub async fn start(db: SqlitePool, assets: Arc<dyn AssetHost>) -> Result<Self, AppError> {
        let (tx, _) = watch::channel(Arc::new(Vec::new()));
        let service = Self {
            db,
            assets,
            feed: Arc::new(tx),
            refresh: Arc::new(Mutex::new(())),
        };
        let galleries = service.list_all().await?;
        service.feed.send_replace(Arc::new(galleries));
        Ok(service)
    }

    pub fn subscribe(&self) -> GallerySubscription {
        GallerySubscription {
            rx: self.feed.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.feed.receiver_count()
    }

    /// Latest snapshot pushed to subscribers.
    pub fn snapshot(&self) -> GallerySnapshot {
        self.feed.borrow().clone()
    }

    async fn publish(&self) {
        let _refresh = self.refresh.lock().await;
        match self.list_all().await {
            Ok(galleries) => {
                self.feed.send_replace(Arc::new(galleries));
            }
            Err(e) => tracing::error!(error = %e, "failed to refresh gallery feed"),
        }
    }

    pub async fn create_gallery(
        &self,
        client_name: &str,
        client_email: &str,
    ) -> Result<CreatedGallery, AppError> {
        let client_name = client_name.trim();
        let client_email = client_email.trim().to_lowercase();
        if client_name.is_empty() || client_email.is_empty() {
            return Err(AppError::validation("client name and email are required"));
        }

        let password = credentials::generate_password();
        let hashed = credentials::hash_password(&password).await?;
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO galleries (id, client_name, client_email, password, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(client_name)
        .bind(&client_email)
        .bind(&hashed)
        .bind(timestamp_now())
        .execute(&self.db)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "failed to create gallery"))?;

        tracing::info!(gallery_id = %id, "gallery created");
        self.publish().await;
        Ok(CreatedGallery { id, password })
    }

    /// Returns the gallery when the credentials match, `None` otherwise.
    /// Unknown emails and wrong passwords are indistinguishable to the caller
    /// and in the logs.
    pub async fn client_login(
        &self,
        client_email: &str,
        password: &str,
    ) -> Result<Option<Gallery>, AppError> {
        let client_email = client_email.trim().to_lowercase();
        let mut candidates: Vec<GalleryRow> = sqlx::query_as(
            "SELECT * FROM galleries WHERE client_email = ? ORDER BY created_at",
        )
        .bind(&client_email)
        .fetch_all(&self.db)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "gallery login lookup failed"))?;

        let stored = candidates.iter().map(|row| row.password.clone()).collect();
        let matched = credentials::first_match(password, stored)
            .await?
            .map(|index| candidates.swap_remove(index));

        match matched {
            Some(row) => {
                tracing::info!(gallery_id = %row.id, "client gallery login");
                let mut galleries = self.hydrate(vec![row]).await?;
                Ok(galleries.pop())
            }
            None => {
                tracing::info!("client gallery login rejected");
                Ok(None)
            }
        }
    }

    pub async fn get(&self, gallery_id: &str) -> Result<Gallery, AppError> {
        let row: Option<GalleryRow> = sqlx::query_as("SELECT * FROM galleries WHERE id = ?")
            .bind(gallery_id)
            .fetch_optional(&self.db)
            .await?;
        let row = row.ok_or(AppError::NotFound)?;
        self.hydrate(vec![row]).await?.pop().ok_or(AppError::NotFound)
    }

    pub async fn list_all(&self) -> Result<Vec<Gallery>, AppError> {
        let rows: Vec<GalleryRow> =
            sqlx::query_as("SELECT * FROM galleries ORDER BY created_at DESC")
                .fetch_all(&self.db)
                .await?;
        self.hydrate(rows).await
    }

    async fn hydrate(&self, rows: Vec<GalleryRow>) -> Result<Vec<Gallery>, AppError> {
        // a single gallery narrows the child queries; otherwise load them all
        let only = match rows.as_slice() {
            [row] => Some(row.id.clone()),
            _ => None,
        };

        let images: Vec<ImageRow> = sqlx::query_as(
            "SELECT gallery_id, id, url, edited_url, selected FROM gallery_images WHERE ? IS NULL OR gallery_id = ? ORDER BY gallery_id, position",
        )
        .bind(&only)
        .bind(&only)
        .fetch_all(&self.db)
        .await?;

        let lists: Vec<FavoriteListRow> = sqlx::query_as(
            "SELECT id, gallery_id, name, selection_limit FROM favorite_lists WHERE ? IS NULL OR gallery_id = ? ORDER BY created_at, rowid",
        )
        .bind(&only)
        .bind(&only)
        .fetch_all(&self.db)
        .await?;

        let selections: Vec<SelectionRow> = sqlx::query_as(
            r#"
            SELECT s.list_id, s.image_id
            FROM favorite_selections s
            JOIN favorite_lists l ON l.id = s.list_id
            WHERE ? IS NULL OR l.gallery_id = ?
            ORDER BY s.added_at, s.rowid
            "#,
        )
        .bind(&only)
        .bind(&only)
        .fetch_all(&self.db)
        .await?;

        let mut images_by_gallery: HashMap<String, Vec<GalleryImage>> = HashMap::new();
        for img in images {
            images_by_gallery
                .entry(img.gallery_id)
                .or_default()
                .push(GalleryImage {
                    id: img.id,
                    url: img.url,
                    edited_url: img.edited_url,
                    selected: img.selected,
                });
        }

        let mut selections_by_list: HashMap<String, Vec<String>> = HashMap::new();
        for sel in selections {
            selections_by_list
                .entry(sel.list_id)
                .or_default()
                .push(sel.image_id);
        }

        let mut lists_by_gallery: HashMap<String, Vec<FavoriteList>> = HashMap::new();
        for list in lists {
            let selections = selections_by_list.remove(&list.id).unwrap_or_default();
            lists_by_gallery
                .entry(list.gallery_id)
                .or_default()
                .push(FavoriteList {
                    id: list.id,
                    name: list.name,
                    limit: list.selection_limit,
                    selections,
                });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let images = images_by_gallery.remove(&row.id).unwrap_or_default();
                let lists = lists_by_gallery.remove(&row.id).unwrap_or_default();
                Gallery::from_parts(row, images, lists)
            })
            .collect())
    }

    async fn ensure_gallery(&self, gallery_id: &str) -> Result<(), AppError> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM galleries WHERE id = ?)")
            .bind(gallery_id)
            .fetch_one(&self.db)
            .await?;
        if exists {
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }

    async fn find_image(&self, gallery_id: &str, image_id: &str) -> Result<GalleryImage, AppError> {
        let image: Option<GalleryImage> = sqlx::query_as(
            "SELECT id, url, edited_url, selected FROM gallery_images WHERE gallery_id = ? AND id = ?",
        )
        .bind(gallery_id)
        .bind(image_id)
        .fetch_optional(&self.db)
        .await?;
        image.ok_or(AppError::NotFound)
    }

    /// Set `selected` to the opposite of what the caller last saw. The write
    /// touches only this image's row, so concurrent toggles of different
    /// images never overwrite each other.
    pub async fn toggle_image_selection(
        &self,
        gallery_id: &str,
        image_id: &str,
        current_selected: bool,
    ) -> Result<GalleryImage, AppError> {
        let image: Option<GalleryImage> = sqlx::query_as(
            "UPDATE gallery_images SET selected = ? WHERE gallery_id = ? AND id = ? RETURNING id, url, edited_url, selected",
        )
        .bind(!current_selected)
        .bind(gallery_id)
        .bind(image_id)
        .fetch_optional(&self.db)
        .await
        .inspect_err(|e| tracing::error!(gallery_id, image_id, error = %e, "failed to toggle image selection"))?;

        let image = image.ok_or(AppError::NotFound)?;
        self.publish().await;
        Ok(image)
    }

    /// Upload a retouched version and attach it. An existing edited link is
    /// replaced, never cleared.
    pub async fn upload_edited_image(
        &self,
        gallery_id: &str,
        image_id: &str,
        upload: Upload,
    ) -> Result<GalleryImage, AppError> {
        self.find_image(gallery_id, image_id).await?;

        let edited_url = self
            .assets
            .upload(upload.bytes, &upload.file_name)
            .await
            .inspect_err(|e| tracing::error!(gallery_id, image_id, error = %e, "edited image upload failed"))?;

        let image: Option<GalleryImage> = sqlx::query_as(
            "UPDATE gallery_images SET edited_url = ? WHERE gallery_id = ? AND id = ? RETURNING id, url, edited_url, selected",
        )
        .bind(&edited_url)
        .bind(gallery_id)
        .bind(image_id)
        .fetch_optional(&self.db)
        .await
        .inspect_err(|e| tracing::error!(gallery_id, image_id, error = %e, "failed to attach edited image"))?;

        let image = image.ok_or(AppError::NotFound)?;
        self.publish().await;
        Ok(image)
    }

    /// Upload every file concurrently, then append them all in one
    /// transaction, keeping the order they were given in.
    pub async fn add_images(
        &self,
        gallery_id: &str,
        uploads: Vec<Upload>,
    ) -> Result<Vec<GalleryImage>, AppError> {
        if uploads.is_empty() {
            return Err(AppError::validation("no files to upload"));
        }
        self.ensure_gallery(gallery_id).await?;

        let urls = try_join_all(
            uploads
                .into_iter()
                .map(|upload| async move { self.assets.upload(upload.bytes, &upload.file_name).await }),
        )
        .await
        .inspect_err(|e| tracing::error!(gallery_id, error = %e, "gallery image upload failed"))?;

        let images: Vec<GalleryImage> = urls.into_iter().map(GalleryImage::new).collect();
        let now = timestamp_now();

        let mut tx = self.db.begin().await?;
        let (next,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM gallery_images WHERE gallery_id = ?",
        )
        .bind(gallery_id)
        .fetch_one(&mut *tx)
        .await?;

        for (offset, image) in images.iter().enumerate() {
            sqlx::query(
                "INSERT INTO gallery_images (id, gallery_id, position, url, edited_url, selected, created_at) VALUES (?, ?, ?, ?, NULL, 0, ?)",
            )
            .bind(&image.id)
            .bind(gallery_id)
            .bind(next + offset as i64)
            .bind(&image.url)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .inspect_err(|e| tracing::error!(gallery_id, error = %e, "failed to append gallery images"))?;
        }
        tx.commit().await?;

        tracing::info!(gallery_id, count = images.len(), "images added to gallery");
        self.publish().await;
        Ok(images)
    }

    /// Use one of the gallery's own images as its cover.
    pub async fn set_cover_photo(&self, gallery_id: &str, image_id: &str) -> Result<(), AppError> {
        let image = self.find_image(gallery_id, image_id).await?;
        sqlx::query("UPDATE galleries SET cover_photo_url = ? WHERE id = ?")
            .bind(&image.url)
            .bind(gallery_id)
            .execute(&self.db)
            .await
            .inspect_err(|e| tracing::error!(gallery_id, error = %e, "failed to set cover photo"))?;
        self.publish().await;
        Ok(())
    }

    pub async fn delete_gallery(&self, gallery_id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM galleries WHERE id = ?")
            .bind(gallery_id)
            .execute(&self.db)
            .await
            .inspect_err(|e| tracing::error!(gallery_id, error = %e, "failed to delete gallery"))?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        tracing::info!(gallery_id, "gallery deleted");
        self.publish().await;
        Ok(())
    }

    pub async fn add_favorite_list(
        &self,
        gallery_id: &str,
        name: &str,
        limit: i64,
    ) -> Result<FavoriteList, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("list name is required"));
        }
        if limit < 1 {
            return Err(AppError::validation("limit must be at least 1"));
        }
        self.ensure_gallery(gallery_id).await?;

        let list = FavoriteList {
            id: Uuid::now_v7().to_string(),
            name: name.to_string(),
            limit,
            selections: Vec::new(),
        };
        sqlx::query(
            "INSERT INTO favorite_lists (id, gallery_id, name, selection_limit, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&list.id)
        .bind(gallery_id)
        .bind(&list.name)
        .bind(list.limit)
        .bind(timestamp_now())
        .execute(&self.db)
        .await
        .inspect_err(|e| tracing::error!(gallery_id, error = %e, "failed to add favorite list"))?;

        self.publish().await;
        Ok(list)
    }

    async fn list_limit(&self, gallery_id: &str, list_id: &str) -> Result<i64, AppError> {
        let limit: Option<(i64,)> = sqlx::query_as(
            "SELECT selection_limit FROM favorite_lists WHERE id = ? AND gallery_id = ?",
        )
        .bind(list_id)
        .bind(gallery_id)
        .fetch_optional(&self.db)
        .await?;
        limit.map(|(limit,)| limit).ok_or(AppError::NotFound)
    }

    pub async fn favorite_quota(&self, gallery_id: &str, list_id: &str) -> Result<FavoriteQuota, AppError> {
        let limit = self.list_limit(gallery_id, list_id).await?;
        let (used,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM favorite_selections WHERE list_id = ?")
                .bind(list_id)
                .fetch_one(&self.db)
                .await?;
        Ok(FavoriteQuota::new(list_id, limit, used))
    }

    /// Add an image to a favorite list unless the list is already full.
    /// Selecting an image that is already on the list changes nothing.
    pub async fn select_favorite(
        &self,
        gallery_id: &str,
        list_id: &str,
        image_id: &str,
    ) -> Result<FavoriteQuota, AppError> {
        let limit = self.list_limit(gallery_id, list_id).await?;
        self.find_image(gallery_id, image_id).await?;

        // count check and insert in one statement so the cap holds under concurrent selects
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO favorite_selections (list_id, image_id, added_at)
            SELECT ?, ?, ?
            WHERE (SELECT COUNT(*) FROM favorite_selections WHERE list_id = ?) < ?
            "#,
        )
        .bind(list_id)
        .bind(image_id)
        .bind(timestamp_now())
        .bind(list_id)
        .bind(limit)
        .execute(&self.db)
        .await
        .inspect_err(|e| tracing::error!(gallery_id, list_id, error = %e, "failed to select favorite"))?;

        let (present,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM favorite_selections WHERE list_id = ? AND image_id = ?)",
        )
        .bind(list_id)
        .bind(image_id)
        .fetch_one(&self.db)
        .await?;
        if !present {
            return Err(AppError::QuotaExceeded { limit });
        }

        self.publish().await;
        self.favorite_quota(gallery_id, list_id).await
    }

    pub async fn deselect_favorite(
        &self,
        gallery_id: &str,
        list_id: &str,
        image_id: &str,
    ) -> Result<FavoriteQuota, AppError> {
        self.list_limit(gallery_id, list_id).await?;
        sqlx::query("DELETE FROM favorite_selections WHERE list_id = ? AND image_id = ?")
            .bind(list_id)
            .bind(image_id)
            .execute(&self.db)
            .await
            .inspect_err(|e| tracing::error!(gallery_id, list_id, error = %e, "failed to deselect favorite"))?;

        self.publish().await;
        self.favorite_quota(gallery_id, list_id).await
    }
}
