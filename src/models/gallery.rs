use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Gallery columns as stored; images and favorite lists live in their own tables.
#[derive(Debug, Clone, FromRow)]
pub struct GalleryRow {
    pub id: String,
    pub client_name: String,
    pub client_email: String,
    pub password: String,
    pub cover_photo_url: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Gallery {
    pub id: String,
    pub client_name: String,
    pub client_email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub images: Vec<GalleryImage>,
    pub cover_photo_url: Option<String>,
    pub favorite_lists: Vec<FavoriteList>,
    pub created_at: String,
}

impl Gallery {
    pub fn from_parts(
        row: GalleryRow,
        images: Vec<GalleryImage>,
        favorite_lists: Vec<FavoriteList>,
    ) -> Self {
        Self {
            id: row.id,
            client_name: row.client_name,
            client_email: row.client_email,
            password: row.password,
            images,
            cover_photo_url: row.cover_photo_url,
            favorite_lists,
            created_at: row.created_at,
        }
    }

    /// The explicit cover, or the first uploaded image when none was chosen.
    pub fn cover_url(&self) -> Option<&str> {
        self.cover_photo_url
            .as_deref()
            .or_else(|| self.images.first().map(|img| img.url.as_str()))
    }

    pub fn selected_count(&self) -> usize {
        self.images.iter().filter(|img| img.selected).count()
    }

    pub fn images_in(&self, view: ImageView) -> Vec<&GalleryImage> {
        self.images.iter().filter(|img| view.includes(img)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct GalleryImage {
    pub id: String,
    pub url: String,
    pub edited_url: Option<String>,
    pub selected: bool,
}

impl GalleryImage {
    /// Image ids are UUIDv7: creation time plus random bits.
    pub fn new(url: String) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            url,
            edited_url: None,
            selected: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageView {
    #[default]
    All,
    Selected,
    Edited,
}

impl ImageView {
    fn includes(self, img: &GalleryImage) -> bool {
        match self {
            ImageView::All => true,
            ImageView::Selected => img.selected,
            ImageView::Edited => img.edited_url.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FavoriteList {
    pub id: String,
    pub name: String,
    pub limit: i64,
    pub selections: Vec<String>,
}

impl FavoriteList {
    pub fn quota(&self) -> FavoriteQuota {
        FavoriteQuota::new(&self.id, self.limit, self.selections.len() as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FavoriteQuota {
    pub list_id: String,
    pub limit: i64,
    pub used: i64,
    pub remaining: i64,
}

impl FavoriteQuota {
    pub fn new(list_id: &str, limit: i64, used: i64) -> Self {
        Self {
            list_id: list_id.to_string(),
            limit,
            used,
            remaining: (limit - used).max(0),
        }
    }

    pub fn is_full(&self) -> bool {
        self.used >= self.limit
    }
}
