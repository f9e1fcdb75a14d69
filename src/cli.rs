use serde::Deserialize;
use sqlx::SqlitePool;
use std::fs;
use uuid::Uuid;

use crate::gallery::GalleryService;
use crate::models::timestamp_now;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyImage {
    id: Option<String>,
    url: String,
    edited_url: Option<String>,
    #[serde(default)]
    selected: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyFavoriteList {
    name: String,
    limit: i64,
    #[serde(default)]
    selections: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyGallery {
    client_name: String,
    client_email: String,
    /// bcrypt hash or, for the oldest galleries, the plaintext password
    password: String,
    #[serde(default)]
    images: Vec<LegacyImage>,
    cover_photo_url: Option<String>,
    #[serde(default)]
    favorite_lists: Vec<LegacyFavoriteList>,
    created_at: Option<String>,
}

/// Import galleries exported from the previous document store. Passwords are
/// carried over as-is, so plaintext legacy records keep working.
pub async fn import_galleries(pool: &SqlitePool, file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let content = fs::read_to_string(file_path)?;
    let galleries: Vec<LegacyGallery> = serde_json::from_str(&content)?;

    let now = timestamp_now();
    let mut imported = 0;
    let mut tx = pool.begin().await?;

    for gallery in galleries {
        let id = Uuid::new_v4().to_string();
        let created_at = gallery.created_at.unwrap_or_else(|| now.clone());

        sqlx::query(
            "INSERT INTO galleries (id, client_name, client_email, password, cover_photo_url, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(gallery.client_name.trim())
        .bind(gallery.client_email.trim().to_lowercase())
        .bind(&gallery.password)
        .bind(&gallery.cover_photo_url)
        .bind(&created_at)
        .execute(&mut *tx)
        .await?;

        // exported image ids are only unique per gallery; remap them
        let mut id_map = std::collections::HashMap::new();
        for (position, image) in gallery.images.iter().enumerate() {
            let image_id = Uuid::now_v7().to_string();
            if let Some(old) = &image.id {
                id_map.insert(old.clone(), image_id.clone());
            }
            sqlx::query(
                "INSERT INTO gallery_images (id, gallery_id, position, url, edited_url, selected, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&image_id)
            .bind(&id)
            .bind(position as i64)
            .bind(&image.url)
            .bind(&image.edited_url)
            .bind(image.selected)
            .bind(&created_at)
            .execute(&mut *tx)
            .await?;
        }

        for list in &gallery.favorite_lists {
            if list.limit < 1 {
                eprintln!("Skipping favorite list '{}' with limit {}", list.name, list.limit);
                continue;
            }
            let list_id = Uuid::now_v7().to_string();
            sqlx::query(
                "INSERT INTO favorite_lists (id, gallery_id, name, selection_limit, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&list_id)
            .bind(&id)
            .bind(&list.name)
            .bind(list.limit)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

            for old_image_id in &list.selections {
                let Some(image_id) = id_map.get(old_image_id) else {
                    eprintln!("Unknown image {old_image_id} in list '{}', skipping", list.name);
                    continue;
                };
                sqlx::query(
                    "INSERT OR IGNORE INTO favorite_selections (list_id, image_id, added_at) VALUES (?, ?, ?)",
                )
                .bind(&list_id)
                .bind(image_id)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
            }
        }

        imported += 1;
    }

    tx.commit().await?;
    println!("Imported {} galleries", imported);
    Ok(())
}

pub async fn create_gallery(
    galleries: &GalleryService,
    client_name: &str,
    client_email: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let created = galleries.create_gallery(client_name, client_email).await?;

    println!("Created gallery:");
    println!("  ID: {}", created.id);
    println!("  Client: {} <{}>", client_name, client_email);
    println!("  Password: {}", created.password);
    println!("The password is shown only once; send it to the client now.");

    Ok(())
}
