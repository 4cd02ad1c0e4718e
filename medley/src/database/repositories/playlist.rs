//! Playlist and playlist item repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::database::models::{
    ItemStatus, ItemStatusCounts, PlaylistDbModel, PlaylistItemDbModel,
};
use crate::{Error, Result};

/// Playlist repository trait.
#[async_trait]
pub trait PlaylistRepository: Send + Sync {
    async fn create_playlist(&self, playlist: &PlaylistDbModel) -> Result<()>;
    async fn get_playlist(&self, id: &str) -> Result<PlaylistDbModel>;
    async fn find_by_source_url(&self, url: &str) -> Result<Option<PlaylistDbModel>>;
    async fn list_playlists(&self) -> Result<Vec<PlaylistDbModel>>;
    async fn update_playlist(&self, playlist: &PlaylistDbModel) -> Result<()>;
    async fn set_last_synced(&self, id: &str) -> Result<()>;
    /// Deleting a playlist cascades its items but never their linked jobs.
    async fn delete_playlist(&self, id: &str) -> Result<bool>;

    async fn list_items(&self, playlist_id: &str) -> Result<Vec<PlaylistItemDbModel>>;
    async fn list_items_page(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
        status: Option<ItemStatus>,
    ) -> Result<(Vec<PlaylistItemDbModel>, i64)>;
    async fn create_item(&self, item: &PlaylistItemDbModel) -> Result<()>;
    async fn update_item_position(&self, id: &str, position: i64) -> Result<()>;
    async fn link_item_job(&self, item_id: &str, job_id: &str) -> Result<()>;
    /// Items that claim to be pending but have no job to back them (a crash
    /// between item creation and job creation leaves this shape behind).
    async fn items_missing_job(&self, playlist_id: &str) -> Result<Vec<PlaylistItemDbModel>>;
    /// Mirror a job outcome onto any item linked to it.
    async fn mark_items_for_job(
        &self,
        job_id: &str,
        status: ItemStatus,
        file_path: Option<&str>,
    ) -> Result<()>;
    async fn status_counts(&self, playlist_id: &str) -> Result<ItemStatusCounts>;
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// SQLx implementation of PlaylistRepository.
pub struct SqlxPlaylistRepository {
    pool: SqlitePool,
}

impl SqlxPlaylistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlaylistRepository for SqlxPlaylistRepository {
    async fn create_playlist(&self, playlist: &PlaylistDbModel) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO playlists (id, source_url, remote_playlist_id, title, description,
                                   download_kind, last_synced_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&playlist.id)
        .bind(&playlist.source_url)
        .bind(&playlist.remote_playlist_id)
        .bind(&playlist.title)
        .bind(&playlist.description)
        .bind(&playlist.download_kind)
        .bind(&playlist.last_synced_at)
        .bind(&playlist.created_at)
        .bind(&playlist.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::conflict(format!(
                "playlist with URL '{}' already exists",
                playlist.source_url
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_playlist(&self, id: &str) -> Result<PlaylistDbModel> {
        sqlx::query_as::<_, PlaylistDbModel>("SELECT * FROM playlists WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Playlist", id))
    }

    async fn find_by_source_url(&self, url: &str) -> Result<Option<PlaylistDbModel>> {
        let playlist =
            sqlx::query_as::<_, PlaylistDbModel>("SELECT * FROM playlists WHERE source_url = ?")
                .bind(url)
                .fetch_optional(&self.pool)
                .await?;
        Ok(playlist)
    }

    async fn list_playlists(&self) -> Result<Vec<PlaylistDbModel>> {
        let playlists =
            sqlx::query_as::<_, PlaylistDbModel>("SELECT * FROM playlists ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?;
        Ok(playlists)
    }

    async fn update_playlist(&self, playlist: &PlaylistDbModel) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE playlists SET
                title = ?,
                description = ?,
                remote_playlist_id = ?,
                download_kind = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&playlist.title)
        .bind(&playlist.description)
        .bind(&playlist.remote_playlist_id)
        .bind(&playlist.download_kind)
        .bind(&now)
        .bind(&playlist.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_last_synced(&self, id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE playlists SET last_synced_at = ?, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_playlist(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM playlists WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_items(&self, playlist_id: &str) -> Result<Vec<PlaylistItemDbModel>> {
        let items = sqlx::query_as::<_, PlaylistItemDbModel>(
            "SELECT * FROM playlist_items WHERE playlist_id = ? ORDER BY position, added_at",
        )
        .bind(playlist_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn list_items_page(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
        status: Option<ItemStatus>,
    ) -> Result<(Vec<PlaylistItemDbModel>, i64)> {
        let (total, items) = match status {
            Some(status) => {
                let (total,): (i64,) = sqlx::query_as(
                    "SELECT COUNT(*) FROM playlist_items WHERE playlist_id = ? AND download_status = ?",
                )
                .bind(playlist_id)
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await?;

                let items = sqlx::query_as::<_, PlaylistItemDbModel>(
                    r#"
                    SELECT * FROM playlist_items
                    WHERE playlist_id = ? AND download_status = ?
                    ORDER BY position, added_at
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(playlist_id)
                .bind(status.as_str())
                .bind(limit as i64)
                .bind(offset as i64)
                .fetch_all(&self.pool)
                .await?;

                (total, items)
            }
            None => {
                let (total,): (i64,) =
                    sqlx::query_as("SELECT COUNT(*) FROM playlist_items WHERE playlist_id = ?")
                        .bind(playlist_id)
                        .fetch_one(&self.pool)
                        .await?;

                let items = sqlx::query_as::<_, PlaylistItemDbModel>(
                    r#"
                    SELECT * FROM playlist_items
                    WHERE playlist_id = ?
                    ORDER BY position, added_at
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(playlist_id)
                .bind(limit as i64)
                .bind(offset as i64)
                .fetch_all(&self.pool)
                .await?;

                (total, items)
            }
        };

        Ok((items, total))
    }

    async fn create_item(&self, item: &PlaylistItemDbModel) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO playlist_items (id, playlist_id, remote_item_id, source_url, title, artist,
                                        position, download_status, linked_job_id, file_path,
                                        added_at, downloaded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.playlist_id)
        .bind(&item.remote_item_id)
        .bind(&item.source_url)
        .bind(&item.title)
        .bind(&item.artist)
        .bind(item.position)
        .bind(&item.download_status)
        .bind(&item.linked_job_id)
        .bind(&item.file_path)
        .bind(&item.added_at)
        .bind(&item.downloaded_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::conflict(format!(
                "item '{}' already exists in playlist '{}'",
                item.remote_item_id, item.playlist_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_item_position(&self, id: &str, position: i64) -> Result<()> {
        sqlx::query("UPDATE playlist_items SET position = ? WHERE id = ?")
            .bind(position)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn link_item_job(&self, item_id: &str, job_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE playlist_items SET linked_job_id = ?, download_status = ? WHERE id = ?",
        )
        .bind(job_id)
        .bind(ItemStatus::Pending.as_str())
        .bind(item_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn items_missing_job(&self, playlist_id: &str) -> Result<Vec<PlaylistItemDbModel>> {
        let items = sqlx::query_as::<_, PlaylistItemDbModel>(
            r#"
            SELECT * FROM playlist_items
            WHERE playlist_id = ? AND linked_job_id IS NULL AND download_status = 'pending'
            ORDER BY position, added_at
            "#,
        )
        .bind(playlist_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn mark_items_for_job(
        &self,
        job_id: &str,
        status: ItemStatus,
        file_path: Option<&str>,
    ) -> Result<()> {
        let downloaded_at = match status {
            ItemStatus::Completed => Some(Utc::now().to_rfc3339()),
            _ => None,
        };
        sqlx::query(
            r#"
            UPDATE playlist_items SET
                download_status = ?,
                file_path = COALESCE(?, file_path),
                downloaded_at = COALESCE(?, downloaded_at)
            WHERE linked_job_id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(file_path)
        .bind(&downloaded_at)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn status_counts(&self, playlist_id: &str) -> Result<ItemStatusCounts> {
        let row: (i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(download_status = 'pending'), 0),
                   COALESCE(SUM(download_status = 'downloading'), 0),
                   COALESCE(SUM(download_status = 'completed'), 0),
                   COALESCE(SUM(download_status = 'failed'), 0)
            FROM playlist_items
            WHERE playlist_id = ?
            "#,
        )
        .bind(playlist_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ItemStatusCounts {
            total: row.0,
            pending: row.1,
            downloading: row.2,
            completed: row.3,
            failed: row.4,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::DownloadKind;
    use crate::database::{init_pool, run_migrations};

    async fn repo() -> SqlxPlaylistRepository {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqlxPlaylistRepository::new(pool)
    }

    #[tokio::test]
    async fn duplicate_source_url_is_a_conflict() {
        let repo = repo().await;
        let first = PlaylistDbModel::new("https://example.com/p", "One", DownloadKind::Audio);
        repo.create_playlist(&first).await.unwrap();

        let dup = PlaylistDbModel::new("https://example.com/p", "Two", DownloadKind::Video);
        match repo.create_playlist(&dup).await {
            Err(Error::Conflict(_)) => {}
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_remote_item_is_a_conflict() {
        let repo = repo().await;
        let playlist = PlaylistDbModel::new("https://example.com/p", "P", DownloadKind::Audio);
        repo.create_playlist(&playlist).await.unwrap();

        let item = PlaylistItemDbModel::new(&playlist.id, "v1", "https://example.com/v1", "T", None, 0);
        repo.create_item(&item).await.unwrap();

        let dup = PlaylistItemDbModel::new(&playlist.id, "v1", "https://example.com/v1", "T again", None, 5);
        assert!(matches!(
            repo.create_item(&dup).await,
            Err(Error::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn deleting_playlist_cascades_items() {
        let repo = repo().await;
        let playlist = PlaylistDbModel::new("https://example.com/p", "P", DownloadKind::Audio);
        repo.create_playlist(&playlist).await.unwrap();
        let item = PlaylistItemDbModel::new(&playlist.id, "v1", "https://example.com/v1", "T", None, 0);
        repo.create_item(&item).await.unwrap();

        assert!(repo.delete_playlist(&playlist.id).await.unwrap());
        assert!(repo.list_items(&playlist.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_counts_sum_by_status() {
        let repo = repo().await;
        let playlist = PlaylistDbModel::new("https://example.com/p", "P", DownloadKind::Audio);
        repo.create_playlist(&playlist).await.unwrap();

        for (idx, remote_id) in ["a", "b", "c"].iter().enumerate() {
            let item = PlaylistItemDbModel::new(
                &playlist.id,
                *remote_id,
                format!("https://example.com/{remote_id}"),
                "T",
                None,
                idx as i64,
            );
            repo.create_item(&item).await.unwrap();
            repo.link_item_job(&item.id, &format!("job-{remote_id}"))
                .await
                .unwrap();
        }
        repo.mark_items_for_job("job-a", ItemStatus::Completed, Some("/out.mp3"))
            .await
            .unwrap();
        repo.mark_items_for_job("job-b", ItemStatus::Failed, None)
            .await
            .unwrap();

        let counts = repo.status_counts(&playlist.id).await.unwrap();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.pending, 1);
    }
}
