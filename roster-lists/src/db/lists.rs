//! Distributed list database operations

use roster_common::db::{DistributionBatch, NormalizedContact};
use roster_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::parse_timestamp;

/// All persisted lists, ordered by agent name ascending
pub async fn fetch_all_lists(pool: &SqlitePool) -> Result<Vec<DistributionBatch>> {
    let rows = sqlx::query(
        r#"
        SELECT id, agent_id, agent_name, agent_email, items, upload_batch, created_at
        FROM distributed_lists
        ORDER BY agent_name ASC, rowid ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(batch_from_row).collect()
}

/// Remove every persisted list
pub async fn delete_all_lists(conn: &mut SqliteConnection) -> Result<u64> {
    let result = sqlx::query("DELETE FROM distributed_lists")
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}

/// Insert one list record
pub async fn insert_list(conn: &mut SqliteConnection, batch: &DistributionBatch) -> Result<()> {
    let items = serde_json::to_string(&batch.items)
        .map_err(|e| Error::Internal(format!("Failed to serialize items: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO distributed_lists (
            id, agent_id, agent_name, agent_email, items, upload_batch, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&batch.id)
    .bind(&batch.agent_id)
    .bind(&batch.agent_name)
    .bind(&batch.agent_email)
    .bind(items)
    .bind(&batch.batch_id)
    .bind(batch.created_at.to_rfc3339())
    .execute(conn)
    .await?;

    Ok(())
}

fn batch_from_row(row: &SqliteRow) -> Result<DistributionBatch> {
    let items: String = row.get("items");
    let items: Vec<NormalizedContact> = serde_json::from_str(&items)
        .map_err(|e| Error::Internal(format!("Failed to deserialize items: {}", e)))?;

    let created_at: String = row.get("created_at");

    Ok(DistributionBatch {
        id: row.get("id"),
        batch_id: row.get("upload_batch"),
        agent_id: row.get("agent_id"),
        agent_name: row.get("agent_name"),
        agent_email: row.get("agent_email"),
        items,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use roster_common::db::init_memory_database;

    fn batch(id: &str, agent_name: &str, items: usize) -> DistributionBatch {
        DistributionBatch {
            id: id.to_string(),
            batch_id: "1700000000000".to_string(),
            agent_id: format!("agent-{}", agent_name),
            agent_name: agent_name.to_string(),
            agent_email: format!("{}@example.com", agent_name.to_lowercase()),
            items: (0..items)
                .map(|i| NormalizedContact::new(format!("C{}", i), format!("{}", i), ""))
                .collect(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_fetch_orders_by_agent_name() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        insert_list(&mut conn, &batch("1", "Zed", 1)).await.unwrap();
        insert_list(&mut conn, &batch("2", "Amy", 2)).await.unwrap();
        insert_list(&mut conn, &batch("3", "Max", 3)).await.unwrap();
        drop(conn);

        let names: Vec<String> = fetch_all_lists(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.agent_name)
            .collect();
        assert_eq!(names, vec!["Amy", "Max", "Zed"]);
    }

    #[tokio::test]
    async fn test_items_round_trip_through_json_column() {
        let pool = init_memory_database().await.unwrap();
        let original = batch("1", "Amy", 4);
        let mut conn = pool.acquire().await.unwrap();
        insert_list(&mut conn, &original).await.unwrap();
        drop(conn);

        let stored = fetch_all_lists(&pool).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].items, original.items);
        assert_eq!(stored[0].batch_id, original.batch_id);
        assert_eq!(stored[0].agent_id, original.agent_id);
        assert_eq!(stored[0].agent_email, original.agent_email);
    }

    #[tokio::test]
    async fn test_delete_all_lists() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        insert_list(&mut conn, &batch("1", "Amy", 1)).await.unwrap();
        insert_list(&mut conn, &batch("2", "Bob", 1)).await.unwrap();

        assert_eq!(delete_all_lists(&mut conn).await.unwrap(), 2);
        drop(conn);

        assert!(fetch_all_lists(&pool).await.unwrap().is_empty());
    }
}
