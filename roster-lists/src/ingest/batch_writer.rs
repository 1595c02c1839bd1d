//! Batch writer: full-replace persist of one distribution run
//!
//! The previous distribution is deleted and the new one inserted inside one
//! transaction, so a failure at any point leaves the previous distribution
//! untouched. Empty buckets are not persisted.

use chrono::{DateTime, Utc};
use roster_common::db::DistributionBatch;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use super::distributor::Bucket;
use super::IngestError;
use crate::db::lists;

/// Build the records for one run, one per non-empty bucket, in bucket order
pub fn batches_for(buckets: Vec<Bucket>, created_at: DateTime<Utc>) -> Vec<DistributionBatch> {
    let batch_id = roster_common::time::batch_id_at(created_at);

    buckets
        .into_iter()
        .filter(|bucket| !bucket.items.is_empty())
        .map(|bucket| DistributionBatch {
            id: Uuid::new_v4().to_string(),
            batch_id: batch_id.clone(),
            agent_id: bucket.agent.id,
            agent_name: bucket.agent.name,
            agent_email: bucket.agent.email,
            items: bucket.items,
            created_at,
        })
        .collect()
}

/// Replace the stored distribution with the given buckets
///
/// Returns the newly written records. On error nothing has changed.
pub async fn replace_distribution(
    pool: &SqlitePool,
    buckets: Vec<Bucket>,
) -> Result<Vec<DistributionBatch>, IngestError> {
    let batches = batches_for(buckets, roster_common::time::now());

    let mut tx = pool.begin().await.map_err(persistence)?;

    let removed = lists::delete_all_lists(&mut tx)
        .await
        .map_err(IngestError::from_store)?;
    debug!(removed, "Previous distribution cleared (uncommitted)");

    for batch in &batches {
        lists::insert_list(&mut tx, batch)
            .await
            .map_err(IngestError::from_store)?;
    }

    // Dropping `tx` on any early return above rolls the transaction back
    tx.commit().await.map_err(persistence)?;

    if let Some(first) = batches.first() {
        info!(
            batch_id = %first.batch_id,
            lists = batches.len(),
            replaced = removed,
            "Distribution persisted"
        );
    }

    Ok(batches)
}

fn persistence(err: sqlx::Error) -> IngestError {
    IngestError::PersistenceFailure(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_common::db::{init_memory_database, AgentRef, NormalizedContact};

    fn bucket(name: &str, items: usize) -> Bucket {
        Bucket {
            agent: AgentRef {
                id: format!("id-{}", name),
                name: name.to_string(),
                email: format!("{}@example.com", name),
            },
            items: (0..items)
                .map(|i| NormalizedContact::new(format!("{}-{}", name, i), "1", ""))
                .collect(),
        }
    }

    #[test]
    fn test_batches_skip_empty_buckets_and_share_id() {
        let batches = batches_for(vec![bucket("a", 2), bucket("b", 0), bucket("c", 1)], Utc::now());

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].agent_name, "a");
        assert_eq!(batches[1].agent_name, "c");
        assert_eq!(batches[0].batch_id, batches[1].batch_id);
        assert_ne!(batches[0].id, batches[1].id);
    }

    #[tokio::test]
    async fn test_replace_discards_previous_run() {
        let pool = init_memory_database().await.unwrap();

        replace_distribution(&pool, vec![bucket("old", 3)]).await.unwrap();
        let written = replace_distribution(&pool, vec![bucket("new1", 1), bucket("new2", 1)])
            .await
            .unwrap();

        let stored = lists::fetch_all_lists(&pool).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|b| b.agent_name.starts_with("new")));
        assert!(stored.iter().all(|b| b.batch_id == written[0].batch_id));
    }

    #[tokio::test]
    async fn test_failed_insert_keeps_previous_run() {
        let pool = init_memory_database().await.unwrap();
        replace_distribution(&pool, vec![bucket("keep", 2)]).await.unwrap();

        sqlx::query(
            r#"
            CREATE TRIGGER reject_boom BEFORE INSERT ON distributed_lists
            WHEN NEW.agent_name = 'boom'
            BEGIN
                SELECT RAISE(ABORT, 'injected write failure');
            END
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        let err = replace_distribution(&pool, vec![bucket("first", 1), bucket("boom", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::PersistenceFailure(_)));

        let stored = lists::fetch_all_lists(&pool).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].agent_name, "keep");
        assert_eq!(stored[0].items.len(), 2);
    }
}
