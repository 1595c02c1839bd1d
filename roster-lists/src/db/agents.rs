//! Agent roster database operations
//!
//! The distribution core only ever reads the roster through
//! [`fetch_all_agents`].

use roster_common::db::{Agent, AgentRef};
use roster_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::parse_timestamp;

/// Insert a new agent
///
/// Fails with `Conflict` when the email is already registered.
pub async fn insert_agent(pool: &SqlitePool, agent: &Agent) -> Result<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO agents (id, name, email, mobile_number, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&agent.id)
    .bind(&agent.name)
    .bind(&agent.email)
    .bind(&agent.mobile_number)
    .bind(agent.created_at.to_rfc3339())
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(Error::Conflict(
            "Agent with this email already exists".to_string(),
        )),
        Err(e) => Err(Error::Database(e)),
    }
}

/// Roster in insertion order, as consumed by the distributor
///
/// The order is stable between calls as long as the roster is unchanged.
pub async fn fetch_all_agents(pool: &SqlitePool) -> Result<Vec<AgentRef>> {
    let rows = sqlx::query("SELECT id, name, email FROM agents ORDER BY rowid ASC")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| AgentRef {
            id: row.get("id"),
            name: row.get("name"),
            email: row.get("email"),
        })
        .collect())
}

/// All agents, newest first
pub async fn list_agents(pool: &SqlitePool) -> Result<Vec<Agent>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, email, mobile_number, created_at
        FROM agents
        ORDER BY created_at DESC, rowid DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(agent_from_row).collect()
}

/// Delete an agent together with every list assigned to it
///
/// Returns `NotFound` when no agent has this id.
pub async fn delete_agent(pool: &SqlitePool, id: &str) -> Result<()> {
    let mut tx = pool.begin().await?;

    let deleted = sqlx::query("DELETE FROM agents WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if deleted == 0 {
        tx.rollback().await?;
        return Err(Error::NotFound(format!("Agent not found: {}", id)));
    }

    let lists = sqlx::query("DELETE FROM distributed_lists WHERE agent_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    tracing::info!(agent_id = %id, lists_removed = lists, "Agent deleted");
    Ok(())
}

fn agent_from_row(row: &SqliteRow) -> Result<Agent> {
    let created_at: String = row.get("created_at");
    Ok(Agent {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        mobile_number: row.get("mobile_number"),
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use roster_common::db::init_memory_database;

    fn agent(id: &str, email: &str, minutes_ago: i64) -> Agent {
        Agent {
            id: id.to_string(),
            name: format!("Agent {}", id),
            email: email.to_string(),
            mobile_number: "+15550000".to_string(),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn test_fetch_all_agents_insertion_order() {
        let pool = init_memory_database().await.unwrap();
        insert_agent(&pool, &agent("b", "b@example.com", 0)).await.unwrap();
        insert_agent(&pool, &agent("a", "a@example.com", 5)).await.unwrap();
        insert_agent(&pool, &agent("c", "c@example.com", 1)).await.unwrap();

        let ids: Vec<String> = fetch_all_agents(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_list_agents_newest_first() {
        let pool = init_memory_database().await.unwrap();
        insert_agent(&pool, &agent("old", "old@example.com", 60)).await.unwrap();
        insert_agent(&pool, &agent("new", "new@example.com", 0)).await.unwrap();

        let agents = list_agents(&pool).await.unwrap();
        assert_eq!(agents[0].id, "new");
        assert_eq!(agents[1].id, "old");
    }

    #[tokio::test]
    async fn test_duplicate_email_conflict() {
        let pool = init_memory_database().await.unwrap();
        insert_agent(&pool, &agent("a", "same@example.com", 0)).await.unwrap();

        let err = insert_agent(&pool, &agent("b", "same@example.com", 0)).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(list_agents(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_agents_round_trips_fields() {
        let pool = init_memory_database().await.unwrap();
        let original = agent("a", "a@example.com", 0);
        insert_agent(&pool, &original).await.unwrap();

        let found = list_agents(&pool).await.unwrap().remove(0);
        assert_eq!(found.email, original.email);
        assert_eq!(found.mobile_number, original.mobile_number);
        assert_eq!(found.created_at.timestamp(), original.created_at.timestamp());
    }

    #[tokio::test]
    async fn test_delete_agent_removes_only_its_lists() {
        let pool = init_memory_database().await.unwrap();
        insert_agent(&pool, &agent("a", "a@example.com", 0)).await.unwrap();
        insert_agent(&pool, &agent("b", "b@example.com", 0)).await.unwrap();

        for (id, owner) in [("l1", "a"), ("l2", "b")] {
            sqlx::query(
                r#"
                INSERT INTO distributed_lists
                    (id, agent_id, agent_name, agent_email, items, upload_batch, created_at)
                VALUES (?, ?, 'x', 'x@example.com', '[]', '1', '2025-01-01T00:00:00+00:00')
                "#,
            )
            .bind(id)
            .bind(owner)
            .execute(&pool)
            .await
            .unwrap();
        }

        delete_agent(&pool, "a").await.unwrap();

        let remaining: Vec<String> = sqlx::query_scalar("SELECT agent_id FROM distributed_lists")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, vec!["b"]);
        assert_eq!(fetch_all_agents(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_unknown_agent_not_found() {
        let pool = init_memory_database().await.unwrap();
        let err = delete_agent(&pool, "ghost").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
