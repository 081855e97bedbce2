use super::email_filter::normalize;
use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

/// Emails known to be registered.
pub static TAKEN_EMAILS: Lazy<Cache<String, ()>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(50_000)
        .time_to_live(Duration::from_secs(86400))
        .build()
});

pub async fn mark_taken(email: &str) {
    TAKEN_EMAILS.insert(normalize(email), ()).await;
}

pub async fn is_taken(email: &str) -> bool {
    TAKEN_EMAILS.get(&normalize(email)).await.is_some()
}

/// Loads accounts that signed in during the last `days` days.
pub async fn warmup_email_cache(pool: &MySqlPool, days: u32, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String,)>(
        r#"
        SELECT email
        FROM users
        WHERE last_login_at >= NOW() - INTERVAL ? DAY
        ORDER BY last_login_at DESC
        "#,
    )
    .bind(days)
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (email,) = row?;
        batch.push(normalize(&email));
        total += 1;

        if batch.len() >= batch_size {
            flush(&mut batch).await;
        }
    }
    flush(&mut batch).await;

    log::info!(
        "Email cache warmup complete: {} recent accounts (last {} days)",
        total,
        days
    );

    Ok(())
}

async fn flush(batch: &mut Vec<String>) {
    let inserts: Vec<_> = batch
        .drain(..)
        .map(|email| TAKEN_EMAILS.insert(email, ()))
        .collect();
    futures::future::join_all(inserts).await;
}
