use sqlx::SqliteConnection;

pub async fn fetch_setting(key: &str, conn: &mut SqliteConnection) -> Result<Option<String>, sqlx::Error> {
    let value =
        sqlx::query_scalar("SELECT value FROM platform_settings WHERE key = $1").bind(key).fetch_optional(conn).await?;
    Ok(value)
}

pub async fn store_setting(key: &str, value: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO platform_settings (key, value, updated_at) VALUES ($1, $2, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(conn)
    .await?;
    Ok(())
}
