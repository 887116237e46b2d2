//! Basic usage example for dbwrap
//!
//! Run with: cargo run --example basic -p dbwrap
//!
//! Set the connection in a .env file or the environment:
//! DB_HOST=localhost
//! DB_USER=root
//! DB_PASS=secret
//! DB_NAME=dbwrap_example
//! LOG_PATH=logs/db.log
//! DEBUG=true

use dbwrap::{ConnectOptions, Database, DbError, LogSettings, Value, init_file_logging};

#[tokio::main]
async fn main() -> Result<(), DbError> {
    // Load .env and route the wrapper's events to LOG_PATH
    let settings = LogSettings::from_env()?;
    if settings.path.is_some() {
        init_file_logging(&settings)?;
    }

    let opts = ConnectOptions::from_env()?;
    let db = Database::connect_mysql(&opts).await?;

    db.batch(
        "CREATE TABLE IF NOT EXISTS users (
            id INT AUTO_INCREMENT PRIMARY KEY,
            username VARCHAR(50) NOT NULL,
            email VARCHAR(100) NOT NULL
        )",
    )
    .await?;
    db.delete_from_table("users", "", &[]).await?;

    for (username, email) in [("alice", "alice@example.com"), ("bob", "bob@example.com")] {
        let outcome = db
            .insert_into_table(
                "users",
                &[("username", Value::from(username)), ("email", Value::from(email))],
            )
            .await?;
        println!("Inserted {username} with id {:?}", outcome.last_insert_id);
    }

    let rows = db.get_all_from_table("users", "", "id", "DESC", Some(10)).await?;
    println!("All users (newest first):");
    for row in &rows {
        let id: i64 = row.try_get("id")?;
        let username: String = row.try_get("username")?;
        println!("  {id}: {username}");
    }

    let names = db.get_col_from_table("users", "username", "", "", "DESC", None).await?;
    println!("Usernames as JSON: {}", names.to_json());

    let updated = db
        .update_table(
            "users",
            &[("email", Value::from("alice@new.example.com"))],
            "username = ?",
            &[Value::from("alice")],
        )
        .await?;
    println!("Updated {} row(s)", updated.affected);

    let random = db.get_all_random_from_table("users", "").await?;
    if let Some(row) = random.first() {
        println!("Random pick: {:?}", row.get("username"));
    }

    let found = db
        .get_all_from_table_prep("users", "email LIKE ?", &[Value::from("%example.com")])
        .await?;
    println!("Matched {} user(s) by email", found.len());

    // Failures come back as errors and are logged by the default monitor
    if let Err(e) = db.get_all_from_table("no_such_table", "", "", "", None).await {
        println!("Expected failure: {e}");
    }

    db.disconnect().await?;
    Ok(())
}
