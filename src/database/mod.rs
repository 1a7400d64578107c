//! Run persistence
//!
//! Writes the run summary, and optionally one row per test, into a SQL
//! database through the sqlx `Any` driver.

mod store;

pub use store::RunStore;

use anyhow::Result;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::models::SuiteRun;

/// Persist a finished run, returning a short description of what was written
pub async fn persist_run(config: &DatabaseConfig, run: &SuiteRun) -> Result<String> {
    let store = RunStore::connect(config).await?;

    let outcome = async {
        let run_id = store.insert_run(&run.summary).await?;
        let mut message = format!("inserted run {} into {}", run_id, store.table());

        if store.records_test_cases() {
            let inserted = store.insert_test_cases(run_id, run).await?;
            message.push_str(&format!(", {inserted} test case rows"));
        }
        Ok::<_, anyhow::Error>(message)
    }
    .await;

    store.close().await;

    let message = outcome?;
    info!("Database: {}", message);
    Ok(message)
}
