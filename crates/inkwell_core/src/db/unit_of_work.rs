use log::{debug, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};

/// Runs `work` inside one IMMEDIATE transaction.
///
/// Commits when `work` returns `Ok`, rolls back when it returns `Err`. A panic
/// inside `work` drops the transaction, which also rolls back. Callers never
/// observe a partially applied write.
pub fn unit_of_work<T, E, F>(conn: &mut Connection, label: &'static str, work: F) -> Result<T, E>
where
    F: FnOnce(&Transaction<'_>) -> Result<T, E>,
    E: From<rusqlite::Error>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    match work(&tx) {
        Ok(value) => {
            tx.commit()?;
            debug!("event=unit_of_work module=db status=commit label={label}");
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback() {
                warn!(
                    "event=unit_of_work module=db status=rollback_failed label={label} error={rollback_err}"
                );
            } else {
                debug!("event=unit_of_work module=db status=rollback label={label}");
            }
            Err(err)
        }
    }
}
