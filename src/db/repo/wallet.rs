//! Wallet transactions, cached balances, and withdrawal requests.
//!
//! The conn-level helpers here are shared with the earning, incentive, and
//! referral submodules so their mutations can credit the wallet inside their
//! own transaction.

use super::{parse_money, Repository};
use crate::domain::{
    Money, OrderId, PartnerId, TimeMs, TxStatus, TxType, Wallet, WalletTransaction,
    WithdrawalMethod, WithdrawalRequest, WithdrawalStatus,
};
use crate::error::AppError;
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;

const WEEK_MS: i64 = 7 * 86_400_000;
const MONTH_MS: i64 = 30 * 86_400_000;

/// Append a transaction row. The UNIQUE reference_no index is the
/// collision check for generated reference numbers.
pub(crate) async fn insert_transaction(
    conn: &mut SqliteConnection,
    t: &WalletTransaction,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO wallet_transactions (
            id, partner_id, title, description, amount, tx_type, status,
            reference_no, order_id, referral_id, created_at_ms, completed_at_ms
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&t.id)
    .bind(t.partner_id.as_str())
    .bind(&t.title)
    .bind(&t.description)
    .bind(t.amount.to_canonical_string())
    .bind(t.tx_type.as_str())
    .bind(t.status.as_str())
    .bind(&t.reference_no)
    .bind(t.order_id.as_ref().map(|o| o.as_str().to_string()))
    .bind(t.referral_id)
    .bind(t.created_at_ms.as_ms())
    .bind(t.completed_at_ms.map(|t| t.as_ms()))
    .execute(conn)
    .await?;

    Ok(())
}

/// Fetch the cached wallet row, creating it lazily (zero balance) if absent.
pub(crate) async fn ensure_wallet(
    conn: &mut SqliteConnection,
    partner: &PartnerId,
    now: TimeMs,
) -> Result<Wallet, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO wallets (partner_id, balance, weekly_earnings, monthly_earnings, lifetime_earnings, updated_at_ms)
        VALUES (?, '0', '0', '0', '0', ?)
        ON CONFLICT(partner_id) DO NOTHING
        "#,
    )
    .bind(partner.as_str())
    .bind(now.as_ms())
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query(
        r#"
        SELECT partner_id, balance, weekly_earnings, monthly_earnings, lifetime_earnings, updated_at_ms
        FROM wallets WHERE partner_id = ?
        "#,
    )
    .bind(partner.as_str())
    .fetch_one(&mut *conn)
    .await?;

    Ok(map_wallet_row(row))
}

/// Overwrite the cached wallet row with new totals.
pub(crate) async fn store_wallet(
    conn: &mut SqliteConnection,
    w: &Wallet,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE wallets
        SET balance = ?, weekly_earnings = ?, monthly_earnings = ?, lifetime_earnings = ?, updated_at_ms = ?
        WHERE partner_id = ?
        "#,
    )
    .bind(w.balance.to_canonical_string())
    .bind(w.weekly_earnings.to_canonical_string())
    .bind(w.monthly_earnings.to_canonical_string())
    .bind(w.lifetime_earnings.to_canonical_string())
    .bind(w.updated_at_ms.as_ms())
    .bind(w.partner_id.as_str())
    .execute(conn)
    .await?;

    Ok(())
}

/// Increment the cached balance and earning counters for a Completed credit.
/// Must run inside the same transaction as the credit's ledger insert.
pub(crate) async fn apply_completed_credit(
    conn: &mut SqliteConnection,
    partner: &PartnerId,
    amount: Money,
    now: TimeMs,
) -> Result<Wallet, sqlx::Error> {
    let mut wallet = ensure_wallet(conn, partner, now).await?;
    wallet.balance = wallet.balance + amount;
    wallet.weekly_earnings = wallet.weekly_earnings + amount;
    wallet.monthly_earnings = wallet.monthly_earnings + amount;
    wallet.lifetime_earnings = wallet.lifetime_earnings + amount;
    wallet.updated_at_ms = now;
    store_wallet(conn, &wallet).await?;
    Ok(wallet)
}

pub(crate) fn map_wallet_row(row: sqlx::sqlite::SqliteRow) -> Wallet {
    Wallet {
        partner_id: PartnerId::new(row.get::<String, _>("partner_id")),
        balance: parse_money("wallets.balance", &row.get::<String, _>("balance")),
        weekly_earnings: parse_money(
            "wallets.weekly_earnings",
            &row.get::<String, _>("weekly_earnings"),
        ),
        monthly_earnings: parse_money(
            "wallets.monthly_earnings",
            &row.get::<String, _>("monthly_earnings"),
        ),
        lifetime_earnings: parse_money(
            "wallets.lifetime_earnings",
            &row.get::<String, _>("lifetime_earnings"),
        ),
        updated_at_ms: TimeMs::new(row.get("updated_at_ms")),
    }
}

fn map_tx_row(row: sqlx::sqlite::SqliteRow) -> WalletTransaction {
    let amount_str: String = row.get("amount");
    let type_str: String = row.get("tx_type");
    let status_str: String = row.get("status");
    WalletTransaction {
        id: row.get("id"),
        partner_id: PartnerId::new(row.get::<String, _>("partner_id")),
        title: row.get("title"),
        description: row.get("description"),
        amount: parse_money("wallet_transactions.amount", &amount_str),
        tx_type: TxType::parse(&type_str).unwrap_or(TxType::Credit),
        status: TxStatus::parse(&status_str).unwrap_or(TxStatus::Pending),
        reference_no: row.get("reference_no"),
        order_id: row.get::<Option<String>, _>("order_id").map(OrderId::new),
        referral_id: row.get("referral_id"),
        created_at_ms: TimeMs::new(row.get("created_at_ms")),
        completed_at_ms: row
            .get::<Option<i64>, _>("completed_at_ms")
            .map(TimeMs::new),
    }
}

fn map_withdrawal_row(row: sqlx::sqlite::SqliteRow) -> WithdrawalRequest {
    let method_str: String = row.get("method");
    let status_str: String = row.get("status");
    WithdrawalRequest {
        id: row.get("id"),
        partner_id: PartnerId::new(row.get::<String, _>("partner_id")),
        amount: parse_money("withdrawal_requests.amount", &row.get::<String, _>("amount")),
        fee: parse_money("withdrawal_requests.fee", &row.get::<String, _>("fee")),
        method: WithdrawalMethod::parse(&method_str).unwrap_or(WithdrawalMethod::BankTransfer),
        status: WithdrawalStatus::parse(&status_str).unwrap_or(WithdrawalStatus::Requested),
        destination: row.get("destination"),
        reference_no: row.get("reference_no"),
        transaction_id: row.get("transaction_id"),
        created_at_ms: TimeMs::new(row.get("created_at_ms")),
        updated_at_ms: TimeMs::new(row.get("updated_at_ms")),
    }
}

impl Repository {
    /// Record a Completed credit and update the cached wallet atomically.
    pub async fn insert_credit(
        &self,
        t: &WalletTransaction,
    ) -> Result<Wallet, AppError> {
        let mut tx = self.pool().begin().await?;
        insert_transaction(&mut tx, t).await?;
        let wallet = apply_completed_credit(&mut tx, &t.partner_id, t.amount, t.created_at_ms).await?;
        tx.commit().await?;
        Ok(wallet)
    }

    /// Record a debit (signed negative amount) after checking the balance
    /// inside the same transaction. Used for both plain debits and
    /// withdrawal holds.
    pub async fn insert_debit(&self, t: &WalletTransaction) -> Result<Wallet, AppError> {
        let mut tx = self.pool().begin().await?;
        let wallet = debit_in_tx(&mut tx, t).await?;
        tx.commit().await?;
        Ok(wallet)
    }

    /// Record the withdrawal hold debit and the request row atomically.
    pub async fn insert_withdrawal(
        &self,
        request: &WithdrawalRequest,
        debit: &WalletTransaction,
    ) -> Result<Wallet, AppError> {
        let mut tx = self.pool().begin().await?;
        let wallet = debit_in_tx(&mut tx, debit).await?;

        sqlx::query(
            r#"
            INSERT INTO withdrawal_requests (
                id, partner_id, amount, fee, method, destination, status,
                reference_no, transaction_id, created_at_ms, updated_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&request.id)
        .bind(request.partner_id.as_str())
        .bind(request.amount.to_canonical_string())
        .bind(request.fee.to_canonical_string())
        .bind(request.method.as_str())
        .bind(&request.destination)
        .bind(request.status.as_str())
        .bind(&request.reference_no)
        .bind(&request.transaction_id)
        .bind(request.created_at_ms.as_ms())
        .bind(request.updated_at_ms.as_ms())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(wallet)
    }

    pub async fn get_withdrawal(&self, id: &str) -> Result<Option<WithdrawalRequest>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT id, partner_id, amount, fee, method, destination, status,
                   reference_no, transaction_id, created_at_ms, updated_at_ms
            FROM withdrawal_requests WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(map_withdrawal_row))
    }

    /// Apply an external settlement outcome. Transition validation, the
    /// debit status change, and the hold release on failure/cancellation
    /// all share one transaction.
    pub async fn transition_withdrawal(
        &self,
        id: &str,
        next: WithdrawalStatus,
        now: TimeMs,
    ) -> Result<WithdrawalRequest, AppError> {
        let mut tx = self.pool().begin().await?;

        let row = sqlx::query(
            r#"
            SELECT id, partner_id, amount, fee, method, destination, status,
                   reference_no, transaction_id, created_at_ms, updated_at_ms
            FROM withdrawal_requests WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let mut request = row
            .map(map_withdrawal_row)
            .ok_or_else(|| AppError::NotFound(format!("withdrawal {} not found", id)))?;

        if !request.status.can_transition_to(next) {
            return Err(AppError::Conflict(format!(
                "withdrawal {} cannot move from {} to {}",
                id,
                request.status.as_str(),
                next.as_str()
            )));
        }

        sqlx::query("UPDATE withdrawal_requests SET status = ?, updated_at_ms = ? WHERE id = ?")
            .bind(next.as_str())
            .bind(now.as_ms())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        match next {
            WithdrawalStatus::Completed => {
                sqlx::query(
                    "UPDATE wallet_transactions SET status = ?, completed_at_ms = ? WHERE id = ?",
                )
                .bind(TxStatus::Completed.as_str())
                .bind(now.as_ms())
                .bind(&request.transaction_id)
                .execute(&mut *tx)
                .await?;
            }
            WithdrawalStatus::Failed | WithdrawalStatus::Cancelled => {
                let tx_status = if next == WithdrawalStatus::Failed {
                    TxStatus::Failed
                } else {
                    TxStatus::Cancelled
                };
                sqlx::query("UPDATE wallet_transactions SET status = ? WHERE id = ?")
                    .bind(tx_status.as_str())
                    .bind(&request.transaction_id)
                    .execute(&mut *tx)
                    .await?;

                // Release the hold: the debit no longer affects the balance.
                let held = request.amount + request.fee;
                let mut wallet = ensure_wallet(&mut tx, &request.partner_id, now).await?;
                wallet.balance = wallet.balance + held;
                wallet.updated_at_ms = now;
                store_wallet(&mut tx, &wallet).await?;
            }
            WithdrawalStatus::Processing | WithdrawalStatus::Requested => {}
        }

        tx.commit().await?;

        request.status = next;
        request.updated_at_ms = now;
        Ok(request)
    }

    pub async fn get_wallet(&self, partner: &PartnerId) -> Result<Option<Wallet>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT partner_id, balance, weekly_earnings, monthly_earnings, lifetime_earnings, updated_at_ms
            FROM wallets WHERE partner_id = ?
            "#,
        )
        .bind(partner.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(map_wallet_row))
    }

    /// Query transactions for a partner, newest first.
    pub async fn query_transactions(
        &self,
        partner: &PartnerId,
        from_ms: Option<TimeMs>,
        to_ms: Option<TimeMs>,
        limit: i64,
    ) -> Result<Vec<WalletTransaction>, AppError> {
        let from_ms = from_ms.unwrap_or(TimeMs::new(0)).as_ms();
        let to_ms = to_ms.unwrap_or(TimeMs::new(i64::MAX)).as_ms();

        let rows = sqlx::query(
            r#"
            SELECT id, partner_id, title, description, amount, tx_type, status,
                   reference_no, order_id, referral_id, created_at_ms, completed_at_ms
            FROM wallet_transactions
            WHERE partner_id = ? AND created_at_ms >= ? AND created_at_ms <= ?
            ORDER BY created_at_ms DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(partner.as_str())
        .bind(from_ms)
        .bind(to_ms)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(map_tx_row).collect())
    }

    /// Recompute the wallet from the transaction log alone and overwrite
    /// the cached row. The balance counts Completed credits plus debits
    /// that still hold funds (Pending or Completed); the earning windows
    /// count Completed credits only.
    ///
    /// Sums are computed in Rust to preserve decimal precision; SQLite's
    /// SUM aggregate returns REAL.
    pub async fn refresh_wallet(
        &self,
        partner: &PartnerId,
        now: TimeMs,
    ) -> Result<Wallet, AppError> {
        let mut tx = self.pool().begin().await?;

        let rows = sqlx::query(
            r#"
            SELECT amount, tx_type, status, created_at_ms
            FROM wallet_transactions
            WHERE partner_id = ?
            ORDER BY created_at_ms ASC, id ASC
            "#,
        )
        .bind(partner.as_str())
        .fetch_all(&mut *tx)
        .await?;

        let mut wallet = Wallet::empty(partner.clone(), now);

        for row in rows {
            let amount = parse_money(
                "wallet_transactions.amount",
                &row.get::<String, _>("amount"),
            );
            let tx_type = TxType::parse(&row.get::<String, _>("tx_type"));
            let status = TxStatus::parse(&row.get::<String, _>("status"));
            let created_at: i64 = row.get("created_at_ms");

            let (Some(tx_type), Some(status)) = (tx_type, status) else {
                continue;
            };

            match tx_type {
                TxType::Credit if status == TxStatus::Completed => {
                    wallet.balance = wallet.balance + amount;
                    wallet.lifetime_earnings = wallet.lifetime_earnings + amount;
                    if created_at >= now.as_ms() - WEEK_MS {
                        wallet.weekly_earnings = wallet.weekly_earnings + amount;
                    }
                    if created_at >= now.as_ms() - MONTH_MS {
                        wallet.monthly_earnings = wallet.monthly_earnings + amount;
                    }
                }
                TxType::Debit if status.affects_balance() => {
                    // Debit amounts are stored negative.
                    wallet.balance = wallet.balance + amount;
                }
                _ => {}
            }
        }

        ensure_wallet(&mut tx, partner, now).await?;
        store_wallet(&mut tx, &wallet).await?;

        tx.commit().await?;
        Ok(wallet)
    }
}

/// Check-then-debit under one transaction: rejects when the signed amount
/// would take the balance negative.
async fn debit_in_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    t: &WalletTransaction,
) -> Result<Wallet, AppError> {
    let mut wallet = ensure_wallet(tx, &t.partner_id, t.created_at_ms).await?;
    let debited = t.amount.abs();
    if debited > wallet.balance {
        return Err(AppError::InsufficientBalance(format!(
            "debit of {} exceeds balance {}",
            debited, wallet.balance
        )));
    }

    insert_transaction(tx, t).await?;
    wallet.balance = wallet.balance - debited;
    wallet.updated_at_ms = t.created_at_ms;
    store_wallet(tx, &wallet).await?;
    Ok(wallet)
}
