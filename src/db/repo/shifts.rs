//! Shift open/close and duration queries.

use super::Repository;
use crate::domain::{GeoPoint, PartnerId, Shift, TimeMs};
use crate::error::{is_unique_violation, AppError};
use sqlx::Row;

fn map_shift_row(row: sqlx::sqlite::SqliteRow) -> Shift {
    let start_loc = match (
        row.get::<Option<f64>, _>("start_lat"),
        row.get::<Option<f64>, _>("start_lng"),
    ) {
        (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
        _ => None,
    };
    let end_loc = match (
        row.get::<Option<f64>, _>("end_lat"),
        row.get::<Option<f64>, _>("end_lng"),
    ) {
        (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
        _ => None,
    };
    Shift {
        id: row.get("id"),
        partner_id: PartnerId::new(row.get::<String, _>("partner_id")),
        start_ms: TimeMs::new(row.get("start_ms")),
        end_ms: row.get::<Option<i64>, _>("end_ms").map(TimeMs::new),
        start_location: start_loc,
        end_location: end_loc,
    }
}

impl Repository {
    /// Open a shift and flip the partner online, atomically. The partial
    /// unique index on open shifts makes the second of two racing starts
    /// fail cleanly with a Conflict.
    pub async fn open_shift(
        &self,
        partner: &PartnerId,
        now: TimeMs,
        location: Option<GeoPoint>,
    ) -> Result<Shift, AppError> {
        let mut tx = self.pool().begin().await?;

        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM partners WHERE id = ?")
            .bind(partner.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound(format!("partner {} not found", partner)));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO shifts (partner_id, start_ms, end_ms, start_lat, start_lng)
            VALUES (?, ?, NULL, ?, ?)
            "#,
        )
        .bind(partner.as_str())
        .bind(now.as_ms())
        .bind(location.map(|l| l.lat))
        .bind(location.map(|l| l.lng))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("partner {} already has an open shift", partner))
            } else {
                e.into()
            }
        })?;

        let shift_id = result.last_insert_rowid();

        sqlx::query("UPDATE partners SET online = 1, current_shift_id = ? WHERE id = ?")
            .bind(shift_id)
            .bind(partner.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Shift {
            id: shift_id,
            partner_id: partner.clone(),
            start_ms: now,
            end_ms: None,
            start_location: location,
            end_location: None,
        })
    }

    /// Close the open shift and clear the partner flags, atomically.
    pub async fn close_shift(
        &self,
        partner: &PartnerId,
        now: TimeMs,
        location: Option<GeoPoint>,
    ) -> Result<Shift, AppError> {
        let mut tx = self.pool().begin().await?;

        let row = sqlx::query(
            r#"
            SELECT id, partner_id, start_ms, end_ms, start_lat, start_lng, end_lat, end_lng
            FROM shifts
            WHERE partner_id = ? AND end_ms IS NULL
            "#,
        )
        .bind(partner.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let mut shift = row
            .map(map_shift_row)
            .ok_or_else(|| AppError::NotFound(format!("no open shift for partner {}", partner)))?;

        sqlx::query("UPDATE shifts SET end_ms = ?, end_lat = ?, end_lng = ? WHERE id = ?")
            .bind(now.as_ms())
            .bind(location.map(|l| l.lat))
            .bind(location.map(|l| l.lng))
            .bind(shift.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE partners SET online = 0, current_shift_id = NULL WHERE id = ?")
            .bind(partner.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        shift.end_ms = Some(now);
        shift.end_location = location;
        Ok(shift)
    }

    pub async fn get_open_shift(&self, partner: &PartnerId) -> Result<Option<Shift>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT id, partner_id, start_ms, end_ms, start_lat, start_lng, end_lat, end_lng
            FROM shifts
            WHERE partner_id = ? AND end_ms IS NULL
            "#,
        )
        .bind(partner.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(map_shift_row))
    }

    /// Shifts overlapping the window starting at `from_ms`, oldest first:
    /// still open, or ended at or after the cutoff. A long-running shift
    /// that started before the cutoff still contributes its overlap.
    pub async fn query_shifts_overlapping(
        &self,
        partner: &PartnerId,
        from_ms: TimeMs,
    ) -> Result<Vec<Shift>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT id, partner_id, start_ms, end_ms, start_lat, start_lng, end_lat, end_lng
            FROM shifts
            WHERE partner_id = ? AND (end_ms IS NULL OR end_ms >= ?)
            ORDER BY start_ms ASC, id ASC
            "#,
        )
        .bind(partner.as_str())
        .bind(from_ms.as_ms())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(map_shift_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::setup_test_db;
    use super::*;

    #[tokio::test]
    async fn test_open_shift_requires_partner() {
        let (repo, _temp) = setup_test_db().await;
        let err = repo
            .open_shift(&PartnerId::new("ghost"), TimeMs::new(1000), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_second_open_shift_is_conflict() {
        let (repo, _temp) = setup_test_db().await;
        let partner = PartnerId::new("p1");
        repo.upsert_partner(&partner, None, TimeMs::new(0))
            .await
            .unwrap();

        repo.open_shift(&partner, TimeMs::new(1000), None)
            .await
            .unwrap();
        let err = repo
            .open_shift(&partner, TimeMs::new(2000), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // Partner flags reflect the surviving shift.
        let p = repo.get_partner(&partner).await.unwrap().unwrap();
        assert!(p.online);
        assert!(p.current_shift_id.is_some());
    }

    #[tokio::test]
    async fn test_close_shift_clears_partner_flags() {
        let (repo, _temp) = setup_test_db().await;
        let partner = PartnerId::new("p1");
        repo.upsert_partner(&partner, None, TimeMs::new(0))
            .await
            .unwrap();

        let opened = repo
            .open_shift(
                &partner,
                TimeMs::new(1000),
                Some(GeoPoint { lat: 18.5, lng: 73.8 }),
            )
            .await
            .unwrap();
        let closed = repo
            .close_shift(&partner, TimeMs::new(5000), None)
            .await
            .unwrap();
        assert_eq!(closed.id, opened.id);
        assert_eq!(closed.end_ms, Some(TimeMs::new(5000)));
        assert_eq!(closed.start_location, Some(GeoPoint { lat: 18.5, lng: 73.8 }));

        let p = repo.get_partner(&partner).await.unwrap().unwrap();
        assert!(!p.online);
        assert!(p.current_shift_id.is_none());
        assert!(repo.get_open_shift(&partner).await.unwrap().is_none());

        // Closing again is NotFound, and reopening is allowed.
        let err = repo
            .close_shift(&partner, TimeMs::new(6000), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        repo.open_shift(&partner, TimeMs::new(7000), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_query_keeps_shifts_straddling_the_cutoff() {
        let (repo, _temp) = setup_test_db().await;
        let partner = PartnerId::new("p1");
        repo.upsert_partner(&partner, None, TimeMs::new(0))
            .await
            .unwrap();

        // Closed before the cutoff: excluded.
        repo.open_shift(&partner, TimeMs::new(1000), None)
            .await
            .unwrap();
        repo.close_shift(&partner, TimeMs::new(2000), None)
            .await
            .unwrap();
        // Started before the cutoff, ended inside the window.
        let straddling = repo
            .open_shift(&partner, TimeMs::new(3000), None)
            .await
            .unwrap();
        repo.close_shift(&partner, TimeMs::new(6000), None)
            .await
            .unwrap();
        // Started before the cutoff, still open.
        let open = repo
            .open_shift(&partner, TimeMs::new(4000), None)
            .await
            .unwrap();

        let shifts = repo
            .query_shifts_overlapping(&partner, TimeMs::new(5000))
            .await
            .unwrap();
        let ids: Vec<i64> = shifts.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![straddling.id, open.id]);
    }
}
