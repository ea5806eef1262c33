//! Database repository for CRUD operations.
//!
//! Uses prepared statements and transactions for data integrity.

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::errors::AppError;
use crate::geo::{haversine_km, BoundingBox};
use crate::lifecycle::{derive_availability, is_expired, DEFAULT_COOLDOWN_DAYS};
use crate::models::{
    Address, BloodRequest, BloodType, Donor, DonorFields, DonorResponse, GeoPoint, Hospital,
    Location, NewBloodRequest, NewHospital, NewNotification, Notification, NotificationPriority,
    NotificationType, RelatedModel, RelatedRef, RequestStatus, RequestType, ResponseStatus,
    Urgency,
};

const DONOR_COLUMNS: &str = "id, user_id, blood_type, age, address, city, state, zipcode, \
    latitude, longitude, formatted_address, last_donation, emergency_available, is_available, \
    medical_conditions, donation_history, is_active, created_at, updated_at";

const REQUEST_COLUMNS: &str = "id, request_type, requested_by, hospital_id, hospital_name, \
    patient_name, blood_type, units_needed, units_received, urgency, address, city, state, \
    zipcode, latitude, longitude, formatted_address, contact_name, contact_number, \
    additional_info, notes, required_by, status, expires_at, closed_at, created_at, updated_at";

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, title, message, related_to, on_model, \
    priority, read, read_at, created_at, expires_at";

const HOSPITAL_COLUMNS: &str = "id, user_id, name, address, city, state, zipcode, phone, \
    email, website, latitude, longitude, formatted_address, blood_inventory, \
    emergency_available, verified, created_at";

/// Filters for listing donors.
#[derive(Debug, Clone, Default)]
pub struct DonorFilter {
    /// Restrict to these blood types. `Some(vec![])` matches nothing.
    pub blood_types: Option<Vec<BloodType>>,
    /// Restrict to donors within a radius (km) of a point.
    pub within: Option<(GeoPoint, f64)>,
}

/// Filters for listing requests.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub blood_type: Option<BloodType>,
    pub urgency: Option<Urgency>,
}

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    cooldown: Duration,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            cooldown: Duration::days(DEFAULT_COOLDOWN_DAYS),
        }
    }

    /// Cooldown used when deriving donor availability on read.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    // ==================== DONOR OPERATIONS ====================

    /// List donors, oldest last donation first (never-donated donors lead).
    pub async fn list_donors(&self, filter: &DonorFilter) -> Result<Vec<Donor>, AppError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM donors WHERE is_active = 1", DONOR_COLUMNS));

        if let Some(types) = &filter.blood_types {
            if types.is_empty() {
                return Ok(Vec::new());
            }
            push_blood_type_filter(&mut qb, types);
        }
        if let Some((center, radius_km)) = filter.within {
            push_bbox_filter(&mut qb, BoundingBox::around(center, radius_km));
        }
        qb.push(" ORDER BY last_donation ASC, created_at ASC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        let now = Utc::now();
        let donors = rows
            .iter()
            .map(|row| donor_from_row(row, self.cooldown, now))
            .filter(|donor| match filter.within {
                Some((center, radius_km)) => within_radius(donor.location.as_ref(), center, radius_km),
                None => true,
            })
            .collect();
        Ok(donors)
    }

    /// Active donors of the given types whose location falls in the box around `center`.
    ///
    /// A coarse pre-filter only: callers still check distance and availability.
    pub async fn find_donor_candidates(
        &self,
        blood_types: &[BloodType],
        center: GeoPoint,
        radius_km: f64,
    ) -> Result<Vec<Donor>, AppError> {
        if blood_types.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM donors WHERE is_active = 1 AND latitude IS NOT NULL AND longitude IS NOT NULL",
            DONOR_COLUMNS
        ));
        push_blood_type_filter(&mut qb, blood_types);
        push_bbox_filter(&mut qb, BoundingBox::around(center, radius_km));

        let rows = qb.build().fetch_all(&self.pool).await?;
        let now = Utc::now();
        Ok(rows
            .iter()
            .map(|row| donor_from_row(row, self.cooldown, now))
            .collect())
    }

    /// Get a donor by ID.
    pub async fn get_donor(&self, id: &str) -> Result<Option<Donor>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM donors WHERE id = ?", DONOR_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row
            .as_ref()
            .map(|row| donor_from_row(row, self.cooldown, Utc::now())))
    }

    /// Get the donor profile owned by a user.
    pub async fn get_donor_by_user(&self, user_id: &str) -> Result<Option<Donor>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM donors WHERE user_id = ?",
            DONOR_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .as_ref()
            .map(|row| donor_from_row(row, self.cooldown, Utc::now())))
    }

    /// User ids owning the given donor profiles. Unknown ids are skipped.
    pub async fn donor_user_ids(&self, donor_ids: &[String]) -> Result<Vec<String>, AppError> {
        if donor_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT user_id FROM donors WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in donor_ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(")");

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|row| row.get("user_id")).collect())
    }

    /// Create a donor profile for a user.
    pub async fn create_donor(&self, user_id: &str, fields: &DonorFields) -> Result<Donor, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let (latitude, longitude, formatted_address) = location_columns(fields.location.as_ref());

        sqlx::query(
            "INSERT INTO donors (id, user_id, blood_type, age, address, city, state, zipcode, latitude, longitude, formatted_address, last_donation, emergency_available, is_available, medical_conditions, donation_history, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)"
        )
        .bind(&id)
        .bind(user_id)
        .bind(fields.blood_type.as_str())
        .bind(fields.age)
        .bind(&fields.address.address)
        .bind(&fields.address.city)
        .bind(&fields.address.state)
        .bind(&fields.address.zipcode)
        .bind(latitude)
        .bind(longitude)
        .bind(formatted_address)
        .bind(fields.last_donation)
        .bind(fields.emergency_available as i32)
        .bind(fields.is_available as i32)
        .bind(serde_json::to_string(&fields.medical_conditions)?)
        .bind(serde_json::to_string(&fields.donation_history)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_donor(&id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Donor {} vanished after insert", id)))
    }

    /// Overwrite the mutable fields of a donor profile.
    pub async fn update_donor(&self, id: &str, fields: &DonorFields) -> Result<Donor, AppError> {
        let now = Utc::now();
        let (latitude, longitude, formatted_address) = location_columns(fields.location.as_ref());

        let result = sqlx::query(
            "UPDATE donors SET blood_type = ?, age = ?, address = ?, city = ?, state = ?, zipcode = ?, latitude = ?, longitude = ?, formatted_address = ?, last_donation = ?, emergency_available = ?, is_available = ?, medical_conditions = ?, donation_history = ?, updated_at = ? WHERE id = ?"
        )
        .bind(fields.blood_type.as_str())
        .bind(fields.age)
        .bind(&fields.address.address)
        .bind(&fields.address.city)
        .bind(&fields.address.state)
        .bind(&fields.address.zipcode)
        .bind(latitude)
        .bind(longitude)
        .bind(formatted_address)
        .bind(fields.last_donation)
        .bind(fields.emergency_available as i32)
        .bind(fields.is_available as i32)
        .bind(serde_json::to_string(&fields.medical_conditions)?)
        .bind(serde_json::to_string(&fields.donation_history)?)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Donor {} not found", id)));
        }

        self.get_donor(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Donor {} not found", id)))
    }

    /// Delete a donor profile.
    pub async fn delete_donor(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM donors WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Donor {} not found", id)));
        }
        Ok(())
    }

    // ==================== REQUEST OPERATIONS ====================

    /// Insert a new request in the `active` state.
    pub async fn create_request(&self, new: &NewBloodRequest) -> Result<BloodRequest, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let (latitude, longitude, formatted_address) = location_columns(new.location.as_ref());

        sqlx::query(&format!(
            "INSERT INTO blood_requests ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'active', ?, NULL, ?, ?)",
            REQUEST_COLUMNS
        ))
        .bind(&id)
        .bind(new.request_type.as_str())
        .bind(&new.requested_by)
        .bind(&new.hospital_id)
        .bind(&new.hospital_name)
        .bind(&new.patient_name)
        .bind(new.blood_type.as_str())
        .bind(new.units_needed)
        .bind(new.urgency.as_str())
        .bind(&new.address.address)
        .bind(&new.address.city)
        .bind(&new.address.state)
        .bind(&new.address.zipcode)
        .bind(latitude)
        .bind(longitude)
        .bind(formatted_address)
        .bind(&new.contact_name)
        .bind(&new.contact_number)
        .bind(&new.additional_info)
        .bind(&new.notes)
        .bind(new.required_by)
        .bind(new.expires_at)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_request(&id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Request {} vanished after insert", id)))
    }

    /// List requests, newest first.
    pub async fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<BloodRequest>, AppError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM blood_requests WHERE 1 = 1",
            REQUEST_COLUMNS
        ));
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(blood_type) = filter.blood_type {
            qb.push(" AND blood_type = ").push_bind(blood_type.as_str());
        }
        if let Some(urgency) = filter.urgency {
            qb.push(" AND urgency = ").push_bind(urgency.as_str());
        }
        qb.push(" ORDER BY created_at DESC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        let now = Utc::now();

        let mut requests = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut request = request_from_row(row, now);
            request.donors = self.list_responses(&request.id).await?;
            requests.push(request);
        }
        Ok(requests)
    }

    /// Get a request by ID, with its donor responses.
    pub async fn get_request(&self, id: &str) -> Result<Option<BloodRequest>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM blood_requests WHERE id = ?",
            REQUEST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut request = request_from_row(&row, Utc::now());
        request.donors = self.list_responses(id).await?;
        Ok(Some(request))
    }

    /// Set the status directly.
    pub async fn update_request_status(
        &self,
        id: &str,
        status: RequestStatus,
    ) -> Result<BloodRequest, AppError> {
        let result = sqlx::query("UPDATE blood_requests SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.reload_request(id, result.rows_affected()).await
    }

    /// Store received units together with the status derived from them.
    pub async fn record_units(
        &self,
        id: &str,
        units_received: i64,
        status: RequestStatus,
    ) -> Result<BloodRequest, AppError> {
        let result = sqlx::query(
            "UPDATE blood_requests SET units_received = ?, status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(units_received)
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.reload_request(id, result.rows_affected()).await
    }

    /// Close a request with a final status and updated notes.
    pub async fn close_request(
        &self,
        id: &str,
        status: RequestStatus,
        notes: &str,
        closed_at: DateTime<Utc>,
    ) -> Result<BloodRequest, AppError> {
        let result = sqlx::query(
            "UPDATE blood_requests SET status = ?, notes = ?, closed_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(notes)
        .bind(closed_at)
        .bind(closed_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.reload_request(id, result.rows_affected()).await
    }

    /// Record matched donors as `notified`. Existing entries are left untouched.
    pub async fn add_notified_donors(
        &self,
        request_id: &str,
        donor_ids: &[String],
        notified_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if donor_ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for donor_id in donor_ids {
            sqlx::query(
                "INSERT INTO request_responses (request_id, donor_id, status, notified_at, responded_at) VALUES (?, ?, 'notified', ?, NULL) ON CONFLICT(request_id, donor_id) DO NOTHING",
            )
            .bind(request_id)
            .bind(donor_id)
            .bind(notified_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Insert or update one donor's response. Keeps the original `notified_at`.
    pub async fn upsert_response(
        &self,
        request_id: &str,
        donor_id: &str,
        status: ResponseStatus,
        responded_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO request_responses (request_id, donor_id, status, notified_at, responded_at) VALUES (?, ?, ?, ?, ?) ON CONFLICT(request_id, donor_id) DO UPDATE SET status = excluded.status, responded_at = excluded.responded_at",
        )
        .bind(request_id)
        .bind(donor_id)
        .bind(status.as_str())
        .bind(responded_at)
        .bind(responded_at)
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE blood_requests SET updated_at = ? WHERE id = ?")
            .bind(responded_at)
            .bind(request_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_responses(&self, request_id: &str) -> Result<Vec<DonorResponse>, AppError> {
        let rows = sqlx::query(
            "SELECT donor_id, status, notified_at, responded_at FROM request_responses WHERE request_id = ? ORDER BY notified_at, donor_id",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(response_from_row).collect())
    }

    async fn reload_request(&self, id: &str, rows_affected: u64) -> Result<BloodRequest, AppError> {
        if rows_affected == 0 {
            return Err(AppError::NotFound("Blood request not found".to_string()));
        }
        self.get_request(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Blood request not found".to_string()))
    }

    // ==================== NOTIFICATION OPERATIONS ====================

    /// Insert notifications in one transaction. Returns how many were written.
    pub async fn insert_notifications(&self, batch: &[NewNotification]) -> Result<usize, AppError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        for n in batch {
            let (related_to, on_model) = match &n.related {
                Some(r) => (Some(r.related_to.as_str()), Some(r.on_model.as_str())),
                None => (None, None),
            };
            sqlx::query(&format!(
                "INSERT INTO notifications ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, ?, ?)",
                NOTIFICATION_COLUMNS
            ))
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&n.user_id)
            .bind(n.kind.as_str())
            .bind(&n.title)
            .bind(&n.message)
            .bind(related_to)
            .bind(on_model)
            .bind(n.priority.as_str())
            .bind(now)
            .bind(n.expires_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(batch.len())
    }

    /// A user's newest notifications.
    pub async fn list_notifications(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<Notification>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM notifications WHERE user_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
            NOTIFICATION_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(notification_from_row).collect())
    }

    /// Get a notification by ID.
    pub async fn get_notification(&self, id: &str) -> Result<Option<Notification>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM notifications WHERE id = ?",
            NOTIFICATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(notification_from_row))
    }

    /// Mark one notification read. The first read time is kept.
    pub async fn mark_notification_read(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<Notification, AppError> {
        let result = sqlx::query(
            "UPDATE notifications SET read = 1, read_at = COALESCE(read_at, ?) WHERE id = ?",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Notification not found".to_string()));
        }
        self.get_notification(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))
    }

    /// Mark every unread notification of a user read. Returns how many changed.
    pub async fn mark_all_notifications_read(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE notifications SET read = 1, read_at = COALESCE(read_at, ?) WHERE user_id = ? AND read = 0",
        )
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete a notification.
    pub async fn delete_notification(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Notification not found".to_string()));
        }
        Ok(())
    }

    // ==================== HOSPITAL OPERATIONS ====================

    /// Register a hospital.
    pub async fn create_hospital(&self, new: &NewHospital) -> Result<Hospital, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(&format!(
            "INSERT INTO hospitals ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)",
            HOSPITAL_COLUMNS
        ))
        .bind(&id)
        .bind(&new.user_id)
        .bind(&new.name)
        .bind(&new.address.address)
        .bind(&new.address.city)
        .bind(&new.address.state)
        .bind(&new.address.zipcode)
        .bind(&new.phone)
        .bind(&new.email)
        .bind(&new.website)
        .bind(new.location.latitude)
        .bind(new.location.longitude)
        .bind(&new.location.formatted_address)
        .bind(serde_json::to_string(&new.blood_inventory)?)
        .bind(new.emergency_available as i32)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_hospital(&id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Hospital {} vanished after insert", id)))
    }

    /// Get a hospital by ID.
    pub async fn get_hospital(&self, id: &str) -> Result<Option<Hospital>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM hospitals WHERE id = ?", HOSPITAL_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(hospital_from_row))
    }

    /// Hospitals within `radius_km` of `center`, nearest first.
    pub async fn hospitals_near(
        &self,
        center: GeoPoint,
        radius_km: f64,
    ) -> Result<Vec<Hospital>, AppError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM hospitals WHERE 1 = 1", HOSPITAL_COLUMNS));
        push_bbox_filter(&mut qb, BoundingBox::around(center, radius_km));

        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut hospitals: Vec<(f64, Hospital)> = rows
            .iter()
            .map(hospital_from_row)
            .map(|h| (haversine_km(center, h.location.point()), h))
            .filter(|(distance, _)| *distance <= radius_km)
            .collect();
        hospitals.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(hospitals.into_iter().map(|(_, h)| h).collect())
    }
}

// Query-building helpers

fn push_blood_type_filter(qb: &mut QueryBuilder<'_, Sqlite>, types: &[BloodType]) {
    qb.push(" AND blood_type IN (");
    let mut separated = qb.separated(", ");
    for t in types {
        separated.push_bind(t.as_str());
    }
    separated.push_unseparated(")");
}

fn push_bbox_filter(qb: &mut QueryBuilder<'_, Sqlite>, bbox: BoundingBox) {
    qb.push(" AND latitude BETWEEN ")
        .push_bind(bbox.min_lat)
        .push(" AND ")
        .push_bind(bbox.max_lat);
    // Across the antimeridian the longitude range is left to the exact distance check.
    if !bbox.wraps() {
        qb.push(" AND longitude BETWEEN ")
            .push_bind(bbox.min_lng)
            .push(" AND ")
            .push_bind(bbox.max_lng);
    }
}

fn within_radius(location: Option<&Location>, center: GeoPoint, radius_km: f64) -> bool {
    location.is_some_and(|loc| haversine_km(center, loc.point()) <= radius_km)
}

fn location_columns(location: Option<&Location>) -> (Option<f64>, Option<f64>, Option<String>) {
    match location {
        Some(loc) => (
            Some(loc.latitude),
            Some(loc.longitude),
            loc.formatted_address.clone(),
        ),
        None => (None, None, None),
    }
}

// Helper functions for row conversion

fn location_from_row(row: &SqliteRow) -> Option<Location> {
    let latitude: Option<f64> = row.get("latitude");
    let longitude: Option<f64> = row.get("longitude");
    match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(Location {
            latitude,
            longitude,
            formatted_address: row.get("formatted_address"),
        }),
        _ => None,
    }
}

fn address_from_row(row: &SqliteRow) -> Address {
    Address {
        address: row.get("address"),
        city: row.get("city"),
        state: row.get("state"),
        zipcode: row.get("zipcode"),
    }
}

fn donor_from_row(row: &SqliteRow, cooldown: Duration, now: DateTime<Utc>) -> Donor {
    let blood_type: String = row.get("blood_type");
    let emergency_available: i32 = row.get("emergency_available");
    let is_available: i32 = row.get("is_available");
    let is_active: i32 = row.get("is_active");
    let medical_conditions: Option<String> = row.get("medical_conditions");
    let donation_history: Option<String> = row.get("donation_history");
    let last_donation: Option<DateTime<Utc>> = row.get("last_donation");

    Donor {
        id: row.get("id"),
        user_id: row.get("user_id"),
        blood_type: parse_blood_type(&blood_type),
        age: row.get("age"),
        address: address_from_row(row),
        location: location_from_row(row),
        last_donation,
        emergency_available: emergency_available != 0,
        is_available: is_available != 0,
        availability_status: derive_availability(
            last_donation,
            emergency_available != 0,
            is_available != 0,
            now,
            cooldown,
        ),
        medical_conditions: medical_conditions
            .map(|s| parse_json_list(&s))
            .unwrap_or_default(),
        donation_history: donation_history
            .map(|s| parse_json_list(&s))
            .unwrap_or_default(),
        is_active: is_active != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn request_from_row(row: &SqliteRow, now: DateTime<Utc>) -> BloodRequest {
    let request_type: String = row.get("request_type");
    let blood_type: String = row.get("blood_type");
    let urgency: String = row.get("urgency");
    let status_str: String = row.get("status");
    let status = RequestStatus::parse(&status_str).unwrap_or_else(|| {
        tracing::warn!("Unknown request status {:?}, treating as active", status_str);
        RequestStatus::Active
    });
    let expires_at: DateTime<Utc> = row.get("expires_at");

    BloodRequest {
        id: row.get("id"),
        request_type: RequestType::parse(&request_type).unwrap_or_default(),
        requested_by: row.get("requested_by"),
        hospital_id: row.get("hospital_id"),
        hospital_name: row.get("hospital_name"),
        patient_name: row.get("patient_name"),
        blood_type: parse_blood_type(&blood_type),
        units_needed: row.get("units_needed"),
        units_received: row.get("units_received"),
        urgency: Urgency::parse(&urgency).unwrap_or(Urgency::Urgent),
        address: address_from_row(row),
        location: location_from_row(row),
        contact_name: row.get("contact_name"),
        contact_number: row.get("contact_number"),
        additional_info: row.get("additional_info"),
        notes: row.get("notes"),
        required_by: row.get("required_by"),
        status,
        expires_at,
        is_expired: is_expired(status, expires_at, now),
        closed_at: row.get("closed_at"),
        donors: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn response_from_row(row: &SqliteRow) -> DonorResponse {
    let status: String = row.get("status");
    DonorResponse {
        donor_id: row.get("donor_id"),
        status: ResponseStatus::parse(&status).unwrap_or(ResponseStatus::Notified),
        notified_at: row.get("notified_at"),
        responded_at: row.get("responded_at"),
    }
}

fn notification_from_row(row: &SqliteRow) -> Notification {
    let kind: String = row.get("kind");
    let priority: String = row.get("priority");
    let related_to: Option<String> = row.get("related_to");
    let on_model: Option<String> = row.get("on_model");
    let read: i32 = row.get("read");

    let related = match (related_to, on_model.as_deref().and_then(RelatedModel::parse)) {
        (Some(related_to), Some(on_model)) => Some(RelatedRef {
            related_to,
            on_model,
        }),
        _ => None,
    };

    Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kind: NotificationType::parse(&kind).unwrap_or(NotificationType::System),
        title: row.get("title"),
        message: row.get("message"),
        related,
        priority: NotificationPriority::parse(&priority).unwrap_or_default(),
        read: read != 0,
        read_at: row.get("read_at"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
    }
}

fn hospital_from_row(row: &SqliteRow) -> Hospital {
    let emergency_available: i32 = row.get("emergency_available");
    let verified: i32 = row.get("verified");
    let inventory: Option<String> = row.get("blood_inventory");

    Hospital {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        address: address_from_row(row),
        phone: row.get("phone"),
        email: row.get("email"),
        website: row.get("website"),
        location: Location {
            latitude: row.get("latitude"),
            longitude: row.get("longitude"),
            formatted_address: row.get("formatted_address"),
        },
        blood_inventory: inventory.map(|s| parse_json_list(&s)).unwrap_or_default(),
        emergency_available: emergency_available != 0,
        verified: verified != 0,
        created_at: row.get("created_at"),
    }
}

fn parse_blood_type(s: &str) -> BloodType {
    BloodType::parse(s).unwrap_or_else(|| {
        tracing::warn!("Unknown stored blood type {:?}", s);
        BloodType::ONegative
    })
}

fn parse_json_list<T: serde::de::DeserializeOwned>(s: &str) -> Vec<T> {
    serde_json::from_str(s).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    use crate::db::init_database;
    use crate::models::DonationRecord;

    async fn repo() -> (Repository, TempDir) {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("repo.sqlite")).await.unwrap();
        (Repository::new(pool), dir)
    }

    fn fields(blood_type: BloodType, point: Option<GeoPoint>) -> DonorFields {
        DonorFields {
            blood_type,
            age: 30,
            address: Address {
                address: "1 Main St".to_string(),
                city: "Springfield".to_string(),
                state: "IL".to_string(),
                zipcode: "62701".to_string(),
            },
            location: point.map(Location::from),
            last_donation: None,
            emergency_available: false,
            is_available: true,
            medical_conditions: vec![],
            donation_history: vec![],
        }
    }

    fn new_request(requested_by: &str) -> NewBloodRequest {
        let now = Utc::now();
        NewBloodRequest {
            request_type: RequestType::Patient,
            requested_by: requested_by.to_string(),
            hospital_id: None,
            hospital_name: Some("General".to_string()),
            patient_name: Some("Pat".to_string()),
            blood_type: BloodType::APositive,
            units_needed: 2,
            urgency: Urgency::Urgent,
            address: Address::default(),
            location: Some(GeoPoint::new(40.0, -74.0).into()),
            contact_name: "Kim".to_string(),
            contact_number: "5550001111".to_string(),
            additional_info: None,
            notes: String::new(),
            required_by: None,
            expires_at: now + Duration::hours(24),
        }
    }

    #[tokio::test]
    async fn test_donor_roundtrip_derives_availability() {
        let (repo, _dir) = repo().await;
        let mut f = fields(BloodType::ONegative, Some(GeoPoint::new(40.0, -74.0)));
        f.last_donation = Some(Utc::now() - Duration::days(10));
        f.donation_history = vec![DonationRecord {
            date: Utc::now() - Duration::days(10),
            hospital: "General".to_string(),
            recipient: None,
            units: 1,
        }];

        let donor = repo.create_donor("user-1", &f).await.unwrap();
        assert_eq!(donor.availability_status, crate::models::AvailabilityStatus::Cooldown);
        assert_eq!(donor.donation_history.len(), 1);

        let by_user = repo.get_donor_by_user("user-1").await.unwrap().unwrap();
        assert_eq!(by_user.id, donor.id);

        let mut updated = DonorFields::from(&donor);
        updated.last_donation = Some(Utc::now() - Duration::days(60));
        let donor = repo.update_donor(&donor.id, &updated).await.unwrap();
        assert_eq!(
            donor.availability_status,
            crate::models::AvailabilityStatus::Available
        );
    }

    #[tokio::test]
    async fn test_candidates_prefilter_by_type_and_box() {
        let (repo, _dir) = repo().await;
        let center = GeoPoint::new(40.0, -74.0);
        repo.create_donor("near-a", &fields(BloodType::APositive, Some(GeoPoint::new(40.05, -74.0))))
            .await
            .unwrap();
        repo.create_donor("near-b", &fields(BloodType::BPositive, Some(GeoPoint::new(40.05, -74.0))))
            .await
            .unwrap();
        repo.create_donor("far-a", &fields(BloodType::APositive, Some(GeoPoint::new(45.0, -74.0))))
            .await
            .unwrap();
        repo.create_donor("nowhere-a", &fields(BloodType::APositive, None))
            .await
            .unwrap();

        let found = repo
            .find_donor_candidates(&[BloodType::APositive, BloodType::ONegative], center, 30.0)
            .await
            .unwrap();
        let users: Vec<_> = found.iter().map(|d| d.user_id.as_str()).collect();
        assert_eq!(users, vec!["near-a"]);

        assert!(repo
            .find_donor_candidates(&[], center, 30.0)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_response_upsert_keeps_single_entry() {
        let (repo, _dir) = repo().await;
        let request = repo.create_request(&new_request("owner")).await.unwrap();
        let notified_at = Utc::now();

        repo.add_notified_donors(&request.id, &["d1".to_string()], notified_at)
            .await
            .unwrap();
        repo.upsert_response(&request.id, "d1", ResponseStatus::Accepted, Utc::now())
            .await
            .unwrap();
        repo.upsert_response(&request.id, "d1", ResponseStatus::Declined, Utc::now())
            .await
            .unwrap();
        // Re-notifying must not reset an answer.
        repo.add_notified_donors(&request.id, &["d1".to_string()], Utc::now())
            .await
            .unwrap();

        let request = repo.get_request(&request.id).await.unwrap().unwrap();
        assert_eq!(request.donors.len(), 1);
        assert_eq!(request.donors[0].status, ResponseStatus::Declined);
        assert!(request.donors[0].responded_at.is_some());
    }

    #[tokio::test]
    async fn test_list_requests_filters() {
        let (repo, _dir) = repo().await;
        let a = repo.create_request(&new_request("u1")).await.unwrap();
        let mut other = new_request("u2");
        other.blood_type = BloodType::BNegative;
        other.urgency = Urgency::Critical;
        repo.create_request(&other).await.unwrap();
        repo.update_request_status(&a.id, RequestStatus::Cancelled)
            .await
            .unwrap();

        let cancelled = repo
            .list_requests(&RequestFilter {
                status: Some(RequestStatus::Cancelled),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].id, a.id);

        let critical = repo
            .list_requests(&RequestFilter {
                urgency: Some(Urgency::Critical),
                blood_type: Some(BloodType::BNegative),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].requested_by, "u2");
    }

    #[tokio::test]
    async fn test_missing_request_is_not_found() {
        let (repo, _dir) = repo().await;
        let err = repo
            .update_request_status("missing", RequestStatus::Fulfilled)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_notification_read_flow() {
        let (repo, _dir) = repo().await;
        let template = NewNotification {
            user_id: "u1".to_string(),
            kind: NotificationType::System,
            title: "Hello".to_string(),
            message: "World".to_string(),
            related: None,
            priority: NotificationPriority::Low,
            expires_at: Utc::now() + Duration::days(30),
        };
        let written = repo
            .insert_notifications(&[template.clone(), template.clone()])
            .await
            .unwrap();
        assert_eq!(written, 2);

        let list = repo.list_notifications("u1", 50).await.unwrap();
        assert_eq!(list.len(), 2);
        assert!(!list[0].read);

        let read = repo
            .mark_notification_read(&list[0].id, Utc::now())
            .await
            .unwrap();
        assert!(read.read);
        let first_read_at = read.read_at.unwrap();
        let again = repo
            .mark_notification_read(&list[0].id, Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(again.read_at.unwrap(), first_read_at);

        assert_eq!(
            repo.mark_all_notifications_read("u1", Utc::now())
                .await
                .unwrap(),
            1
        );
        repo.delete_notification(&list[1].id).await.unwrap();
        assert_eq!(repo.list_notifications("u1", 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_hospitals_near_sorted_by_distance() {
        let (repo, _dir) = repo().await;
        let make = |name: &str, point: GeoPoint| NewHospital {
            user_id: "admin".to_string(),
            name: name.to_string(),
            address: Address::default(),
            phone: "5550001111".to_string(),
            email: "h@example.com".to_string(),
            website: None,
            location: point.into(),
            blood_inventory: vec![],
            emergency_available: true,
        };
        repo.create_hospital(&make("Farther", GeoPoint::new(40.05, -74.0)))
            .await
            .unwrap();
        repo.create_hospital(&make("Closer", GeoPoint::new(40.01, -74.0)))
            .await
            .unwrap();
        repo.create_hospital(&make("Elsewhere", GeoPoint::new(41.0, -74.0)))
            .await
            .unwrap();

        let near = repo
            .hospitals_near(GeoPoint::new(40.0, -74.0), 10.0)
            .await
            .unwrap();
        let names: Vec<_> = near.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Closer", "Farther"]);
    }
}
