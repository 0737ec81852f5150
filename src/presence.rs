//! Daily presence: per-student, per-day intent for the outbound ("ida") and
//! return ("volta") legs, and the per-driver manifest built from it.
//!
//! Dates are calendar dates (`NaiveDate`, `YYYY-MM-DD` on the wire) and are
//! compared by equality only. A submission made at 23:59 and one made at
//! 00:01 the next day therefore land in different rows.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DbErr, EntityTrait, QueryFilter, Set};
use serde::Serialize;
use serde_json::json;

use crate::audit::{AuditAction, AuditEntry};
use crate::entity::{daily_presence, user, Role};
use crate::error::{ApiError, ApiResult};
use crate::storage::{new_id, Storage};

/// Shown on the manifest when a student has no institution on file.
pub const INSTITUTION_PLACEHOLDER: &str = "Not informed";
/// Shown on the manifest when a student has no pickup address on file.
pub const PICKUP_PLACEHOLDER: &str = "Pickup location not informed";

/// The server-local calendar date.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// One presence submission for a known student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceSubmission {
    pub student_id: String,
    pub date: NaiveDate,
    pub status_ida: bool,
    pub status_volta: bool,
    pub observation: Option<String>,
}

/// Records a submission, creating or overwriting the `(student, date)` row.
///
/// The write is a single `INSERT … ON CONFLICT (student_id, date) DO UPDATE`
/// against the unique index on that pair, so concurrent or repeated
/// submissions converge on one row. The row keeps its original id; flags,
/// observation and `updated_at` take the latest values. The stored row is read
/// back by its key afterwards, since the inserted id is not the row's id when
/// the conflict branch fires.
pub async fn upsert(
    storage: &Storage,
    submission: PresenceSubmission,
) -> Result<daily_presence::Model, DbErr> {
    let student_id = submission.student_id;
    let date = submission.date;
    let row = daily_presence::ActiveModel {
        id: Set(new_id()),
        student_id: Set(student_id.clone()),
        date: Set(date),
        status_ida: Set(submission.status_ida),
        status_volta: Set(submission.status_volta),
        observation: Set(crate::storage::non_empty(submission.observation)),
        updated_at: Set(Utc::now()),
    };

    daily_presence::Entity::insert(row)
        .on_conflict(
            OnConflict::columns([
                daily_presence::Column::StudentId,
                daily_presence::Column::Date,
            ])
            .update_columns([
                daily_presence::Column::StatusIda,
                daily_presence::Column::StatusVolta,
                daily_presence::Column::Observation,
                daily_presence::Column::UpdatedAt,
            ])
            .to_owned(),
        )
        .exec_without_returning(storage.conn())
        .await?;

    find_for_date(storage, &student_id, date)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("daily presence for {student_id} on {date}")))
}

/// The row for `student_id` on `date`, or `None` when nothing was submitted.
pub async fn find_for_date(
    storage: &Storage,
    student_id: &str,
    date: NaiveDate,
) -> Result<Option<daily_presence::Model>, DbErr> {
    daily_presence::Entity::find()
        .filter(daily_presence::Column::StudentId.eq(student_id))
        .filter(daily_presence::Column::Date.eq(date))
        .one(storage.conn())
        .await
}

/// Whose presence a caller may submit.
///
/// Students submit for themselves only. Staff act on behalf of a student and
/// must name one.
pub fn submission_target(caller: &user::Model, requested: Option<&str>) -> ApiResult<String> {
    match caller.role {
        Role::Student => match requested {
            None => Ok(caller.id.clone()),
            Some(id) if id == caller.id => Ok(caller.id.clone()),
            Some(_) => Err(ApiError::Forbidden),
        },
        role if role.is_staff() => requested
            .map(str::to_owned)
            .ok_or_else(|| ApiError::validation("studentId is required")),
        _ => Err(ApiError::Forbidden),
    }
}

/// Whose presence a caller may read. Students read their own; everybody else
/// reads the named student, or themselves when none is named.
pub fn read_target(caller: &user::Model, requested: Option<&str>) -> ApiResult<String> {
    match (caller.role, requested) {
        (_, None) => Ok(caller.id.clone()),
        (Role::Student, Some(id)) if id != caller.id => Err(ApiError::Forbidden),
        (_, Some(id)) => Ok(id.to_owned()),
    }
}

/// A presence submission as received from a caller.
#[derive(Debug, Clone, Default)]
pub struct MarkPresence {
    pub student_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub status_ida: bool,
    pub status_volta: bool,
    pub observation: Option<String>,
}

/// Authorizes, records and audits a presence submission.
pub async fn mark(
    storage: &Storage,
    caller: &user::Model,
    request: MarkPresence,
) -> ApiResult<daily_presence::Model> {
    let student_id = submission_target(caller, request.student_id.as_deref())?;

    let student = storage
        .get_user(&student_id)
        .await?
        .filter(|user| user.role == Role::Student && user.is_active)
        .ok_or(ApiError::NotFound("Student"))?;

    // Only staff may record a day other than today.
    let date = match request.date {
        Some(date) if date != today() && !caller.role.is_staff() => {
            return Err(ApiError::Forbidden)
        }
        Some(date) => date,
        None => today(),
    };
    let presence = upsert(
        storage,
        PresenceSubmission {
            student_id: student.id,
            date,
            status_ida: request.status_ida,
            status_volta: request.status_volta,
            observation: request.observation,
        },
    )
    .await?;

    storage
        .create_audit_log(
            AuditEntry::new(AuditAction::UpdatePresence, "daily_presence")
                .actor(caller.id.clone())
                .target(presence.id.clone())
                .changes(json!({
                    "studentId": presence.student_id,
                    "date": presence.date,
                    "statusIda": presence.status_ida,
                    "statusVolta": presence.status_volta,
                })),
        )
        .await?;

    tracing::info!(
        student_id = %presence.student_id,
        date = %presence.date,
        ida = presence.status_ida,
        volta = presence.status_volta,
        "presence recorded"
    );
    Ok(presence)
}

/// Whose manifest a caller may read. Only administrators may name another
/// driver.
pub fn manifest_driver(caller: &user::Model, requested: Option<&str>) -> ApiResult<String> {
    match requested {
        Some(id) if id != caller.id => {
            if caller.role == Role::Admin {
                Ok(id.to_owned())
            } else {
                Err(ApiError::Forbidden)
            }
        }
        _ => Ok(caller.id.clone()),
    }
}

/// One expected passenger on a driver's manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub student_id: String,
    pub student_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub institution: String,
    pub route_id: String,
    pub route_name: String,
    pub route_start_time: NaiveTime,
    pub pickup_location: String,
    /// `false` both when the student declined and when nothing was submitted.
    pub status_ida: bool,
    pub status_volta: bool,
    pub observation: Option<String>,
}

/// Builds the manifest of `driver_id` for `date`.
///
/// Composes four reads (routes of the driver, active enrollments on those
/// routes, the enrolled students, their presence rows for the day) outside
/// of any transaction. Each read sees its own snapshot, so a submission that
/// lands mid-way may or may not show up; clients refresh the manifest
/// periodically.
///
/// Students without a submission are listed with both legs `false`. A
/// student enrolled on several of the driver's routes is listed once, under
/// the first enrollment found. No ordering is guaranteed.
pub async fn manifest(
    storage: &Storage,
    driver_id: &str,
    date: NaiveDate,
) -> Result<Vec<ManifestEntry>, DbErr> {
    let routes = storage.list_routes_by_driver(driver_id).await?;
    if routes.is_empty() {
        return Ok(Vec::new());
    }
    let route_ids: Vec<String> = routes.iter().map(|route| route.id.clone()).collect();

    let enrollments = storage
        .list_active_enrollments_by_routes(&route_ids)
        .await?;
    let mut student_ids: Vec<String> = enrollments
        .iter()
        .map(|enrollment| enrollment.student_id.clone())
        .collect();
    student_ids.sort();
    student_ids.dedup();

    let students: HashMap<String, user::Model> = storage
        .list_users_by_ids(&student_ids)
        .await?
        .into_iter()
        .map(|student| (student.id.clone(), student))
        .collect();

    let presence: HashMap<String, daily_presence::Model> = if student_ids.is_empty() {
        HashMap::new()
    } else {
        daily_presence::Entity::find()
            .filter(daily_presence::Column::StudentId.is_in(student_ids.iter().cloned()))
            .filter(daily_presence::Column::Date.eq(date))
            .all(storage.conn())
            .await?
            .into_iter()
            .map(|row| (row.student_id.clone(), row))
            .collect()
    };

    let routes: HashMap<&str, _> = routes.iter().map(|route| (route.id.as_str(), route)).collect();
    let mut listed = HashSet::new();
    let mut entries = Vec::with_capacity(enrollments.len());

    for enrollment in &enrollments {
        let (Some(student), Some(route)) = (
            students.get(&enrollment.student_id),
            routes.get(enrollment.route_id.as_str()),
        ) else {
            continue;
        };
        if !listed.insert(student.id.as_str()) {
            continue;
        }

        let submitted = presence.get(&student.id);
        entries.push(ManifestEntry {
            student_id: student.id.clone(),
            student_name: student.full_name.clone(),
            email: student.email.clone(),
            phone_number: student.phone_number.clone(),
            institution: student
                .institution
                .clone()
                .unwrap_or_else(|| INSTITUTION_PLACEHOLDER.to_string()),
            route_id: route.id.clone(),
            route_name: route.name.clone(),
            route_start_time: route.start_time,
            pickup_location: student
                .pickup_address
                .clone()
                .unwrap_or_else(|| PICKUP_PLACEHOLDER.to_string()),
            status_ida: submitted.is_some_and(|row| row.status_ida),
            status_volta: submitted.is_some_and(|row| row.status_volta),
            observation: submitted.and_then(|row| row.observation.clone()),
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use sea_orm::PaginatorTrait;

    use super::*;
    use crate::storage::test_support::{storage, user as make_user};
    use crate::storage::{NewEnrollment, NewRoute};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn submission(student_id: &str, date: NaiveDate, ida: bool, volta: bool) -> PresenceSubmission {
        PresenceSubmission {
            student_id: student_id.to_string(),
            date,
            status_ida: ida,
            status_volta: volta,
            observation: None,
        }
    }

    async fn route(storage: &Storage, name: &str, driver_id: &str) -> String {
        storage
            .create_route(NewRoute {
                name: name.into(),
                driver_id: Some(driver_id.into()),
                max_capacity: 30,
                start_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
                is_active: true,
            })
            .await
            .unwrap()
            .id
    }

    async fn enroll(storage: &Storage, student_id: &str, route_id: &str, active: bool) {
        storage
            .create_enrollment(NewEnrollment {
                student_id: student_id.into(),
                route_id: route_id.into(),
                monthly_fee_cents: 25_000,
                due_day: 5,
                is_active: active,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn repeated_submissions_converge_on_one_row() {
        let storage = storage().await;
        let student = make_user(&storage, "ana@student.com", Role::Student).await;
        let date = day(2025, 11, 19);

        let first = upsert(&storage, submission(&student.id, date, true, false))
            .await
            .unwrap();
        let second = upsert(&storage, submission(&student.id, date, true, false))
            .await
            .unwrap();
        let third = upsert(&storage, submission(&student.id, date, true, true))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.id, third.id);
        assert!(second.updated_at >= first.updated_at);
        assert!(third.status_volta);

        let rows = daily_presence::Entity::find().count(storage.conn()).await.unwrap();
        assert_eq!(rows, 1);

        let stored = find_for_date(&storage, &student.id, date).await.unwrap().unwrap();
        assert!(stored.status_ida && stored.status_volta);
    }

    #[tokio::test]
    async fn adjacent_dates_never_share_a_row() {
        let storage = storage().await;
        let student = make_user(&storage, "bruno@student.com", Role::Student).await;
        let late = day(2025, 11, 19);
        let early_next = day(2025, 11, 20);

        upsert(&storage, submission(&student.id, late, true, true))
            .await
            .unwrap();

        assert!(find_for_date(&storage, &student.id, early_next)
            .await
            .unwrap()
            .is_none());

        upsert(&storage, submission(&student.id, early_next, false, false))
            .await
            .unwrap();
        let d1 = find_for_date(&storage, &student.id, late).await.unwrap().unwrap();
        let d2 = find_for_date(&storage, &student.id, early_next).await.unwrap().unwrap();
        assert_ne!(d1.id, d2.id);
        assert!(d1.status_ida);
        assert!(!d2.status_ida);
    }

    #[tokio::test]
    async fn false_false_submission_is_distinct_from_no_submission() {
        let storage = storage().await;
        let student = make_user(&storage, "carla@student.com", Role::Student).await;
        let date = day(2025, 11, 19);

        assert!(find_for_date(&storage, &student.id, date).await.unwrap().is_none());
        upsert(&storage, submission(&student.id, date, false, false))
            .await
            .unwrap();
        let row = find_for_date(&storage, &student.id, date).await.unwrap();
        assert!(row.is_some_and(|row| !row.status_ida && !row.status_volta));
    }

    #[tokio::test]
    async fn mark_enforces_who_may_submit() {
        let storage = storage().await;
        let ana = make_user(&storage, "ana@student.com", Role::Student).await;
        let bruno = make_user(&storage, "bruno@student.com", Role::Student).await;
        let coordinator = make_user(&storage, "coord@transport.com", Role::Coordinator).await;
        let driver = make_user(&storage, "joao@transport.com", Role::Driver).await;

        let own = mark(
            &storage,
            &ana,
            MarkPresence {
                status_ida: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(own.student_id, ana.id);
        assert_eq!(own.date, today());

        let for_other = mark(
            &storage,
            &ana,
            MarkPresence {
                student_id: Some(bruno.id.clone()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(for_other, Err(ApiError::Forbidden)));

        let missing_id = mark(&storage, &coordinator, MarkPresence::default()).await;
        assert!(matches!(missing_id, Err(ApiError::Validation(_))));

        let on_behalf = mark(
            &storage,
            &coordinator,
            MarkPresence {
                student_id: Some(bruno.id.clone()),
                status_volta: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(on_behalf.student_id, bruno.id);

        let not_a_student = mark(
            &storage,
            &coordinator,
            MarkPresence {
                student_id: Some(driver.id.clone()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(not_a_student, Err(ApiError::NotFound("Student"))));

        let logs = storage.list_audit_logs(10).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|log| log.action == "UPDATE_PRESENCE"));
    }

    #[tokio::test]
    async fn only_staff_may_record_another_day() {
        let storage = storage().await;
        let ana = make_user(&storage, "ana@student.com", Role::Student).await;
        let coordinator = make_user(&storage, "coord@transport.com", Role::Coordinator).await;
        let yesterday = today().pred_opt().unwrap();

        let backdated = mark(
            &storage,
            &ana,
            MarkPresence {
                date: Some(yesterday),
                status_ida: true,
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(backdated, Err(ApiError::Forbidden)));
        assert!(find_for_date(&storage, &ana.id, yesterday).await.unwrap().is_none());

        let explicit_today = mark(
            &storage,
            &ana,
            MarkPresence {
                date: Some(today()),
                status_ida: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(explicit_today.date, today());

        let corrected = mark(
            &storage,
            &coordinator,
            MarkPresence {
                student_id: Some(ana.id.clone()),
                date: Some(yesterday),
                status_volta: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(corrected.date, yesterday);
        assert!(corrected.status_volta);
    }

    #[test]
    fn read_and_manifest_targets() {
        let student = user::Model {
            id: "s1".into(),
            full_name: "Ana".into(),
            email: "ana@student.com".into(),
            password_hash: String::new(),
            phone_number: None,
            role: Role::Student,
            is_active: true,
            institution: None,
            pickup_address: None,
            created_at: Utc::now(),
        };
        let driver = user::Model {
            id: "d1".into(),
            role: Role::Driver,
            ..student.clone()
        };
        let admin = user::Model {
            id: "a1".into(),
            role: Role::Admin,
            ..student.clone()
        };

        assert_eq!(read_target(&student, None).unwrap(), "s1");
        assert_eq!(read_target(&student, Some("s1")).unwrap(), "s1");
        assert!(matches!(read_target(&student, Some("s2")), Err(ApiError::Forbidden)));
        assert_eq!(read_target(&driver, Some("s2")).unwrap(), "s2");

        assert_eq!(manifest_driver(&driver, None).unwrap(), "d1");
        assert_eq!(manifest_driver(&driver, Some("d1")).unwrap(), "d1");
        assert!(matches!(manifest_driver(&driver, Some("d2")), Err(ApiError::Forbidden)));
        assert_eq!(manifest_driver(&admin, Some("d2")).unwrap(), "d2");
    }

    #[tokio::test]
    async fn manifest_lists_every_enrolled_student_with_defaults() {
        let storage = storage().await;
        let driver = make_user(&storage, "joao@transport.com", Role::Driver).await;
        let other_driver = make_user(&storage, "maria@transport.com", Role::Driver).await;
        let s1 = make_user(&storage, "s1@student.com", Role::Student).await;
        let s2 = make_user(&storage, "s2@student.com", Role::Student).await;
        let s3 = make_user(&storage, "s3@student.com", Role::Student).await;
        let s4 = make_user(&storage, "s4@student.com", Role::Student).await;
        let s5 = make_user(&storage, "s5@student.com", Role::Student).await;

        let route_a = route(&storage, "North Campus Route", &driver.id).await;
        let route_b = route(&storage, "East Campus Route", &driver.id).await;
        let route_c = route(&storage, "South Campus Route", &other_driver.id).await;

        enroll(&storage, &s1.id, &route_a, true).await;
        enroll(&storage, &s2.id, &route_b, true).await;
        enroll(&storage, &s3.id, &route_a, true).await;
        enroll(&storage, &s4.id, &route_a, false).await;
        enroll(&storage, &s5.id, &route_c, true).await;

        let date = day(2025, 11, 19);
        upsert(&storage, submission(&s1.id, date, true, false))
            .await
            .unwrap();
        // Another day must not leak into this manifest
        upsert(&storage, submission(&s2.id, day(2025, 11, 18), true, true))
            .await
            .unwrap();

        let entries = manifest(&storage, &driver.id, date).await.unwrap();
        assert_eq!(entries.len(), 3);

        let by_student: HashMap<&str, &ManifestEntry> = entries
            .iter()
            .map(|entry| (entry.student_id.as_str(), entry))
            .collect();
        assert!(by_student[s1.id.as_str()].status_ida);
        assert!(!by_student[s1.id.as_str()].status_volta);
        assert!(!by_student[s2.id.as_str()].status_ida);
        assert!(!by_student[s3.id.as_str()].status_ida);
        assert_eq!(by_student[s2.id.as_str()].route_name, "East Campus Route");
        assert_eq!(by_student[s3.id.as_str()].institution, INSTITUTION_PLACEHOLDER);
        assert_eq!(by_student[s3.id.as_str()].pickup_location, PICKUP_PLACEHOLDER);
        assert!(!by_student.contains_key(s4.id.as_str()));
        assert!(!by_student.contains_key(s5.id.as_str()));
    }

    #[tokio::test]
    async fn manifest_is_empty_without_routes_or_enrollments() {
        let storage = storage().await;
        let driver = make_user(&storage, "joao@transport.com", Role::Driver).await;
        assert!(manifest(&storage, &driver.id, today()).await.unwrap().is_empty());

        route(&storage, "North Campus Route", &driver.id).await;
        assert!(manifest(&storage, &driver.id, today()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn student_on_two_routes_is_listed_once() {
        let storage = storage().await;
        let driver = make_user(&storage, "joao@transport.com", Role::Driver).await;
        let student = make_user(&storage, "ana@student.com", Role::Student).await;
        let morning = route(&storage, "Morning", &driver.id).await;
        let evening = route(&storage, "Evening", &driver.id).await;
        enroll(&storage, &student.id, &morning, true).await;
        enroll(&storage, &student.id, &evening, true).await;

        let entries = manifest(&storage, &driver.id, today()).await.unwrap();
        assert_eq!(entries.len(), 1);
    }
}
