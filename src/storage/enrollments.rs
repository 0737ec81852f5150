use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use serde::Deserialize;

use super::{new_id, Storage};
use crate::entity::{enrollment, payment, route};

/// Why an enrollment write was refused.
#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error("Route not found")]
    RouteNotFound,
    #[error("Route is at full capacity")]
    RouteFull,
    #[error(transparent)]
    Database(#[from] DbErr),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEnrollment {
    pub student_id: String,
    pub route_id: String,
    pub monthly_fee_cents: i64,
    pub due_day: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentChanges {
    pub route_id: Option<String>,
    pub monthly_fee_cents: Option<i64>,
    pub due_day: Option<i32>,
    pub is_active: Option<bool>,
}

fn default_true() -> bool {
    true
}

impl Storage {
    pub async fn get_enrollment(&self, id: &str) -> Result<Option<enrollment::Model>, DbErr> {
        enrollment::Entity::find_by_id(id).one(&self.conn).await
    }

    pub async fn list_enrollments(&self) -> Result<Vec<enrollment::Model>, DbErr> {
        enrollment::Entity::find().all(&self.conn).await
    }

    pub async fn list_enrollments_by_student(
        &self,
        student_id: &str,
    ) -> Result<Vec<enrollment::Model>, DbErr> {
        enrollment::Entity::find()
            .filter(enrollment::Column::StudentId.eq(student_id))
            .all(&self.conn)
            .await
    }

    pub async fn list_enrollments_by_route(
        &self,
        route_id: &str,
    ) -> Result<Vec<enrollment::Model>, DbErr> {
        enrollment::Entity::find()
            .filter(enrollment::Column::RouteId.eq(route_id))
            .all(&self.conn)
            .await
    }

    /// Active enrollments on any of `route_ids`.
    pub async fn list_active_enrollments_by_routes(
        &self,
        route_ids: &[String],
    ) -> Result<Vec<enrollment::Model>, DbErr> {
        if route_ids.is_empty() {
            return Ok(Vec::new());
        }
        enrollment::Entity::find()
            .filter(enrollment::Column::RouteId.is_in(route_ids.iter().cloned()))
            .filter(enrollment::Column::IsActive.eq(true))
            .all(&self.conn)
            .await
    }

    pub async fn has_active_enrollments(&self, student_id: &str) -> Result<bool, DbErr> {
        let count = enrollment::Entity::find()
            .filter(enrollment::Column::StudentId.eq(student_id))
            .filter(enrollment::Column::IsActive.eq(true))
            .count(&self.conn)
            .await?;
        Ok(count > 0)
    }

    /// Inserts an enrollment. An active one needs a free seat on its route;
    /// the count and the insert share a transaction that locks the route row
    /// where the backend supports it.
    pub async fn create_enrollment(
        &self,
        new: NewEnrollment,
    ) -> Result<enrollment::Model, EnrollmentError> {
        let txn = self.conn.begin().await?;
        reserve_seat(&txn, &new.route_id, new.is_active, None).await?;

        let created = enrollment::ActiveModel {
            id: Set(new_id()),
            student_id: Set(new.student_id),
            route_id: Set(new.route_id),
            monthly_fee_cents: Set(new.monthly_fee_cents),
            due_day: Set(new.due_day),
            is_active: Set(new.is_active),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(created)
    }

    /// Applies `changes`, re-checking capacity on the resulting route when the
    /// enrollment ends up active. `None` when the enrollment does not exist.
    pub async fn update_enrollment(
        &self,
        id: &str,
        changes: EnrollmentChanges,
    ) -> Result<Option<enrollment::Model>, EnrollmentError> {
        let txn = self.conn.begin().await?;
        let Some(existing) = enrollment::Entity::find_by_id(id).one(&txn).await? else {
            return Ok(None);
        };

        let route_id = changes
            .route_id
            .clone()
            .unwrap_or_else(|| existing.route_id.clone());
        let active = changes.is_active.unwrap_or(existing.is_active);

        let mut model = existing.clone().into_active_model();
        if let Some(route_id) = changes.route_id {
            model.route_id = Set(route_id);
        }
        if let Some(fee) = changes.monthly_fee_cents {
            model.monthly_fee_cents = Set(fee);
        }
        if let Some(due_day) = changes.due_day {
            model.due_day = Set(due_day);
        }
        if let Some(is_active) = changes.is_active {
            model.is_active = Set(is_active);
        }

        if !model.is_changed() {
            return Ok(Some(existing));
        }

        reserve_seat(&txn, &route_id, active, Some(&existing.id)).await?;

        let updated = model.update(&txn).await?;
        txn.commit().await?;
        Ok(Some(updated))
    }

    /// Deletes an enrollment and its payment history in one transaction.
    /// Callers check for outstanding payments first.
    pub async fn delete_enrollment(&self, id: &str) -> Result<bool, DbErr> {
        let txn = self.conn.begin().await?;

        payment::Entity::delete_many()
            .filter(payment::Column::EnrollmentId.eq(id))
            .exec(&txn)
            .await?;
        let deleted = enrollment::Entity::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;
        Ok(deleted.rows_affected > 0)
    }
}

/// Checks that `route_id` exists and, for an active enrollment, that it has a
/// seat left not counting `excluding`. Runs inside the caller's transaction.
async fn reserve_seat<C: ConnectionTrait>(
    conn: &C,
    route_id: &str,
    active: bool,
    excluding: Option<&str>,
) -> Result<(), EnrollmentError> {
    let route = route::Entity::find_by_id(route_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or(EnrollmentError::RouteNotFound)?;
    if !active {
        return Ok(());
    }

    let mut taken = enrollment::Entity::find()
        .filter(enrollment::Column::RouteId.eq(route_id))
        .filter(enrollment::Column::IsActive.eq(true));
    if let Some(id) = excluding {
        taken = taken.filter(enrollment::Column::Id.ne(id));
    }
    let taken = taken.count(conn).await?;

    if taken >= u64::try_from(route.max_capacity).unwrap_or(0) {
        return Err(EnrollmentError::RouteFull);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::entity::Role;
    use crate::storage::test_support::{storage, user as make_user};
    use crate::storage::NewRoute;

    async fn route_with_seats(storage: &Storage, seats: i32) -> route::Model {
        storage
            .create_route(NewRoute {
                name: "North Campus Route".into(),
                driver_id: None,
                max_capacity: seats,
                start_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
                is_active: true,
            })
            .await
            .unwrap()
    }

    fn enrollment(student_id: &str, route_id: &str, is_active: bool) -> NewEnrollment {
        NewEnrollment {
            student_id: student_id.into(),
            route_id: route_id.into(),
            monthly_fee_cents: 25_000,
            due_day: 5,
            is_active,
        }
    }

    #[tokio::test]
    async fn active_enrollments_stop_at_capacity() {
        let storage = storage().await;
        let ana = make_user(&storage, "ana@student.com", Role::Student).await;
        let bruno = make_user(&storage, "bruno@student.com", Role::Student).await;
        let route = route_with_seats(&storage, 1).await;

        let seated = storage
            .create_enrollment(enrollment(&ana.id, &route.id, true))
            .await
            .unwrap();

        let full = storage
            .create_enrollment(enrollment(&bruno.id, &route.id, true))
            .await;
        assert!(matches!(full, Err(EnrollmentError::RouteFull)));

        let waiting = storage
            .create_enrollment(enrollment(&bruno.id, &route.id, false))
            .await
            .unwrap();
        let activate = storage
            .update_enrollment(
                &waiting.id,
                EnrollmentChanges {
                    is_active: Some(true),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(activate, Err(EnrollmentError::RouteFull)));

        let moved_due_day = storage
            .update_enrollment(
                &seated.id,
                EnrollmentChanges {
                    due_day: Some(10),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(moved_due_day.due_day, 10);

        let nowhere = storage
            .create_enrollment(enrollment(&bruno.id, "no-such-route", false))
            .await;
        assert!(matches!(nowhere, Err(EnrollmentError::RouteNotFound)));

        let missing = storage
            .update_enrollment("no-such-enrollment", EnrollmentChanges::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn concurrent_enrollments_cannot_overfill_a_route() {
        let storage = storage().await;
        let ana = make_user(&storage, "ana@student.com", Role::Student).await;
        let bruno = make_user(&storage, "bruno@student.com", Role::Student).await;
        let route = route_with_seats(&storage, 1).await;

        let (first, second) = tokio::join!(
            storage.create_enrollment(enrollment(&ana.id, &route.id, true)),
            storage.create_enrollment(enrollment(&bruno.id, &route.id, true)),
        );
        let results = [first, second];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(EnrollmentError::RouteFull))));

        let active = enrollment::Entity::find()
            .filter(enrollment::Column::RouteId.eq(route.id.as_str()))
            .filter(enrollment::Column::IsActive.eq(true))
            .count(storage.conn())
            .await
            .unwrap();
        assert_eq!(active, 1);
    }
}
