use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder,
    Set, TransactionTrait,
};

use super::{new_id, non_empty, Storage};
use crate::entity::{daily_presence, route, user, Role};

/// A user about to be inserted. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub phone_number: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub institution: Option<String>,
    pub pickup_address: Option<String>,
}

/// Partial update of a user; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub phone_number: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub institution: Option<String>,
    pub pickup_address: Option<String>,
}

/// Emails are compared case-insensitively.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Storage {
    pub async fn get_user(&self, id: &str) -> Result<Option<user::Model>, DbErr> {
        user::Entity::find_by_id(id).one(&self.conn).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<user::Model>, DbErr> {
        user::Entity::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(&self.conn)
            .await
    }

    pub async fn list_users(&self) -> Result<Vec<user::Model>, DbErr> {
        user::Entity::find()
            .order_by_asc(user::Column::FullName)
            .all(&self.conn)
            .await
    }

    pub async fn list_users_by_ids(&self, ids: &[String]) -> Result<Vec<user::Model>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        user::Entity::find()
            .filter(user::Column::Id.is_in(ids.iter().cloned()))
            .all(&self.conn)
            .await
    }

    pub async fn create_user(&self, new: NewUser) -> Result<user::Model, DbErr> {
        user::ActiveModel {
            id: Set(new_id()),
            full_name: Set(new.full_name.trim().to_string()),
            email: Set(normalize_email(&new.email)),
            password_hash: Set(new.password_hash),
            phone_number: Set(non_empty(new.phone_number)),
            role: Set(new.role),
            is_active: Set(new.is_active),
            institution: Set(non_empty(new.institution)),
            pickup_address: Set(non_empty(new.pickup_address)),
            created_at: Set(chrono::Utc::now()),
        }
        .insert(&self.conn)
        .await
    }

    pub async fn update_user(
        &self,
        id: &str,
        changes: UserChanges,
    ) -> Result<Option<user::Model>, DbErr> {
        let Some(existing) = self.get_user(id).await? else {
            return Ok(None);
        };

        let mut model = existing.clone().into_active_model();
        if let Some(full_name) = changes.full_name {
            model.full_name = Set(full_name.trim().to_string());
        }
        if let Some(email) = changes.email {
            model.email = Set(normalize_email(&email));
        }
        if let Some(password_hash) = changes.password_hash {
            model.password_hash = Set(password_hash);
        }
        if changes.phone_number.is_some() {
            model.phone_number = Set(non_empty(changes.phone_number));
        }
        if let Some(role) = changes.role {
            model.role = Set(role);
        }
        if let Some(is_active) = changes.is_active {
            model.is_active = Set(is_active);
        }
        if changes.institution.is_some() {
            model.institution = Set(non_empty(changes.institution));
        }
        if changes.pickup_address.is_some() {
            model.pickup_address = Set(non_empty(changes.pickup_address));
        }

        if !model.is_changed() {
            return Ok(Some(existing));
        }
        model.update(&self.conn).await.map(Some)
    }

    /// Deletes a user together with the rows that only make sense while the
    /// user exists: their presence submissions go, routes they drove lose
    /// their driver. Enrollments are not touched; callers refuse the delete
    /// while any exist.
    pub async fn delete_user(&self, id: &str) -> Result<bool, DbErr> {
        let txn = self.conn.begin().await?;

        daily_presence::Entity::delete_many()
            .filter(daily_presence::Column::StudentId.eq(id))
            .exec(&txn)
            .await?;

        route::Entity::update_many()
            .col_expr(route::Column::DriverId, Expr::value(None::<String>))
            .filter(route::Column::DriverId.eq(id))
            .exec(&txn)
            .await?;

        let deleted = user::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        Ok(deleted.rows_affected > 0)
    }
}
