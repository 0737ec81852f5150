use chrono::NaiveTime;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder,
    Set,
};
use serde::Deserialize;

use super::{new_id, Storage};
use crate::entity::route;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoute {
    pub name: String,
    #[serde(default)]
    pub driver_id: Option<String>,
    pub max_capacity: i32,
    pub start_time: NaiveTime,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Partial update of a route. `driverId: null` is indistinguishable from an
/// absent field; use `unassignDriver` to clear the driver.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteChanges {
    pub name: Option<String>,
    pub driver_id: Option<String>,
    #[serde(default)]
    pub unassign_driver: bool,
    pub max_capacity: Option<i32>,
    pub start_time: Option<NaiveTime>,
    pub is_active: Option<bool>,
}

fn default_true() -> bool {
    true
}

impl Storage {
    pub async fn get_route(&self, id: &str) -> Result<Option<route::Model>, DbErr> {
        route::Entity::find_by_id(id).one(&self.conn).await
    }

    pub async fn list_routes(&self) -> Result<Vec<route::Model>, DbErr> {
        route::Entity::find()
            .order_by_asc(route::Column::StartTime)
            .all(&self.conn)
            .await
    }

    pub async fn list_active_routes(&self) -> Result<Vec<route::Model>, DbErr> {
        route::Entity::find()
            .filter(route::Column::IsActive.eq(true))
            .order_by_asc(route::Column::StartTime)
            .all(&self.conn)
            .await
    }

    pub async fn list_routes_by_driver(&self, driver_id: &str) -> Result<Vec<route::Model>, DbErr> {
        route::Entity::find()
            .filter(route::Column::DriverId.eq(driver_id))
            .all(&self.conn)
            .await
    }

    pub async fn create_route(&self, new: NewRoute) -> Result<route::Model, DbErr> {
        route::ActiveModel {
            id: Set(new_id()),
            name: Set(new.name.trim().to_string()),
            driver_id: Set(new.driver_id),
            max_capacity: Set(new.max_capacity),
            start_time: Set(new.start_time),
            is_active: Set(new.is_active),
        }
        .insert(&self.conn)
        .await
    }

    pub async fn update_route(
        &self,
        id: &str,
        changes: RouteChanges,
    ) -> Result<Option<route::Model>, DbErr> {
        let Some(existing) = self.get_route(id).await? else {
            return Ok(None);
        };

        let mut model = existing.clone().into_active_model();
        if let Some(name) = changes.name {
            model.name = Set(name.trim().to_string());
        }
        if changes.unassign_driver {
            model.driver_id = Set(None);
        } else if let Some(driver_id) = changes.driver_id {
            model.driver_id = Set(Some(driver_id));
        }
        if let Some(max_capacity) = changes.max_capacity {
            model.max_capacity = Set(max_capacity);
        }
        if let Some(start_time) = changes.start_time {
            model.start_time = Set(start_time);
        }
        if let Some(is_active) = changes.is_active {
            model.is_active = Set(is_active);
        }

        if !model.is_changed() {
            return Ok(Some(existing));
        }
        model.update(&self.conn).await.map(Some)
    }

    pub async fn delete_route(&self, id: &str) -> Result<bool, DbErr> {
        let result = route::Entity::delete_by_id(id).exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }
}
