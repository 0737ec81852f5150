use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder,
    Set,
};
use serde::Deserialize;

use super::{new_id, Storage};
use crate::entity::{payment, PaymentStatus};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub enrollment_id: String,
    pub billing_month: NaiveDate,
    pub amount_due_cents: i64,
    #[serde(default = "default_status")]
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentChanges {
    pub billing_month: Option<NaiveDate>,
    pub amount_due_cents: Option<i64>,
    pub status: Option<PaymentStatus>,
    pub paid_at: Option<DateTime<Utc>>,
    /// Filled by the handler when staff settle the payment.
    #[serde(skip)]
    pub processed_by_id: Option<String>,
}

fn default_status() -> PaymentStatus {
    PaymentStatus::Pending
}

impl Storage {
    pub async fn get_payment(&self, id: &str) -> Result<Option<payment::Model>, DbErr> {
        payment::Entity::find_by_id(id).one(&self.conn).await
    }

    /// All payments, most recent billing month first.
    pub async fn list_payments(&self) -> Result<Vec<payment::Model>, DbErr> {
        payment::Entity::find()
            .order_by_desc(payment::Column::BillingMonth)
            .all(&self.conn)
            .await
    }

    pub async fn list_payments_by_enrollment(
        &self,
        enrollment_id: &str,
    ) -> Result<Vec<payment::Model>, DbErr> {
        payment::Entity::find()
            .filter(payment::Column::EnrollmentId.eq(enrollment_id))
            .order_by_desc(payment::Column::BillingMonth)
            .all(&self.conn)
            .await
    }

    pub async fn create_payment(&self, new: NewPayment) -> Result<payment::Model, DbErr> {
        payment::ActiveModel {
            id: Set(new_id()),
            enrollment_id: Set(new.enrollment_id),
            billing_month: Set(new.billing_month),
            amount_due_cents: Set(new.amount_due_cents),
            status: Set(new.status),
            processed_by_id: Set(None),
            paid_at: Set(None),
        }
        .insert(&self.conn)
        .await
    }

    pub async fn update_payment(
        &self,
        id: &str,
        changes: PaymentChanges,
    ) -> Result<Option<payment::Model>, DbErr> {
        let Some(existing) = self.get_payment(id).await? else {
            return Ok(None);
        };

        let mut model = existing.clone().into_active_model();
        if let Some(billing_month) = changes.billing_month {
            model.billing_month = Set(billing_month);
        }
        if let Some(amount) = changes.amount_due_cents {
            model.amount_due_cents = Set(amount);
        }
        if let Some(status) = changes.status {
            model.status = Set(status);
        }
        if let Some(paid_at) = changes.paid_at {
            model.paid_at = Set(Some(paid_at));
        }
        if let Some(processed_by_id) = changes.processed_by_id {
            model.processed_by_id = Set(Some(processed_by_id));
        }

        if !model.is_changed() {
            return Ok(Some(existing));
        }
        model.update(&self.conn).await.map(Some)
    }

    pub async fn delete_payment(&self, id: &str) -> Result<bool, DbErr> {
        let result = payment::Entity::delete_by_id(id).exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }
}
