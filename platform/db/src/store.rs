use chrono::{DateTime, Utc};
use entity::deals;
use products_crm::{Deal, DealId, DealPatch, DealStore, NewDeal, Stage, StoreError, StoreResult};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, DbErr, EntityTrait, QueryOrder, TransactionTrait,
    prelude::DateTimeWithTimeZone,
};
use tracing::warn;

use crate::DbPool;

/// [`DealStore`] over the `deals` table.
#[derive(Clone, Debug)]
pub struct SeaOrmDealStore {
    db: DbPool,
}

impl SeaOrmDealStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DbPool {
        &self.db
    }
}

impl DealStore for SeaOrmDealStore {
    async fn list_deals(&self) -> StoreResult<Vec<Deal>> {
        let rows = deals::Entity::find()
            .order_by_asc(deals::Column::Id)
            .all(&self.db)
            .await
            .map_err(unavailable)?;
        Ok(rows.into_iter().map(to_deal).collect())
    }

    async fn get_deal(&self, id: DealId) -> StoreResult<Deal> {
        deals::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(unavailable)?
            .map(to_deal)
            .ok_or(StoreError::NotFound(id))
    }

    async fn update_deal_stage(&self, id: DealId, stage: Stage) -> StoreResult<Deal> {
        let txn = self.db.begin().await.map_err(unavailable)?;
        let model = deals::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(unavailable)?
            .ok_or(StoreError::NotFound(id))?;
        let mut deal = to_deal(model.clone());
        deal.transition_to(stage, Utc::now());
        let mut active: deals::ActiveModel = model.into();
        active.stage = Set(to_entity_stage(deal.stage));
        active.stage_updated_at = Set(to_db_time(deal.stage_updated_at));
        let updated = active.update(&txn).await.map_err(|err| row_error(id, err))?;
        txn.commit().await.map_err(unavailable)?;
        Ok(to_deal(updated))
    }

    async fn create_deal(&self, deal: NewDeal) -> StoreResult<Deal> {
        let now = to_db_time(Utc::now());
        let inserted = deals::ActiveModel {
            name: Set(deal.name),
            value: Set(Some(deal.value)),
            stage: Set(to_entity_stage(deal.stage)),
            contact_name: Set(deal.contact_name),
            contact_id: Set(deal.contact_id),
            company_name: Set(deal.company_name),
            company_id: Set(deal.company_id),
            description: Set(deal.description),
            close_date: Set(deal.close_date),
            created_at: Set(now),
            stage_updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(unavailable)?;
        Ok(to_deal(inserted))
    }

    async fn update_deal(&self, id: DealId, patch: DealPatch) -> StoreResult<Deal> {
        let txn = self.db.begin().await.map_err(unavailable)?;
        let model = deals::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(unavailable)?
            .ok_or(StoreError::NotFound(id))?;
        let mut deal = to_deal(model.clone());
        patch.apply(&mut deal, Utc::now());
        let mut active: deals::ActiveModel = model.into();
        active.name = Set(deal.name);
        active.value = Set(Some(deal.value));
        active.stage = Set(to_entity_stage(deal.stage));
        active.contact_name = Set(deal.contact_name);
        active.contact_id = Set(deal.contact_id);
        active.company_name = Set(deal.company_name);
        active.company_id = Set(deal.company_id);
        active.description = Set(deal.description);
        active.close_date = Set(deal.close_date);
        active.stage_updated_at = Set(to_db_time(deal.stage_updated_at));
        let updated = active.update(&txn).await.map_err(|err| row_error(id, err))?;
        txn.commit().await.map_err(unavailable)?;
        Ok(to_deal(updated))
    }

    async fn delete_deal(&self, id: DealId) -> StoreResult<bool> {
        let result = deals::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(unavailable)?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(true)
    }
}

fn to_deal(model: deals::Model) -> Deal {
    Deal {
        id: model.id,
        name: model.name,
        value: model.value.unwrap_or(0.0),
        stage: to_board_stage(model.stage),
        contact_name: model.contact_name,
        contact_id: model.contact_id,
        company_name: model.company_name,
        company_id: model.company_id,
        description: model.description,
        close_date: model.close_date,
        created_at: model.created_at.with_timezone(&Utc),
        stage_updated_at: model.stage_updated_at.with_timezone(&Utc),
    }
}

fn to_db_time(at: DateTime<Utc>) -> DateTimeWithTimeZone {
    at.into()
}

fn to_entity_stage(stage: Stage) -> deals::Stage {
    match stage {
        Stage::Lead => deals::Stage::Lead,
        Stage::Qualified => deals::Stage::Qualified,
        Stage::Proposal => deals::Stage::Proposal,
        Stage::Negotiation => deals::Stage::Negotiation,
        Stage::Closed => deals::Stage::Closed,
    }
}

fn to_board_stage(stage: deals::Stage) -> Stage {
    match stage {
        deals::Stage::Lead => Stage::Lead,
        deals::Stage::Qualified => Stage::Qualified,
        deals::Stage::Proposal => Stage::Proposal,
        deals::Stage::Negotiation => Stage::Negotiation,
        deals::Stage::Closed => Stage::Closed,
    }
}

fn row_error(id: DealId, err: DbErr) -> StoreError {
    match err {
        DbErr::RecordNotFound(_) | DbErr::RecordNotUpdated => StoreError::NotFound(id),
        other => unavailable(other),
    }
}

fn unavailable(err: DbErr) -> StoreError {
    warn!(error = %err, "deal store query failed");
    StoreError::Unavailable(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DatabaseSettings;
    use migration::{Migrator, MigratorTrait};
    use products_crm::DealDraft;

    async fn store() -> SeaOrmDealStore {
        let db = DatabaseSettings::default()
            .with_url("sqlite::memory:")
            .connect()
            .await
            .unwrap();
        Migrator::up(&db, None).await.unwrap();
        SeaOrmDealStore::new(db)
    }

    fn draft(name: &str, value: f64) -> NewDeal {
        DealDraft {
            name: name.into(),
            value,
            company_name: Some("Initech".into()),
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    #[tokio::test]
    async fn create_assigns_id_and_timestamps() {
        let store = store().await;
        let first = store.create_deal(draft("Licences", 1200.5)).await.unwrap();
        let second = store.create_deal(draft("Support", 300.0)).await.unwrap();
        assert!(second.id > first.id);
        assert_eq!(first.stage, Stage::Lead);
        assert_eq!(first.created_at, first.stage_updated_at);
        assert_eq!(first.value, 1200.5);

        let listed = store.list_deals().await.unwrap();
        let ids: Vec<DealId> = listed.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert_eq!(listed[0].company_name.as_deref(), Some("Initech"));
    }

    #[tokio::test]
    async fn stage_update_is_persisted() {
        let store = store().await;
        let created = store.create_deal(draft("Licences", 10.0)).await.unwrap();
        let moved = store
            .update_deal_stage(created.id, Stage::Negotiation)
            .await
            .unwrap();
        assert_eq!(moved.stage, Stage::Negotiation);
        assert!(moved.stage_updated_at >= created.stage_updated_at);
        let fetched = store.get_deal(created.id).await.unwrap();
        assert_eq!(fetched.stage, Stage::Negotiation);
    }

    #[tokio::test]
    async fn missing_rows_report_not_found() {
        let store = store().await;
        assert_eq!(
            store.update_deal_stage(42, Stage::Closed).await,
            Err(StoreError::NotFound(42))
        );
        assert_eq!(store.get_deal(42).await, Err(StoreError::NotFound(42)));
        assert_eq!(store.delete_deal(42).await, Err(StoreError::NotFound(42)));
    }

    #[tokio::test]
    async fn patch_and_delete_round_trip() {
        let store = store().await;
        let created = store.create_deal(draft("Licences", 10.0)).await.unwrap();
        let patched = store
            .update_deal(
                created.id,
                DealPatch {
                    name: Some("Licences (renewal)".into()),
                    stage: Some(Stage::Qualified),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(patched.name, "Licences (renewal)");
        assert_eq!(patched.stage, Stage::Qualified);
        assert_eq!(patched.value, 10.0);

        assert!(store.delete_deal(created.id).await.unwrap());
        assert!(store.list_deals().await.unwrap().is_empty());
    }
}
