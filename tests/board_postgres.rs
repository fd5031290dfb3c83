use std::sync::Arc;

use migration::{Migrator, MigratorTrait};
use platform_db::{DatabaseSettings, SeaOrmDealStore};
use products_crm::{DealDraft, DealStore, DragPhase, PipelineBoard, Stage};

async fn setup_pg() -> Option<PipelineBoard<SeaOrmDealStore>> {
    let url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("skipping Postgres board tests: TEST_DATABASE_URL not set");
            return None;
        }
    };

    let pool = DatabaseSettings::default().with_url(url).connect().await.ok()?;
    Migrator::reset(&pool).await.ok()?;
    Migrator::up(&pool, None).await.ok()?;
    let store = Arc::new(SeaOrmDealStore::new(pool));
    for (name, value, stage) in [
        ("Website revamp", 1000.0, Stage::Lead),
        ("Annual licence", 2000.0, Stage::Qualified),
    ] {
        let draft = DealDraft {
            name: name.into(),
            value,
            stage: Some(stage),
            ..Default::default()
        };
        store.create_deal(draft.validate().ok()?).await.ok()?;
    }
    let board = PipelineBoard::new(store);
    board.load().await.ok()?;
    Some(board)
}

#[tokio::test]
async fn drag_round_trips_through_postgres() {
    let Some(board) = setup_pg().await else {
        return;
    };
    let id = board.snapshot().deals[0].id;
    let outcome = board.move_deal(id, "negotiation").await;
    assert_eq!(outcome.phase(), DragPhase::Committed);

    let stored = board.store().get_deal(id).await.unwrap();
    assert_eq!(stored.stage, Stage::Negotiation);
    assert_eq!(board.deal(id).unwrap().stage, stored.stage);
}

#[tokio::test]
async fn concurrent_moves_on_different_cards_both_commit() {
    let Some(board) = setup_pg().await else {
        return;
    };
    let board = Arc::new(board);
    let ids: Vec<i32> = board.snapshot().deals.iter().map(|d| d.id).collect();
    let (first, second) = tokio::join!(
        board.move_deal(ids[0], "closed"),
        board.move_deal(ids[1], "proposal")
    );
    assert_eq!(first.phase(), DragPhase::Committed);
    assert_eq!(second.phase(), DragPhase::Committed);
    assert!(board.snapshot().pending.is_empty());
}
