use anyhow::Result;
use chrono::NaiveDate;
use products_crm::{Deal, DealDraft, DealStore, Stage};
use tracing::info;

struct DemoDeal {
    name: &'static str,
    value: f64,
    stage: Stage,
    contact: &'static str,
    company: &'static str,
    close: Option<(i32, u32, u32)>,
}

const DEMO_DEALS: [DemoDeal; 6] = [
    DemoDeal {
        name: "ACME ERP rollout",
        value: 48_000.0,
        stage: Stage::Lead,
        contact: "Wile Coyote",
        company: "ACME, Inc.",
        close: None,
    },
    DemoDeal {
        name: "ACME support renewal",
        value: 6_500.0,
        stage: Stage::Negotiation,
        contact: "Wile Coyote",
        company: "ACME, Inc.",
        close: Some((2025, 6, 30)),
    },
    DemoDeal {
        name: "FossRust Labs pilot",
        value: 12_000.0,
        stage: Stage::Qualified,
        contact: "Ferris Crab",
        company: "FossRust Labs",
        close: None,
    },
    DemoDeal {
        name: "NuFlights booking portal",
        value: 27_500.0,
        stage: Stage::Proposal,
        contact: "Amelia Hart",
        company: "NuFlights LLC",
        close: Some((2025, 9, 15)),
    },
    DemoDeal {
        name: "NuFlights crew scheduling",
        value: 9_800.0,
        stage: Stage::Closed,
        contact: "Amelia Hart",
        company: "NuFlights LLC",
        close: Some((2025, 3, 1)),
    },
    DemoDeal {
        name: "Workshop tickets",
        value: 1_200.0,
        stage: Stage::Lead,
        contact: "Ferris Crab",
        company: "FossRust Labs",
        close: None,
    },
];

/// Inserts the demo pipeline unless the store already holds deals.
pub async fn seed_demo<S: DealStore>(store: &S) -> Result<Vec<Deal>> {
    let existing = store.list_deals().await?;
    if !existing.is_empty() {
        info!(count = existing.len(), "deals present; skipping seed");
        return Ok(Vec::new());
    }

    let mut created = Vec::with_capacity(DEMO_DEALS.len());
    for demo in &DEMO_DEALS {
        let draft = DealDraft {
            name: demo.name.to_string(),
            value: demo.value,
            stage: Some(demo.stage),
            contact_name: Some(demo.contact.to_string()),
            company_name: Some(demo.company.to_string()),
            close_date: demo
                .close
                .and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            ..Default::default()
        };
        let deal = store.create_deal(draft.validate()?).await?;
        created.push(deal);
    }
    info!(count = created.len(), "demo deals seeded");
    Ok(created)
}
