use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Deals {
    Table,
    Id,
    Name,
    Value,
    Stage,
    ContactName,
    ContactId,
    CompanyName,
    CompanyId,
    Description,
    CloseDate,
    CreatedAt,
    StageUpdatedAt,
}

const STAGE_KEYS: [&str; 5] = ["lead", "qualified", "proposal", "negotiation", "closed"];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Deals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Deals::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Deals::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Deals::Value).double().null())
                    .col(
                        ColumnDef::new(Deals::Stage)
                            .string_len(16)
                            .not_null()
                            .default("lead")
                            .check(Expr::col(Deals::Stage).is_in(STAGE_KEYS)),
                    )
                    .col(ColumnDef::new(Deals::ContactName).string_len(255).null())
                    .col(ColumnDef::new(Deals::ContactId).integer().null())
                    .col(ColumnDef::new(Deals::CompanyName).string_len(255).null())
                    .col(ColumnDef::new(Deals::CompanyId).integer().null())
                    .col(ColumnDef::new(Deals::Description).text().null())
                    .col(ColumnDef::new(Deals::CloseDate).date().null())
                    .col(
                        ColumnDef::new(Deals::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Deals::StageUpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_deals_stage")
                    .table(Deals::Table)
                    .col(Deals::Stage)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_deals_stage").table(Deals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Deals::Table).to_owned())
            .await
    }
}
