use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScheduledPosts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ScheduledPosts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(ScheduledPosts::UserId).uuid().not_null())
                    .col(ColumnDef::new(ScheduledPosts::Content).text().null())
                    .col(
                        ColumnDef::new(ScheduledPosts::MediaUrls)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(ScheduledPosts::ScheduledAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledPosts::Status)
                            .string_len(16)
                            .not_null()
                            .default("draft"),
                    )
                    .col(
                        ColumnDef::new(ScheduledPosts::PlatformOptions)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(ScheduledPosts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ScheduledPosts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_scheduled_posts_status_scheduled_at")
                    .table(ScheduledPosts::Table)
                    .col(ScheduledPosts::Status)
                    .col(ScheduledPosts::ScheduledAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SocialAccounts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SocialAccounts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(SocialAccounts::UserId).uuid().not_null())
                    .col(ColumnDef::new(SocialAccounts::Platform).string_len(16).not_null())
                    // Stored as ivHex:authTagHex:cipherHex.
                    .col(ColumnDef::new(SocialAccounts::AccessToken).text().not_null())
                    .col(
                        ColumnDef::new(SocialAccounts::PlatformAccountId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SocialAccounts::Metadata)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(SocialAccounts::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(SocialAccounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PostDestinations::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PostDestinations::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(PostDestinations::PostId).uuid().not_null())
                    .col(ColumnDef::new(PostDestinations::AccountId).uuid().not_null())
                    .col(
                        ColumnDef::new(PostDestinations::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(PostDestinations::PlatformPostId).string().null())
                    .col(ColumnDef::new(PostDestinations::ErrorMessage).text().null())
                    .col(
                        ColumnDef::new(PostDestinations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_post_destinations_post")
                            .from(PostDestinations::Table, PostDestinations::PostId)
                            .to(ScheduledPosts::Table, ScheduledPosts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_post_destinations_account")
                            .from(PostDestinations::Table, PostDestinations::AccountId)
                            .to(SocialAccounts::Table, SocialAccounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One destination per (post, account).
        manager
            .create_index(
                Index::create()
                    .name("uq_post_destinations_post_account")
                    .table(PostDestinations::Table)
                    .col(PostDestinations::PostId)
                    .col(PostDestinations::AccountId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // No foreign keys: the audit trail outlives deleted posts.
        manager
            .create_table(
                Table::create()
                    .table(PublishLogs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PublishLogs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(PublishLogs::PostId).uuid().not_null())
                    .col(ColumnDef::new(PublishLogs::DestinationId).uuid().not_null())
                    .col(ColumnDef::new(PublishLogs::Platform).string_len(16).null())
                    .col(ColumnDef::new(PublishLogs::Status).string_len(16).not_null())
                    .col(ColumnDef::new(PublishLogs::ErrorCode).string_len(64).null())
                    .col(ColumnDef::new(PublishLogs::ErrorMessage).text().null())
                    .col(ColumnDef::new(PublishLogs::Attempt).integer().not_null())
                    .col(
                        ColumnDef::new(PublishLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_publish_logs_post_id")
                    .table(PublishLogs::Table)
                    .col(PublishLogs::PostId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PublishLogs::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PostDestinations::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SocialAccounts::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ScheduledPosts::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ScheduledPosts {
    Table,
    Id,
    UserId,
    Content,
    MediaUrls,
    ScheduledAt,
    Status,
    PlatformOptions,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SocialAccounts {
    Table,
    Id,
    UserId,
    Platform,
    AccessToken,
    PlatformAccountId,
    Metadata,
    IsActive,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PostDestinations {
    Table,
    Id,
    PostId,
    AccountId,
    Status,
    PlatformPostId,
    ErrorMessage,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PublishLogs {
    Table,
    Id,
    PostId,
    DestinationId,
    Platform,
    Status,
    ErrorCode,
    ErrorMessage,
    Attempt,
    CreatedAt,
}
