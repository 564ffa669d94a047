//! Accounts, roles and OAuth2 clients/tokens.
//!
//! - application_user: staff and patient accounts
//! - user_role: ordered role assignments
//! - oauth2_client: registered token clients
//! - oauth2_token: issued access/refresh token pairs

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ApplicationUser::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ApplicationUser::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ApplicationUser::UserName).string().not_null())
                    .col(
                        ColumnDef::new(ApplicationUser::NormalizedUserName)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(ApplicationUser::FirstName).string().not_null())
                    .col(ColumnDef::new(ApplicationUser::LastName).string().not_null())
                    .col(ColumnDef::new(ApplicationUser::Email).string().null())
                    .col(ColumnDef::new(ApplicationUser::PhoneNumber).string().null())
                    .col(ColumnDef::new(ApplicationUser::BirthDate).date().null())
                    .col(ColumnDef::new(ApplicationUser::PasswordHash).string().null())
                    .col(ColumnDef::new(ApplicationUser::ClinicId).string().null())
                    .col(
                        ColumnDef::new(ApplicationUser::CreatedAt)
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
                    .name("idx_application_user_clinic_id")
                    .table(ApplicationUser::Table)
                    .col(ApplicationUser::ClinicId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserRole::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UserRole::UserId).string().not_null())
                    .col(ColumnDef::new(UserRole::Role).string().not_null())
                    .col(
                        ColumnDef::new(UserRole::Position)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .primary_key(Index::create().col(UserRole::UserId).col(UserRole::Role))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OAuth2Client::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2Client::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OAuth2Client::SecretHash).string().null())
                    .col(ColumnDef::new(OAuth2Client::DisplayName).string().not_null())
                    .col(
                        ColumnDef::new(OAuth2Client::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OAuth2Token::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2Token::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Token::AccessToken)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Token::RefreshToken)
                            .string()
                            .null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Token::TokenType)
                            .string()
                            .not_null()
                            .default("Bearer"),
                    )
                    .col(ColumnDef::new(OAuth2Token::ClientId).string().not_null())
                    .col(ColumnDef::new(OAuth2Token::UserId).string().not_null())
                    .col(ColumnDef::new(OAuth2Token::Scope).text().not_null())
                    .col(ColumnDef::new(OAuth2Token::Claims).text().not_null())
                    .col(
                        ColumnDef::new(OAuth2Token::AccessTokenExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Token::RefreshTokenExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Token::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Token::RevokedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_oauth2_token_user_id")
                    .table(OAuth2Token::Table)
                    .col(OAuth2Token::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OAuth2Token::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OAuth2Client::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserRole::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ApplicationUser::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum ApplicationUser {
    Table,
    Id,
    UserName,
    NormalizedUserName,
    FirstName,
    LastName,
    Email,
    PhoneNumber,
    BirthDate,
    PasswordHash,
    ClinicId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum UserRole {
    Table,
    UserId,
    Role,
    Position,
}

#[derive(DeriveIden)]
enum OAuth2Client {
    #[sea_orm(iden = "oauth2_client")]
    Table,
    Id,
    SecretHash,
    DisplayName,
    CreatedAt,
}

#[derive(DeriveIden)]
enum OAuth2Token {
    #[sea_orm(iden = "oauth2_token")]
    Table,
    Id,
    AccessToken,
    RefreshToken,
    TokenType,
    ClientId,
    UserId,
    Scope,
    Claims,
    AccessTokenExpiresAt,
    RefreshTokenExpiresAt,
    CreatedAt,
    RevokedAt,
}
