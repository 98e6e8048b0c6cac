use mongodb::{
    bson::doc,
    options::IndexOptions,
    Client, Collection, Database, IndexModel,
};

use crate::config::AppConfig;
use crate::errors::Result;
use crate::models::member::Member;
use crate::models::otp::OtpVerification;
use crate::models::program::Program;

pub async fn connect(config: &AppConfig) -> Result<Database> {
    let client = Client::with_uri_str(&config.database_url).await?;
    let db = client.database(&config.database_name);

    db.run_command(doc! { "ping": 1 }).await?;
    tracing::info!("Connected to database: {}", config.database_name);

    Ok(db)
}

/// Create the indexes the OTP store and sweep queries rely on, plus the
/// uniqueness constraints on member identity and program slugs.
pub async fn ensure_indexes(db: &Database) -> Result<()> {
    let otp: Collection<OtpVerification> = db.collection("otp_verifications");
    otp.create_index(
        IndexModel::builder()
            .keys(doc! { "email": 1, "is_verified": 1 })
            .build(),
    )
    .await?;
    otp.create_index(IndexModel::builder().keys(doc! { "expires_at": 1 }).build())
        .await?;

    let unique = IndexOptions::builder().unique(true).build();

    let members: Collection<Member> = db.collection("members");
    members
        .create_index(
            IndexModel::builder()
                .keys(doc! { "username": 1 })
                .options(unique.clone())
                .build(),
        )
        .await?;
    members
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(unique.clone())
                .build(),
        )
        .await?;

    let programs: Collection<Program> = db.collection("programs");
    programs
        .create_index(
            IndexModel::builder()
                .keys(doc! { "slug": 1 })
                .options(unique)
                .build(),
        )
        .await?;

    Ok(())
}
