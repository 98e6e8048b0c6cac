use std::sync::Arc;

use mongodb::Database;

use crate::config::AppConfig;
use crate::errors::Result;
use crate::services::email_service::SmtpMailer;
use crate::services::otp_service::OtpService;
use crate::services::otp_store::MongoOtpStore;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
    pub otp_service: OtpService,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig) -> Result<Self> {
        let mailer = Arc::new(SmtpMailer::new(
            &config.smtp_host,
            &config.smtp_username,
            &config.smtp_password,
            &config.from_email,
        )?);
        let store = Arc::new(MongoOtpStore::new(&db));
        let otp_service = OtpService::new(
            store,
            mailer,
            config.site_name.clone(),
            config.jwt_secret.clone(),
        );

        Ok(Self {
            db,
            config: Arc::new(config),
            otp_service,
        })
    }
}
