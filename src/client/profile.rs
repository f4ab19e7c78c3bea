//! Student profile endpoint.

use tracing::instrument;

use crate::consts;
use crate::error::Result;
use crate::models::Profile;
use crate::models::profile::parse_profile;

use super::Client;

impl Client {
    /// The student's profile, scraped from the account information page
    /// on first use and cached until the session cookies change.
    #[instrument(level = "debug", skip(self))]
    pub async fn profile(&self) -> Result<Profile> {
        if let Some(cached) = self.session.cache_value("profile") {
            if let Ok(profile) = serde_json::from_value::<Profile>(cached) {
                return Ok(profile);
            }
        }

        let student_id = self.student_id().await?;
        let url = format!("{}{}", consts::PROFILE_URL, student_id);
        let html = self.session.get(&url).await?.text().await?;
        let profile = parse_profile(&html)?;

        if let Ok(value) = serde_json::to_value(&profile) {
            self.session.store_value("profile", value);
        }
        Ok(profile)
    }
}
