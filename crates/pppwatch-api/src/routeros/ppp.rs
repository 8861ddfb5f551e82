// PPP menu endpoints
//
// Secrets, active sessions and profiles under `/rest/ppp/*`, plus the
// interface listing that carries per-session byte counters.

use serde_json::{Value, json};
use tracing::debug;

use crate::error::Error;
use crate::routeros::client::RouterOsClient;
use crate::routeros::models::{Interface, NewPppSecret, PppActive, PppProfile, PppSecret};

const SECRET_MENU: &str = "ppp/secret";
const ACTIVE_MENU: &str = "ppp/active";

impl RouterOsClient {
    // ── Secrets ──────────────────────────────────────────────────────

    /// List all PPP secrets.
    ///
    /// `GET /rest/ppp/secret`
    pub async fn list_secrets(&self) -> Result<Vec<PppSecret>, Error> {
        let url = self.rest_url(SECRET_MENU)?;
        self.get(url).await
    }

    /// Find secrets by name. RouterOS enforces unique names, so this
    /// returns at most one record in practice.
    ///
    /// `GET /rest/ppp/secret?name={name}`
    pub async fn find_secrets(&self, name: &str) -> Result<Vec<PppSecret>, Error> {
        let url = self.rest_url(SECRET_MENU)?;
        self.get_filtered(url, &[("name", name)]).await
    }

    /// Set one property on every secret with the given name.
    ///
    /// `PATCH /rest/ppp/secret/{id}` with `{field: value}` per match.
    /// Fails with [`Error::NotFound`] if no secret has that name.
    pub async fn set_secret_field(&self, name: &str, field: &str, value: &str) -> Result<(), Error> {
        let matches = self.find_secrets(name).await?;
        if matches.is_empty() {
            return Err(Error::NotFound {
                menu: SECRET_MENU,
                name: name.to_owned(),
            });
        }

        debug!(name, field, "setting secret field");
        for secret in matches {
            let url = self.item_url(SECRET_MENU, &secret.id)?;
            let _: Value = self.patch(url, &json!({ field: value })).await?;
        }
        Ok(())
    }

    /// Create a secret.
    ///
    /// `PUT /rest/ppp/secret`
    pub async fn add_secret(&self, secret: &NewPppSecret) -> Result<(), Error> {
        let url = self.rest_url(SECRET_MENU)?;
        debug!(name = %secret.name, profile = %secret.profile, "adding secret");
        let _: Value = self.put(url, secret).await?;
        Ok(())
    }

    // ── Active sessions ──────────────────────────────────────────────

    /// List live PPP sessions.
    ///
    /// `GET /rest/ppp/active`
    pub async fn list_active(&self) -> Result<Vec<PppActive>, Error> {
        let url = self.rest_url(ACTIVE_MENU)?;
        self.get(url).await
    }

    /// Find live sessions for a secret name.
    ///
    /// `GET /rest/ppp/active?name={name}`
    pub async fn find_active(&self, name: &str) -> Result<Vec<PppActive>, Error> {
        let url = self.rest_url(ACTIVE_MENU)?;
        self.get_filtered(url, &[("name", name)]).await
    }

    /// Drop a live session. Removing a session that already ended is not
    /// an error.
    ///
    /// `DELETE /rest/ppp/active/{id}`
    pub async fn remove_active(&self, id: &str) -> Result<(), Error> {
        let url = self.item_url(ACTIVE_MENU, id)?;
        debug!(id, "removing active session");
        match self.delete(url).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }

    // ── Profiles ─────────────────────────────────────────────────────

    /// List PPP profiles.
    ///
    /// `GET /rest/ppp/profile`
    pub async fn list_profiles(&self) -> Result<Vec<PppProfile>, Error> {
        let url = self.rest_url("ppp/profile")?;
        self.get(url).await
    }

    // ── Interfaces ───────────────────────────────────────────────────

    /// List all interfaces with their byte counters.
    ///
    /// `GET /rest/interface`
    pub async fn list_interfaces(&self) -> Result<Vec<Interface>, Error> {
        let url = self.rest_url("interface")?;
        self.get(url).await
    }
}
