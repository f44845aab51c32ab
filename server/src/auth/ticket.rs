//! Cookie-ticket authentication policy.
//!
//! A ticket is a signed, time-limited identity claim carried in a cookie:
//!
//! ```text
//! hex(sha512(secret || ts_be || userid)) || hex(ts, 8) || userid
//! ```
//!
//! where `ts` is the unix issue time in seconds. Validation recomputes the
//! digest over the presented timestamp and userid with the configured secret
//! and rejects tickets older than the configured timeout. The digest is fixed
//! at SHA-512.

use std::sync::Arc;
use std::time::Duration;

use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::HttpRequest;
use mockable::{Clock, DefaultClock};
use sha2::{Digest, Sha512};
use zeroize::Zeroizing;

use crate::config::Settings;

/// Cookie the ticket travels in.
pub const AUTH_COOKIE_NAME: &str = "auth_tkt";

/// Ticket lifetime applied when `authtkt_timeout` is not configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 86400;

/// Hex length of the SHA-512 digest prefix.
const DIGEST_HEX_LEN: usize = 128;

/// Hex length of the timestamp field.
const TS_HEX_LEN: usize = 8;

/// Errors raised while building the policy or minting tickets.
#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    /// No secret was configured.
    #[error("authtkt_secret is not configured")]
    MissingSecret,

    /// The clock reported a time outside the ticket's timestamp range.
    #[error("clock out of range for ticket timestamps")]
    ClockRange,
}

/// Cookie-ticket authentication policy.
///
/// Cloning is cheap; all clones share the clock.
#[derive(Clone)]
pub struct TicketPolicy {
    secret: Zeroizing<String>,
    timeout: Duration,
    secure: bool,
    clock: Arc<dyn Clock>,
    test_identity: Option<String>,
}

impl TicketPolicy {
    /// Build the policy from settings: required secret, timeout defaulting to
    /// [`DEFAULT_TIMEOUT_SECS`], and the configured secure flag.
    pub fn from_settings(settings: &Settings) -> Result<Self, TicketError> {
        let secret = settings
            .authtkt_secret
            .clone()
            .ok_or(TicketError::MissingSecret)?;
        let timeout = settings.authtkt_timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
        Ok(Self::new(secret, timeout, settings.authtkt_secure))
    }

    /// Build a policy from explicit parts with the system clock.
    pub fn new(secret: impl Into<String>, timeout_secs: u64, secure: bool) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
            timeout: Duration::from_secs(timeout_secs),
            secure,
            clock: Arc::new(DefaultClock),
            test_identity: None,
        }
    }

    /// Replace the clock, for expiry-sensitive tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Policy that reports `identity` for every request without consulting
    /// cookies. Stands in for an external identity provider in development
    /// and test deployments.
    pub fn testing(identity: impl Into<String>) -> Self {
        let mut policy = Self::new("insecure-testing-secret", DEFAULT_TIMEOUT_SECS, false);
        policy.test_identity = Some(identity.into());
        policy
    }

    /// Configured ticket lifetime.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether minted cookies carry the Secure attribute.
    pub fn secure(&self) -> bool {
        self.secure
    }

    /// The unauthenticated-userid claim for a request: the verified ticket
    /// identity, or `None` when the cookie is absent, forged, or expired.
    pub fn identity(&self, request: &HttpRequest) -> Option<String> {
        if let Some(fixed) = &self.test_identity {
            return Some(fixed.clone());
        }
        let cookie = request.cookie(AUTH_COOKIE_NAME)?;
        self.verify(cookie.value())
    }

    /// Mint a ticket cookie for `userid`.
    pub fn remember(&self, userid: &str) -> Result<Cookie<'static>, TicketError> {
        let now = self.clock.utc().timestamp();
        let ts = u32::try_from(now).map_err(|_| TicketError::ClockRange)?;
        let value = self.encode(ts, userid);
        let max_age = i64::try_from(self.timeout.as_secs()).map_err(|_| TicketError::ClockRange)?;
        Ok(self.cookie_with(value, CookieDuration::seconds(max_age)))
    }

    /// Removal cookie that clears the ticket.
    pub fn forget(&self) -> Cookie<'static> {
        self.cookie_with(String::new(), CookieDuration::ZERO)
    }

    fn cookie_with(&self, value: String, max_age: CookieDuration) -> Cookie<'static> {
        Cookie::build(AUTH_COOKIE_NAME, value)
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(max_age)
            .finish()
    }

    fn digest(&self, ts: u32, userid: &str) -> [u8; 64] {
        let mut hasher = Sha512::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(ts.to_be_bytes());
        hasher.update(userid.as_bytes());
        hasher.finalize().into()
    }

    fn encode(&self, ts: u32, userid: &str) -> String {
        let digest = self.digest(ts, userid);
        format!("{}{ts:08x}{userid}", hex::encode(digest))
    }

    /// Verify a ticket value, returning the userid when the digest matches
    /// and the ticket has not outlived the timeout.
    fn verify(&self, value: &str) -> Option<String> {
        let bytes = value.as_bytes();
        if bytes.len() <= DIGEST_HEX_LEN + TS_HEX_LEN {
            return None;
        }
        let (digest_hex, rest) = bytes.split_at(DIGEST_HEX_LEN);
        let (ts_hex, userid) = rest.split_at(TS_HEX_LEN);

        let presented = hex::decode(digest_hex).ok()?;
        let ts_str = std::str::from_utf8(ts_hex).ok()?;
        let ts = u32::from_str_radix(ts_str, 16).ok()?;
        let userid = std::str::from_utf8(userid).ok()?;

        if !constant_time_eq(&presented, &self.digest(ts, userid)) {
            return None;
        }

        let now = self.clock.utc().timestamp();
        let now = u64::try_from(now).ok()?;
        let age = now.saturating_sub(u64::from(ts));
        if age > self.timeout.as_secs() {
            return None;
        }

        Some(userid.to_owned())
    }
}

impl std::fmt::Debug for TicketPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The secret stays out of logs.
        f.debug_struct("TicketPolicy")
            .field("timeout", &self.timeout)
            .field("secure", &self.secure)
            .field("testing", &self.test_identity.is_some())
            .finish()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use chrono::{DateTime, Local, Utc};
    use rstest::rstest;

    /// Clock pinned to a fixed instant.
    struct FixedClock {
        utc_now: DateTime<Utc>,
    }

    impl Clock for FixedClock {
        fn local(&self) -> DateTime<Local> {
            self.utc_now.with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            self.utc_now
        }
    }

    fn fixed_clock(unix_secs: i64) -> Arc<dyn Clock> {
        Arc::new(FixedClock {
            utc_now: DateTime::from_timestamp(unix_secs, 0).expect("valid timestamp"),
        })
    }

    fn request_with_ticket(value: &str) -> HttpRequest {
        TestRequest::default()
            .cookie(Cookie::new(AUTH_COOKIE_NAME, value.to_owned()))
            .to_http_request()
    }

    #[rstest]
    fn remembered_ticket_round_trips() {
        let policy = TicketPolicy::new("hunter2", 3600, false);
        let cookie = policy.remember("guest").expect("mint ticket");

        let request = request_with_ticket(cookie.value());
        assert_eq!(policy.identity(&request).as_deref(), Some("guest"));
    }

    #[rstest]
    fn ticket_minted_with_other_secret_is_rejected() {
        let minting = TicketPolicy::new("hunter2", 3600, false);
        let verifying = TicketPolicy::new("changeme", 3600, false);
        let cookie = minting.remember("guest").expect("mint ticket");

        let request = request_with_ticket(cookie.value());
        assert_eq!(verifying.identity(&request), None);
    }

    #[rstest]
    fn tampered_userid_is_rejected() {
        let policy = TicketPolicy::new("hunter2", 3600, false);
        let cookie = policy.remember("guest").expect("mint ticket");

        let forged = format!("{}x", cookie.value());
        let request = request_with_ticket(&forged);
        assert_eq!(policy.identity(&request), None);
    }

    #[rstest]
    fn expired_ticket_is_rejected() {
        let issue = 1_600_000_000;
        let policy = TicketPolicy::new("hunter2", 10, false).with_clock(fixed_clock(issue));
        let cookie = policy.remember("guest").expect("mint ticket");

        // Within the timeout the ticket is honoured.
        let within = policy.clone().with_clock(fixed_clock(issue + 10));
        let request = request_with_ticket(cookie.value());
        assert_eq!(within.identity(&request).as_deref(), Some("guest"));

        // One second past the timeout it is not.
        let past = policy.with_clock(fixed_clock(issue + 11));
        assert_eq!(past.identity(&request), None);
    }

    #[rstest]
    fn missing_cookie_yields_no_identity() {
        let policy = TicketPolicy::new("hunter2", 3600, false);
        let request = TestRequest::default().to_http_request();
        assert_eq!(policy.identity(&request), None);
    }

    #[rstest]
    fn garbage_cookie_yields_no_identity() {
        let policy = TicketPolicy::new("hunter2", 3600, false);
        for garbage in ["".to_owned(), "short".to_owned(), "ff".repeat(80)] {
            let request = request_with_ticket(&garbage);
            assert_eq!(policy.identity(&request), None, "value: {garbage:?}");
        }
    }

    #[rstest]
    fn timeout_defaults_to_one_day_when_unconfigured() {
        let settings = Settings {
            authtkt_secret: Some("hunter2".to_owned()),
            authtkt_secure: true,
            ..Settings::default()
        };

        let policy = TicketPolicy::from_settings(&settings).expect("secret configured");
        assert_eq!(policy.timeout(), Duration::from_secs(86400));
        assert!(policy.secure());
    }

    #[rstest]
    fn configured_timeout_wins_over_the_default() {
        let settings = Settings {
            authtkt_secret: Some("hunter2".to_owned()),
            authtkt_timeout: Some(10),
            ..Settings::default()
        };

        let policy = TicketPolicy::from_settings(&settings).expect("secret configured");
        assert_eq!(policy.timeout(), Duration::from_secs(10));
    }

    #[rstest]
    fn missing_secret_fails_policy_construction() {
        let settings = Settings::default();

        assert!(matches!(
            TicketPolicy::from_settings(&settings),
            Err(TicketError::MissingSecret)
        ));
    }

    #[rstest]
    fn cookie_attributes_reflect_the_policy() {
        let policy = TicketPolicy::new("hunter2", 60, true);
        let cookie = policy.remember("guest").expect("mint ticket");

        assert_eq!(cookie.name(), AUTH_COOKIE_NAME);
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.max_age(), Some(CookieDuration::seconds(60)));
    }

    #[rstest]
    fn forget_clears_the_cookie() {
        let policy = TicketPolicy::new("hunter2", 60, false);
        let cookie = policy.forget();

        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
    }

    #[rstest]
    fn testing_policy_reports_the_fixed_identity() {
        let policy = TicketPolicy::testing("guest");
        let request = TestRequest::default().to_http_request();
        assert_eq!(policy.identity(&request).as_deref(), Some("guest"));
    }
}
