use std::convert::Infallible;
use std::net::IpAddr;

use log::debug;
use rocket::request::{FromRequest, Outcome, Request};

use crate::error::{Error, Result};
use crate::verification::VerificationGate;

/// The network address a request came from. This is the voter identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOrigin(Option<IpAddr>);

impl ClientOrigin {
    pub fn ip(&self) -> Option<IpAddr> {
        self.0
    }

    /// The address as used in storage keys.
    pub fn identity(&self) -> Result<String> {
        self.0
            .map(|ip| ip.to_string())
            .ok_or_else(|| Error::BadRequest("client address unavailable".to_string()))
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientOrigin {
    type Error = Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(ClientOrigin(req.client_ip()))
    }
}

/// Require a positive human-verification decision for `token`.
pub async fn verify_human(
    gate: &dyn VerificationGate,
    token: Option<&str>,
    origin: &ClientOrigin,
) -> Result<()> {
    let token = token.ok_or_else(|| Error::BadRequest("missing recaptcha token".to_string()))?;
    if gate.verify(token, origin.ip()).await? {
        Ok(())
    } else {
        debug!("Human verification declined for {:?}", origin.ip());
        Err(Error::VerificationFailed("failed recaptcha".to_string()))
    }
}
