//! Construction of the URI used to launch a wallet for local association.

use std::fmt;
use std::ops::RangeInclusive;

use url::Url;

/// URI used when no wallet-specific base URI is configured
pub const DEFAULT_ASSOCIATION_URI: &str = "solana-wallet:/v1/associate/local";

/// Path appended to a wallet-specific base URI
pub const ASSOCIATION_PATH: &str = "v1/associate/local";

/// Ports a local association may listen on
pub const LOCAL_PORT_RANGE: RangeInclusive<u16> = 49152..=65535;

/// Errors building an association intent
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntentError {
    #[error("Port {0} is outside the local association range")]
    PortOutOfRange(u16),

    #[error("Association session token is empty")]
    EmptySessionToken,

    #[error("Endpoint-specific URI prefix must be HTTPS: {0}")]
    InsecureBaseUri(String),

    #[error("Invalid association URI: {0}")]
    InvalidUri(String),
}

/// Launchable association request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssociationIntent {
    uri: Url,
}

impl AssociationIntent {
    /// Build the launch URI for an association listening on `port`.
    ///
    /// With a `base_uri` the request targets that wallet endpoint
    /// (`<base>/v1/associate/local`), otherwise the generic
    /// `solana-wallet:` scheme is used so any installed wallet may answer.
    pub fn new(base_uri: Option<&Url>, port: u16, session_token: &str) -> Result<Self, IntentError> {
        if !LOCAL_PORT_RANGE.contains(&port) {
            return Err(IntentError::PortOutOfRange(port));
        }
        if session_token.is_empty() {
            return Err(IntentError::EmptySessionToken);
        }

        let mut uri = match base_uri {
            Some(base) => endpoint_uri(base)?,
            None => Url::parse(DEFAULT_ASSOCIATION_URI)
                .map_err(|e| IntentError::InvalidUri(e.to_string()))?,
        };
        uri.query_pairs_mut()
            .append_pair("association", session_token)
            .append_pair("port", &port.to_string());

        Ok(Self { uri })
    }

    /// Parsed launch URI
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Launch URI as a string
    pub fn as_str(&self) -> &str {
        self.uri.as_str()
    }
}

impl fmt::Display for AssociationIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri.as_str())
    }
}

/// Parse and check a wallet-specific base URI.
pub fn parse_base_uri(raw: &str) -> Result<Url, IntentError> {
    let url = Url::parse(raw).map_err(|e| IntentError::InvalidUri(format!("{raw}: {e}")))?;
    if url.scheme() != "https" {
        return Err(IntentError::InsecureBaseUri(raw.to_string()));
    }
    Ok(url)
}

fn endpoint_uri(base: &Url) -> Result<Url, IntentError> {
    if base.scheme() != "https" {
        return Err(IntentError::InsecureBaseUri(base.to_string()));
    }
    let mut uri = base.clone();
    let path = format!("{}/{}", base.path().trim_end_matches('/'), ASSOCIATION_PATH);
    uri.set_path(&path);
    uri.set_query(None);
    uri.set_fragment(None);
    Ok(uri)
}
