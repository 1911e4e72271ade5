use crate::config::{Community, LookupSettings};
use crate::phone::PhoneNumber;
use crate::roster::{LookupOutcome, RosterConnector, RosterLookup};
use std::sync::Arc;

/// The single seam for "is this number authorized for this community".
///
/// Both the manual `verify/<number>` command and the join-request controller
/// route through here, so matching semantics can never drift between the two
/// enforcement points.
pub struct Verifier {
    lookup: RosterLookup,
}

impl Verifier {
    pub fn new(connector: Arc<dyn RosterConnector>, settings: &LookupSettings) -> Self {
        Verifier {
            lookup: RosterLookup::new(connector, settings.max_retries, settings.columns.clone()),
        }
    }

    pub async fn verify(&self, raw: &str, community: &Community) -> LookupOutcome {
        let number = PhoneNumber::normalize(raw);
        self.lookup.lookup(&number, &community.sources).await
    }
}
