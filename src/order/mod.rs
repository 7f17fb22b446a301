//! Order, authorization and challenge resources.
//!
//! These are stateless façades over the signing transport. Every call is
//! exactly one round trip to the CA; nothing is cached, so polling is done by
//! calling `get` again. The state machine driving them lives in [`Issuer`].
//!
//! An order goes through:
//!
//! 1. `pending` while authorizations are outstanding.
//! 2. `ready` once all authorizations are valid. Time to [`finalize`].
//! 3. `processing` while the CA signs the CSR.
//! 4. `valid` with a certificate URL, or `invalid`.
//!
//! [`Issuer`]: ../struct.Issuer.html
//! [`finalize`]: struct.OrderService.html#method.finalize
use crate::api::{ApiFinalize, ApiIdentifier, ApiOrder};
use crate::dir::Directory;
use crate::req::HttpClient;
use crate::util::{base64url, read_json};
use crate::{Error, Result};

mod auth;

pub use self::auth::{AuthorizationService, ChallengeResponse, ChallengeService};

/// An order with the URL used to poll it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderResource {
    pub location: String,
    pub order: ApiOrder,
}

/// Creating, fetching and finalizing orders.
#[derive(Debug)]
pub struct OrderService<'a, H: HttpClient> {
    dir: &'a Directory<H>,
}

impl<'a, H: HttpClient> OrderService<'a, H> {
    pub(crate) fn new(dir: &'a Directory<H>) -> Self {
        OrderService { dir }
    }

    /// Create a new order for the domains.
    ///
    /// Every call creates a new order with the CA, even when the domain
    /// names are exactly the same as a previous order.
    pub fn new_order(&self, domains: &[&str]) -> Result<OrderResource> {
        if domains.is_empty() {
            return Err(Error::Config("an order needs at least one domain".into()));
        }
        let order = ApiOrder {
            identifiers: domains.iter().map(|d| ApiIdentifier::dns(d)).collect(),
            ..Default::default()
        };

        let new_order_url = &self.dir.api_directory().newOrder;
        let res = self.dir.transport().post(new_order_url, &order)?;
        let location = res.expect_header("location")?.to_string();
        let order: ApiOrder = read_json(&res)?;
        Ok(OrderResource { location, order })
    }

    /// Fetch the current state of the order (POST-as-GET).
    pub fn get(&self, url: &str) -> Result<OrderResource> {
        let res = self.dir.transport().post_as_get(url)?;
        Ok(OrderResource {
            location: url.to_string(),
            order: read_json(&res)?,
        })
    }

    /// Submit the DER encoded CSR. The order normally comes back as
    /// `processing`, to be polled until `valid`.
    pub fn finalize(&self, finalize_url: &str, csr_der: &[u8]) -> Result<ApiOrder> {
        let finalize = ApiFinalize {
            csr: base64url(csr_der),
        };
        let res = self.dir.transport().post(finalize_url, &finalize)?;
        read_json(&res)
    }
}
