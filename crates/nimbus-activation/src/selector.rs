//! Resolution of selection criteria into concrete activation refs.

use tracing::debug;

use crate::error::{ActivationError, ActivationResult};
use crate::gateway::RuntimeQueryGateway;
use crate::model::{ActivationRef, ListResponse, SelectionCriteria};

/// Resolves which activations a command operates on.
///
/// Precedence: explicit id (no network call), then "most recent" via a single
/// listing query, otherwise [`ActivationError::MissingIdentifier`].
pub struct ActivationSelector<'a, G: ?Sized> {
    gateway: &'a G,
}

impl<'a, G> ActivationSelector<'a, G>
where
    G: RuntimeQueryGateway + ?Sized,
{
    /// Create a selector backed by the given gateway.
    #[must_use]
    pub const fn new(gateway: &'a G) -> Self {
        Self { gateway }
    }

    /// Resolve `criteria` into an ordered list of activation refs.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::MissingIdentifier`] when neither an id nor
    /// `use_last` was supplied, [`ActivationError::NoActivationsFound`] when
    /// the listing is empty, and [`ActivationError::Upstream`] when the
    /// listing call itself fails.
    pub async fn resolve(
        &self,
        criteria: &SelectionCriteria,
    ) -> ActivationResult<Vec<ActivationRef>> {
        if let Some(activation_id) = criteria.explicit_id() {
            debug!(activation_id, "resolved explicit activation id");
            return Ok(vec![ActivationRef::from_id(activation_id)]);
        }

        if !criteria.use_last {
            return Err(ActivationError::MissingIdentifier);
        }

        let query = criteria.list_query();
        debug!(
            limit = ?query.limit,
            skip = ?query.skip,
            name = ?query.name,
            "resolving most recent activations"
        );

        let response = self
            .gateway
            .list(&query)
            .await
            .map_err(|err| ActivationError::upstream("list the activations", err))?;

        let activations = match response {
            ListResponse::Activations(activations) => activations,
            ListResponse::Count(_) => {
                return Err(ActivationError::upstream(
                    "list the activations",
                    anyhow::anyhow!("listing returned a count instead of activation records"),
                ));
            }
        };

        if activations.is_empty() {
            return Err(ActivationError::NoActivationsFound {
                name_filter: criteria.name_filter.clone(),
            });
        }

        debug!(count = activations.len(), "resolved activations from listing");
        Ok(activations)
    }
}
