//! Reconciliation of persisted asset changes with the link index.
//!
//! Agent changes link and unlink protocol configurations; changes to other
//! assets link and unlink their agent-linked attributes. Every decision is a
//! content comparison between the previous and current attribute sets, so
//! replaying the same event produces no driver calls the second time.

use super::link_index::{LinkIndex, LinkIndexError, LinkOutcome, UnlinkOutcome};
use crate::linking::{
    domain::{
        AssetChangeEvent, AttributeRef, LinkedAttribute, PersistenceCause, ProtocolConfiguration,
        agent_linked_attributes, protocol_configurations,
    },
    ports::{AssetQuery, AssetStore},
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Summary of the link operations one reconciliation performed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Protocol configurations newly linked.
    pub linked_configurations: usize,
    /// Protocol configurations unlinked.
    pub unlinked_configurations: usize,
    /// Attributes newly bound.
    pub linked_attributes: usize,
    /// Attributes released.
    pub unlinked_attributes: usize,
    /// Operations that failed and were contained.
    pub failures: usize,
    /// Agent-linked attributes whose configuration is not linked.
    pub unresolved: Vec<AttributeRef>,
}

impl ReconcileReport {
    /// Returns whether nothing was linked, unlinked or attempted.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self == &Self::default()
    }
}

/// Computes and applies link operations for asset change events.
pub struct Reconciler<S>
where
    S: AssetStore,
{
    index: Arc<LinkIndex>,
    store: Arc<S>,
}

impl<S> Reconciler<S>
where
    S: AssetStore,
{
    /// Creates a reconciler over the shared link index and asset store.
    #[must_use]
    pub const fn new(index: Arc<LinkIndex>, store: Arc<S>) -> Self {
        Self { index, store }
    }

    /// Reconciles a change to an agent.
    ///
    /// An update without attribute sets is ignored.
    pub async fn reconcile_agent(&self, event: &AssetChangeEvent) -> ReconcileReport {
        let agent = event.asset();
        let mut report = ReconcileReport::default();
        tracing::debug!(agent_id = %agent.id(), cause = %event.cause(), "reconciling agent change");

        match event.cause() {
            PersistenceCause::Insert => {
                for configuration in agent.protocol_configurations() {
                    self.link_protocol_configuration(&configuration, &mut report)
                        .await;
                }
            }
            PersistenceCause::Update => {
                let (Some(previous), Some(current)) =
                    (event.previous_attributes(), event.current_attributes())
                else {
                    return report;
                };
                let before = protocol_configurations(agent.id(), previous);
                let after = protocol_configurations(agent.id(), current);

                for removed in before
                    .iter()
                    .filter(|old| !after.iter().any(|new| new.same_content(old)))
                {
                    self.unlink_protocol_configuration(removed, &mut report)
                        .await;
                }
                // Unlinks above complete before any dependent attribute is relinked.
                for added in after
                    .iter()
                    .filter(|new| !before.iter().any(|old| old.same_content(new)))
                {
                    self.link_protocol_configuration(added, &mut report).await;
                }
            }
            PersistenceCause::Delete => {
                for configuration in agent.protocol_configurations() {
                    self.unlink_protocol_configuration(&configuration, &mut report)
                        .await;
                }
            }
        }
        report
    }

    /// Reconciles a change to a non-agent asset.
    ///
    /// An update without attribute sets is ignored.
    pub async fn reconcile_asset(&self, event: &AssetChangeEvent) -> ReconcileReport {
        let asset = event.asset();
        let mut report = ReconcileReport::default();
        tracing::debug!(asset_id = %asset.id(), cause = %event.cause(), "reconciling asset change");

        match event.cause() {
            PersistenceCause::Insert => {
                self.link_grouped(asset.agent_linked_attributes(), &mut report)
                    .await;
            }
            PersistenceCause::Update => {
                let (Some(previous), Some(current)) =
                    (event.previous_attributes(), event.current_attributes())
                else {
                    return report;
                };
                let ignored_fields = &self.index.settings().diff_ignored_fields;
                let before = agent_linked_attributes(asset.id(), previous);
                let after = agent_linked_attributes(asset.id(), current);

                let removed = only_in(&before, &after, ignored_fields);
                let added = only_in(&after, &before, ignored_fields);
                self.unlink_grouped(removed, &mut report).await;
                self.link_grouped(added, &mut report).await;
            }
            PersistenceCause::Delete => {
                self.unlink_grouped(asset.agent_linked_attributes(), &mut report)
                    .await;
            }
        }
        report
    }

    /// Links a protocol configuration and then every stored attribute that
    /// points at it.
    ///
    /// Dependent attributes are only linked when the configuration was newly
    /// linked; a driver failure leaves them unbound.
    pub async fn link_protocol_configuration(
        &self,
        configuration: &ProtocolConfiguration,
        report: &mut ReconcileReport,
    ) {
        let protocol_ref = configuration.reference();
        match self.index.link_configuration(configuration).await {
            Ok(LinkOutcome::Linked) => report.linked_configurations += 1,
            Ok(LinkOutcome::Unchanged) => return,
            Err(LinkIndexError::DriverNotFound { driver, .. }) => {
                tracing::warn!(
                    protocol_ref = %protocol_ref,
                    driver = %driver,
                    "cannot find driver for protocol configuration"
                );
                report.failures += 1;
                return;
            }
            Err(err) => {
                tracing::error!(protocol_ref = %protocol_ref, error = %err, "failed to link protocol configuration");
                report.failures += 1;
                return;
            }
        }

        let assets = match self
            .store
            .find_all(&AssetQuery::ByAgentLink(protocol_ref.clone()))
            .await
        {
            Ok(assets) => assets,
            Err(err) => {
                tracing::error!(
                    protocol_ref = %protocol_ref,
                    error = %err,
                    "failed to load assets linked to protocol configuration"
                );
                report.failures += 1;
                return;
            }
        };

        let dependents: Vec<LinkedAttribute> = assets
            .iter()
            .flat_map(|asset| asset.agent_linked_attributes())
            .filter(|attribute| attribute.agent_link() == Some(protocol_ref))
            .collect();
        if !dependents.is_empty() {
            self.link_group(protocol_ref, dependents, report).await;
        }
    }

    /// Unlinks a protocol configuration if it is still the linked one.
    pub async fn unlink_protocol_configuration(
        &self,
        configuration: &ProtocolConfiguration,
        report: &mut ReconcileReport,
    ) {
        match self.index.unlink_configuration_matching(configuration).await {
            UnlinkOutcome::Unlinked => report.unlinked_configurations += 1,
            UnlinkOutcome::NotLinked | UnlinkOutcome::Superseded => {}
        }
    }

    async fn link_grouped(&self, attributes: Vec<LinkedAttribute>, report: &mut ReconcileReport) {
        let mut groups: BTreeMap<AttributeRef, Vec<LinkedAttribute>> = BTreeMap::new();
        for attribute in attributes {
            let Some(protocol_ref) = attribute.agent_link().cloned() else {
                continue;
            };
            if self.index.protocol_configuration(&protocol_ref).is_none() {
                tracing::warn!(
                    attribute_ref = %attribute.reference(),
                    protocol_ref = %protocol_ref,
                    "linked protocol configuration not found"
                );
                report.unresolved.push(attribute.reference().clone());
                continue;
            }
            groups.entry(protocol_ref).or_default().push(attribute);
        }

        for (protocol_ref, group) in groups {
            self.link_group(&protocol_ref, group, report).await;
        }
    }

    async fn unlink_grouped(&self, attributes: Vec<LinkedAttribute>, report: &mut ReconcileReport) {
        for (protocol_ref, group) in group_by_link(attributes) {
            match self.index.unlink_attributes(&protocol_ref, group).await {
                Ok(released) => report.unlinked_attributes += released.len(),
                Err(LinkIndexError::ConfigurationNotLinked(_)) => {}
                Err(err) => {
                    tracing::error!(protocol_ref = %protocol_ref, error = %err, "failed to unlink attributes");
                    report.failures += 1;
                }
            }
        }
    }

    async fn link_group(
        &self,
        protocol_ref: &AttributeRef,
        attributes: Vec<LinkedAttribute>,
        report: &mut ReconcileReport,
    ) {
        match self.index.link_attributes(protocol_ref, attributes).await {
            Ok(bound) => report.linked_attributes += bound.len(),
            Err(err) => {
                tracing::error!(protocol_ref = %protocol_ref, error = %err, "failed to link attributes");
                report.failures += 1;
            }
        }
    }
}

fn only_in(
    source: &[LinkedAttribute],
    other: &[LinkedAttribute],
    ignored_fields: &[String],
) -> Vec<LinkedAttribute> {
    source
        .iter()
        .filter(|candidate| {
            !other.iter().any(|existing| {
                existing.reference() == candidate.reference()
                    && existing
                        .attribute()
                        .content_eq_ignoring(candidate.attribute(), ignored_fields)
            })
        })
        .cloned()
        .collect()
}

fn group_by_link(attributes: Vec<LinkedAttribute>) -> BTreeMap<AttributeRef, Vec<LinkedAttribute>> {
    let mut groups: BTreeMap<AttributeRef, Vec<LinkedAttribute>> = BTreeMap::new();
    for attribute in attributes {
        if let Some(protocol_ref) = attribute.agent_link().cloned() {
            groups.entry(protocol_ref).or_default().push(attribute);
        }
    }
    groups
}
