//! Message handlers: what the integration does with each request type.
//!
//! Dispatch is an exhaustive `match` over [`AgentMessage`]. A handler that
//! does not serve a message returns [`Dispatch::Skipped`] instead of an
//! error, so "intentionally unhandled" never looks like "broken".

use std::future::Future;
use std::time::Duration;

use dz_core::FeatureFlags;

use crate::archive::ProjectArchive;
use crate::error::HandlerError;
use crate::message::{
    AdditionalCostsResponse, AddressBookSyncResponse, AgentMessage, AgentResponse, Article,
    ArticlesSyncResponse, EventLog, ExportItemResult, ExportToErpResponse, PartTypeStepRequest,
    PartyArticleNumbers, ProductionTimeResponse, ProjectDocument, Relation, ScalePrice,
    SellingBuyingPartyArticleRequest, SellingBuyingPartyArticleResponse,
};

/// What a handler did with a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Handled, optionally with a response for the producer.
    Handled(Option<AgentResponse>),
    /// Deliberately not handled; the file stays where it is.
    Skipped,
}

/// Handles decoded requests.
///
/// Implementations are shared across concurrently processed files.
pub trait RequestHandler: Send + Sync + 'static {
    /// Handles a standalone message file.
    fn handle_message(
        &self,
        message: AgentMessage,
    ) -> impl Future<Output = Result<Dispatch, HandlerError>> + Send;

    /// Handles a project export: the JSON document plus its companion archive.
    fn handle_project(
        &self,
        project: ProjectDocument,
        archive: ProjectArchive,
    ) -> impl Future<Output = Result<Dispatch, HandlerError>> + Send;
}

/// Built-in handlers, gated per message type by [`FeatureFlags`].
///
/// Responses are example payloads in the exact shape the producer expects;
/// replacing them with real lookups is the point of an integration.
#[derive(Debug, Clone, Default)]
pub struct IntegrationHandlers {
    features: FeatureFlags,
    source: String,
}

impl IntegrationHandlers {
    /// Creates handlers with the given feature flags.
    #[must_use]
    pub fn new(features: FeatureFlags) -> Self {
        Self {
            features,
            source: String::from("dropzone"),
        }
    }

    /// Sets the integration name reported in ERP export responses.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Returns the feature flags.
    #[must_use]
    pub const fn features(&self) -> &FeatureFlags {
        &self.features
    }

    fn dispatch(&self, message: AgentMessage) -> Result<Dispatch, HandlerError> {
        let enabled = match &message {
            AgentMessage::RequestAddressBookSyncMessage(_) => self.features.address_book_sync,
            AgentMessage::RequestArticlesSyncMessage(_) => self.features.article_sync,
            AgentMessage::RequestAdditionalCostsOfPartTypeMessage(_) => {
                self.features.additional_costs_of_part_type
            }
            AgentMessage::RequestProductionTimeEstimationOfPartTypeMessage(_) => {
                self.features.production_time_estimation_of_part_type
            }
            AgentMessage::RequestSellingBuyingPartyArticleMessage(_) => {
                self.features.selling_buying_party_article
            }
            AgentMessage::ProjectStatusChangedMessage(_) => self.features.project_status_changed,
            AgentMessage::Unknown => false,
        };
        if !enabled {
            tracing::info!(message_type = message.message_type(), "Message type not handled");
            return Ok(Dispatch::Skipped);
        }

        tracing::info!(message_type = message.message_type(), "Handling message");
        let response = match message {
            AgentMessage::RequestAddressBookSyncMessage(_) => address_book(),
            AgentMessage::RequestArticlesSyncMessage(_) => articles(),
            AgentMessage::RequestAdditionalCostsOfPartTypeMessage(request) => additional_costs(request)?,
            AgentMessage::RequestProductionTimeEstimationOfPartTypeMessage(request) => {
                production_time(request)?
            }
            AgentMessage::RequestSellingBuyingPartyArticleMessage(request) => party_articles(request),
            AgentMessage::ProjectStatusChangedMessage(changed) => {
                // Acknowledged without asking the producer to change anything.
                tracing::info!(
                    project_id = %changed.project_id,
                    state = %changed.project_state,
                    "Project status changed"
                );
                return Ok(Dispatch::Handled(None));
            }
            AgentMessage::Unknown => return Ok(Dispatch::Skipped),
        };
        Ok(Dispatch::Handled(Some(response)))
    }

    fn export(&self, project: &ProjectDocument, archive: &ProjectArchive) -> Dispatch {
        if !self.features.project_files {
            tracing::info!(project_id = %project.id, "Project files not handled");
            return Dispatch::Skipped;
        }

        for entry in archive.entries() {
            tracing::info!(project_id = %project.id, entry = %entry.name, bytes = entry.bytes.len(), "Archive entry");
        }

        let item = |id, log: EventLog| ExportItemResult {
            id,
            succeed: true,
            external_url: String::new(),
            event_logs: vec![log],
        };
        let imported = || EventLog::info("Imported").for_project(project.id);

        Dispatch::Handled(Some(AgentResponse::ExportToErpResponse(ExportToErpResponse {
            source: self.source.clone(),
            succeed: true,
            project_id: project.id,
            external_url: String::new(),
            event_logs: vec![
                EventLog::info(format!("Received {} attachment(s)", archive.len())).for_project(project.id),
            ],
            assembly_import_results: project
                .bom
                .assemblies
                .iter()
                .map(|a| item(a.id, imported().for_assembly(a.id)))
                .collect(),
            part_type_results: project
                .bom
                .part_list
                .iter()
                .map(|p| item(p.id, imported().for_part_type(p.id)))
                .collect(),
            attachments: archive.entries().iter().map(|e| e.name.clone()).collect(),
        })))
    }
}

impl RequestHandler for IntegrationHandlers {
    async fn handle_message(&self, message: AgentMessage) -> Result<Dispatch, HandlerError> {
        self.dispatch(message)
    }

    async fn handle_project(
        &self,
        project: ProjectDocument,
        archive: ProjectArchive,
    ) -> Result<Dispatch, HandlerError> {
        Ok(self.export(&project, &archive))
    }
}

fn require_step(request: &PartTypeStepRequest, message_type: &'static str) -> Result<(), HandlerError> {
    if request.working_step_key.trim().is_empty() {
        return Err(HandlerError::InvalidMessage {
            message_type,
            reason: String::from("working step key is empty"),
        });
    }
    Ok(())
}

fn address_book() -> AgentResponse {
    AgentResponse::RequestAddressBookSyncMessageResponse(AddressBookSyncResponse {
        relations: vec![Relation {
            id: 1,
            code: String::from("DEBTOR-1"),
            company_name: String::from("Example Metalworks B.V."),
            email: String::from("info@example.com"),
            postal_city: String::from("Eindhoven"),
            postal_country_code: String::from("NL"),
            vat_ratio: 21.0,
            payment_terms_code: String::from("60D"),
            delivery_terms_code: String::from("EXW"),
        }],
        event_logs: vec![EventLog::info("Address book exported")],
    })
}

fn articles() -> AgentResponse {
    AgentResponse::RequestArticlesSyncMessageResponse(ArticlesSyncResponse {
        articles: vec![
            Article {
                id: 1,
                code: String::from("ITEM1"),
                description: String::from("Item with single price"),
                price: Some(123.45),
                currency_iso_code: String::from("EUR"),
                unit_iso_code: String::from("C62"),
                scale_prices: Vec::new(),
            },
            Article {
                id: 2,
                code: String::from("ITEM2"),
                description: String::from("Item with scaled price"),
                price: None,
                currency_iso_code: String::from("EUR"),
                unit_iso_code: String::from("C62"),
                scale_prices: vec![
                    ScalePrice { price: 200.0, quantity: 0 },
                    ScalePrice { price: 100.0, quantity: 50 },
                ],
            },
        ],
        event_logs: vec![EventLog::info("Articles exported")],
    })
}

fn additional_costs(request: PartTypeStepRequest) -> Result<AgentResponse, HandlerError> {
    require_step(&request, "RequestAdditionalCostsOfPartTypeMessage")?;
    Ok(AgentResponse::RequestAdditionalCostsOfPartTypeMessageResponse(AdditionalCostsResponse {
        project_id: request.project_id,
        part_type_id: request.part_type.id,
        additional_costs: 12.50,
        event_logs: vec![
            EventLog::info("Additional costs calculated")
                .for_project(request.project_id)
                .for_part_type(request.part_type.id),
        ],
        working_step_key: request.working_step_key,
    }))
}

fn production_time(request: PartTypeStepRequest) -> Result<AgentResponse, HandlerError> {
    require_step(&request, "RequestProductionTimeEstimationOfPartTypeMessage")?;
    let estimate = u64::try_from(Duration::from_secs(12 * 60).as_millis()).unwrap_or(u64::MAX);
    Ok(AgentResponse::RequestProductionTimeEstimationOfPartTypeMessageResponse(
        ProductionTimeResponse {
            project_id: request.project_id,
            part_type_id: request.part_type.id,
            estimated_production_time_ms: estimate,
            event_logs: vec![
                EventLog::info("Production time estimated")
                    .for_project(request.project_id)
                    .for_part_type(request.part_type.id),
            ],
            working_step_key: request.working_step_key,
        },
    ))
}

fn party_articles(request: SellingBuyingPartyArticleRequest) -> AgentResponse {
    AgentResponse::RequestSellingBuyingPartyArticleMessageResponse(SellingBuyingPartyArticleResponse {
        project_id: request.project_id,
        responses: request
            .requests
            .iter()
            .map(|item| PartyArticleNumbers {
                bom_item_id: item.bom_item_id,
                buying_party_article_number: format!("BUYING-ART-{}", item.bom_item_id),
                selling_party_article_number: format!("SELLING-ART-{}", item.bom_item_id),
            })
            .collect(),
    })
}
