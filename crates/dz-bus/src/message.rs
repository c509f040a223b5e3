//! Typed request and response envelopes exchanged through the drop zone.
//!
//! Every file carries a `messageType` tag. Requests decode into the closed
//! [`AgentMessage`] set; an unrecognised tag decodes to
//! [`AgentMessage::Unknown`] instead of failing, so new producer message
//! types are skipped rather than routed to `error/`.
//!
//! ```
//! use dz_bus::AgentMessage;
//!
//! let json = r#"{
//!     "messageType": "RequestAdditionalCostsOfPartTypeMessage",
//!     "projectId": "5e2d7a4c-3a61-4e25-9c1f-4a0f3b7f6e11",
//!     "partType": { "id": "0f8fad5b-d9cb-469f-a165-70867728950e" },
//!     "workingStepKey": "bending"
//! }"#;
//! let message: AgentMessage = serde_json::from_str(json).unwrap();
//! assert_eq!(message.message_type(), "RequestAdditionalCostsOfPartTypeMessage");
//!
//! let unknown: AgentMessage = serde_json::from_str(r#"{"messageType":"Later"}"#).unwrap();
//! assert!(matches!(unknown, AgentMessage::Unknown));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Requests
// ============================================================================

/// A request dropped by the producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType")]
pub enum AgentMessage {
    /// Asks for the relation (address book) list.
    RequestAddressBookSyncMessage(AddressBookSyncRequest),
    /// Asks for the article list.
    RequestArticlesSyncMessage(ArticlesSyncRequest),
    /// Asks for additional costs of one working step of a part type.
    RequestAdditionalCostsOfPartTypeMessage(PartTypeStepRequest),
    /// Asks for the production time of one working step of a part type.
    RequestProductionTimeEstimationOfPartTypeMessage(PartTypeStepRequest),
    /// Asks for buying/selling party article numbers of BoM items.
    RequestSellingBuyingPartyArticleMessage(SellingBuyingPartyArticleRequest),
    /// Announces a project state change.
    ProjectStatusChangedMessage(ProjectStatusChanged),
    /// Any tag this build does not know.
    #[serde(other)]
    Unknown,
}

impl AgentMessage {
    /// Returns the `messageType` tag.
    #[must_use]
    pub const fn message_type(&self) -> &'static str {
        match self {
            Self::RequestAddressBookSyncMessage(_) => "RequestAddressBookSyncMessage",
            Self::RequestArticlesSyncMessage(_) => "RequestArticlesSyncMessage",
            Self::RequestAdditionalCostsOfPartTypeMessage(_) => "RequestAdditionalCostsOfPartTypeMessage",
            Self::RequestProductionTimeEstimationOfPartTypeMessage(_) => {
                "RequestProductionTimeEstimationOfPartTypeMessage"
            }
            Self::RequestSellingBuyingPartyArticleMessage(_) => "RequestSellingBuyingPartyArticleMessage",
            Self::ProjectStatusChangedMessage(_) => "ProjectStatusChangedMessage",
            Self::Unknown => "Unknown",
        }
    }
}

/// Body of an address book sync request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressBookSyncRequest {
    /// Only relations changed after this instant, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_since: Option<DateTime<Utc>>,
}

/// Body of an article sync request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArticlesSyncRequest {
    /// Only articles changed after this instant, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_since: Option<DateTime<Utc>>,
}

/// Reference to a part type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartTypeRef {
    /// Part type id.
    pub id: Uuid,
}

/// Body shared by the per-part-type working step requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartTypeStepRequest {
    /// Owning project.
    pub project_id: Uuid,
    /// Part type being quoted.
    pub part_type: PartTypeRef,
    /// Working step the question is about.
    pub working_step_key: String,
}

/// Body of a selling/buying party article request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellingBuyingPartyArticleRequest {
    /// Owning project.
    pub project_id: Uuid,
    /// BoM items to resolve.
    #[serde(default)]
    pub requests: Vec<BomItemRef>,
}

/// Reference to a bill-of-materials item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomItemRef {
    /// BoM item id.
    #[serde(rename = "boMItemId")]
    pub bom_item_id: Uuid,
}

/// Body of a project status notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatusChanged {
    /// Project whose state changed.
    pub project_id: Uuid,
    /// New state name.
    #[serde(default)]
    pub project_state: String,
}

// ============================================================================
// Responses
// ============================================================================

/// A response written back to the producer's inbound directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType")]
pub enum AgentResponse {
    /// Relations known to the integration.
    RequestAddressBookSyncMessageResponse(AddressBookSyncResponse),
    /// Articles known to the integration.
    RequestArticlesSyncMessageResponse(ArticlesSyncResponse),
    /// Additional costs of one working step.
    RequestAdditionalCostsOfPartTypeMessageResponse(AdditionalCostsResponse),
    /// Production time of one working step.
    RequestProductionTimeEstimationOfPartTypeMessageResponse(ProductionTimeResponse),
    /// Article numbers per BoM item.
    RequestSellingBuyingPartyArticleMessageResponse(SellingBuyingPartyArticleResponse),
    /// Requests a project state change on the producer side.
    ChangeProjectStatusMessage(ProjectStatusChanged),
    /// Result of exporting a project to the ERP.
    ExportToErpResponse(ExportToErpResponse),
}

impl AgentResponse {
    /// Returns the `messageType` tag.
    #[must_use]
    pub const fn message_type(&self) -> &'static str {
        match self {
            Self::RequestAddressBookSyncMessageResponse(_) => "RequestAddressBookSyncMessageResponse",
            Self::RequestArticlesSyncMessageResponse(_) => "RequestArticlesSyncMessageResponse",
            Self::RequestAdditionalCostsOfPartTypeMessageResponse(_) => {
                "RequestAdditionalCostsOfPartTypeMessageResponse"
            }
            Self::RequestProductionTimeEstimationOfPartTypeMessageResponse(_) => {
                "RequestProductionTimeEstimationOfPartTypeMessageResponse"
            }
            Self::RequestSellingBuyingPartyArticleMessageResponse(_) => {
                "RequestSellingBuyingPartyArticleMessageResponse"
            }
            Self::ChangeProjectStatusMessage(_) => "ChangeProjectStatusMessage",
            Self::ExportToErpResponse(_) => "ExportToErpResponse",
        }
    }
}

/// Severity of an [`EventLog`] entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLogLevel {
    /// Informational.
    Information,
    /// Something the operator should look at.
    Warning,
    /// The request could not be fully served.
    Error,
}

/// A log line attached to a response and shown to the producer's users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLog {
    /// When the entry was written.
    pub date_time: DateTime<Utc>,
    /// Severity.
    pub level: EventLogLevel,
    /// Text.
    pub message: String,
    /// Related project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    /// Related part type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_type_id: Option<Uuid>,
    /// Related assembly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembly_id: Option<Uuid>,
}

impl EventLog {
    /// Creates an information entry stamped now.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            date_time: Utc::now(),
            level: EventLogLevel::Information,
            message: message.into(),
            project_id: None,
            part_type_id: None,
            assembly_id: None,
        }
    }

    /// Attaches a project id.
    #[must_use]
    pub const fn for_project(mut self, project_id: Uuid) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// Attaches a part type id.
    #[must_use]
    pub const fn for_part_type(mut self, part_type_id: Uuid) -> Self {
        self.part_type_id = Some(part_type_id);
        self
    }

    /// Attaches an assembly id.
    #[must_use]
    pub const fn for_assembly(mut self, assembly_id: Uuid) -> Self {
        self.assembly_id = Some(assembly_id);
        self
    }
}

/// One relation in an address book response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    /// Integration-side id.
    pub id: i64,
    /// Debtor code.
    pub code: String,
    /// Company name.
    pub company_name: String,
    /// Contact e-mail.
    pub email: String,
    /// Postal city.
    pub postal_city: String,
    /// ISO country code.
    pub postal_country_code: String,
    /// VAT rate in percent, 0 to 100.
    pub vat_ratio: f64,
    /// ERP payment terms code.
    pub payment_terms_code: String,
    /// ERP delivery terms code.
    pub delivery_terms_code: String,
}

/// Address book response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressBookSyncResponse {
    /// Relations.
    pub relations: Vec<Relation>,
    /// Log entries.
    pub event_logs: Vec<EventLog>,
}

/// A price that applies from a quantity onward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalePrice {
    /// Unit price.
    pub price: f64,
    /// Minimum quantity.
    pub quantity: u32,
}

/// One article in an article sync response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// Integration-side id.
    pub id: i64,
    /// Article code.
    pub code: String,
    /// Description.
    pub description: String,
    /// Flat price, absent when scale prices apply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// ISO 4217 currency.
    pub currency_iso_code: String,
    /// UNECE Recommendation 20 unit code.
    pub unit_iso_code: String,
    /// Scaled prices.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scale_prices: Vec<ScalePrice>,
}

/// Article sync response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlesSyncResponse {
    /// Articles.
    pub articles: Vec<Article>,
    /// Log entries.
    pub event_logs: Vec<EventLog>,
}

/// Additional costs response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalCostsResponse {
    /// Owning project.
    pub project_id: Uuid,
    /// Part type.
    pub part_type_id: Uuid,
    /// Working step.
    pub working_step_key: String,
    /// Costs in the project currency.
    pub additional_costs: f64,
    /// Log entries.
    pub event_logs: Vec<EventLog>,
}

/// Production time response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionTimeResponse {
    /// Owning project.
    pub project_id: Uuid,
    /// Part type.
    pub part_type_id: Uuid,
    /// Working step.
    pub working_step_key: String,
    /// Estimate in milliseconds.
    pub estimated_production_time_ms: u64,
    /// Log entries.
    pub event_logs: Vec<EventLog>,
}

/// Article numbers resolved for one BoM item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyArticleNumbers {
    /// BoM item id.
    #[serde(rename = "boMItemId")]
    pub bom_item_id: Uuid,
    /// Buyer's article number.
    pub buying_party_article_number: String,
    /// Seller's article number.
    pub selling_party_article_number: String,
}

/// Selling/buying party article response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellingBuyingPartyArticleResponse {
    /// Owning project.
    pub project_id: Uuid,
    /// One entry per requested BoM item.
    pub responses: Vec<PartyArticleNumbers>,
}

/// Export result for one assembly or part type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportItemResult {
    /// Assembly or part type id.
    pub id: Uuid,
    /// Whether the ERP accepted it.
    pub succeed: bool,
    /// Link to the imported entity, if any.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub external_url: String,
    /// Log entries.
    pub event_logs: Vec<EventLog>,
}

/// ERP export response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportToErpResponse {
    /// Integration name.
    pub source: String,
    /// Whether the export as a whole succeeded.
    pub succeed: bool,
    /// Exported project.
    pub project_id: Uuid,
    /// Link to the imported project, if any.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub external_url: String,
    /// Log entries.
    pub event_logs: Vec<EventLog>,
    /// Per-assembly results.
    pub assembly_import_results: Vec<ExportItemResult>,
    /// Per-part-type results.
    pub part_type_results: Vec<ExportItemResult>,
    /// Names of the archive entries that were received.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

// ============================================================================
// Project export
// ============================================================================

/// Project document accompanying a project archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDocument {
    /// Project id.
    pub id: Uuid,
    /// Human-readable project name.
    #[serde(default)]
    pub name: String,
    /// Bill of materials.
    #[serde(rename = "boM", default)]
    pub bom: BillOfMaterials,
}

/// The part of a project's bill of materials the export cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BillOfMaterials {
    /// Assemblies.
    pub assemblies: Vec<BomEntry>,
    /// Part types.
    pub part_list: Vec<BomEntry>,
}

/// An assembly or part type in a bill of materials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomEntry {
    /// Entry id.
    pub id: Uuid,
}
