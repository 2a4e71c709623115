//! Business logic services for the Pharmacy Retail ERP

pub mod company;
pub mod document;
pub mod item;
pub mod ledger;
pub mod pricing;
pub mod refresh_queue;
pub mod refresher;
pub mod reporting;
pub mod snapshot;

pub use company::CompanyService;
pub use document::DocumentService;
pub use item::ItemService;
pub use ledger::LedgerService;
pub use pricing::PricingService;
pub use refresh_queue::RefreshQueueService;
pub use refresher::SnapshotRefresher;
pub use reporting::ReportingService;
pub use snapshot::SnapshotService;
